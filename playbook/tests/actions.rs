mod common;

use ethers::types::U256;
use gauntlet_testkit::{account, addr, ether, MemoryChain, EPOCH_SECONDS};
use gauntlet_types::{Account, Campaign, Listing, TimeControl, NATIVE};
use playbook::actions::{
    CompleteCampaign, Delegate, FundCampaign, RecallVote, Stake, Swap, Transfer, Undelegate, Unstake, Vote,
    LOCAL_VOTE_ADVANCE_SECS, LOCK_EPOCHS,
};
use playbook::amounts::FRACTION_DIVISOR;
use playbook::{Action, Outcome};
use std::sync::Arc;

const TOKEN_A: u64 = 0xA1;
const TOKEN_B: u64 = 0xB1;

fn rich(chain: &MemoryChain, user: &Account, tokens: &[u64]) {
    chain.mint(user.address, NATIVE, ether(1_000));
    for token in tokens {
        chain.mint(user.address, addr(*token), ether(1_000));
    }
    chain.mint(user.address, chain.wrapped_token(), ether(1_000));
}

#[tokio::test]
async fn test_swap_between_connected_tokens() {
    let chain = Arc::new(MemoryChain::new());
    let wrapped = chain.wrapped_token();
    chain.add_pool(addr(TOKEN_A), wrapped);
    chain.add_pool(wrapped, addr(TOKEN_B));
    let ctx = common::context(&chain).await;
    let user = account(1);
    rich(&chain, &user, &[TOKEN_A, TOKEN_B]);

    for _ in 0..5 {
        let outcome = Swap.execute(&ctx, &user).await.unwrap();
        assert!(outcome.is_submitted(), "{:?}", outcome);
    }
    assert_eq!(chain.calls("swap"), 5);
}

#[tokio::test]
async fn test_swap_with_empty_balance_is_amount_too_low() {
    let chain = Arc::new(MemoryChain::new());
    chain.add_pool(addr(TOKEN_A), addr(TOKEN_B));
    let ctx = common::context(&chain).await;

    let err = Swap.execute(&ctx, &account(1)).await.unwrap_err();

    assert_eq!(err.kind, gauntlet_types::ErrorKind::AmountTooLow);
    assert!(Swap.tolerates().contains(&err.kind));
    assert_eq!(chain.calls("swap"), 0);
}

#[tokio::test]
async fn test_stake_creates_locked_position() {
    let chain = Arc::new(MemoryChain::new());
    chain.add_pool(addr(TOKEN_A), chain.wrapped_token());
    let ctx = common::context(&chain).await;
    let user = account(1);
    rich(&chain, &user, &[TOKEN_A]);

    let outcome = Stake.execute(&ctx, &user).await.unwrap();

    assert!(outcome.is_submitted(), "{:?}", outcome);
    let positions = chain.positions_of(user.address);
    assert_eq!(positions.len(), 1);
    assert!(LOCK_EPOCHS.contains(&positions[0].epochs_locked));
    assert_eq!(
        chain.allowance_of(user.address, addr(TOKEN_A), chain.governance_address()),
        ctx.treasurer.policy().approval_amount - (positions[0].amount / 2u64)
    );
}

#[tokio::test]
async fn test_stake_without_route_to_native_is_skipped() {
    let chain = Arc::new(MemoryChain::new());
    chain.add_pool(addr(TOKEN_A), addr(TOKEN_B));
    let ctx = common::context(&chain).await;
    let user = account(1);
    rich(&chain, &user, &[TOKEN_A, TOKEN_B]);

    let outcome = Stake.execute(&ctx, &user).await.unwrap();

    assert!(matches!(outcome, Outcome::Skipped(_)));
    assert_eq!(chain.calls("stake"), 0);
}

#[tokio::test]
async fn test_stake_with_fund_tops_up_both_tokens() {
    let chain = Arc::new(MemoryChain::new());
    chain.add_pool(addr(TOKEN_A), chain.wrapped_token());
    let ctx = common::context(&chain).await.with_fund(true);
    let source = account(common::SOURCE);
    chain.mint(source.address, addr(TOKEN_A), ether(1_000_000));
    chain.mint(source.address, chain.wrapped_token(), ether(1_000_000));

    // Gas and a sliver of token A so the draw is non-zero
    let user = account(2);
    chain.mint(user.address, NATIVE, ether(1));
    chain.mint(user.address, addr(TOKEN_A), ether(1));

    let outcome = Stake.execute(&ctx, &user).await.unwrap();

    assert!(outcome.is_submitted(), "{:?}", outcome);
    assert_eq!(chain.positions_of(user.address).len(), 1);
    assert!(chain.calls("transfer") >= 1);
}

#[tokio::test]
async fn test_unstake_removes_a_position() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let user = account(1);
    chain.mint(user.address, NATIVE, ether(1));

    assert!(matches!(Unstake.execute(&ctx, &user).await.unwrap(), Outcome::Skipped(_)));

    chain.add_position(user.address, ether(5), 1_000, 0);
    chain.add_position(user.address, ether(7), 1_000, 0);
    assert!(Unstake.execute(&ctx, &user).await.unwrap().is_submitted());
    assert_eq!(chain.positions_of(user.address).len(), 1);
}

#[tokio::test]
async fn test_fund_campaign_respects_minimum_contribution() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let paired = addr(0xC1);
    let id = U256::from(1u64);
    chain.add_campaign(Campaign {
        id,
        creator: addr(0xCC),
        paired_token: paired,
        goal: ether(1_000),
        funds_raised: U256::zero(),
        deadline: chain.timestamp() + EPOCH_SECONDS,
    });

    let poor = account(1);
    chain.mint(poor.address, NATIVE, ether(1));
    chain.mint(poor.address, paired, ether(1) / 2u64);
    assert!(matches!(FundCampaign.execute(&ctx, &poor).await.unwrap(), Outcome::Skipped(_)));

    let rich = account(2);
    chain.mint(rich.address, NATIVE, ether(1));
    chain.mint(rich.address, paired, ether(500));
    assert!(FundCampaign.execute(&ctx, &rich).await.unwrap().is_submitted());

    let campaign = chain.campaign(id).unwrap();
    assert!(campaign.funds_raised >= ether(1));
    assert!(chain.contributed(rich.address, id));
    assert!(!chain.contributed(poor.address, id));
}

#[tokio::test]
async fn test_fund_campaign_ignores_ended_campaigns() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    chain.add_campaign(Campaign {
        id: U256::one(),
        creator: addr(0xCC),
        paired_token: addr(0xC1),
        goal: ether(1),
        funds_raised: U256::zero(),
        deadline: chain.timestamp(),
    });

    let outcome = FundCampaign.execute(&ctx, &account(1)).await.unwrap();
    assert_eq!(outcome, Outcome::skipped("no open campaigns"));
}

#[tokio::test]
async fn test_complete_campaign_withdraws_or_refunds() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let user = account(1);
    chain.mint(user.address, NATIVE, ether(1));
    let ended = chain.timestamp() - 1;

    for (id, raised) in [(1u64, ether(10)), (2u64, ether(3))] {
        chain.add_campaign(Campaign {
            id: U256::from(id),
            creator: addr(0xCC),
            paired_token: NATIVE,
            goal: ether(5),
            funds_raised: raised,
            deadline: ended,
        });
        chain.add_contribution(user.address, U256::from(id));
    }

    assert!(CompleteCampaign.execute(&ctx, &user).await.unwrap().is_submitted());

    assert_eq!(chain.calls("withdraw_campaign_tokens"), 1);
    assert_eq!(chain.calls("refund_campaign"), 1);
    assert!(!chain.contributed(user.address, U256::from(1u64)));
    assert!(!chain.contributed(user.address, U256::from(2u64)));
}

#[tokio::test]
async fn test_vote_uses_only_long_locked_positions() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let trade_token = addr(0xD1);
    chain.set_listing(Some(Listing {
        campaign_id: U256::one(),
        end_epoch: 10,
        trade_token,
    }));

    let short = account(1);
    chain.mint(short.address, NATIVE, ether(1));
    chain.add_position(short.address, ether(1), 100, 0);
    assert!(matches!(Vote.execute(&ctx, &short).await.unwrap(), Outcome::Skipped(_)));

    let long = account(2);
    chain.mint(long.address, NATIVE, ether(1));
    chain.add_position(long.address, ether(1), 1_000, 0);
    let before = chain.timestamp();

    assert!(Vote.execute(&ctx, &long).await.unwrap().is_submitted());
    assert_eq!(chain.vote_of(long.address), Some(trade_token));
    assert_eq!(chain.timestamp(), before + LOCAL_VOTE_ADVANCE_SECS);
}

#[tokio::test]
async fn test_vote_survives_failed_time_advance() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let trade_token = addr(0xD1);
    chain.set_listing(Some(Listing {
        campaign_id: U256::one(),
        end_epoch: 10,
        trade_token,
    }));

    let voter = account(1);
    chain.mint(voter.address, NATIVE, ether(1));
    chain.add_position(voter.address, ether(1), 1_000, 0);
    chain.fail_next("advance", gauntlet_types::ProtocolError::from_message("read ECONNRESET"));
    let before = chain.timestamp();

    assert!(Vote.execute(&ctx, &voter).await.unwrap().is_submitted());
    assert_eq!(chain.vote_of(voter.address), Some(trade_token));
    assert_eq!(chain.calls("advance"), 1);
    assert_eq!(chain.timestamp(), before);
}

#[tokio::test]
async fn test_vote_after_listing_end_is_skipped() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    chain.set_listing(Some(Listing {
        campaign_id: U256::one(),
        end_epoch: 0,
        trade_token: addr(0xD1),
    }));
    chain.advance(EPOCH_SECONDS * 2).await.unwrap();

    let user = account(1);
    chain.add_position(user.address, ether(1), 1_000, 0);
    assert!(matches!(Vote.execute(&ctx, &user).await.unwrap(), Outcome::Skipped(_)));
    assert_eq!(chain.calls("vote"), 0);
}

#[tokio::test]
async fn test_concurrent_votes_all_land() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = Arc::new(common::context(&chain).await);
    chain.set_listing(Some(Listing {
        campaign_id: U256::one(),
        end_epoch: 10,
        trade_token: addr(0xD1),
    }));

    let voters: Vec<_> = (1..=4).map(account).collect();
    for voter in &voters {
        chain.mint(voter.address, NATIVE, ether(1));
        chain.add_position(voter.address, ether(1), 1_000, 0);
    }

    let handles: Vec<_> = voters
        .iter()
        .map(|voter| {
            let ctx = ctx.clone();
            let voter = *voter;
            tokio::spawn(async move { Vote.execute(&ctx, &voter).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_submitted());
    }
    assert_eq!(chain.calls("vote"), 4);
    assert_eq!(chain.calls("advance"), 4);
    assert!(ctx.governance_queue.is_empty());
}

#[tokio::test]
async fn test_recall_only_with_recorded_vote() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let user = account(1);
    chain.mint(user.address, NATIVE, ether(1));

    assert!(matches!(RecallVote.execute(&ctx, &user).await.unwrap(), Outcome::Skipped(_)));

    chain.set_vote(user.address, addr(0xD1));
    assert!(RecallVote.execute(&ctx, &user).await.unwrap().is_submitted());
    assert_eq!(chain.vote_of(user.address), None);
}

#[tokio::test]
async fn test_transfers_go_to_other_accounts() {
    let chain = Arc::new(MemoryChain::new());
    chain.add_pool(addr(TOKEN_A), addr(TOKEN_B));
    let ctx = common::context(&chain).await;
    let sender = account(1);
    rich(&chain, &sender, &[TOKEN_A, TOKEN_B]);
    for _ in 0..10 {
        chain.add_position(sender.address, ether(1), 1_000, 0);
    }

    for _ in 0..10 {
        let outcome = Transfer.execute(&ctx, &sender).await.unwrap();
        assert!(outcome.is_submitted(), "{:?}", outcome);
    }

    let received = |i: u32| {
        let to = account(i).address;
        !chain.positions_of(to).is_empty()
            || [NATIVE, addr(TOKEN_A), addr(TOKEN_B)]
                .iter()
                .any(|t| !chain.balance_of(to, *t).is_zero())
    };
    assert!(received(2) || received(3));
    assert_eq!(
        chain.positions_of(sender.address).len() + chain.positions_of(account(2).address).len()
            + chain.positions_of(account(3).address).len(),
        10
    );
}

#[tokio::test]
async fn test_delegate_and_undelegate_move_small_fractions() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let user = account(1);
    chain.mint(user.address, NATIVE, ether(10));

    assert!(matches!(Undelegate.execute(&ctx, &user).await.unwrap(), Outcome::Skipped(_)));

    assert!(Delegate.execute(&ctx, &user).await.unwrap().is_submitted());
    let wrapped = chain.balance_of(user.address, chain.wrapped_token());
    assert!(!wrapped.is_zero());
    assert!(wrapped < ether(10) / FRACTION_DIVISOR);

    assert!(Undelegate.execute(&ctx, &user).await.unwrap().is_submitted());
    assert!(chain.balance_of(user.address, chain.wrapped_token()) < wrapped);
}
