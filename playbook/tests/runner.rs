mod common;

use async_trait::async_trait;
use ethers::types::{H256, U256};
use gauntlet_metrics::GauntletMetrics;
use gauntlet_testkit::{account, addr, ether, MemoryChain};
use gauntlet_types::{
    Account, ErrorKind, MockProtocolClient, NetworkMode, Position, ProtocolError, TxReceipt, NATIVE,
};
use parking_lot::Mutex;
use pathfinder::{Pathfinder, PathfinderConfig};
use playbook::actions::{Claim, Swap};
use playbook::{Action, ActionContext, ActionRunner, ClaimPolicy, Outcome};
use std::collections::VecDeque;
use std::sync::Arc;
use treasurer::Treasurer;
use triage::Classifier;

fn receipt(n: u64) -> TxReceipt {
    TxReceipt {
        tx_hash: H256::from_low_u64_be(n),
        block_number: Some(n),
    }
}

/// Fails with the queued errors, then succeeds
struct Scripted {
    errors: Mutex<VecDeque<ProtocolError>>,
    tolerated: &'static [ErrorKind],
    runs: Mutex<usize>,
}

impl Scripted {
    fn new(messages: &[&str]) -> Self {
        Self {
            errors: Mutex::new(messages.iter().map(|m| ProtocolError::from_message(*m)).collect()),
            tolerated: &[],
            runs: Mutex::new(0),
        }
    }

    fn tolerating(mut self, tolerated: &'static [ErrorKind]) -> Self {
        self.tolerated = tolerated;
        self
    }

    fn runs(&self) -> usize {
        *self.runs.lock()
    }
}

#[async_trait]
impl Action for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn tolerates(&self) -> &'static [ErrorKind] {
        self.tolerated
    }

    async fn execute(&self, _ctx: &ActionContext, _account: &Account) -> Result<Outcome, ProtocolError> {
        *self.runs.lock() += 1;
        match self.errors.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(Outcome::Submitted(receipt(1))),
        }
    }
}

fn runner(mode: NetworkMode) -> (ActionRunner, Arc<GauntletMetrics>) {
    let metrics = Arc::new(GauntletMetrics::new());
    let runner = ActionRunner::new(Classifier::new(mode, Vec::new())).with_metrics(metrics.clone());
    (runner, metrics)
}

#[tokio::test]
async fn test_transport_errors_are_ignored() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let (runner, metrics) = runner(NetworkMode::Local);
    let action = Scripted::new(&["read ECONNRESET"]);

    let outcome = runner.run(&ctx, &action, &account(1)).await.unwrap();

    assert!(matches!(outcome, Outcome::Ignored(e) if e.kind == ErrorKind::ConnectionReset));
    assert_eq!(metrics.actions.count("scripted", "ignored"), 1);
    assert_eq!(action.runs(), 1);
}

#[tokio::test]
async fn test_revert_is_fatal_locally_but_not_live() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;

    let (local, local_metrics) = runner(NetworkMode::Local);
    let fatal = local
        .run(&ctx, &Scripted::new(&["execution reverted: K"]), &account(1))
        .await
        .unwrap_err();
    assert_eq!(fatal.action, "scripted");
    assert_eq!(fatal.account, account(1).address);
    assert_eq!(fatal.error.kind, ErrorKind::ExecutionReverted);
    assert_eq!(local_metrics.actions.count("scripted", "fatal"), 1);

    let (live, _) = runner(NetworkMode::Live);
    let outcome = live
        .run(&ctx, &Scripted::new(&["execution reverted: K"]), &account(1))
        .await
        .unwrap();
    assert_eq!(outcome.as_str(), "ignored");
}

#[tokio::test]
async fn test_action_tolerance_applies() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let (runner, _) = runner(NetworkMode::Local);
    let action = Scripted::new(&["execution reverted: No GToken balance found at nonce for user"])
        .tolerating(&[ErrorKind::NothingAtNonce]);

    let outcome = runner.run(&ctx, &action, &account(1)).await.unwrap();
    assert_eq!(outcome.as_str(), "ignored");
}

#[tokio::test]
async fn test_gas_shortage_is_funded_and_retried_once() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await.with_fund(true);
    let (runner, metrics) = runner(NetworkMode::Local);
    let user = account(1);
    let action = Scripted::new(&["insufficient funds for gas * price + value"]);

    let outcome = runner.run(&ctx, &action, &user).await.unwrap();

    assert!(outcome.is_submitted());
    assert_eq!(action.runs(), 2);
    assert_eq!(chain.calls("transfer"), 1);
    assert_eq!(chain.balance_of(user.address, NATIVE), ether(10));
    assert_eq!(metrics.actions.count("scripted", "retried"), 1);
    assert_eq!(metrics.actions.count("scripted", "submitted"), 1);
}

#[tokio::test]
async fn test_second_failure_after_retry_is_classified() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await.with_fund(true);
    let (runner, _) = runner(NetworkMode::Local);
    let action = Scripted::new(&["gas + fee exceeds balance", "gas + fee exceeds balance"]);

    let fatal = runner.run(&ctx, &action, &account(1)).await.unwrap_err();

    assert_eq!(fatal.error.kind, ErrorKind::InsufficientFunds);
    assert_eq!(action.runs(), 2);
}

#[tokio::test]
async fn test_no_retry_without_fund() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await;
    let (runner, _) = runner(NetworkMode::Live);
    let action = Scripted::new(&["insufficient funds for gas * price + value"]);

    let outcome = runner.run(&ctx, &action, &account(1)).await.unwrap();

    assert_eq!(outcome.as_str(), "ignored");
    assert_eq!(action.runs(), 1);
    assert_eq!(chain.calls("transfer"), 0);
}

#[tokio::test]
async fn test_short_swap_input_is_funded_and_same_pair_retried() {
    let chain = Arc::new(MemoryChain::new());
    let (token_a, token_b) = (addr(0xA1), addr(0xB1));
    chain.add_pool(token_a, token_b);
    let ctx = common::context(&chain).await.with_fund(true);
    let source = account(common::SOURCE).address;
    chain.mint(source, token_a, ether(1_000_000));
    chain.mint(source, token_b, ether(1_000_000));

    let user = account(1);
    chain.mint(user.address, NATIVE, ether(5));
    let (runner, metrics) = runner(NetworkMode::Local);

    let outcome = runner.run(&ctx, &Swap, &user).await.unwrap();

    assert!(outcome.is_submitted(), "{:?}", outcome);
    assert_eq!(chain.calls("transfer"), 1);
    assert_eq!(chain.calls("swap"), 1);
    assert_eq!(metrics.actions.count("swap", "submitted"), 1);
}

#[tokio::test]
async fn test_short_swap_input_without_fund_is_ignored() {
    let chain = Arc::new(MemoryChain::new());
    chain.add_pool(addr(0xA1), addr(0xB1));
    let ctx = common::context(&chain).await;
    let user = account(1);
    chain.mint(user.address, NATIVE, ether(5));
    let (runner, _) = runner(NetworkMode::Local);

    let outcome = runner.run(&ctx, &Swap, &user).await.unwrap();

    assert!(matches!(outcome, Outcome::Ignored(e) if e.kind == ErrorKind::AmountTooLow));
    assert_eq!(chain.calls("transfer"), 0);
    assert_eq!(chain.calls("swap"), 0);
}

#[tokio::test]
async fn test_runner_leaves_short_amounts_to_the_action() {
    let chain = Arc::new(MemoryChain::new());
    let ctx = common::context(&chain).await.with_fund(true);
    let (runner, _) = runner(NetworkMode::Local);
    let action = Scripted::new(&["amount too low"]).tolerating(&[ErrorKind::AmountTooLow]);

    let outcome = runner.run(&ctx, &action, &account(1)).await.unwrap();

    assert_eq!(outcome.as_str(), "ignored");
    assert_eq!(action.runs(), 1);
    assert_eq!(chain.calls("transfer"), 0);
}

#[tokio::test]
async fn test_claim_picks_oldest_position() {
    let chain = Arc::new(MemoryChain::new());
    let user = account(1);
    let mut protocol = MockProtocolClient::new();

    protocol.expect_positions().returning(|_| {
        Ok([(1u64, 5u64), (2, 2), (3, 9)]
            .into_iter()
            .map(|(nonce, last_claim_epoch)| Position {
                nonce: U256::from(nonce),
                amount: U256::exp10(18),
                epochs_locked: 1_000,
                last_claim_epoch,
            })
            .collect())
    });
    protocol
        .expect_claim_rewards()
        .withf(|_, nonce| *nonce == U256::from(2u64))
        .times(1)
        .returning(|_, _| Ok(receipt(7)));

    let ctx = ActionContext::new(
        Arc::new(protocol),
        chain.clone(),
        chain.clone(),
        Arc::new(Pathfinder::new(&[], PathfinderConfig::default())),
        Arc::new(Treasurer::new(chain.clone(), common::policy())),
        account(common::SOURCE),
        chain.wrapped_token(),
    )
    .with_claim_policy(ClaimPolicy::OldestClaim);

    let outcome = Claim.execute(&ctx, &user).await.unwrap();
    assert_eq!(outcome, Outcome::Submitted(receipt(7)));
}

#[tokio::test]
async fn test_claim_without_positions_is_skipped() {
    let chain = Arc::new(MemoryChain::new());
    let mut protocol = MockProtocolClient::new();
    protocol.expect_positions().returning(|_| Ok(Vec::new()));
    protocol.expect_claim_rewards().never();

    let ctx = ActionContext::new(
        Arc::new(protocol),
        chain.clone(),
        chain.clone(),
        Arc::new(Pathfinder::new(&[], PathfinderConfig::default())),
        Arc::new(Treasurer::new(chain.clone(), common::policy())),
        account(common::SOURCE),
        chain.wrapped_token(),
    );

    let outcome = Claim.execute(&ctx, &account(1)).await.unwrap();
    assert_eq!(outcome, Outcome::skipped("no positions"));
}
