use crate::{Action, ActionContext, Outcome};
use async_trait::async_trait;
use futures::FutureExt;
use gauntlet_types::{Account, Position, ProtocolError, Spender, TxReceipt, VoteBallot};
use rand::Rng;

/// Positions need this many epochs of lock left to vote
pub const MIN_VOTE_LOCK_EPOCHS: u64 = 360;

/// Chain time moved after each voter on a local node (five minutes)
pub const LOCAL_VOTE_ADVANCE_SECS: u64 = 300;

/// Vote on the active listing with every eligible position
pub struct Vote;

/// Take back a recorded vote
pub struct RecallVote;

pub fn can_vote(position: &Position, current_epoch: u64) -> bool {
    position.epochs_locked.saturating_sub(current_epoch) >= MIN_VOTE_LOCK_EPOCHS
}

#[async_trait]
impl Action for Vote {
    fn name(&self) -> &'static str {
        "vote"
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let Some(listing) = ctx.protocol.active_listing().await? else {
            return Ok(Outcome::skipped("no active listing"));
        };
        let epoch = ctx.protocol.current_epoch().await?;
        if epoch > listing.end_epoch {
            return Ok(Outcome::skipped(format!("listing ended at epoch {}", listing.end_epoch)));
        }

        let ballots: Vec<VoteBallot> = ctx
            .protocol
            .positions(account.address)
            .await?
            .into_iter()
            .filter(|p| can_vote(p, epoch))
            .map(|p| VoteBallot {
                position_nonce: p.nonce,
                position_amount: p.amount,
                trade_token: listing.trade_token,
                in_favour: ctx.with_rng(|rng| rng.gen_range(0..100) <= 70),
            })
            .collect();
        if ballots.is_empty() {
            return Ok(Outcome::skipped("no position locked long enough"));
        }

        let protocol = ctx.protocol.clone();
        let clock = ctx.clock.clone();
        let treasurer = ctx.treasurer.clone();
        let local = ctx.mode.is_local();
        let voter = *account;

        let step = async move {
            let result = treasurer
                .sequential(voter.address, async {
                    let mut last = protocol.approve_positions(&voter, Spender::Governance).await?;
                    for ballot in ballots {
                        let in_favour = ballot.in_favour;
                        last = protocol.vote(&voter, ballot).await?;
                        tracing::info!(
                            "PLAYBOOK: {:?} voted {} for {:?}",
                            voter.address,
                            if in_favour { "YES" } else { "NO" },
                            listing.trade_token
                        );
                    }
                    Ok::<TxReceipt, ProtocolError>(last)
                })
                .await;

            if local {
                if let Err(e) = clock.advance(LOCAL_VOTE_ADVANCE_SECS).await {
                    tracing::warn!("PLAYBOOK: Time advance after vote failed: {}", e);
                }
            }
            result
        };

        match ctx.governance_queue.submit(None, step.boxed()).await {
            Some(result) => Ok(Outcome::Submitted(result?)),
            None => Ok(Outcome::skipped("vote dropped from the governance queue")),
        }
    }
}

#[async_trait]
impl Action for RecallVote {
    fn name(&self) -> &'static str {
        "recall_vote"
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        if ctx.protocol.user_vote(account.address).await?.is_none() {
            return Ok(Outcome::skipped("no vote to recall"));
        }

        let protocol = ctx.protocol.clone();
        let treasurer = ctx.treasurer.clone();
        let voter = *account;
        let step = async move {
            treasurer
                .sequential(voter.address, protocol.recall_vote(&voter))
                .await
        };

        match ctx.governance_queue.submit(None, step.boxed()).await {
            Some(result) => Ok(Outcome::Submitted(result?)),
            None => Ok(Outcome::skipped("recall dropped from the governance queue")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    #[test]
    fn test_vote_eligibility() {
        let position = |epochs_locked| Position {
            nonce: U256::one(),
            amount: U256::one(),
            epochs_locked,
            last_claim_epoch: 0,
        };

        assert!(can_vote(&position(1_000), 10));
        assert!(can_vote(&position(370), 10));
        assert!(!can_vote(&position(369), 10));
        assert!(!can_vote(&position(5), 10));
    }
}
