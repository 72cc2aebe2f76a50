use crate::{Action, ActionContext, ClaimPolicy, Outcome};
use async_trait::async_trait;
use ethers::types::U256;
use gauntlet_types::{Account, ErrorKind, Position, ProtocolError};
use rand::seq::SliceRandom;

/// Claim staking rewards on one position
pub struct Claim;

/// Unstake one random position
pub struct Unstake;

/// Position a claim goes for under the configured [`ClaimPolicy`]
pub fn pick_for_claim<'a>(ctx: &ActionContext, positions: &'a [Position]) -> Option<&'a Position> {
    match ctx.claim_policy {
        ClaimPolicy::Random => ctx.with_rng(|rng| positions.choose(rng)),
        ClaimPolicy::OldestClaim => positions.iter().min_by_key(|p| p.last_claim_epoch),
    }
}

#[async_trait]
impl Action for Claim {
    fn name(&self) -> &'static str {
        "claim"
    }

    fn tolerates(&self) -> &'static [ErrorKind] {
        &[ErrorKind::NothingAtNonce]
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let positions = ctx.protocol.positions(account.address).await?;
        let Some(nonce) = pick_for_claim(ctx, &positions).map(|p| p.nonce) else {
            return Ok(Outcome::skipped("no positions"));
        };

        let receipt = ctx
            .submit(account, ctx.protocol.claim_rewards(account, nonce))
            .await?;
        Ok(Outcome::Submitted(receipt))
    }
}

#[async_trait]
impl Action for Unstake {
    fn name(&self) -> &'static str {
        "unstake"
    }

    fn tolerates(&self) -> &'static [ErrorKind] {
        &[ErrorKind::NothingAtNonce]
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let positions = ctx.protocol.positions(account.address).await?;
        let Some(nonce) = ctx.with_rng(|rng| positions.choose(rng).map(|p| p.nonce)) else {
            return Ok(Outcome::skipped("no positions"));
        };

        let receipt = ctx
            .submit(
                account,
                ctx.protocol.unstake(account, nonce, U256::one(), U256::one()),
            )
            .await?;
        Ok(Outcome::Submitted(receipt))
    }
}
