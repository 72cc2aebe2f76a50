use crate::amounts::random_fraction;
use crate::{Action, ActionContext, Outcome};
use async_trait::async_trait;
use ethers::types::Address;
use gauntlet_types::{Account, ProtocolError, Token, NATIVE};
use rand::seq::SliceRandom;
use rand::Rng;

/// Send something to another account of the pool
pub struct Transfer;

/// What a transfer moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Asset {
    Fungible(Token),
    /// A whole staking position
    Position,
}

impl Transfer {
    /// Tokens seen in pools plus the native coin, and positions one time in
    /// four
    fn pick_asset(ctx: &ActionContext) -> Asset {
        ctx.with_rng(|rng| {
            if rng.gen_range(0..4) == 0 {
                return Asset::Position;
            }
            let tokens = ctx.paths.tokens();
            let index = rng.gen_range(0..=tokens.len());
            Asset::Fungible(tokens.get(index).copied().unwrap_or(NATIVE))
        })
    }

    fn pick_recipient(ctx: &ActionContext, account: &Account) -> Option<Address> {
        let others: Vec<Address> = ctx
            .recipients
            .iter()
            .copied()
            .filter(|r| *r != account.address)
            .collect();
        ctx.with_rng(|rng| others.choose(rng).copied())
    }
}

#[async_trait]
impl Action for Transfer {
    fn name(&self) -> &'static str {
        "transfer"
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let Some(to) = Self::pick_recipient(ctx, account) else {
            return Ok(Outcome::skipped("no recipient"));
        };

        match Self::pick_asset(ctx) {
            Asset::Position => {
                let positions = ctx.protocol.positions(account.address).await?;
                let Some(position) = ctx.with_rng(|rng| positions.choose(rng).cloned()) else {
                    return Ok(Outcome::skipped("no position to transfer"));
                };
                let receipt = ctx
                    .submit(
                        account,
                        ctx.protocol
                            .transfer_position(account, to, position.nonce, position.amount),
                    )
                    .await?;
                tracing::debug!(
                    "PLAYBOOK: {:?} sent position {} to {:?}",
                    account.address,
                    position.nonce,
                    to
                );
                Ok(Outcome::Submitted(receipt))
            }
            Asset::Fungible(token) => {
                let balance = ctx.ledger.balance(account.address, token).await?;
                let amount = ctx.with_rng(|rng| random_fraction(rng, balance));
                if amount.is_zero() {
                    return Ok(Outcome::skipped(format!("nothing to send of {:?}", token)));
                }
                let receipt = ctx
                    .submit(account, ctx.ledger.transfer(account, to, token, amount, None))
                    .await?;
                tracing::debug!(
                    "PLAYBOOK: {:?} sent {} of {:?} to {:?}",
                    account.address,
                    amount,
                    token,
                    to
                );
                Ok(Outcome::Submitted(receipt))
            }
        }
    }
}
