use crate::amounts::random_fraction;
use crate::{Action, ActionContext, Outcome};
use async_trait::async_trait;
use gauntlet_types::{Account, ProtocolError, NATIVE};

/// Wrap part of the native balance
pub struct Delegate;

/// Unwrap part of the wrapped-native balance
pub struct Undelegate;

#[async_trait]
impl Action for Delegate {
    fn name(&self) -> &'static str {
        "delegate"
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let balance = ctx.ledger.balance(account.address, NATIVE).await?;
        let amount = ctx.with_rng(|rng| random_fraction(rng, balance));
        if amount.is_zero() {
            return Ok(Outcome::skipped("native balance too small"));
        }

        let receipt = ctx.submit(account, ctx.protocol.wrap_native(account, amount)).await?;
        Ok(Outcome::Submitted(receipt))
    }
}

#[async_trait]
impl Action for Undelegate {
    fn name(&self) -> &'static str {
        "undelegate"
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let balance = ctx.ledger.balance(account.address, ctx.wrapped_native).await?;
        let amount = ctx.with_rng(|rng| random_fraction(rng, balance));
        if amount.is_zero() {
            return Ok(Outcome::skipped("wrapped balance too small"));
        }

        let receipt = ctx.submit(account, ctx.protocol.unwrap_native(account, amount)).await?;
        Ok(Outcome::Submitted(receipt))
    }
}
