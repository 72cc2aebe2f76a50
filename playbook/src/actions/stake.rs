use crate::amounts::{apply_slippage, far_deadline, random_slippage, size_input};
use crate::{funding_failure, Action, ActionContext, Outcome};
use async_trait::async_trait;
use gauntlet_types::{is_native, Account, ErrorKind, ProtocolError, Spender, StakeOrder, Token, TokenPayment};
use rand::Rng;

/// Lock durations are drawn from this range of epochs
pub const LOCK_EPOCHS: std::ops::Range<u64> = 900..1030;

/// Stake slippage is counted in parts per thousand
const SLIPPAGE_SCALE: u64 = 1_000;

/// Liquidity stake of a random pool's token pair
pub struct Stake;

/// Route the protocol uses to value the stake in native terms
pub fn path_to_native(ctx: &ActionContext, token_a: Token, token_b: Token) -> Option<Vec<Token>> {
    let wrapped = ctx.wrapped_native;
    if token_a == wrapped {
        return Some(vec![token_b, token_a]);
    }
    if token_b == wrapped {
        return Some(vec![token_a, token_b]);
    }
    ctx.paths
        .resolve(token_a, wrapped)
        .or_else(|| ctx.paths.resolve(token_b, wrapped))
        .map(|path| path.into_tokens())
}

#[async_trait]
impl Action for Stake {
    fn name(&self) -> &'static str {
        "stake"
    }

    fn tolerates(&self) -> &'static [ErrorKind] {
        &[ErrorKind::InsufficientAmount]
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let pool = match ctx.with_rng(|rng| ctx.paths.random_pool(rng)) {
            Ok(pool) => pool,
            Err(e) => return Ok(Outcome::skipped(e.to_string())),
        };
        let (token_a, token_b) = (pool.token0, pool.token1);

        let Some(path_to_native) = path_to_native(ctx, token_a, token_b) else {
            return Ok(Outcome::skipped(format!("no path to native for {:?} / {:?}", token_a, token_b)));
        };

        let slippage = ctx.with_rng(random_slippage);

        let sizing = size_input(ctx, account, token_a).await?;
        if sizing.amount.is_zero() {
            return Ok(Outcome::skipped("nothing to stake"));
        }
        let amount_a = sizing.amount;
        let amount_b = ctx.protocol.quote(amount_a, &[token_a, token_b]).await?;
        if amount_b.is_zero() {
            return Ok(Outcome::skipped("zero quote for second token"));
        }

        let min_amount_a = apply_slippage(amount_a, slippage, SLIPPAGE_SCALE);
        let min_amount_b = apply_slippage(amount_b, slippage, SLIPPAGE_SCALE);
        if min_amount_a.is_zero() || min_amount_b.is_zero() {
            return Ok(Outcome::skipped("stake too small after slippage"));
        }

        let governance = ctx.protocol.spender(Spender::Governance).await?;

        if ctx.fund {
            ctx.treasurer
                .ensure_gas(account, &ctx.funding_source)
                .await
                .map_err(funding_failure)?;
        }
        for (token, amount) in [(token_a, amount_a), (token_b, amount_b)] {
            if is_native(&token) {
                continue;
            }
            if ctx.fund {
                ctx.treasurer
                    .ensure_funded(account, &ctx.funding_source, token, amount)
                    .await
                    .map_err(funding_failure)?;
            }
            ctx.treasurer
                .ensure_allowance(account, token, governance, amount)
                .await
                .map_err(funding_failure)?;
        }

        let order = StakeOrder {
            payment_a: TokenPayment::fungible(token_a, amount_a),
            payment_b: TokenPayment::fungible(token_b, amount_b),
            epochs_locked: ctx.with_rng(|rng| rng.gen_range(LOCK_EPOCHS)),
            min_amount_a,
            min_amount_b,
            deadline: far_deadline(),
            path_to_native,
            native_value: sizing.native.then_some(amount_a),
        };

        tracing::debug!(
            "PLAYBOOK: {:?} staking {} {:?} + {} {:?} for {} epochs",
            account.address,
            amount_a,
            token_a,
            amount_b,
            token_b,
            order.epochs_locked
        );
        let receipt = ctx.submit(account, ctx.protocol.stake(account, order)).await?;
        Ok(Outcome::Submitted(receipt))
    }
}
