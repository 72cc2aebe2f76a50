use crate::amounts::{
    apply_slippage, far_deadline, random_slippage, size_input, MIN_SWAP_BALANCE, MIN_TRADE_AMOUNT,
};
use crate::{funding_failure, Action, ActionContext, Outcome};
use async_trait::async_trait;
use ethers::types::U256;
use gauntlet_types::{Account, ErrorKind, ProtocolError, Spender, SwapOrder, Token, NATIVE};
use pathfinder::Path;
use rand::Rng;

/// Exact-input swap between two random tokens along the shortest path.
/// With funding on, an input too small to trade is topped up and the same
/// pair is tried once more.
pub struct Swap;

/// How one sized attempt ended
enum Attempt {
    Done(Outcome),
    /// The input or its quote fell under the minimum; `token` paid for it
    Short { token: Token, error: ProtocolError },
}

#[async_trait]
impl Action for Swap {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn tolerates(&self) -> &'static [ErrorKind] {
        &[ErrorKind::AmountTooLow]
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let (token_in, token_out) = match ctx.with_rng(|rng| ctx.paths.random_pair(rng)) {
            Ok(pair) => pair,
            Err(e) => return Ok(Outcome::skipped(e.to_string())),
        };

        let Some(path) = ctx.paths.resolve(token_in, token_out) else {
            return Ok(Outcome::skipped(format!("no path {:?} -> {:?}", token_in, token_out)));
        };

        let short = match attempt(ctx, account, token_in, &path).await? {
            Attempt::Done(outcome) => return Ok(outcome),
            Attempt::Short { error, .. } if !ctx.fund => return Err(error),
            Attempt::Short { token, error } => {
                tracing::info!(
                    account = ?account.address,
                    action = "swap",
                    "PLAYBOOK: swap short on {:?} ({}), topping up and retrying",
                    token,
                    error
                );
                token
            }
        };

        ctx.treasurer
            .ensure_funded(account, &ctx.funding_source, short, MIN_SWAP_BALANCE)
            .await
            .map_err(funding_failure)?;

        match attempt(ctx, account, token_in, &path).await? {
            Attempt::Done(outcome) => Ok(outcome),
            Attempt::Short { error, .. } => Err(error),
        }
    }
}

async fn attempt(
    ctx: &ActionContext,
    account: &Account,
    token_in: Token,
    path: &Path,
) -> Result<Attempt, ProtocolError> {
    let sizing = size_input(ctx, account, token_in).await?;
    let paying = if sizing.native { NATIVE } else { token_in };

    if sizing.amount < MIN_TRADE_AMOUNT {
        return Ok(Attempt::Short {
            token: paying,
            error: ProtocolError::new(
                ErrorKind::AmountTooLow,
                format!("swap input {} below minimum, balance {}", sizing.amount, sizing.balance),
            ),
        });
    }

    let quote = ctx.protocol.quote(sizing.amount, path.tokens()).await?;
    if quote < MIN_TRADE_AMOUNT {
        return Ok(Attempt::Short {
            token: paying,
            error: ProtocolError::new(
                ErrorKind::AmountTooLow,
                format!("swap quote {} below minimum", quote),
            ),
        });
    }
    let min_amount_out = apply_slippage(quote, ctx.with_rng(random_slippage), 100);

    if !sizing.native {
        let router = ctx.protocol.spender(Spender::Router).await?;
        ctx.treasurer
            .ensure_allowance(account, token_in, router, sizing.amount)
            .await
            .map_err(funding_failure)?;
    }

    let total_users = ctx.protocol.total_users().await?;
    let total_users = total_users.min(U256::from(u64::MAX)).as_u64();
    let referrer_id = if total_users == 0 {
        0
    } else {
        ctx.with_rng(|rng| rng.gen_range(0..total_users))
    };

    let order = SwapOrder {
        amount_in: sizing.amount,
        min_amount_out,
        path: path.tokens().to_vec(),
        deadline: far_deadline(),
        referrer_id: U256::from(referrer_id),
        native_value: sizing.native.then_some(sizing.amount),
    };

    tracing::debug!(
        "PLAYBOOK: {:?} swapping {} along {:?}",
        account.address,
        order.amount_in,
        order.path
    );
    let receipt = ctx.submit(account, ctx.protocol.swap(account, order)).await?;
    Ok(Attempt::Done(Outcome::Submitted(receipt)))
}
