//! Amount, slippage and deadline draws

use crate::ActionContext;
use ethers::types::U256;
use gauntlet_types::{is_native, Account, ProtocolError, Token, NATIVE};
use rand::Rng;

/// Smallest random trade size (0.001 token)
pub const MIN_TRADE_AMOUNT: U256 = U256([1_000_000_000_000_000, 0, 0, 0]);

/// Smallest balance whose 90% cap still clears [`MIN_TRADE_AMOUNT`]
pub const MIN_SWAP_BALANCE: U256 = U256([1_111_111_111_111_112, 0, 0, 0]);

/// Launch campaigns refuse anything below one token
pub const MIN_CONTRIBUTION: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

/// Transfers and wraps move at most this fraction of a random draw
pub const FRACTION_DIVISOR: u64 = 10_000;

const DRAW_MIN: u128 = 1_000_000_000_000_000;
const DRAW_MAX: u128 = 100_000_000_000_000_000_000;

/// Chance, in percent, that wrapped native is paid with the native coin
const NATIVE_PAYMENT_PERCENT: u32 = 45;

/// Largest safe integer of a double; the protocol takes it as "no deadline"
pub fn far_deadline() -> U256 {
    U256::from(9_007_199_254_740_991u64)
}

/// A sized input and how it is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizing {
    pub amount: U256,
    /// Paid with the native coin instead of the token
    pub native: bool,
    /// Balance the amount was capped against
    pub balance: U256,
}

/// Uniform draw in `[0.001, 100)` tokens
pub fn random_amount<R: Rng + ?Sized>(rng: &mut R) -> U256 {
    U256::from(rng.gen_range(DRAW_MIN..DRAW_MAX))
}

/// Draws above the balance fall back to 90% of it
pub fn cap_to_balance(amount: U256, balance: U256) -> U256 {
    if amount > balance {
        balance * 9u64 / 10u64
    } else {
        amount
    }
}

/// `amount` minus `slippage` parts per `scale`
pub fn apply_slippage(amount: U256, slippage: u64, scale: u64) -> U256 {
    amount - amount * slippage / scale
}

/// Slippage draw in `[1, 10)`
pub fn random_slippage<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    rng.gen_range(1..10)
}

/// A random part of `balance`, divided by [`FRACTION_DIVISOR`]
pub fn random_fraction<R: Rng + ?Sized>(rng: &mut R, balance: U256) -> U256 {
    if balance.is_zero() {
        return U256::zero();
    }
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    (U256::from_big_endian(&bytes) % balance) / FRACTION_DIVISOR
}

/// Size an input of `token` for `account`. Wrapped native is paid natively
/// part of the time; the native sentinel always is.
pub async fn size_input(ctx: &ActionContext, account: &Account, token: Token) -> Result<Sizing, ProtocolError> {
    let native = is_native(&token)
        || (token == ctx.wrapped_native
            && ctx.with_rng(|rng| rng.gen_range(0..100)) >= 100 - NATIVE_PAYMENT_PERCENT);

    let balance = ctx
        .ledger
        .balance(account.address, if native { NATIVE } else { token })
        .await?;
    let draw = ctx.with_rng(|rng| random_amount(rng));

    Ok(Sizing {
        amount: cap_to_balance(draw, balance),
        native,
        balance,
    })
}
