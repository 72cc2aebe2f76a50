//! External surfaces driven by the engine
//!
//! The engine never talks to a chain directly. It goes through these three
//! traits, implemented over RPC by the gateway crate and in memory by the
//! testkit.

use crate::{
    Account, Campaign, Contribution, Listing, Pool, Position, ProtocolError, Spender, StakeOrder,
    SwapOrder, Token, TxReceipt, VoteBallot,
};
use async_trait::async_trait;
use ethers_core::types::{Address, U256};

/// Reads and submissions against the protocol under test
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    // Reads

    /// Every pool the router knows about, in enumeration order
    async fn pools(&self) -> Result<Vec<Pool>, ProtocolError>;

    async fn wrapped_native(&self) -> Result<Token, ProtocolError>;

    /// Read-only output estimate for `amount_in` along `path`
    async fn quote(&self, amount_in: U256, path: &[Token]) -> Result<U256, ProtocolError>;

    /// Number of registered users (referrer ids are drawn below this)
    async fn total_users(&self) -> Result<U256, ProtocolError>;

    async fn positions(&self, owner: Address) -> Result<Vec<Position>, ProtocolError>;

    async fn current_epoch(&self) -> Result<u64, ProtocolError>;

    async fn active_listing(&self) -> Result<Option<Listing>, ProtocolError>;

    /// Token the owner currently votes for, if any
    async fn user_vote(&self, owner: Address) -> Result<Option<Token>, ProtocolError>;

    async fn active_campaigns(&self) -> Result<Vec<Campaign>, ProtocolError>;

    /// Campaigns the owner has contributed to
    async fn user_campaigns(&self, owner: Address) -> Result<Vec<Campaign>, ProtocolError>;

    /// Address of the contract acting as `spender`
    async fn spender(&self, spender: Spender) -> Result<Address, ProtocolError>;

    // Submissions

    async fn swap(&self, account: &Account, order: SwapOrder) -> Result<TxReceipt, ProtocolError>;

    async fn stake(&self, account: &Account, order: StakeOrder) -> Result<TxReceipt, ProtocolError>;

    async fn claim_rewards(&self, account: &Account, nonce: U256) -> Result<TxReceipt, ProtocolError>;

    async fn unstake(
        &self,
        account: &Account,
        nonce: U256,
        min_amount_a: U256,
        min_amount_b: U256,
    ) -> Result<TxReceipt, ProtocolError>;

    async fn vote(&self, account: &Account, ballot: VoteBallot) -> Result<TxReceipt, ProtocolError>;

    async fn recall_vote(&self, account: &Account) -> Result<TxReceipt, ProtocolError>;

    async fn contribute(&self, account: &Account, contribution: Contribution) -> Result<TxReceipt, ProtocolError>;

    async fn withdraw_campaign_tokens(&self, account: &Account, campaign_id: U256) -> Result<TxReceipt, ProtocolError>;

    async fn refund_campaign(&self, account: &Account, campaign_id: U256) -> Result<TxReceipt, ProtocolError>;

    /// Deposit native coin into the wrapped-native token on behalf of `account`
    async fn wrap_native(&self, account: &Account, amount: U256) -> Result<TxReceipt, ProtocolError>;

    async fn unwrap_native(&self, account: &Account, amount: U256) -> Result<TxReceipt, ProtocolError>;

    /// Let `spender` move the account's staking positions
    async fn approve_positions(&self, account: &Account, spender: Spender) -> Result<TxReceipt, ProtocolError>;

    async fn transfer_position(
        &self,
        account: &Account,
        to: Address,
        nonce: U256,
        amount: U256,
    ) -> Result<TxReceipt, ProtocolError>;
}

/// Balances, allowances and value transfers
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait AccountLedger: Send + Sync {
    /// Balance of `owner` in `token` (native when `token` is the sentinel)
    async fn balance(&self, owner: Address, token: Token) -> Result<U256, ProtocolError>;

    async fn allowance(&self, owner: Address, token: Token, spender: Address) -> Result<U256, ProtocolError>;

    /// Send `amount` of `token` from `from` to `to`, optionally pinning the
    /// sender's transaction nonce
    async fn transfer(
        &self,
        from: &Account,
        to: Address,
        token: Token,
        amount: U256,
        nonce: Option<U256>,
    ) -> Result<TxReceipt, ProtocolError>;

    async fn approve(
        &self,
        owner: &Account,
        token: Token,
        spender: Address,
        amount: U256,
    ) -> Result<TxReceipt, ProtocolError>;

    /// Next usable transaction nonce, when the ledger can tell
    async fn pending_nonce(&self, _owner: Address) -> Result<Option<U256>, ProtocolError> {
        Ok(None)
    }
}

/// Chain clock control, only meaningful on a local node
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait TimeControl: Send + Sync {
    async fn latest_timestamp(&self) -> Result<u64, ProtocolError>;

    /// Move chain time forward and mine a block
    async fn advance(&self, seconds: u64) -> Result<(), ProtocolError>;
}
