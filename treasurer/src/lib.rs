//! TREASURER - Account Funder
//!
//! Keeps simulated accounts able to pay for what they do. Every top-up
//! comes from one shared funding source, and the source must never have
//! two funding transfers in flight at once.
//!
//! # Responsibilities
//! - Top accounts up from the funding source on demand
//! - Serialize submissions per address (funding source and accounts)
//! - Recover from nonce drift on the funding source
//! - Grant ERC-20 allowances before protocol calls

pub mod nonce;
pub mod sync;

pub use nonce::{recovered_nonce, submit_with_recovery, Recovered};
pub use sync::{KeyGuard, KeyedLock, SingleFlight};

use ethers::types::{Address, U256};
use gauntlet_metrics::GauntletMetrics;
use gauntlet_types::{is_native, Account, AccountLedger, ProtocolError, Token, TxReceipt, NATIVE};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Treasurer errors
#[derive(Error, Debug)]
pub enum FundingError {
    #[error("Ledger error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Nonce recovery gave up after {attempts} attempts: {last}")]
    NonceRecoveryExhausted { attempts: u32, last: String },
}

impl FundingError {
    /// The protocol error behind this failure, if there is one
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            FundingError::Protocol(e) => Some(e),
            FundingError::NonceRecoveryExhausted { .. } => None,
        }
    }
}

/// Funding amounts and lock behaviour
#[derive(Debug, Clone)]
pub struct FundingPolicy {
    /// Native balance an account should hold to pay for gas
    pub native_floor: U256,
    pub native_top_up: U256,
    pub token_top_up: U256,
    /// Allowance granted when an approval is needed
    pub approval_amount: U256,
    pub lock_poll: Duration,
    /// Re-read the balance after waiting for the source's lock
    pub recheck_after_wait: bool,
    pub max_nonce_retries: u32,
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self {
            native_floor: U256::exp10(18),                       // 1 native
            native_top_up: U256::from(10u64) * U256::exp10(18),  // 10 native
            token_top_up: U256::from(100u64) * U256::exp10(18),  // 100 tokens
            approval_amount: U256::from(2u64).pow(U256::from(251u64)),
            lock_poll: Duration::from_secs(1),
            recheck_after_wait: true,
            max_nonce_retries: 5,
        }
    }
}

impl FundingPolicy {
    pub fn top_up(&self, token: &Token) -> U256 {
        if is_native(token) {
            self.native_top_up
        } else {
            self.token_top_up
        }
    }
}

/// Result of a funding check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingOutcome {
    AlreadyFunded,
    ToppedUp { amount: U256, receipt: TxReceipt },
}

/// Account funder. One per engine; the lock table is not shared across
/// instances.
pub struct Treasurer {
    ledger: Arc<dyn AccountLedger>,
    policy: FundingPolicy,
    locks: KeyedLock,
    metrics: Option<Arc<GauntletMetrics>>,
}

impl Treasurer {
    pub fn new(ledger: Arc<dyn AccountLedger>, policy: FundingPolicy) -> Self {
        tracing::info!("TREASURER: Online with policy: {:?}", policy);
        Self {
            locks: KeyedLock::new(policy.lock_poll),
            ledger,
            policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GauntletMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &FundingPolicy {
        &self.policy
    }

    pub fn locks(&self) -> &KeyedLock {
        &self.locks
    }

    /// Make sure `account` holds at least `min_amount` of `token`, sending
    /// the difference (at least the policy top-up) from `source`.
    /// Transfers from one source never overlap.
    pub async fn ensure_funded(
        &self,
        account: &Account,
        source: &Account,
        token: Token,
        min_amount: U256,
    ) -> Result<FundingOutcome, FundingError> {
        let result = self.fund(account, source, token, min_amount).await;
        self.record(match &result {
            Ok(FundingOutcome::AlreadyFunded) => "already_funded",
            Ok(FundingOutcome::ToppedUp { .. }) => "topped_up",
            Err(_) => "failed",
        });
        result
    }

    /// Native top-up to the policy floor
    pub async fn ensure_gas(&self, account: &Account, source: &Account) -> Result<FundingOutcome, FundingError> {
        self.ensure_funded(account, source, NATIVE, self.policy.native_floor).await
    }

    async fn fund(
        &self,
        account: &Account,
        source: &Account,
        token: Token,
        min_amount: U256,
    ) -> Result<FundingOutcome, FundingError> {
        let mut balance = self.ledger.balance(account.address, token).await?;
        if balance >= min_amount {
            return Ok(FundingOutcome::AlreadyFunded);
        }

        let guard = self.locks.acquire(source.address).await;

        if guard.waited() && self.policy.recheck_after_wait {
            balance = self.ledger.balance(account.address, token).await?;
            if balance >= min_amount {
                tracing::debug!(
                    "TREASURER: {:?} funded while waiting on {:?}",
                    account.address,
                    source.address
                );
                return Ok(FundingOutcome::AlreadyFunded);
            }
        }

        let amount = self.policy.top_up(&token).max(min_amount - balance);
        let to = account.address;
        let recovered = submit_with_recovery(
            self.ledger.as_ref(),
            source.address,
            self.policy.max_nonce_retries,
            |nonce| self.ledger.transfer(source, to, token, amount, nonce),
        )
        .await?;
        drop(guard);

        if recovered.retries > 0 {
            if let Some(metrics) = &self.metrics {
                metrics.funding.nonce_recoveries.inc_by(recovered.retries as u64);
            }
        }

        tracing::info!(
            "TREASURER: Funded {:?} with {} of {:?} from {:?}",
            to,
            amount,
            token,
            source.address
        );

        Ok(FundingOutcome::ToppedUp {
            amount,
            receipt: recovered.receipt,
        })
    }

    /// Make sure `spender` may pull at least `min_amount` of `token` from
    /// `account`. Runs under the account's own key, so it must not be called
    /// from inside [`Treasurer::sequential`] for the same account.
    pub async fn ensure_allowance(
        &self,
        account: &Account,
        token: Token,
        spender: Address,
        min_amount: U256,
    ) -> Result<Option<TxReceipt>, FundingError> {
        if is_native(&token) {
            return Ok(None);
        }

        let _guard = self.locks.acquire(account.address).await;

        let allowance = self.ledger.allowance(account.address, token, spender).await?;
        if allowance >= min_amount {
            return Ok(None);
        }

        let receipt = self
            .ledger
            .approve(account, token, spender, self.policy.approval_amount)
            .await?;
        tracing::debug!("TREASURER: {:?} approved {:?} on {:?}", account.address, spender, token);
        Ok(Some(receipt))
    }

    /// Run `fut` while holding `key`. Not reentrant.
    pub async fn sequential<F, T>(&self, key: Address, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.locks.acquire(key).await;
        fut.await
    }

    fn record(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.funding.fundings.with_label_values(&[result]).inc();
        }
    }
}
