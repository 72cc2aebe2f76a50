//! PLAYBOOK - Action Catalog
//!
//! Randomized protocol interactions performed by simulated users. Each
//! action is one protocol interaction for one account and is safe to run
//! concurrently for disjoint accounts.
//!
//! # Responsibilities
//! - Draw tokens, pools, amounts and slippage for each interaction
//! - Fund and approve before submitting when asked to
//! - Serialize submissions per account
//! - Classify failures closest to the call and retry once after funding

pub mod actions;
pub mod amounts;
pub mod catalog;
pub mod context;
pub mod runner;

pub use catalog::Catalog;
pub use context::{ActionContext, ClaimPolicy};
pub use runner::ActionRunner;

use async_trait::async_trait;
use ethers::types::Address;
use gauntlet_types::{Account, ErrorKind, ProtocolError, TxReceipt};
use pathfinder::PathfinderError;
use thiserror::Error;
use treasurer::FundingError;

/// Playbook setup errors
#[derive(Error, Debug)]
pub enum PlaybookError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Catalog has no actions")]
    EmptyCatalog,

    #[error("Unknown claim policy: {0}")]
    UnknownClaimPolicy(String),

    #[error("Path error: {0}")]
    Path(#[from] PathfinderError),
}

/// A failure the classifier refused to tolerate. Ends the worker.
#[derive(Error, Debug, Clone)]
#[error("{action} for {account:?} failed: {error}")]
pub struct FatalError {
    pub action: &'static str,
    pub account: Address,
    pub error: ProtocolError,
}

/// What an action did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Submitted(TxReceipt),
    /// Nothing to do for this account right now
    Skipped(String),
    /// Failed with an error the classifier tolerates
    Ignored(ProtocolError),
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, Outcome::Submitted(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Submitted(_) => "submitted",
            Outcome::Skipped(_) => "skipped",
            Outcome::Ignored(_) => "ignored",
        }
    }
}

/// One kind of protocol interaction
#[async_trait]
pub trait Action: Send + Sync {
    /// Stable name, used in config weights, logs and metrics
    fn name(&self) -> &'static str;

    /// Error kinds this action treats as expected
    fn tolerates(&self) -> &'static [ErrorKind] {
        &[]
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError>;
}

/// Funding failures surface to the classifier as protocol errors
pub(crate) fn funding_failure(error: FundingError) -> ProtocolError {
    match error {
        FundingError::Protocol(e) => e,
        FundingError::NonceRecoveryExhausted { attempts, last } => ProtocolError::new(
            ErrorKind::NonceTooLow,
            format!("nonce recovery gave up after {} attempts: {}", attempts, last),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_recovery_reads_as_nonce_error() {
        let error = funding_failure(FundingError::NonceRecoveryExhausted {
            attempts: 6,
            last: "nonce too low: tx: 3 state: 4".to_string(),
        });
        assert_eq!(error.kind, ErrorKind::NonceTooLow);

        let error = funding_failure(FundingError::from(ProtocolError::from_message("read ECONNRESET")));
        assert_eq!(error.kind, ErrorKind::ConnectionReset);
    }
}
