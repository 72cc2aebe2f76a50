//! Nonce recovery for funding submissions
//!
//! A funding source is shared by every worker, so its transaction count
//! moves under our feet. On a nonce rejection the submission is retried
//! with a fresh nonce: the ledger's pending count when it has one, else
//! the `state: N` figure some nodes put in the rejection text.

use crate::FundingError;
use ethers::types::{Address, U256};
use gauntlet_types::{AccountLedger, ProtocolError, TxReceipt};
use regex::Regex;
use std::future::Future;
use std::sync::OnceLock;

fn state_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"state: (\d+)").ok()).as_ref()
}

/// Expected nonce quoted in a node's rejection message, if any
pub fn recovered_nonce(message: &str) -> Option<U256> {
    let captures = state_pattern()?.captures(message)?;
    U256::from_dec_str(captures.get(1)?.as_str()).ok()
}

/// Receipt plus the number of nonce corrections it took
#[derive(Debug, Clone)]
pub struct Recovered {
    pub receipt: TxReceipt,
    pub retries: u32,
}

/// Run `submit` with the sender's pending nonce, retrying on nonce
/// rejections up to `max_retries` times. Any other failure, or a rejection
/// with no usable new nonce, is returned as is.
pub async fn submit_with_recovery<F, Fut>(
    ledger: &dyn AccountLedger,
    sender: Address,
    max_retries: u32,
    mut submit: F,
) -> Result<Recovered, FundingError>
where
    F: FnMut(Option<U256>) -> Fut,
    Fut: Future<Output = Result<TxReceipt, ProtocolError>>,
{
    let mut nonce = ledger.pending_nonce(sender).await?;
    let mut retries = 0;

    loop {
        let error = match submit(nonce).await {
            Ok(receipt) => return Ok(Recovered { receipt, retries }),
            Err(e) if e.kind.is_nonce() => e,
            Err(e) => return Err(e.into()),
        };

        if retries >= max_retries {
            return Err(FundingError::NonceRecoveryExhausted {
                attempts: retries + 1,
                last: error.message,
            });
        }

        let next = match ledger.pending_nonce(sender).await? {
            Some(pending) if Some(pending) != nonce => Some(pending),
            _ => recovered_nonce(&error.message).filter(|n| Some(*n) != nonce),
        };

        match next {
            Some(n) => {
                tracing::warn!(
                    "TREASURER: {} from {:?} at nonce {:?}, retrying with {}",
                    error.kind,
                    sender,
                    nonce,
                    n
                );
                nonce = Some(n);
                retries += 1;
            }
            None => return Err(error.into()),
        }
    }
}
