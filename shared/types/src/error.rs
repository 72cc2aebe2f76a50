//! Typed protocol failures
//!
//! Transport and revert text is turned into an [`ErrorKind`] once, at the
//! surface boundary. Everything downstream decides on the kind.

use std::fmt;
use thiserror::Error;

/// Failure reason reported by the protocol or its transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InsufficientInputAmount,
    InsufficientAmount,
    NothingAtNonce,
    AmountTooLow,
    NonceTooLow,
    NonceTooHigh,
    InsufficientFunds,
    RateLimited,
    ConnectionReset,
    AddressNotAvailable,
    PeerClosed,
    Timeout,
    ExecutionReverted,
    Other,
}

/// Substring table, most specific reasons first. The generic revert is last
/// so that `execution reverted: INSUFFICIENT_AMOUNT` keeps its reason.
const PATTERNS: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::InsufficientInputAmount, &["insufficient_input_amount"]),
    (
        ErrorKind::InsufficientAmount,
        &["insufficient_amount", "insufficient_output_amount", "insufficient_liquidity"],
    ),
    (ErrorKind::NothingAtNonce, &["balance found at nonce for user"]),
    (ErrorKind::AmountTooLow, &["amount too low"]),
    (ErrorKind::NonceTooLow, &["nonce too low"]),
    (ErrorKind::NonceTooHigh, &["nonce too high"]),
    (ErrorKind::InsufficientFunds, &["insufficient funds for gas", "gas + fee"]),
    (ErrorKind::ConnectionReset, &["econnreset", "connection reset"]),
    (ErrorKind::AddressNotAvailable, &["eaddrnotavail", "address not available"]),
    (ErrorKind::PeerClosed, &["other side closed", "peer closed connection"]),
    (ErrorKind::Timeout, &["timeout error", "timed out", "timeout"]),
    (ErrorKind::RateLimited, &["too many requests", "status code 429", "http 429"]),
    (ErrorKind::ExecutionReverted, &["execution reverted"]),
];

impl ErrorKind {
    /// Classify raw error text. Case-insensitive, first match wins.
    pub fn from_message(message: &str) -> Self {
        let lowered = message.to_lowercase();
        PATTERNS
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lowered.contains(n)))
            .map(|(kind, _)| *kind)
            .unwrap_or(ErrorKind::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InsufficientInputAmount => "insufficient_input_amount",
            ErrorKind::InsufficientAmount => "insufficient_amount",
            ErrorKind::NothingAtNonce => "nothing_at_nonce",
            ErrorKind::AmountTooLow => "amount_too_low",
            ErrorKind::NonceTooLow => "nonce_too_low",
            ErrorKind::NonceTooHigh => "nonce_too_high",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ConnectionReset => "connection_reset",
            ErrorKind::AddressNotAvailable => "address_not_available",
            ErrorKind::PeerClosed => "peer_closed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ExecutionReverted => "execution_reverted",
            ErrorKind::Other => "other",
        }
    }

    /// Network-level hiccups that say nothing about the protocol
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectionReset
                | ErrorKind::AddressNotAvailable
                | ErrorKind::PeerClosed
                | ErrorKind::Timeout
        )
    }

    pub fn is_nonce(&self) -> bool {
        matches!(self, ErrorKind::NonceTooLow | ErrorKind::NonceTooHigh)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every external surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ProtocolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProtocolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Build from unstructured transport or revert text
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self { kind: ErrorKind::from_message(&message), message }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}
