//! TRIAGE - Error Classifier
//!
//! Decides, per failed action attempt, whether the failure is expected
//! noise of a soak run or something that must stop the worker.
//!
//! # Responsibilities
//! - Tolerate transport hiccups everywhere
//! - Tolerate chain-level rejections on live networks only
//! - Apply per-action tolerances
//! - Stay deterministic: same error, same mode, same verdict

use gauntlet_types::{ErrorKind, NetworkMode, ProtocolError};
use std::fmt;

/// Kinds tolerated in every mode
pub const ALWAYS_IGNORABLE: &[ErrorKind] = &[
    ErrorKind::ConnectionReset,
    ErrorKind::AddressNotAvailable,
    ErrorKind::PeerClosed,
    ErrorKind::Timeout,
    ErrorKind::InsufficientInputAmount,
];

/// Kinds tolerated only against a live network
pub const LIVE_IGNORABLE: &[ErrorKind] = &[
    ErrorKind::ExecutionReverted,
    ErrorKind::NonceTooLow,
    ErrorKind::InsufficientFunds,
    ErrorKind::RateLimited,
];

/// Classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Log and move on
    Ignorable,
    /// Stop the worker
    Fatal,
}

impl Verdict {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Verdict::Fatal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Ignorable => "ignored",
            Verdict::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error classifier for one network mode
#[derive(Debug, Clone)]
pub struct Classifier {
    mode: NetworkMode,
    /// Provider-specific substrings tolerated on live networks when the
    /// error could not be typed
    live_patterns: Vec<String>,
}

impl Classifier {
    pub fn new(mode: NetworkMode, live_patterns: Vec<String>) -> Self {
        tracing::debug!(
            "TRIAGE: Classifier for {} with {} live patterns",
            mode,
            live_patterns.len()
        );
        Self { mode, live_patterns }
    }

    pub fn mode(&self) -> NetworkMode {
        self.mode
    }

    /// Classify `error` given the kinds the failing action tolerates
    pub fn classify(&self, error: &ProtocolError, tolerated: &[ErrorKind]) -> Verdict {
        if tolerated.contains(&error.kind) || ALWAYS_IGNORABLE.contains(&error.kind) {
            return Verdict::Ignorable;
        }

        if self.mode == NetworkMode::Live {
            if LIVE_IGNORABLE.contains(&error.kind) {
                return Verdict::Ignorable;
            }
            if error.kind == ErrorKind::Other
                && self.live_patterns.iter().any(|p| error.message.contains(p.as_str()))
            {
                return Verdict::Ignorable;
            }
        }

        Verdict::Fatal
    }

    /// Classify raw error text
    pub fn classify_message(&self, message: &str, tolerated: &[ErrorKind]) -> Verdict {
        self.classify(&ProtocolError::from_message(message), tolerated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn local() -> Classifier {
        Classifier::new(NetworkMode::Local, Vec::new())
    }

    fn live() -> Classifier {
        Classifier::new(NetworkMode::Live, vec!["upstream hiccup".to_string()])
    }

    #[test]
    fn test_transport_errors_ignorable_everywhere() {
        for message in [
            "read ECONNRESET",
            "connect EADDRNOTAVAIL 127.0.0.1:8545",
            "SocketError: other side closed",
            "Timeout Error",
            "execution reverted: INSUFFICIENT_INPUT_AMOUNT",
        ] {
            assert_eq!(local().classify_message(message, &[]), Verdict::Ignorable, "{}", message);
            assert_eq!(live().classify_message(message, &[]), Verdict::Ignorable, "{}", message);
        }
    }

    #[test]
    fn test_chain_rejections_depend_on_mode() {
        for message in [
            "execution reverted",
            "nonce too low: tx: 1 state: 2",
            "insufficient funds for gas * price + value",
            "Too Many Requests error received from rpc.edu-chain.raas.gelato.cloud",
        ] {
            assert_eq!(local().classify_message(message, &[]), Verdict::Fatal, "{}", message);
            assert_eq!(live().classify_message(message, &[]), Verdict::Ignorable, "{}", message);
        }
    }

    #[test]
    fn test_hex_digits_do_not_read_as_rate_limits() {
        let timeout = "Timeout Error: no response for tx 0xab4290ff";
        assert_eq!(local().classify_message(timeout, &[]), Verdict::Ignorable);

        let signer = "invalid signer 0x4291aa";
        assert_eq!(live().classify_message(signer, &[]), Verdict::Fatal);
    }

    #[test]
    fn test_live_patterns_only_apply_to_untyped_errors() {
        assert_eq!(live().classify_message("upstream hiccup on node 3", &[]), Verdict::Ignorable);
        assert_eq!(local().classify_message("upstream hiccup on node 3", &[]), Verdict::Fatal);
        // Typed kinds are decided by kind, not by pattern
        assert_eq!(live().classify_message("nonce too high (upstream hiccup)", &[]), Verdict::Fatal);
    }

    #[test]
    fn test_action_tolerances() {
        let claim_tolerates = [ErrorKind::NothingAtNonce];
        let message = "execution reverted: No GToken balance found at nonce for user";

        assert_eq!(local().classify_message(message, &claim_tolerates), Verdict::Ignorable);
        assert_eq!(local().classify_message(message, &[]), Verdict::Fatal);
    }

    proptest! {
        #[test]
        fn prop_classification_is_deterministic(message in ".{0,80}", live_mode in any::<bool>()) {
            let classifier = if live_mode { live() } else { local() };
            let first = classifier.classify_message(&message, &[]);
            prop_assert_eq!(classifier.classify_message(&message, &[]), first);
        }

        #[test]
        fn prop_live_tolerates_whatever_local_does(message in ".{0,80}") {
            if local().classify_message(&message, &[]) == Verdict::Ignorable {
                prop_assert_eq!(live().classify_message(&message, &[]), Verdict::Ignorable);
            }
        }
    }
}
