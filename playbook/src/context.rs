//! Everything an action needs to talk to the protocol

use crate::PlaybookError;
use ethers::types::Address;
use gauntlet_types::{Account, AccountLedger, NetworkMode, ProtocolClient, TimeControl, Token};
use parking_lot::Mutex;
use pathfinder::Pathfinder;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use treasurer::{SingleFlight, Treasurer};

/// Which staking position a claim picks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimPolicy {
    #[default]
    Random,
    /// The position whose rewards were claimed longest ago
    OldestClaim,
}

impl FromStr for ClaimPolicy {
    type Err = PlaybookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(ClaimPolicy::Random),
            "oldest_claim" => Ok(ClaimPolicy::OldestClaim),
            other => Err(PlaybookError::UnknownClaimPolicy(other.to_string())),
        }
    }
}

/// Shared collaborators for one engine. Cheap to share behind an `Arc`.
pub struct ActionContext {
    pub protocol: Arc<dyn ProtocolClient>,
    pub ledger: Arc<dyn AccountLedger>,
    pub clock: Arc<dyn TimeControl>,
    pub paths: Arc<Pathfinder>,
    pub treasurer: Arc<Treasurer>,
    /// Account every top-up is paid from
    pub funding_source: Account,
    /// Addresses of the account pool, used as transfer recipients
    pub recipients: Vec<Address>,
    pub wrapped_native: Token,
    pub fund: bool,
    pub mode: NetworkMode,
    pub claim_policy: ClaimPolicy,
    /// Serializes governance votes across the engine
    pub governance_queue: Arc<SingleFlight>,
    rng: Mutex<ChaCha8Rng>,
}

impl ActionContext {
    pub fn new(
        protocol: Arc<dyn ProtocolClient>,
        ledger: Arc<dyn AccountLedger>,
        clock: Arc<dyn TimeControl>,
        paths: Arc<Pathfinder>,
        treasurer: Arc<Treasurer>,
        funding_source: Account,
        wrapped_native: Token,
    ) -> Self {
        let governance_queue = Arc::new(SingleFlight::new(treasurer.policy().lock_poll));
        Self {
            protocol,
            ledger,
            clock,
            paths,
            treasurer,
            funding_source,
            recipients: Vec::new(),
            wrapped_native,
            fund: false,
            mode: NetworkMode::Local,
            claim_policy: ClaimPolicy::default(),
            governance_queue,
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    pub fn with_recipients(mut self, recipients: Vec<Address>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_fund(mut self, fund: bool) -> Self {
        self.fund = fund;
        self
    }

    pub fn with_mode(mut self, mode: NetworkMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_claim_policy(mut self, policy: ClaimPolicy) -> Self {
        self.claim_policy = policy;
        self
    }

    /// Reproducible draws
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(ChaCha8Rng::seed_from_u64(seed));
        self
    }

    /// Run `f` with the engine's random source. The lock is released before
    /// `f`'s result is returned, so never call this across an await.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        f(&mut self.rng.lock())
    }

    /// Run a submission under the account's key, so one account never has
    /// two transactions in flight
    pub async fn submit<F, T>(&self, account: &Account, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        self.treasurer.sequential(account.address, fut).await
    }
}
