//! Gauntlet Types - Shared types for the protocol soak tester
//!
//! Data model used by every engine crate plus the external surfaces
//! (protocol, ledger, time control) the engine drives.

pub mod error;
pub mod surface;

use ethers_core::types::{Address, H160, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use error::{ErrorKind, ProtocolError};
pub use surface::{AccountLedger, ProtocolClient, TimeControl};

#[cfg(feature = "mock")]
pub use surface::{MockAccountLedger, MockProtocolClient, MockTimeControl};

/// A fungible asset, identified by its contract address
pub type Token = Address;

/// Sentinel token standing for the chain's native coin
pub const NATIVE: Token = H160([0u8; 20]);

/// Returns true when `token` is the native sentinel
pub fn is_native(token: &Token) -> bool {
    *token == NATIVE
}

/// Network the run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Local test node: small fixed account set, simulated clock control
    Local,
    /// Live network: large derived account set, no clock control
    Live,
}

impl NetworkMode {
    pub fn is_local(&self) -> bool {
        matches!(self, NetworkMode::Local)
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkMode::Local => write!(f, "local"),
            NetworkMode::Live => write!(f, "live"),
        }
    }
}

impl std::str::FromStr for NetworkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "localhost" => Ok(NetworkMode::Local),
            "live" => Ok(NetworkMode::Live),
            other => Err(format!("Unknown network mode: {}", other)),
        }
    }
}

/// Liquidity pool between exactly two tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pool {
    pub address: Address,
    pub token0: Token,
    pub token1: Token,
}

impl Pool {
    pub fn new(address: Address, token0: Token, token1: Token) -> Self {
        Self { address, token0, token1 }
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    /// The opposite side of the pool, if `token` is one of its sides
    pub fn other(&self, token: &Token) -> Option<Token> {
        if self.token0 == *token {
            Some(self.token1)
        } else if self.token1 == *token {
            Some(self.token0)
        } else {
            None
        }
    }
}

/// A simulated user. The signing key lives with the surface implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    /// Derivation index within the account pool
    pub index: u32,
}

impl Account {
    pub fn new(address: Address, index: u32) -> Self {
        Self { address, index }
    }
}

/// Staking receipt held by an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub nonce: U256,
    pub amount: U256,
    pub epochs_locked: u64,
    pub last_claim_epoch: u64,
}

/// Launch campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: U256,
    pub creator: Address,
    pub paired_token: Token,
    pub goal: U256,
    pub funds_raised: U256,
    /// Unix timestamp (seconds, chain time)
    pub deadline: u64,
}

impl Campaign {
    pub fn is_open(&self, now: u64) -> bool {
        self.deadline > now
    }

    pub fn reached_goal(&self) -> bool {
        self.goal <= self.funds_raised
    }
}

/// Governance listing currently open for votes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub campaign_id: U256,
    pub end_epoch: u64,
    pub trade_token: Token,
}

/// Token amount as the protocol takes it (`nonce` is 0 for fungible tokens)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayment {
    pub token: Token,
    pub nonce: U256,
    pub amount: U256,
}

impl TokenPayment {
    pub fn fungible(token: Token, amount: U256) -> Self {
        Self { token, nonce: U256::zero(), amount }
    }
}

/// Contracts an account grants spending rights to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spender {
    Router,
    Governance,
    LaunchPair,
}

/// Exact-input swap along a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOrder {
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub path: Vec<Token>,
    pub deadline: U256,
    pub referrer_id: U256,
    /// Native coin attached to the call when paying natively
    pub native_value: Option<U256>,
}

/// Liquidity stake of a token pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeOrder {
    pub payment_a: TokenPayment,
    pub payment_b: TokenPayment,
    pub epochs_locked: u64,
    pub min_amount_a: U256,
    pub min_amount_b: U256,
    pub deadline: U256,
    pub path_to_native: Vec<Token>,
    pub native_value: Option<U256>,
}

/// Vote on the active listing with a staking position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteBallot {
    pub position_nonce: U256,
    pub position_amount: U256,
    pub trade_token: Token,
    pub in_favour: bool,
}

/// Contribution to a launch campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub campaign_id: U256,
    pub payment: TokenPayment,
    pub native_value: Option<U256>,
}

/// Acknowledgment of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_other_side() {
        let a = Address::from_low_u64_be(1);
        let b = Address::from_low_u64_be(2);
        let c = Address::from_low_u64_be(3);
        let pool = Pool::new(Address::from_low_u64_be(100), a, b);

        assert_eq!(pool.other(&a), Some(b));
        assert_eq!(pool.other(&b), Some(a));
        assert_eq!(pool.other(&c), None);
        assert!(!pool.contains(&c));
    }

    #[test]
    fn test_network_mode_parse() {
        assert_eq!("localhost".parse::<NetworkMode>().unwrap(), NetworkMode::Local);
        assert_eq!("LIVE".parse::<NetworkMode>().unwrap(), NetworkMode::Live);
        assert!("mainnet".parse::<NetworkMode>().is_err());
    }

    #[test]
    fn test_campaign_state() {
        let campaign = Campaign {
            id: U256::one(),
            creator: Address::from_low_u64_be(7),
            paired_token: NATIVE,
            goal: U256::from(100u64),
            funds_raised: U256::from(100u64),
            deadline: 1_000,
        };

        assert!(campaign.is_open(999));
        assert!(!campaign.is_open(1_000));
        assert!(campaign.reached_goal());
    }
}
