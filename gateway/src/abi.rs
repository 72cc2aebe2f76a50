//! Contract interfaces
//!
//! Only the functions the engine calls are declared, as human-readable
//! fragments parsed once at startup. Struct returns are declared as
//! unnamed tuples in the deployed field order.

use crate::GatewayError;
use ethers::abi::{parse_abi, Abi, Function, Token as AbiToken};
use ethers::types::{Address, Bytes, U256};
use gauntlet_types::TokenPayment;

/// `(token, nonce, amount)`
const PAYMENT: &str = "(address,uint256,uint256)";

const ROUTER: &[&str] = &[
    "function pairs() external view returns (address[])",
    "function getWrappedNativeToken() external view returns (address)",
    "function getGovernance() external view returns (address)",
    "function totalUsers() external view returns (uint256)",
    "function registerAndSwap(uint256 referrerId, bytes swapData) external payable",
    "function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) external returns (uint256[])",
];

const PAIR: &[&str] = &[
    "function token0() external view returns (address)",
    "function token1() external view returns (address)",
];

const VIEWS: &[&str] = &["function getQuote(uint256 amountIn, address[] path) external view returns (uint256)"];

const ERC20: &[&str] = &[
    "function balanceOf(address owner) external view returns (uint256)",
    "function allowance(address owner, address spender) external view returns (uint256)",
    "function approve(address spender, uint256 amount) external returns (bool)",
    "function transfer(address to, uint256 amount) external returns (bool)",
];

const WRAPPED_NATIVE: &[&str] = &[
    "function receiveFor(address to) external payable",
    "function withdraw(uint256 amount) external",
];

const GTOKEN: &[&str] = &[
    // (nonce, amount, (rewardPerShare, epochStaked, epochsLocked, lastClaimEpoch, stakeWeight, lpAmount))
    "function getGTokenBalance(address user) external view returns ((uint256,uint256,(uint256,uint256,uint256,uint256,uint256,uint256))[])",
    "function setApprovalForAll(address operator, bool approved) external",
    "function safeTransferFrom(address from, address to, uint256 id, uint256 amount, bytes data) external",
];

/// Attribute slots inside a GToken balance entry
const ATTR_EPOCHS_LOCKED: usize = 2;
const ATTR_LAST_CLAIM_EPOCH: usize = 3;

/// Field slots of a listing: (owner, tradeTokenPayment, securityGTokenPayment,
/// campaignId, yesVote, noVote, endEpoch)
pub const LISTING_OWNER: usize = 0;
pub const LISTING_TRADE_PAYMENT: usize = 1;
pub const LISTING_CAMPAIGN_ID: usize = 3;
pub const LISTING_END_EPOCH: usize = 6;

/// Field slots of a campaign: (creator, goal, deadline, fundsRaised)
pub const CAMPAIGN_CREATOR: usize = 0;
pub const CAMPAIGN_GOAL: usize = 1;
pub const CAMPAIGN_DEADLINE: usize = 2;
pub const CAMPAIGN_FUNDS_RAISED: usize = 3;

fn governance_fragments() -> Vec<String> {
    vec![
        "function getGToken() external view returns (address)".to_string(),
        "function launchPair() external view returns (address)".to_string(),
        "function currentEpoch() external view returns (uint256)".to_string(),
        format!(
            "function activeListing() external view returns ((address,{p},{p},uint256,uint256,uint256,uint256))",
            p = PAYMENT
        ),
        "function userVote(address user) external view returns (address)".to_string(),
        format!(
            "function stakeLiquidity({p} paymentA, {p} paymentB, uint256 epochsLocked, uint256[3] amountOutMins, address[] pathToNative) external payable returns (uint256)",
            p = PAYMENT
        ),
        "function claimRewards(uint256 nonce) external returns (uint256)".to_string(),
        "function unStake(uint256 nonce, uint256 amount0Min, uint256 amount1Min) external".to_string(),
        format!(
            "function vote({p} payment, address tradeToken, bool shouldList) external",
            p = PAYMENT
        ),
        "function recallVoteToken() external".to_string(),
    ]
}

fn launch_pair_fragments() -> Vec<String> {
    vec![
        "function getActiveCampaigns() external view returns (uint256[])".to_string(),
        "function getUserCampaigns(address user) external view returns (uint256[])".to_string(),
        "function getCampaignDetails(uint256 id) external view returns ((address,uint256,uint256,uint256))".to_string(),
        "function pairListing(address creator) external view returns (address pairedToken)".to_string(),
        format!(
            "function contribute({p} payment, uint256 campaignId) external payable",
            p = PAYMENT
        ),
        "function withdrawLaunchPairToken(uint256 campaignId) external".to_string(),
        "function getRefunded(uint256 campaignId) external".to_string(),
    ]
}

/// Parsed interfaces of every contract the gateway talks to
#[derive(Debug, Clone)]
pub struct Interfaces {
    pub router: Abi,
    pub pair: Abi,
    pub views: Abi,
    pub erc20: Abi,
    pub wrapped_native: Abi,
    pub gtoken: Abi,
    pub governance: Abi,
    pub launch_pair: Abi,
}

impl Interfaces {
    pub fn parse() -> Result<Self, GatewayError> {
        let governance = governance_fragments();
        let launch_pair = launch_pair_fragments();

        Ok(Self {
            router: parse(ROUTER)?,
            pair: parse(PAIR)?,
            views: parse(VIEWS)?,
            erc20: parse(ERC20)?,
            wrapped_native: parse(WRAPPED_NATIVE)?,
            gtoken: parse(GTOKEN)?,
            governance: parse(&governance.iter().map(String::as_str).collect::<Vec<_>>())?,
            launch_pair: parse(&launch_pair.iter().map(String::as_str).collect::<Vec<_>>())?,
        })
    }
}

fn parse(fragments: &[&str]) -> Result<Abi, GatewayError> {
    parse_abi(fragments).map_err(|e| GatewayError::Abi(e.to_string()))
}

fn function<'a>(abi: &'a Abi, name: &str) -> Result<&'a Function, GatewayError> {
    abi.function(name)
        .map_err(|e| GatewayError::Abi(format!("{}: {}", name, e)))
}

/// Calldata for `name(args)`
pub fn encode(abi: &Abi, name: &str, args: &[AbiToken]) -> Result<Bytes, GatewayError> {
    function(abi, name)?
        .encode_input(args)
        .map(Bytes::from)
        .map_err(|e| GatewayError::Abi(format!("{}: {}", name, e)))
}

/// Return values of `name`
pub fn decode(abi: &Abi, name: &str, data: &[u8]) -> Result<Vec<AbiToken>, GatewayError> {
    function(abi, name)?
        .decode_output(data)
        .map_err(|e| GatewayError::Decode(format!("{}: {}", name, e)))
}

pub fn payment(payment: &TokenPayment) -> AbiToken {
    AbiToken::Tuple(vec![
        AbiToken::Address(payment.token),
        AbiToken::Uint(payment.nonce),
        AbiToken::Uint(payment.amount),
    ])
}

pub fn addresses(tokens: &[Address]) -> AbiToken {
    AbiToken::Array(tokens.iter().copied().map(AbiToken::Address).collect())
}

// Output accessors. `what` names the value in the error.

pub fn first(outputs: Vec<AbiToken>, what: &str) -> Result<AbiToken, GatewayError> {
    outputs
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Decode(format!("{}: empty return", what)))
}

pub fn uint(token: AbiToken, what: &str) -> Result<U256, GatewayError> {
    token
        .into_uint()
        .ok_or_else(|| GatewayError::Decode(format!("{}: expected uint", what)))
}

pub fn address(token: AbiToken, what: &str) -> Result<Address, GatewayError> {
    token
        .into_address()
        .ok_or_else(|| GatewayError::Decode(format!("{}: expected address", what)))
}

pub fn array(token: AbiToken, what: &str) -> Result<Vec<AbiToken>, GatewayError> {
    token
        .into_array()
        .ok_or_else(|| GatewayError::Decode(format!("{}: expected array", what)))
}

pub fn tuple(token: AbiToken, what: &str) -> Result<Vec<AbiToken>, GatewayError> {
    token
        .into_tuple()
        .ok_or_else(|| GatewayError::Decode(format!("{}: expected tuple", what)))
}

/// Field `index` of a decoded struct
pub fn field(fields: &[AbiToken], index: usize, what: &str) -> Result<AbiToken, GatewayError> {
    fields
        .get(index)
        .cloned()
        .ok_or_else(|| GatewayError::Decode(format!("{}: missing field {}", what, index)))
}

/// Clamp to u64; epochs and timestamps never get near the bound
pub fn to_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.low_u64()
    }
}

/// `(nonce, amount, epochs_locked, last_claim_epoch)` of one GToken entry
pub fn position_fields(entry: AbiToken) -> Result<(U256, U256, u64, u64), GatewayError> {
    const WHAT: &str = "getGTokenBalance";
    let fields = tuple(entry, WHAT)?;
    let nonce = uint(field(&fields, 0, WHAT)?, WHAT)?;
    let amount = uint(field(&fields, 1, WHAT)?, WHAT)?;
    let attributes = tuple(field(&fields, 2, WHAT)?, WHAT)?;
    let epochs_locked = uint(field(&attributes, ATTR_EPOCHS_LOCKED, WHAT)?, WHAT)?;
    let last_claim_epoch = uint(field(&attributes, ATTR_LAST_CLAIM_EPOCH, WHAT)?, WHAT)?;
    Ok((nonce, amount, to_u64(epochs_locked), to_u64(last_claim_epoch)))
}
