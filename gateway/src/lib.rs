//! GATEWAY - Chain Access
//!
//! Drives the deployed protocol over JSON-RPC. Implements the three
//! engine surfaces on top of one HTTP provider and a signer per account.
//!
//! # Responsibilities
//! - Derive account keys and the funding source
//! - Encode protocol calls and decode view results
//! - Submit signed transactions and wait for receipts
//! - Move chain time on a local node

pub mod abi;
pub mod wallets;

use async_trait::async_trait;
use ethers::abi::Token as AbiToken;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer, WalletError};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, BlockNumber, TransactionRequest, U256, U64,
};
use gauntlet_config::{ContractsConfig, NetworkConfig};
use gauntlet_types::{
    is_native, AccountLedger, Account, Campaign, Contribution, Listing, NetworkMode, Pool,
    Position, ProtocolClient, ProtocolError, Spender, StakeOrder, SwapOrder, TimeControl, Token,
    TxReceipt, VoteBallot,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;

pub use abi::Interfaces;
pub use wallets::WalletSet;

/// Receipt polling interval
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid RPC url: {0}")]
    InvalidUrl(String),

    #[error("Invalid address for {name}: {value}")]
    InvalidAddress { name: &'static str, value: String },

    #[error("No mnemonic configured for live mode")]
    MissingMnemonic,

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Unexpected return data: {0}")]
    Decode(String),

    #[error("No signer for {0:?}")]
    UnknownAccount(Address),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<GatewayError> for ProtocolError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Protocol(inner) => inner,
            other => ProtocolError::from_message(other.to_string()),
        }
    }
}

/// Transport and node errors keep their text so the classifier can read it
fn rpc_error(err: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::from_message(err.to_string())
}

fn parse_address(name: &'static str, value: &str) -> Result<Address, GatewayError> {
    value.parse().map_err(|_| GatewayError::InvalidAddress {
        name,
        value: value.to_string(),
    })
}

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

/// The protocol, the ledger and the clock of one RPC endpoint
pub struct EvmGateway {
    provider: Provider<Http>,
    interfaces: Interfaces,
    wallets: WalletSet,
    signers: HashMap<Address, Arc<Client>>,
    mode: NetworkMode,
    router: Address,
    views: Address,
    wrapped: OnceCell<Address>,
    governance: OnceCell<Address>,
    gtoken: OnceCell<Address>,
    launch_pair: OnceCell<Address>,
}

impl EvmGateway {
    /// Connect to the endpoint and derive every signer
    pub async fn connect(
        network: &NetworkConfig,
        contracts: &ContractsConfig,
    ) -> Result<Self, GatewayError> {
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str())
            .map_err(|e| GatewayError::InvalidUrl(e.to_string()))?
            .interval(POLL_INTERVAL);

        let chain_id = match network.chain_id {
            Some(id) => id,
            None => provider.get_chainid().await.map_err(rpc_error)?.as_u64(),
        };

        let wallets = WalletSet::from_config(network, chain_id)?;
        let signers = wallets
            .wallets()
            .map(|wallet| {
                let client = SignerMiddleware::new(provider.clone(), wallet.clone());
                (wallet.address(), Arc::new(client))
            })
            .collect();

        tracing::info!(
            "GATEWAY: Connected to {} (chain {}, {:?} mode)",
            network.rpc_url,
            chain_id,
            network.mode
        );

        Ok(Self {
            provider,
            interfaces: Interfaces::parse()?,
            wallets,
            signers,
            mode: network.mode,
            router: parse_address("contracts.router", &contracts.router)?,
            views: parse_address("contracts.views", &contracts.views)?,
            wrapped: OnceCell::new(),
            governance: OnceCell::new(),
            gtoken: OnceCell::new(),
            launch_pair: OnceCell::new(),
        })
    }

    pub fn accounts(&self) -> &[Account] {
        self.wallets.accounts()
    }

    pub fn funding_source(&self) -> Account {
        self.wallets.funding_source()
    }

    pub fn mode(&self) -> NetworkMode {
        self.mode
    }

    fn signer(&self, address: Address) -> Result<&Arc<Client>, ProtocolError> {
        self.signers
            .get(&address)
            .ok_or_else(|| GatewayError::UnknownAccount(address).into())
    }

    /// Read-only call, decoded
    async fn call(
        &self,
        to: Address,
        abi: &ethers::abi::Abi,
        name: &str,
        args: &[AbiToken],
    ) -> Result<Vec<AbiToken>, ProtocolError> {
        let data = abi::encode(abi, name, args)?;
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        let output = self.provider.call(&tx, None).await.map_err(rpc_error)?;
        Ok(abi::decode(abi, name, &output)?)
    }

    async fn call_uint(&self, to: Address, abi: &ethers::abi::Abi, name: &str, args: &[AbiToken]) -> Result<U256, ProtocolError> {
        let outputs = self.call(to, abi, name, args).await?;
        Ok(abi::uint(abi::first(outputs, name)?, name)?)
    }

    async fn call_address(&self, to: Address, abi: &ethers::abi::Abi, name: &str, args: &[AbiToken]) -> Result<Address, ProtocolError> {
        let outputs = self.call(to, abi, name, args).await?;
        Ok(abi::address(abi::first(outputs, name)?, name)?)
    }

    async fn call_uints(&self, to: Address, abi: &ethers::abi::Abi, name: &str, args: &[AbiToken]) -> Result<Vec<U256>, ProtocolError> {
        let outputs = self.call(to, abi, name, args).await?;
        let items = abi::array(abi::first(outputs, name)?, name)?;
        items
            .into_iter()
            .map(|item| abi::uint(item, name).map_err(ProtocolError::from))
            .collect()
    }

    /// Sign, submit and wait for the receipt. A mined but failed
    /// transaction is reported as a revert.
    async fn send(&self, account: &Account, tx: TransactionRequest) -> Result<TxReceipt, ProtocolError> {
        let client = self.signer(account.address)?;
        let pending = client
            .send_transaction(tx.from(account.address), None)
            .await
            .map_err(rpc_error)?;
        let receipt = pending
            .await
            .map_err(rpc_error)?
            .ok_or_else(|| ProtocolError::from_message("transaction dropped from the mempool"))?;

        if receipt.status == Some(U64::zero()) {
            return Err(ProtocolError::from_message(format!(
                "execution reverted: transaction {:?} failed",
                receipt.transaction_hash
            )));
        }

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()),
        })
    }

    async fn invoke(
        &self,
        account: &Account,
        to: Address,
        abi: &ethers::abi::Abi,
        name: &str,
        args: &[AbiToken],
        value: Option<U256>,
    ) -> Result<TxReceipt, ProtocolError> {
        let mut tx = TransactionRequest::new().to(to).data(abi::encode(abi, name, args)?);
        if let Some(value) = value {
            tx = tx.value(value);
        }
        tracing::debug!(account = ?account.address, call = name, "GATEWAY: Submitting");
        self.send(account, tx).await
    }

    // Addresses discovered through the router

    async fn wrapped(&self) -> Result<Address, ProtocolError> {
        self.wrapped
            .get_or_try_init(|| {
                self.call_address(self.router, &self.interfaces.router, "getWrappedNativeToken", &[])
            })
            .await
            .copied()
    }

    async fn governance(&self) -> Result<Address, ProtocolError> {
        self.governance
            .get_or_try_init(|| self.call_address(self.router, &self.interfaces.router, "getGovernance", &[]))
            .await
            .copied()
    }

    async fn gtoken(&self) -> Result<Address, ProtocolError> {
        let governance = self.governance().await?;
        self.gtoken
            .get_or_try_init(|| self.call_address(governance, &self.interfaces.governance, "getGToken", &[]))
            .await
            .copied()
    }

    async fn launch_pair(&self) -> Result<Address, ProtocolError> {
        let governance = self.governance().await?;
        self.launch_pair
            .get_or_try_init(|| self.call_address(governance, &self.interfaces.governance, "launchPair", &[]))
            .await
            .copied()
    }

    async fn campaign(&self, id: U256) -> Result<Campaign, ProtocolError> {
        const WHAT: &str = "getCampaignDetails";
        let launch_pair = self.launch_pair().await?;
        let outputs = self
            .call(launch_pair, &self.interfaces.launch_pair, WHAT, &[AbiToken::Uint(id)])
            .await?;
        let fields = abi::tuple(abi::first(outputs, WHAT)?, WHAT)?;

        let creator = abi::address(abi::field(&fields, abi::CAMPAIGN_CREATOR, WHAT)?, WHAT)?;
        let goal = abi::uint(abi::field(&fields, abi::CAMPAIGN_GOAL, WHAT)?, WHAT)?;
        let deadline = abi::uint(abi::field(&fields, abi::CAMPAIGN_DEADLINE, WHAT)?, WHAT)?;
        let funds_raised = abi::uint(abi::field(&fields, abi::CAMPAIGN_FUNDS_RAISED, WHAT)?, WHAT)?;
        let paired_token = self
            .call_address(
                launch_pair,
                &self.interfaces.launch_pair,
                "pairListing",
                &[AbiToken::Address(creator)],
            )
            .await?;

        Ok(Campaign {
            id,
            creator,
            paired_token,
            goal,
            funds_raised,
            deadline: abi::to_u64(deadline),
        })
    }

    async fn campaigns(&self, ids: Vec<U256>) -> Result<Vec<Campaign>, ProtocolError> {
        futures::future::try_join_all(ids.into_iter().map(|id| self.campaign(id))).await
    }

    async fn rpc<T>(&self, method: &str, params: T) -> Result<serde_json::Value, ProtocolError>
    where
        T: std::fmt::Debug + serde::Serialize + Send + Sync,
    {
        self.provider.request(method, params).await.map_err(rpc_error)
    }
}

#[async_trait]
impl ProtocolClient for EvmGateway {
    async fn pools(&self) -> Result<Vec<Pool>, ProtocolError> {
        let outputs = self.call(self.router, &self.interfaces.router, "pairs", &[]).await?;
        let pairs = abi::array(abi::first(outputs, "pairs")?, "pairs")?
            .into_iter()
            .map(|p| abi::address(p, "pairs"))
            .collect::<Result<Vec<_>, _>>()?;

        let pools = futures::future::try_join_all(pairs.into_iter().map(|pair| async move {
            let token0 = self.call_address(pair, &self.interfaces.pair, "token0", &[]).await?;
            let token1 = self.call_address(pair, &self.interfaces.pair, "token1", &[]).await?;
            Ok::<_, ProtocolError>(Pool::new(pair, token0, token1))
        }))
        .await?;

        tracing::info!("GATEWAY: Router lists {} pools", pools.len());
        Ok(pools)
    }

    async fn wrapped_native(&self) -> Result<Token, ProtocolError> {
        self.wrapped().await
    }

    async fn quote(&self, amount_in: U256, path: &[Token]) -> Result<U256, ProtocolError> {
        self.call_uint(
            self.views,
            &self.interfaces.views,
            "getQuote",
            &[AbiToken::Uint(amount_in), abi::addresses(path)],
        )
        .await
    }

    async fn total_users(&self) -> Result<U256, ProtocolError> {
        self.call_uint(self.router, &self.interfaces.router, "totalUsers", &[]).await
    }

    async fn positions(&self, owner: Address) -> Result<Vec<Position>, ProtocolError> {
        let gtoken = self.gtoken().await?;
        let outputs = self
            .call(gtoken, &self.interfaces.gtoken, "getGTokenBalance", &[AbiToken::Address(owner)])
            .await?;

        abi::array(abi::first(outputs, "getGTokenBalance")?, "getGTokenBalance")?
            .into_iter()
            .map(|entry| -> Result<Position, ProtocolError> {
                let (nonce, amount, epochs_locked, last_claim_epoch) = abi::position_fields(entry)?;
                Ok(Position {
                    nonce,
                    amount,
                    epochs_locked,
                    last_claim_epoch,
                })
            })
            .collect()
    }

    async fn current_epoch(&self) -> Result<u64, ProtocolError> {
        let governance = self.governance().await?;
        let epoch = self
            .call_uint(governance, &self.interfaces.governance, "currentEpoch", &[])
            .await?;
        Ok(abi::to_u64(epoch))
    }

    async fn active_listing(&self) -> Result<Option<Listing>, ProtocolError> {
        const WHAT: &str = "activeListing";
        let governance = self.governance().await?;
        let outputs = self.call(governance, &self.interfaces.governance, WHAT, &[]).await?;
        let fields = abi::tuple(abi::first(outputs, WHAT)?, WHAT)?;

        let owner = abi::address(abi::field(&fields, abi::LISTING_OWNER, WHAT)?, WHAT)?;
        if owner.is_zero() {
            return Ok(None);
        }

        let payment = abi::tuple(abi::field(&fields, abi::LISTING_TRADE_PAYMENT, WHAT)?, WHAT)?;
        Ok(Some(Listing {
            campaign_id: abi::uint(abi::field(&fields, abi::LISTING_CAMPAIGN_ID, WHAT)?, WHAT)?,
            end_epoch: abi::to_u64(abi::uint(abi::field(&fields, abi::LISTING_END_EPOCH, WHAT)?, WHAT)?),
            trade_token: abi::address(abi::field(&payment, 0, WHAT)?, WHAT)?,
        }))
    }

    async fn user_vote(&self, owner: Address) -> Result<Option<Token>, ProtocolError> {
        let governance = self.governance().await?;
        let token = self
            .call_address(governance, &self.interfaces.governance, "userVote", &[AbiToken::Address(owner)])
            .await?;
        Ok((!token.is_zero()).then_some(token))
    }

    async fn active_campaigns(&self) -> Result<Vec<Campaign>, ProtocolError> {
        let launch_pair = self.launch_pair().await?;
        let ids = self
            .call_uints(launch_pair, &self.interfaces.launch_pair, "getActiveCampaigns", &[])
            .await?;
        self.campaigns(ids).await
    }

    async fn user_campaigns(&self, owner: Address) -> Result<Vec<Campaign>, ProtocolError> {
        let launch_pair = self.launch_pair().await?;
        let ids = self
            .call_uints(
                launch_pair,
                &self.interfaces.launch_pair,
                "getUserCampaigns",
                &[AbiToken::Address(owner)],
            )
            .await?;
        self.campaigns(ids).await
    }

    async fn spender(&self, spender: Spender) -> Result<Address, ProtocolError> {
        match spender {
            Spender::Router => Ok(self.router),
            Spender::Governance => self.governance().await,
            Spender::LaunchPair => self.launch_pair().await,
        }
    }

    async fn swap(&self, account: &Account, order: SwapOrder) -> Result<TxReceipt, ProtocolError> {
        let swap_data = abi::encode(
            &self.interfaces.router,
            "swapExactTokensForTokens",
            &[
                AbiToken::Uint(order.amount_in),
                AbiToken::Uint(order.min_amount_out),
                abi::addresses(&order.path),
                AbiToken::Address(account.address),
                AbiToken::Uint(order.deadline),
            ],
        )?;

        self.invoke(
            account,
            self.router,
            &self.interfaces.router,
            "registerAndSwap",
            &[AbiToken::Uint(order.referrer_id), AbiToken::Bytes(swap_data.to_vec())],
            order.native_value,
        )
        .await
    }

    async fn stake(&self, account: &Account, order: StakeOrder) -> Result<TxReceipt, ProtocolError> {
        let governance = self.governance().await?;
        let mins = AbiToken::FixedArray(vec![
            AbiToken::Uint(order.min_amount_a),
            AbiToken::Uint(order.min_amount_b),
            AbiToken::Uint(order.deadline),
        ]);

        self.invoke(
            account,
            governance,
            &self.interfaces.governance,
            "stakeLiquidity",
            &[
                abi::payment(&order.payment_a),
                abi::payment(&order.payment_b),
                AbiToken::Uint(U256::from(order.epochs_locked)),
                mins,
                abi::addresses(&order.path_to_native),
            ],
            order.native_value,
        )
        .await
    }

    async fn claim_rewards(&self, account: &Account, nonce: U256) -> Result<TxReceipt, ProtocolError> {
        let governance = self.governance().await?;
        self.invoke(
            account,
            governance,
            &self.interfaces.governance,
            "claimRewards",
            &[AbiToken::Uint(nonce)],
            None,
        )
        .await
    }

    async fn unstake(
        &self,
        account: &Account,
        nonce: U256,
        min_amount_a: U256,
        min_amount_b: U256,
    ) -> Result<TxReceipt, ProtocolError> {
        let governance = self.governance().await?;
        self.invoke(
            account,
            governance,
            &self.interfaces.governance,
            "unStake",
            &[
                AbiToken::Uint(nonce),
                AbiToken::Uint(min_amount_a),
                AbiToken::Uint(min_amount_b),
            ],
            None,
        )
        .await
    }

    async fn vote(&self, account: &Account, ballot: VoteBallot) -> Result<TxReceipt, ProtocolError> {
        let governance = self.governance().await?;
        let gtoken = self.gtoken().await?;
        let payment = AbiToken::Tuple(vec![
            AbiToken::Address(gtoken),
            AbiToken::Uint(ballot.position_nonce),
            AbiToken::Uint(ballot.position_amount),
        ]);

        self.invoke(
            account,
            governance,
            &self.interfaces.governance,
            "vote",
            &[
                payment,
                AbiToken::Address(ballot.trade_token),
                AbiToken::Bool(ballot.in_favour),
            ],
            None,
        )
        .await
    }

    async fn recall_vote(&self, account: &Account) -> Result<TxReceipt, ProtocolError> {
        let governance = self.governance().await?;
        self.invoke(account, governance, &self.interfaces.governance, "recallVoteToken", &[], None)
            .await
    }

    async fn contribute(&self, account: &Account, contribution: Contribution) -> Result<TxReceipt, ProtocolError> {
        let launch_pair = self.launch_pair().await?;
        self.invoke(
            account,
            launch_pair,
            &self.interfaces.launch_pair,
            "contribute",
            &[
                abi::payment(&contribution.payment),
                AbiToken::Uint(contribution.campaign_id),
            ],
            contribution.native_value,
        )
        .await
    }

    async fn withdraw_campaign_tokens(&self, account: &Account, campaign_id: U256) -> Result<TxReceipt, ProtocolError> {
        let launch_pair = self.launch_pair().await?;
        self.invoke(
            account,
            launch_pair,
            &self.interfaces.launch_pair,
            "withdrawLaunchPairToken",
            &[AbiToken::Uint(campaign_id)],
            None,
        )
        .await
    }

    async fn refund_campaign(&self, account: &Account, campaign_id: U256) -> Result<TxReceipt, ProtocolError> {
        let launch_pair = self.launch_pair().await?;
        self.invoke(
            account,
            launch_pair,
            &self.interfaces.launch_pair,
            "getRefunded",
            &[AbiToken::Uint(campaign_id)],
            None,
        )
        .await
    }

    async fn wrap_native(&self, account: &Account, amount: U256) -> Result<TxReceipt, ProtocolError> {
        let wrapped = self.wrapped().await?;
        self.invoke(
            account,
            wrapped,
            &self.interfaces.wrapped_native,
            "receiveFor",
            &[AbiToken::Address(account.address)],
            Some(amount),
        )
        .await
    }

    async fn unwrap_native(&self, account: &Account, amount: U256) -> Result<TxReceipt, ProtocolError> {
        let wrapped = self.wrapped().await?;
        self.invoke(
            account,
            wrapped,
            &self.interfaces.wrapped_native,
            "withdraw",
            &[AbiToken::Uint(amount)],
            None,
        )
        .await
    }

    async fn approve_positions(&self, account: &Account, spender: Spender) -> Result<TxReceipt, ProtocolError> {
        let operator = self.spender(spender).await?;
        let gtoken = self.gtoken().await?;
        self.invoke(
            account,
            gtoken,
            &self.interfaces.gtoken,
            "setApprovalForAll",
            &[AbiToken::Address(operator), AbiToken::Bool(true)],
            None,
        )
        .await
    }

    async fn transfer_position(
        &self,
        account: &Account,
        to: Address,
        nonce: U256,
        amount: U256,
    ) -> Result<TxReceipt, ProtocolError> {
        let gtoken = self.gtoken().await?;
        self.invoke(
            account,
            gtoken,
            &self.interfaces.gtoken,
            "safeTransferFrom",
            &[
                AbiToken::Address(account.address),
                AbiToken::Address(to),
                AbiToken::Uint(nonce),
                AbiToken::Uint(amount),
                AbiToken::Bytes(Vec::new()),
            ],
            None,
        )
        .await
    }
}

#[async_trait]
impl AccountLedger for EvmGateway {
    async fn balance(&self, owner: Address, token: Token) -> Result<U256, ProtocolError> {
        if is_native(&token) {
            return self.provider.get_balance(owner, None).await.map_err(rpc_error);
        }
        self.call_uint(token, &self.interfaces.erc20, "balanceOf", &[AbiToken::Address(owner)])
            .await
    }

    async fn allowance(&self, owner: Address, token: Token, spender: Address) -> Result<U256, ProtocolError> {
        if is_native(&token) {
            return Ok(U256::MAX);
        }
        self.call_uint(
            token,
            &self.interfaces.erc20,
            "allowance",
            &[AbiToken::Address(owner), AbiToken::Address(spender)],
        )
        .await
    }

    async fn transfer(
        &self,
        from: &Account,
        to: Address,
        token: Token,
        amount: U256,
        nonce: Option<U256>,
    ) -> Result<TxReceipt, ProtocolError> {
        let mut tx = if is_native(&token) {
            TransactionRequest::new().to(to).value(amount)
        } else {
            let data = abi::encode(
                &self.interfaces.erc20,
                "transfer",
                &[AbiToken::Address(to), AbiToken::Uint(amount)],
            )?;
            TransactionRequest::new().to(token).data(data)
        };
        if let Some(nonce) = nonce {
            tx = tx.nonce(nonce);
        }
        self.send(from, tx).await
    }

    async fn approve(
        &self,
        owner: &Account,
        token: Token,
        spender: Address,
        amount: U256,
    ) -> Result<TxReceipt, ProtocolError> {
        self.invoke(
            owner,
            token,
            &self.interfaces.erc20,
            "approve",
            &[AbiToken::Address(spender), AbiToken::Uint(amount)],
            None,
        )
        .await
    }

    async fn pending_nonce(&self, owner: Address) -> Result<Option<U256>, ProtocolError> {
        let nonce = self
            .provider
            .get_transaction_count(owner, Some(BlockNumber::Pending.into()))
            .await
            .map_err(rpc_error)?;
        Ok(Some(nonce))
    }
}

#[async_trait]
impl TimeControl for EvmGateway {
    async fn latest_timestamp(&self) -> Result<u64, ProtocolError> {
        let block = self
            .provider
            .get_block(BlockNumber::Latest)
            .await
            .map_err(rpc_error)?
            .ok_or_else(|| ProtocolError::from_message("latest block unavailable"))?;
        Ok(abi::to_u64(block.timestamp))
    }

    async fn advance(&self, seconds: u64) -> Result<(), ProtocolError> {
        if !self.mode.is_local() {
            tracing::warn!("GATEWAY: Ignoring time advance on a live network");
            return Ok(());
        }
        self.rpc("evm_increaseTime", [seconds]).await?;
        self.rpc("evm_mine", Vec::<serde_json::Value>::new()).await?;
        tracing::debug!("GATEWAY: Advanced chain time by {}s", seconds);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_types::ErrorKind;

    #[test]
    fn test_gateway_errors_keep_their_text() {
        let err: ProtocolError = GatewayError::UnknownAccount(Address::zero()).into();
        assert_eq!(err.kind, ErrorKind::Other);
        assert!(err.message.contains("No signer"));

        let inner = ProtocolError::from_message("nonce too low");
        let err: ProtocolError = GatewayError::Protocol(inner.clone()).into();
        assert_eq!(err, inner);
    }

    #[test]
    fn test_rpc_errors_are_classified() {
        let err = rpc_error("(code: -32000, message: nonce too low: next nonce 5, tx nonce 4, data: None)");
        assert_eq!(err.kind, ErrorKind::NonceTooLow);

        let err = rpc_error("error sending request: connection reset by peer");
        assert_eq!(err.kind, ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_contract_addresses_are_validated() {
        assert!(parse_address("contracts.router", "0x5FbDB2315678afecb367f032d93F642f64180aa3").is_ok());
        assert!(matches!(
            parse_address("contracts.router", "router"),
            Err(GatewayError::InvalidAddress { name: "contracts.router", .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let network = NetworkConfig {
            rpc_url: "not a url".to_string(),
            chain_id: Some(31337),
            ..NetworkConfig::default()
        };
        let result = EvmGateway::connect(&network, &ContractsConfig::default()).await;
        assert!(matches!(result, Err(GatewayError::InvalidUrl(_))));
    }
}
