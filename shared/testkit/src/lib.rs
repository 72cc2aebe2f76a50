//! Gauntlet Testkit - In-memory chain for scenario tests
//!
//! [`MemoryChain`] implements [`ProtocolClient`], [`AccountLedger`] and
//! [`TimeControl`] over plain maps. Failures use the same text a node
//! would return, so they go through the regular classification path.
//!
//! Knobs:
//! - per-submission delay, to make races observable
//! - scripted failures per operation
//! - stale pending-nonce reads, to drive nonce recovery
//!
//! Instrumentation: call counts per operation and the highest number of
//! concurrent submissions seen from a single sender.

use async_trait::async_trait;
use ethers_core::types::{Address, H256, U256};
use gauntlet_types::{
    is_native, Account, AccountLedger, Campaign, Contribution, Listing, Pool, Position,
    ProtocolClient, ProtocolError, Spender, StakeOrder, SwapOrder, TimeControl, Token,
    TxReceipt, VoteBallot, NATIVE,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Chain seconds per protocol epoch
pub const EPOCH_SECONDS: u64 = 86_400;

/// Chain timestamp at block zero
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Deterministic address for fixtures
pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

/// `n` whole tokens with 18 decimals
pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

/// Account fixture with derivation index `n`
pub fn account(n: u32) -> Account {
    Account::new(addr(0xA000 + n as u64), n)
}

#[derive(Default)]
struct ChainState {
    balances: HashMap<(Address, Token), U256>,
    allowances: HashMap<(Address, Token, Address), U256>,
    nonces: HashMap<Address, U256>,
    pools: Vec<Pool>,
    positions: HashMap<Address, Vec<Position>>,
    next_position: u64,
    campaigns: Vec<Campaign>,
    contributions: HashMap<Address, HashSet<U256>>,
    listing: Option<Listing>,
    votes: HashMap<Address, Token>,
    position_approvals: HashSet<(Address, Spender)>,
    timestamp: u64,
    block: u64,
    total_users: U256,
    failures: HashMap<&'static str, VecDeque<ProtocolError>>,
    stale_nonce_reads: usize,
    calls: HashMap<&'static str, usize>,
}

impl ChainState {
    fn balance(&self, owner: Address, token: Token) -> U256 {
        self.balances.get(&(owner, token)).copied().unwrap_or_default()
    }

    fn credit(&mut self, owner: Address, token: Token, amount: U256) {
        let entry = self.balances.entry((owner, token)).or_default();
        *entry = entry.saturating_add(amount);
    }

    fn debit(&mut self, owner: Address, token: Token, amount: U256) -> Result<(), ProtocolError> {
        let balance = self.balance(owner, token);
        if balance < amount {
            let message = if is_native(&token) {
                format!(
                    "insufficient funds for gas * price + value: address {:?} have {} want {}",
                    owner, balance, amount
                )
            } else {
                "execution reverted: ERC20: transfer amount exceeds balance".to_string()
            };
            return Err(ProtocolError::from_message(message));
        }
        self.balances.insert((owner, token), balance - amount);
        Ok(())
    }

    /// ERC-20 pull by `spender`, consuming allowance
    fn pull(&mut self, owner: Address, token: Token, spender: Address, amount: U256) -> Result<(), ProtocolError> {
        let key = (owner, token, spender);
        let allowance = self.allowances.get(&key).copied().unwrap_or_default();
        if allowance < amount {
            return Err(ProtocolError::from_message(
                "execution reverted: ERC20: insufficient allowance",
            ));
        }
        self.debit(owner, token, amount)?;
        self.allowances.insert(key, allowance - amount);
        Ok(())
    }

    fn epoch(&self) -> u64 {
        self.timestamp.saturating_sub(GENESIS_TIMESTAMP) / EPOCH_SECONDS
    }

    fn connected(&self, a: &Token, b: &Token) -> bool {
        self.pools.iter().any(|p| p.contains(a) && p.other(a) == Some(*b))
    }

    fn check_path(&self, path: &[Token]) -> Result<(), ProtocolError> {
        if path.len() < 2 || !path.windows(2).all(|hop| self.connected(&hop[0], &hop[1])) {
            return Err(ProtocolError::from_message("execution reverted: INVALID_PATH"));
        }
        Ok(())
    }

    fn campaign_mut(&mut self, id: U256) -> Result<&mut Campaign, ProtocolError> {
        self.campaigns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ProtocolError::from_message("execution reverted: Invalid campaign"))
    }
}

/// Decrements the per-sender submission count when a submission ends
struct SendGuard<'a> {
    chain: &'a MemoryChain,
    from: Address,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        let mut sending = self.chain.sending.lock();
        if let Some(count) = sending.get_mut(&self.from) {
            *count = count.saturating_sub(1);
        }
    }
}

/// In-memory protocol, ledger and clock
pub struct MemoryChain {
    state: Mutex<ChainState>,
    wrapped_native: Token,
    router: Address,
    governance: Address,
    launch_pair: Address,
    delay: Duration,
    pending_nonce_supported: bool,
    sending: Mutex<HashMap<Address, usize>>,
    max_concurrent_sends: AtomicUsize,
}

impl MemoryChain {
    pub fn new() -> Self {
        let state = ChainState {
            timestamp: GENESIS_TIMESTAMP,
            next_position: 1,
            total_users: U256::from(10u64),
            ..Default::default()
        };

        Self {
            state: Mutex::new(state),
            wrapped_native: addr(0xEE),
            router: addr(0xF1),
            governance: addr(0xF2),
            launch_pair: addr(0xF3),
            delay: Duration::ZERO,
            pending_nonce_supported: true,
            sending: Mutex::new(HashMap::new()),
            max_concurrent_sends: AtomicUsize::new(0),
        }
    }

    /// Every submission sleeps this long before it is applied
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Ledger reports no pending nonce, forcing message-based recovery
    pub fn without_pending_nonce(mut self) -> Self {
        self.pending_nonce_supported = false;
        self
    }

    pub fn wrapped_token(&self) -> Token {
        self.wrapped_native
    }

    pub fn router_address(&self) -> Address {
        self.router
    }

    pub fn governance_address(&self) -> Address {
        self.governance
    }

    // Fixture setup

    pub fn add_pool(&self, token0: Token, token1: Token) -> Pool {
        let mut state = self.state.lock();
        let pool = Pool::new(addr(0x10_000 + state.pools.len() as u64), token0, token1);
        state.pools.push(pool);
        pool
    }

    pub fn mint(&self, owner: Address, token: Token, amount: U256) {
        self.state.lock().credit(owner, token, amount);
    }

    pub fn set_allowance(&self, owner: Address, token: Token, spender: Address, amount: U256) {
        self.state.lock().allowances.insert((owner, token, spender), amount);
    }

    pub fn set_total_users(&self, total: u64) {
        self.state.lock().total_users = U256::from(total);
    }

    /// Give `owner` a staking position, returning its nonce
    pub fn add_position(&self, owner: Address, amount: U256, epochs_locked: u64, last_claim_epoch: u64) -> U256 {
        let mut state = self.state.lock();
        let nonce = U256::from(state.next_position);
        state.next_position += 1;
        state.positions.entry(owner).or_default().push(Position {
            nonce,
            amount,
            epochs_locked,
            last_claim_epoch,
        });
        nonce
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        self.state.lock().campaigns.push(campaign);
    }

    pub fn add_contribution(&self, owner: Address, campaign_id: U256) {
        self.state.lock().contributions.entry(owner).or_default().insert(campaign_id);
    }

    pub fn set_listing(&self, listing: Option<Listing>) {
        self.state.lock().listing = listing;
    }

    pub fn set_vote(&self, owner: Address, token: Token) {
        self.state.lock().votes.insert(owner, token);
    }

    /// Make the next call to `op` fail with `error`
    pub fn fail_next(&self, op: &'static str, error: ProtocolError) {
        self.state.lock().failures.entry(op).or_default().push_back(error);
    }

    /// The next `reads` pending-nonce lookups lag one transaction behind
    pub fn stale_nonce_reads(&self, reads: usize) {
        self.state.lock().stale_nonce_reads = reads;
    }

    /// Simulate a transaction sent by `owner` outside the engine
    pub fn bump_nonce(&self, owner: Address) {
        let mut state = self.state.lock();
        let nonce = state.nonces.entry(owner).or_default();
        *nonce += U256::one();
    }

    // Inspection

    pub fn balance_of(&self, owner: Address, token: Token) -> U256 {
        self.state.lock().balance(owner, token)
    }

    pub fn allowance_of(&self, owner: Address, token: Token, spender: Address) -> U256 {
        self.state.lock().allowances.get(&(owner, token, spender)).copied().unwrap_or_default()
    }

    pub fn nonce_of(&self, owner: Address) -> U256 {
        self.state.lock().nonces.get(&owner).copied().unwrap_or_default()
    }

    pub fn positions_of(&self, owner: Address) -> Vec<Position> {
        self.state.lock().positions.get(&owner).cloned().unwrap_or_default()
    }

    pub fn vote_of(&self, owner: Address) -> Option<Token> {
        self.state.lock().votes.get(&owner).copied()
    }

    pub fn campaign(&self, id: U256) -> Option<Campaign> {
        self.state.lock().campaigns.iter().find(|c| c.id == id).cloned()
    }

    pub fn contributed(&self, owner: Address, id: U256) -> bool {
        self.state.lock().contributions.get(&owner).map_or(false, |ids| ids.contains(&id))
    }

    pub fn timestamp(&self) -> u64 {
        self.state.lock().timestamp
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch()
    }

    /// Number of times `op` was called, failed calls included
    pub fn calls(&self, op: &str) -> usize {
        self.state.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Highest number of overlapping submissions from one sender
    pub fn max_concurrent_sends(&self) -> usize {
        self.max_concurrent_sends.load(Ordering::SeqCst)
    }

    fn record_call(&self, op: &'static str) -> Result<(), ProtocolError> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_default() += 1;
        match state.failures.get_mut(op).and_then(|q| q.pop_front()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn begin_send(&self, from: Address) -> SendGuard<'_> {
        let mut sending = self.sending.lock();
        let count = sending.entry(from).or_default();
        *count += 1;
        self.max_concurrent_sends.fetch_max(*count, Ordering::SeqCst);
        SendGuard { chain: self, from }
    }

    /// Common submission path: scripted failure, delay, nonce and gas checks,
    /// then `apply` against the state.
    async fn submit<F>(
        &self,
        op: &'static str,
        from: Address,
        nonce: Option<U256>,
        apply: F,
    ) -> Result<TxReceipt, ProtocolError>
    where
        F: FnOnce(&mut ChainState) -> Result<(), ProtocolError> + Send,
    {
        self.record_call(op)?;
        let _guard = self.begin_send(from);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut state = self.state.lock();
        let expected = state.nonces.get(&from).copied().unwrap_or_default();
        if let Some(nonce) = nonce {
            if nonce < expected {
                return Err(ProtocolError::from_message(format!(
                    "nonce too low: address {:?}, tx: {} state: {}",
                    from, nonce, expected
                )));
            }
            if nonce > expected {
                return Err(ProtocolError::from_message(format!(
                    "nonce too high: address {:?}, tx: {} state: {}",
                    from, nonce, expected
                )));
            }
        }

        if state.balance(from, NATIVE).is_zero() {
            return Err(ProtocolError::from_message(
                "insufficient funds for intrinsic transaction cost: gas + fee exceeds balance",
            ));
        }

        apply(&mut state)?;

        state.nonces.insert(from, expected + U256::one());
        state.block += 1;
        Ok(TxReceipt {
            tx_hash: H256::from_low_u64_be(state.block),
            block_number: Some(state.block),
        })
    }

    fn spender_address(&self, spender: Spender) -> Address {
        match spender {
            Spender::Router => self.router,
            Spender::Governance => self.governance,
            Spender::LaunchPair => self.launch_pair,
        }
    }
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolClient for MemoryChain {
    async fn pools(&self) -> Result<Vec<Pool>, ProtocolError> {
        self.record_call("pools")?;
        Ok(self.state.lock().pools.clone())
    }

    async fn wrapped_native(&self) -> Result<Token, ProtocolError> {
        Ok(self.wrapped_native)
    }

    async fn quote(&self, amount_in: U256, path: &[Token]) -> Result<U256, ProtocolError> {
        self.record_call("quote")?;
        self.state.lock().check_path(path)?;
        Ok(amount_in)
    }

    async fn total_users(&self) -> Result<U256, ProtocolError> {
        Ok(self.state.lock().total_users)
    }

    async fn positions(&self, owner: Address) -> Result<Vec<Position>, ProtocolError> {
        self.record_call("positions")?;
        Ok(self.positions_of(owner))
    }

    async fn current_epoch(&self) -> Result<u64, ProtocolError> {
        Ok(self.epoch())
    }

    async fn active_listing(&self) -> Result<Option<Listing>, ProtocolError> {
        Ok(self.state.lock().listing.clone())
    }

    async fn user_vote(&self, owner: Address) -> Result<Option<Token>, ProtocolError> {
        Ok(self.vote_of(owner))
    }

    async fn active_campaigns(&self) -> Result<Vec<Campaign>, ProtocolError> {
        Ok(self.state.lock().campaigns.clone())
    }

    async fn user_campaigns(&self, owner: Address) -> Result<Vec<Campaign>, ProtocolError> {
        let state = self.state.lock();
        let ids = state.contributions.get(&owner).cloned().unwrap_or_default();
        Ok(state.campaigns.iter().filter(|c| ids.contains(&c.id)).cloned().collect())
    }

    async fn spender(&self, spender: Spender) -> Result<Address, ProtocolError> {
        Ok(self.spender_address(spender))
    }

    async fn swap(&self, account: &Account, order: SwapOrder) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        let router = self.router;
        let wrapped = self.wrapped_native;
        self.submit("swap", owner, None, move |state| {
            state.check_path(&order.path)?;
            if order.amount_in.is_zero() {
                return Err(ProtocolError::from_message(
                    "execution reverted: INSUFFICIENT_INPUT_AMOUNT",
                ));
            }
            let amount_out = order.amount_in;
            if amount_out < order.min_amount_out {
                return Err(ProtocolError::from_message(
                    "execution reverted: INSUFFICIENT_OUTPUT_AMOUNT",
                ));
            }
            match order.native_value {
                Some(value) if order.path[0] == wrapped => state.debit(owner, NATIVE, value)?,
                Some(_) => {
                    return Err(ProtocolError::from_message("execution reverted: INVALID_PATH"))
                }
                None => state.pull(owner, order.path[0], router, order.amount_in)?,
            }
            if let Some(last) = order.path.last() {
                state.credit(owner, *last, amount_out);
            }
            Ok(())
        })
        .await
    }

    async fn stake(&self, account: &Account, order: StakeOrder) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        let governance = self.governance;
        self.submit("stake", owner, None, move |state| {
            if order.payment_a.amount < order.min_amount_a || order.payment_b.amount < order.min_amount_b {
                return Err(ProtocolError::from_message(
                    "execution reverted: INSUFFICIENT_AMOUNT",
                ));
            }
            match order.native_value {
                Some(value) => state.debit(owner, NATIVE, value)?,
                None => state.pull(owner, order.payment_a.token, governance, order.payment_a.amount)?,
            }
            state.pull(owner, order.payment_b.token, governance, order.payment_b.amount)?;

            let nonce = U256::from(state.next_position);
            state.next_position += 1;
            let epoch = state.epoch();
            state.positions.entry(owner).or_default().push(Position {
                nonce,
                amount: order.payment_a.amount + order.payment_b.amount,
                epochs_locked: order.epochs_locked,
                last_claim_epoch: epoch,
            });
            Ok(())
        })
        .await
    }

    async fn claim_rewards(&self, account: &Account, nonce: U256) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        self.submit("claim_rewards", owner, None, move |state| {
            let epoch = state.epoch();
            let position = state
                .positions
                .get_mut(&owner)
                .and_then(|ps| ps.iter_mut().find(|p| p.nonce == nonce))
                .ok_or_else(nothing_at_nonce)?;
            position.last_claim_epoch = epoch;
            Ok(())
        })
        .await
    }

    async fn unstake(
        &self,
        account: &Account,
        nonce: U256,
        _min_amount_a: U256,
        _min_amount_b: U256,
    ) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        self.submit("unstake", owner, None, move |state| {
            let positions = state.positions.entry(owner).or_default();
            let index = positions
                .iter()
                .position(|p| p.nonce == nonce)
                .ok_or_else(nothing_at_nonce)?;
            positions.remove(index);
            Ok(())
        })
        .await
    }

    async fn vote(&self, account: &Account, ballot: VoteBallot) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        self.submit("vote", owner, None, move |state| {
            let epoch = state.epoch();
            match &state.listing {
                Some(listing) if epoch <= listing.end_epoch => {}
                _ => return Err(ProtocolError::from_message("execution reverted: No active listing")),
            }
            if !state.position_approvals.contains(&(owner, Spender::Governance)) {
                return Err(ProtocolError::from_message(
                    "execution reverted: ERC1155: caller is not token owner or approved",
                ));
            }
            let owns = state
                .positions
                .get(&owner)
                .map_or(false, |ps| ps.iter().any(|p| p.nonce == ballot.position_nonce));
            if !owns {
                return Err(nothing_at_nonce());
            }
            state.votes.insert(owner, ballot.trade_token);
            Ok(())
        })
        .await
    }

    async fn recall_vote(&self, account: &Account) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        self.submit("recall_vote", owner, None, move |state| {
            state
                .votes
                .remove(&owner)
                .map(|_| ())
                .ok_or_else(|| ProtocolError::from_message("execution reverted: No vote to recall"))
        })
        .await
    }

    async fn contribute(&self, account: &Account, contribution: Contribution) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        let launch_pair = self.launch_pair;
        self.submit("contribute", owner, None, move |state| {
            let now = state.timestamp;
            let open = state.campaign_mut(contribution.campaign_id)?.is_open(now);
            if !open {
                return Err(ProtocolError::from_message("execution reverted: Campaign ended"));
            }
            let amount = contribution.payment.amount;
            match contribution.native_value {
                Some(value) => state.debit(owner, NATIVE, value)?,
                None => state.pull(owner, contribution.payment.token, launch_pair, amount)?,
            }
            let campaign = state.campaign_mut(contribution.campaign_id)?;
            campaign.funds_raised = campaign.funds_raised.saturating_add(amount);
            state.contributions.entry(owner).or_default().insert(contribution.campaign_id);
            Ok(())
        })
        .await
    }

    async fn withdraw_campaign_tokens(&self, account: &Account, campaign_id: U256) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        self.submit("withdraw_campaign_tokens", owner, None, move |state| {
            settle_campaign(state, owner, campaign_id, true)
        })
        .await
    }

    async fn refund_campaign(&self, account: &Account, campaign_id: U256) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        self.submit("refund_campaign", owner, None, move |state| {
            settle_campaign(state, owner, campaign_id, false)
        })
        .await
    }

    async fn wrap_native(&self, account: &Account, amount: U256) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        let wrapped = self.wrapped_native;
        self.submit("wrap_native", owner, None, move |state| {
            state.debit(owner, NATIVE, amount)?;
            state.credit(owner, wrapped, amount);
            Ok(())
        })
        .await
    }

    async fn unwrap_native(&self, account: &Account, amount: U256) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        let wrapped = self.wrapped_native;
        self.submit("unwrap_native", owner, None, move |state| {
            state.debit(owner, wrapped, amount)?;
            state.credit(owner, NATIVE, amount);
            Ok(())
        })
        .await
    }

    async fn approve_positions(&self, account: &Account, spender: Spender) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        self.submit("approve_positions", owner, None, move |state| {
            state.position_approvals.insert((owner, spender));
            Ok(())
        })
        .await
    }

    async fn transfer_position(
        &self,
        account: &Account,
        to: Address,
        nonce: U256,
        _amount: U256,
    ) -> Result<TxReceipt, ProtocolError> {
        let owner = account.address;
        self.submit("transfer_position", owner, None, move |state| {
            let positions = state.positions.entry(owner).or_default();
            let index = positions
                .iter()
                .position(|p| p.nonce == nonce)
                .ok_or_else(nothing_at_nonce)?;
            let position = positions.remove(index);
            state.positions.entry(to).or_default().push(position);
            Ok(())
        })
        .await
    }
}

fn nothing_at_nonce() -> ProtocolError {
    ProtocolError::from_message("execution reverted: No GToken balance found at nonce for user")
}

fn settle_campaign(state: &mut ChainState, owner: Address, id: U256, withdraw: bool) -> Result<(), ProtocolError> {
    let now = state.timestamp;
    let campaign = state.campaign_mut(id)?;
    if campaign.is_open(now) {
        return Err(ProtocolError::from_message("execution reverted: Campaign still active"));
    }
    if campaign.reached_goal() != withdraw {
        return Err(ProtocolError::from_message(if withdraw {
            "execution reverted: Campaign failed"
        } else {
            "execution reverted: Campaign succeeded"
        }));
    }
    let removed = state
        .contributions
        .get_mut(&owner)
        .map_or(false, |ids| ids.remove(&id));
    if !removed {
        return Err(ProtocolError::from_message("execution reverted: No contribution"));
    }
    Ok(())
}

#[async_trait]
impl AccountLedger for MemoryChain {
    async fn balance(&self, owner: Address, token: Token) -> Result<U256, ProtocolError> {
        self.record_call("balance")?;
        Ok(self.balance_of(owner, token))
    }

    async fn allowance(&self, owner: Address, token: Token, spender: Address) -> Result<U256, ProtocolError> {
        Ok(self.allowance_of(owner, token, spender))
    }

    async fn transfer(
        &self,
        from: &Account,
        to: Address,
        token: Token,
        amount: U256,
        nonce: Option<U256>,
    ) -> Result<TxReceipt, ProtocolError> {
        let sender = from.address;
        self.submit("transfer", sender, nonce, move |state| {
            state.debit(sender, token, amount)?;
            state.credit(to, token, amount);
            Ok(())
        })
        .await
    }

    async fn approve(
        &self,
        owner: &Account,
        token: Token,
        spender: Address,
        amount: U256,
    ) -> Result<TxReceipt, ProtocolError> {
        let holder = owner.address;
        self.submit("approve", holder, None, move |state| {
            state.allowances.insert((holder, token, spender), amount);
            Ok(())
        })
        .await
    }

    async fn pending_nonce(&self, owner: Address) -> Result<Option<U256>, ProtocolError> {
        if !self.pending_nonce_supported {
            return Ok(None);
        }
        let mut state = self.state.lock();
        let nonce = state.nonces.get(&owner).copied().unwrap_or_default();
        if state.stale_nonce_reads > 0 {
            state.stale_nonce_reads -= 1;
            return Ok(Some(nonce.saturating_sub(U256::one())));
        }
        Ok(Some(nonce))
    }
}

#[async_trait]
impl TimeControl for MemoryChain {
    async fn latest_timestamp(&self) -> Result<u64, ProtocolError> {
        Ok(self.timestamp())
    }

    async fn advance(&self, seconds: u64) -> Result<(), ProtocolError> {
        self.record_call("advance")?;
        let mut state = self.state.lock();
        state.timestamp += seconds;
        state.block += 1;
        Ok(())
    }
}
