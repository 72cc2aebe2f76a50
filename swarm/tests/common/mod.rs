#![allow(dead_code)]

use async_trait::async_trait;
use gauntlet_metrics::GauntletMetrics;
use gauntlet_testkit::{account, ether, MemoryChain};
use gauntlet_types::{Account, NetworkMode, ProtocolError, NATIVE};
use pathfinder::{Pathfinder, PathfinderConfig};
use playbook::{Action, ActionContext, ActionRunner, Catalog, Outcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swarm::{Engine, WorkerSettings};
use treasurer::{FundingPolicy, Treasurer};
use triage::Classifier;

/// Index of the account every top-up is paid from
pub const SOURCE: u32 = 0;

pub fn policy() -> FundingPolicy {
    FundingPolicy {
        lock_poll: Duration::from_millis(2),
        ..Default::default()
    }
}

/// Sleeps, and records how many copies of itself ran at once
pub struct Sleepy {
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
    done: AtomicUsize,
}

impl Sleepy {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Action for Sleepy {
    fn name(&self) -> &'static str {
        "sleepy"
    }

    async fn execute(&self, _ctx: &ActionContext, _account: &Account) -> Result<Outcome, ProtocolError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(Outcome::skipped("slept"))
    }
}

/// Always fails with an unclassified revert
pub struct Reverting;

#[async_trait]
impl Action for Reverting {
    fn name(&self) -> &'static str {
        "reverting"
    }

    async fn execute(&self, _ctx: &ActionContext, _account: &Account) -> Result<Outcome, ProtocolError> {
        Err(ProtocolError::from_message("execution reverted: boom"))
    }
}

/// Engine over `chain` running only `action` for accounts 1..=`accounts`
pub fn engine(chain: &Arc<MemoryChain>, action: Arc<dyn Action>, accounts: u32, fund: bool) -> Arc<Engine> {
    chain.mint(account(SOURCE).address, NATIVE, ether(1_000_000));
    let metrics = Arc::new(GauntletMetrics::new());

    let ctx = ActionContext::new(
        chain.clone(),
        chain.clone(),
        chain.clone(),
        Arc::new(Pathfinder::new(&[], PathfinderConfig::default())),
        Arc::new(Treasurer::new(chain.clone(), policy())),
        account(SOURCE),
        chain.wrapped_token(),
    )
    .with_mode(NetworkMode::Local)
    .with_fund(fund)
    .with_seed(11);

    let runner = ActionRunner::new(Classifier::new(NetworkMode::Local, Vec::new()))
        .with_metrics(metrics.clone());

    Arc::new(Engine {
        ctx: Arc::new(ctx),
        runner: Arc::new(runner),
        catalog: Catalog::new(vec![action]).unwrap(),
        accounts: (1..=accounts).map(account).collect(),
        metrics,
    })
}

pub fn settings(cap: usize, budget: usize, rounds: Option<u64>) -> WorkerSettings {
    WorkerSettings {
        max_in_flight: cap,
        selection_budget: budget,
        throttle_interval: Duration::from_millis(5),
        round_interval: Duration::from_millis(1),
        shutdown_grace: Duration::from_secs(60),
        time_advance: 1..2,
        max_rounds: rounds,
        ..WorkerSettings::default()
    }
}
