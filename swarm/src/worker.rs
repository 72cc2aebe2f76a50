//! The worker loop
//!
//! `Running -> (select, dispatch, advance time, pause)* -> ShuttingDown ->
//! Terminated`. Shutdown is only observed at the top of an iteration;
//! dispatched items finish on their own within the grace period.

use crate::engine::Engine;
use crate::in_flight::InFlight;
use crate::selection::{AccountSelector, SelectionMode};
use crate::SwarmError;
use futures::future::BoxFuture;
use futures::FutureExt;
use gauntlet_config::{MonitoringConfig, SchedulerConfig};
use gauntlet_types::Account;
use playbook::{Action, FatalError};
use rand::Rng;
use std::collections::BTreeSet;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use treasurer::SingleFlight;

/// Poll interval while waiting for an in-flight slot
const SLOT_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    ShuttingDown,
    Terminated,
}

/// How a round's work items are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchStrategy {
    /// Every item runs as its own task
    #[default]
    FanOut,
    /// Items go through one queue, drained by one task at a time, each
    /// preceded by a gas top-up when funding is on
    SingleFlight,
}

impl FromStr for DispatchStrategy {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fan_out" => Ok(DispatchStrategy::FanOut),
            "single_flight" => Ok(DispatchStrategy::SingleFlight),
            other => Err(SwarmError::InvalidSetting(format!("dispatch strategy: {}", other))),
        }
    }
}

/// Worker loop settings
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub index: usize,
    pub max_in_flight: usize,
    pub max_batch: usize,
    pub selection_budget: usize,
    pub selection: SelectionMode,
    pub dispatch: DispatchStrategy,
    pub throttle_interval: Duration,
    pub round_interval: Duration,
    pub shutdown_grace: Duration,
    /// Seconds, half-open
    pub time_advance: Range<u64>,
    pub summary_interval: Duration,
    pub max_rounds: Option<u64>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            index: 0,
            max_in_flight: 30,
            max_batch: 50,
            selection_budget: 60,
            selection: SelectionMode::Sampled,
            dispatch: DispatchStrategy::FanOut,
            throttle_interval: Duration::from_secs(1),
            round_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(30),
            time_advance: 1..3600,
            summary_interval: Duration::from_secs(30),
            max_rounds: None,
        }
    }
}

impl WorkerSettings {
    pub fn from_config(
        index: usize,
        scheduler: &SchedulerConfig,
        monitoring: &MonitoringConfig,
    ) -> Result<Self, SwarmError> {
        let min = scheduler.time_advance_min_secs;
        let max = scheduler.time_advance_max_secs.max(min + 1);

        Ok(Self {
            index,
            max_in_flight: scheduler.max_in_flight,
            max_batch: scheduler.max_batch,
            selection_budget: scheduler.selection_budget,
            selection: scheduler.selection.parse()?,
            dispatch: scheduler.dispatch.parse()?,
            throttle_interval: Duration::from_millis(scheduler.throttle_interval_ms),
            round_interval: Duration::from_millis(scheduler.round_interval_ms),
            shutdown_grace: Duration::from_millis(scheduler.shutdown_grace_ms),
            time_advance: min..max,
            summary_interval: Duration::from_millis(monitoring.summary_interval_ms),
            max_rounds: scheduler.max_rounds,
        })
    }
}

/// One action for one account
#[derive(Clone)]
pub struct WorkItem {
    pub action: Arc<dyn Action>,
    pub account: Account,
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("action", &self.action.name())
            .field("account", &self.account.address)
            .finish()
    }
}

/// What a worker did before it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub rounds: u64,
    pub dispatched: u64,
    pub peak_in_flight: usize,
}

/// Drives the catalog against the account pool until shutdown
pub struct Worker {
    settings: WorkerSettings,
    engine: Arc<Engine>,
    selector: AccountSelector,
    in_flight: Arc<InFlight>,
    queue: Arc<SingleFlight>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    state: WorkerState,
}

impl Worker {
    pub fn new(settings: WorkerSettings, engine: Arc<Engine>, shutdown: CancellationToken) -> Self {
        let selector = AccountSelector::new(
            engine.accounts.clone(),
            settings.selection,
            settings.selection_budget,
            engine.catalog.len(),
        );
        let in_flight = Arc::new(
            InFlight::new(settings.max_in_flight, SLOT_POLL).with_metrics(engine.metrics.clone()),
        );
        let queue = Arc::new(SingleFlight::new(SLOT_POLL));

        tracing::info!(
            "SWARM: Worker {} created: {} accounts, window {}, cap {}, {:?} dispatch",
            settings.index,
            selector.pool_size(),
            selector.window(),
            in_flight.cap(),
            settings.dispatch
        );

        Self {
            settings,
            engine,
            selector,
            in_flight,
            queue,
            tracker: TaskTracker::new(),
            shutdown,
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    /// Run until shutdown, the round limit, or a fatal error
    pub async fn run(mut self) -> Result<WorkerReport, SwarmError> {
        self.state = WorkerState::Running;
        tracing::info!("SWARM: Worker {} running", self.settings.index);

        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<FatalError>();
        let mut rounds = 0u64;
        let mut dispatched = 0u64;
        let mut last_summary = Instant::now();

        let outcome = loop {
            if self.shutdown.is_cancelled() {
                tracing::info!("SWARM: Worker {} received shutdown", self.settings.index);
                break Ok(());
            }

            if let Ok(fatal) = fatal_rx.try_recv() {
                break Err(fatal);
            }

            if self.settings.max_rounds.is_some_and(|max| rounds >= max) {
                tracing::info!("SWARM: Worker {} finished {} rounds", self.settings.index, rounds);
                break Ok(());
            }

            if self.in_flight.is_saturated() {
                tracing::info!(
                    "SWARM: Worker {} throttled at {} in flight",
                    self.settings.index,
                    self.in_flight.count()
                );
                self.engine.metrics.scheduler.throttled.inc();
                tokio::time::sleep(self.settings.throttle_interval).await;
                continue;
            }

            let items = self.select_work();
            self.engine.metrics.scheduler.rounds.inc();
            self.engine.metrics.scheduler.round_size.observe(items.len() as f64);
            dispatched += items.len() as u64;
            self.dispatch(items, &fatal_tx).await;
            rounds += 1;

            if self.engine.ctx.mode.is_local() {
                self.advance_time().await;
            }

            if last_summary.elapsed() >= self.settings.summary_interval {
                self.log_summary(rounds);
                last_summary = Instant::now();
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.round_interval) => {}
                _ = self.shutdown.cancelled() => {}
            }
        };

        self.state = WorkerState::ShuttingDown;
        self.drain().await;
        self.state = WorkerState::Terminated;
        self.log_summary(rounds);

        // A fatal error may also land while in-flight items drain
        let outcome = outcome.and_then(|_| match fatal_rx.try_recv() {
            Ok(fatal) => Err(fatal),
            Err(_) => Ok(()),
        });

        match outcome {
            Ok(()) => Ok(WorkerReport {
                rounds,
                dispatched,
                peak_in_flight: self.in_flight.peak(),
            }),
            Err(error) => {
                tracing::error!("SWARM: Worker {} stopping on fatal error: {}", self.settings.index, error);
                Err(SwarmError::Fatal {
                    worker: self.settings.index,
                    error,
                })
            }
        }
    }

    /// Shuffle the catalog, give every entry a window of accounts, cap the
    /// round at `max_batch`
    pub fn select_work(&self) -> Vec<WorkItem> {
        let engine = &self.engine;
        engine.ctx.with_rng(|rng| {
            engine
                .catalog
                .shuffled(rng)
                .into_iter()
                .flat_map(|action| {
                    self.selector
                        .select(rng)
                        .into_iter()
                        .map(move |account| WorkItem {
                            action: action.clone(),
                            account,
                        })
                        .collect::<Vec<_>>()
                })
                .take(self.settings.max_batch)
                .collect()
        })
    }

    /// Hand every item to the strategy, waiting for a slot when the cap is
    /// reached. Items release their slot however they end.
    async fn dispatch(&self, items: Vec<WorkItem>, fatal_tx: &mpsc::UnboundedSender<FatalError>) {
        for item in items {
            let slot = self.in_flight.acquire().await;
            self.engine.metrics.scheduler.dispatched.inc();

            let engine = self.engine.clone();
            let fatal_tx = fatal_tx.clone();
            let account = item.account;
            let step = async move {
                let _slot = slot;
                if let Err(fatal) = engine
                    .runner
                    .run(&engine.ctx, item.action.as_ref(), &item.account)
                    .await
                {
                    let _ = fatal_tx.send(fatal);
                }
            };

            match self.settings.dispatch {
                DispatchStrategy::FanOut => {
                    self.tracker.spawn(step);
                }
                DispatchStrategy::SingleFlight => {
                    self.queue.enqueue(self.gas_top_up(account), step.boxed());
                    let queue = self.queue.clone();
                    self.tracker.spawn(async move {
                        queue.run().await;
                    });
                }
            }
        }
    }

    fn gas_top_up(&self, account: Account) -> Option<BoxFuture<'static, ()>> {
        if !self.engine.ctx.fund {
            return None;
        }

        let ctx = self.engine.ctx.clone();
        Some(
            async move {
                if let Err(e) = ctx.treasurer.ensure_gas(&account, &ctx.funding_source).await {
                    tracing::warn!(account = ?account.address, "SWARM: Gas top-up failed: {}", e);
                }
            }
            .boxed(),
        )
    }

    async fn advance_time(&self) {
        let range = self.settings.time_advance.clone();
        let seconds = self.engine.ctx.with_rng(|rng| rng.gen_range(range));

        match self.engine.ctx.clock.advance(seconds).await {
            Ok(()) => {
                self.engine.metrics.scheduler.time_advanced_seconds.inc_by(seconds);
                tracing::debug!("SWARM: Advanced chain time by {}s", seconds);
            }
            Err(e) => tracing::warn!("SWARM: Time advance failed: {}", e),
        }
    }

    /// Give dispatched items the grace period to finish
    async fn drain(&self) {
        self.tracker.close();
        let pending = self.in_flight.count();
        if pending > 0 {
            tracing::info!(
                "SWARM: Worker {} waiting up to {:?} for {} items",
                self.settings.index,
                self.settings.shutdown_grace,
                pending
            );
        }

        if tokio::time::timeout(self.settings.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                "SWARM: Worker {} left {} items unfinished after the grace period",
                self.settings.index,
                self.in_flight.count()
            );
        }
    }

    fn log_summary(&self, rounds: u64) {
        let actions = &self.engine.metrics.actions;
        let names: BTreeSet<&'static str> = self.engine.catalog.names().into_iter().collect();

        for name in names {
            tracing::info!(
                worker = self.settings.index,
                action = name,
                submitted = actions.count(name, "submitted"),
                skipped = actions.count(name, "skipped"),
                ignored = actions.count(name, "ignored"),
                "SWARM: Summary"
            );
        }
        tracing::info!(
            worker = self.settings.index,
            rounds,
            in_flight = self.in_flight.count(),
            peak = self.in_flight.peak(),
            "SWARM: Summary"
        );
    }
}
