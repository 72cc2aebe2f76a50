//! Gauntlet Metrics - Counters and gauges for a soak run
//!
//! Prometheus metrics for every engine component. Each engine owns its own
//! [`Registry`], so two engines in one process never share counters.

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

/// Latency buckets for action histograms (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.01,  // 10ms
    0.05,  // 50ms
    0.1,   // 100ms
    0.25,  // 250ms
    0.5,   // 500ms
    1.0,   // 1s
    2.5,   // 2.5s
    5.0,   // 5s
    15.0,  // 15s
    60.0,  // 1m
];

/// Action attempt metrics
pub struct ActionMetrics {
    /// outcome: submitted, skipped, ignored, fatal, retried
    pub attempts: IntCounterVec,
    pub duration: HistogramVec,
}

impl ActionMetrics {
    pub fn new(registry: &Registry) -> Self {
        let attempts = IntCounterVec::new(
            Opts::new("gauntlet_actions_total", "Action attempts by outcome"),
            &["action", "outcome"],
        ).expect("Failed to create actions_total metric");

        let duration = HistogramVec::new(
            HistogramOpts::new("gauntlet_action_seconds", "Action wall time")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["action"],
        ).expect("Failed to create action_seconds metric");

        registry.register(Box::new(attempts.clone())).ok();
        registry.register(Box::new(duration.clone())).ok();

        Self { attempts, duration }
    }

    pub fn record(&self, action: &str, outcome: &str) {
        self.attempts.with_label_values(&[action, outcome]).inc();
    }

    pub fn count(&self, action: &str, outcome: &str) -> u64 {
        self.attempts.with_label_values(&[action, outcome]).get()
    }
}

/// Worker loop metrics
pub struct SchedulerMetrics {
    pub in_flight: IntGauge,
    pub in_flight_peak: IntGauge,
    pub rounds: IntCounter,
    pub throttled: IntCounter,
    pub dispatched: IntCounter,
    pub time_advanced_seconds: IntCounter,
    pub round_size: Histogram,
}

impl SchedulerMetrics {
    pub fn new(registry: &Registry) -> Self {
        let in_flight = IntGauge::new("gauntlet_in_flight", "Work items currently executing")
            .expect("Failed to create in_flight metric");

        let in_flight_peak = IntGauge::new("gauntlet_in_flight_peak", "Highest in-flight count observed")
            .expect("Failed to create in_flight_peak metric");

        let rounds = IntCounter::new("gauntlet_rounds_total", "Worker rounds started")
            .expect("Failed to create rounds_total metric");

        let throttled = IntCounter::new("gauntlet_throttled_total", "Rounds skipped at the in-flight cap")
            .expect("Failed to create throttled_total metric");

        let dispatched = IntCounter::new("gauntlet_dispatched_total", "Work items dispatched")
            .expect("Failed to create dispatched_total metric");

        let time_advanced_seconds = IntCounter::new(
            "gauntlet_time_advanced_seconds_total",
            "Chain seconds skipped on the local node",
        ).expect("Failed to create time_advanced metric");

        let round_size = Histogram::with_opts(
            HistogramOpts::new("gauntlet_round_size", "Work items per round")
                .buckets(vec![1.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0]),
        ).expect("Failed to create round_size metric");

        registry.register(Box::new(in_flight.clone())).ok();
        registry.register(Box::new(in_flight_peak.clone())).ok();
        registry.register(Box::new(rounds.clone())).ok();
        registry.register(Box::new(throttled.clone())).ok();
        registry.register(Box::new(dispatched.clone())).ok();
        registry.register(Box::new(time_advanced_seconds.clone())).ok();
        registry.register(Box::new(round_size.clone())).ok();

        Self {
            in_flight,
            in_flight_peak,
            rounds,
            throttled,
            dispatched,
            time_advanced_seconds,
            round_size,
        }
    }
}

/// Funding metrics
pub struct FundingMetrics {
    /// result: already_funded, topped_up, failed
    pub fundings: IntCounterVec,
    pub nonce_recoveries: IntCounter,
}

impl FundingMetrics {
    pub fn new(registry: &Registry) -> Self {
        let fundings = IntCounterVec::new(
            Opts::new("gauntlet_funding_total", "Funding checks by result"),
            &["result"],
        ).expect("Failed to create funding_total metric");

        let nonce_recoveries = IntCounter::new(
            "gauntlet_nonce_recoveries_total",
            "Funding submissions retried with a recovered nonce",
        ).expect("Failed to create nonce_recoveries metric");

        registry.register(Box::new(fundings.clone())).ok();
        registry.register(Box::new(nonce_recoveries.clone())).ok();

        Self { fundings, nonce_recoveries }
    }
}

/// Path resolution metrics
pub struct PathMetrics {
    /// result: hit, miss
    pub cache: IntCounterVec,
    pub unreachable: IntCounter,
}

impl PathMetrics {
    pub fn new(registry: &Registry) -> Self {
        let cache = IntCounterVec::new(
            Opts::new("gauntlet_path_cache_total", "Path cache lookups"),
            &["result"],
        ).expect("Failed to create path_cache metric");

        let unreachable = IntCounter::new("gauntlet_path_unreachable_total", "Pairs with no route")
            .expect("Failed to create path_unreachable metric");

        registry.register(Box::new(cache.clone())).ok();
        registry.register(Box::new(unreachable.clone())).ok();

        Self { cache, unreachable }
    }
}

/// All Gauntlet metrics, bound to one registry
pub struct GauntletMetrics {
    registry: Registry,
    pub actions: ActionMetrics,
    pub scheduler: SchedulerMetrics,
    pub funding: FundingMetrics,
    pub paths: PathMetrics,
}

impl GauntletMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        Self {
            actions: ActionMetrics::new(&registry),
            scheduler: SchedulerMetrics::new(&registry),
            funding: FundingMetrics::new(&registry),
            paths: PathMetrics::new(&registry),
            registry,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Metrics as Prometheus text format
    pub fn gather(&self) -> String {
        gather(&self.registry)
    }
}

impl Default for GauntletMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a registry as Prometheus text format
pub fn gather(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("METRICS: Failed to encode: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
