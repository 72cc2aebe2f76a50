//! In-flight work counter
//!
//! Backpressure is by polling: a dispatcher that finds the counter at its
//! cap sleeps and re-checks instead of queueing.

use gauntlet_metrics::GauntletMetrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts work items dispatched but not yet finished
pub struct InFlight {
    count: AtomicUsize,
    peak: AtomicUsize,
    cap: usize,
    poll: Duration,
    metrics: Option<Arc<GauntletMetrics>>,
}

impl InFlight {
    pub fn new(cap: usize, poll: Duration) -> Self {
        Self {
            count: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            cap: cap.max(1),
            poll,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GauntletMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Highest count observed since construction
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn is_saturated(&self) -> bool {
        self.count() >= self.cap
    }

    /// Take a slot if one is free. The slot is released when the guard drops,
    /// whatever the work item's outcome.
    pub fn try_acquire(self: &Arc<Self>) -> Option<InFlightGuard> {
        let taken = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.cap).then_some(n + 1)
            })
            .ok()?;

        let now = taken + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.publish(now);

        Some(InFlightGuard {
            counter: Arc::clone(self),
        })
    }

    /// Wait for a free slot
    pub async fn acquire(self: &Arc<Self>) -> InFlightGuard {
        loop {
            if let Some(guard) = self.try_acquire() {
                return guard;
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    fn release(&self) {
        let now = self.count.fetch_sub(1, Ordering::SeqCst) - 1;
        self.publish(now);
    }

    fn publish(&self, now: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.scheduler.in_flight.set(now as i64);
            metrics.scheduler.in_flight_peak.set(self.peak() as i64);
        }
    }
}

/// One occupied slot
pub struct InFlightGuard {
    counter: Arc<InFlight>,
}

impl std::fmt::Debug for InFlightGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightGuard").finish_non_exhaustive()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.release();
    }
}
