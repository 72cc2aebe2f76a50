//! Per-key mutual exclusion and the single-flight queue

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ethers::types::Address;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// Busy-set keyed by address. At most one holder per key; waiters poll.
pub struct KeyedLock {
    busy: DashMap<Address, ()>,
    poll: Duration,
}

impl KeyedLock {
    pub fn new(poll: Duration) -> Self {
        Self {
            busy: DashMap::new(),
            poll,
        }
    }

    pub fn try_acquire(&self, key: Address) -> Option<KeyGuard<'_>> {
        match self.busy.entry(key) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(KeyGuard {
                    lock: self,
                    key,
                    waited: false,
                })
            }
        }
    }

    /// Wait until `key` is free, polling every `poll`
    pub async fn acquire(&self, key: Address) -> KeyGuard<'_> {
        let mut waited = false;
        loop {
            if let Some(mut guard) = self.try_acquire(key) {
                guard.waited = waited;
                return guard;
            }
            if !waited {
                tracing::debug!("TREASURER: Waiting for {:?}", key);
                waited = true;
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    pub fn is_busy(&self, key: &Address) -> bool {
        self.busy.contains_key(key)
    }
}

/// Releases the key on drop
pub struct KeyGuard<'a> {
    lock: &'a KeyedLock,
    key: Address,
    waited: bool,
}

impl KeyGuard<'_> {
    /// Someone else held the key when acquisition started
    pub fn waited(&self) -> bool {
        self.waited
    }

    pub fn key(&self) -> Address {
        self.key
    }
}

impl std::fmt::Debug for KeyGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard")
            .field("key", &self.key)
            .field("waited", &self.waited)
            .finish_non_exhaustive()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.lock.busy.remove(&self.key);
    }
}

type Step = BoxFuture<'static, ()>;

/// FIFO of (pre-step, step) pairs drained by one caller at a time
pub struct SingleFlight {
    queue: Mutex<VecDeque<(Option<Step>, Step)>>,
    running: AtomicBool,
    poll: Duration,
}

impl SingleFlight {
    pub fn new(poll: Duration) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(false),
            poll,
        }
    }

    pub fn enqueue(&self, pre: Option<Step>, step: Step) {
        self.queue.lock().push_back((pre, step));
    }

    /// Enqueue `step` and drive the queue until its result is in. The
    /// value is `None` only if the step was dropped without finishing.
    pub async fn submit<T>(&self, pre: Option<Step>, step: BoxFuture<'static, T>) -> Option<T>
    where
        T: Send + 'static,
    {
        let (tx, mut rx) = oneshot::channel();
        self.enqueue(
            pre,
            Box::pin(async move {
                let _ = tx.send(step.await);
            }),
        );

        loop {
            self.run().await;
            match rx.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Closed) => return None,
                Err(TryRecvError::Empty) => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Drain the queue if nobody else is. A caller that finds a drain in
    /// progress waits for it to end and returns without draining.
    /// Returns the number of pairs this caller ran.
    pub async fn run(&self) -> usize {
        let mut drained = 0;

        loop {
            if self
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                if drained == 0 {
                    while self.is_running() {
                        tokio::time::sleep(self.poll).await;
                    }
                }
                return drained;
            }

            let _reset = RunningReset(&self.running);
            loop {
                let next = self.queue.lock().pop_front();
                let Some((pre, step)) = next else { break };
                if let Some(pre) = pre {
                    pre.await;
                }
                step.await;
                drained += 1;
            }
            drop(_reset);

            // Pairs enqueued between the last pop and the reset
            if self.is_empty() {
                return drained;
            }
        }
    }
}

struct RunningReset<'a>(&'a AtomicBool);

impl Drop for RunningReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready};

    #[test]
    fn test_keyed_lock_is_exclusive_per_key() {
        let lock = KeyedLock::new(Duration::from_millis(10));
        let a = Address::from_low_u64_be(1);
        let b = Address::from_low_u64_be(2);

        let guard = lock.try_acquire(a).unwrap();
        assert!(lock.try_acquire(a).is_none());
        assert!(lock.try_acquire(b).is_some());

        drop(guard);
        assert!(!lock.is_busy(&a));
        assert!(lock.try_acquire(a).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_release() {
        let lock = KeyedLock::new(Duration::from_millis(10));
        let key = Address::from_low_u64_be(1);

        let held = lock.try_acquire(key).unwrap();
        let mut waiter = tokio_test::task::spawn(lock.acquire(key));
        assert_pending!(waiter.poll());

        drop(held);
        tokio::time::advance(Duration::from_millis(10)).await;

        let guard = assert_ready!(waiter.poll());
        assert!(guard.waited());
    }

    #[tokio::test]
    async fn test_single_flight_runs_pairs_in_order() {
        let flight = SingleFlight::new(Duration::from_millis(1));
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let pre_log = log.clone();
            let step_log = log.clone();
            flight.enqueue(
                Some(async move { pre_log.lock().push(format!("pre{}", i)) }.boxed()),
                async move { step_log.lock().push(format!("step{}", i)) }.boxed(),
            );
        }

        assert_eq!(flight.run().await, 3);
        assert!(flight.is_empty());
        assert_eq!(
            *log.lock(),
            vec!["pre0", "step0", "pre1", "step1", "pre2", "step2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_returns_step_result() {
        let flight = Arc::new(SingleFlight::new(Duration::from_millis(5)));
        let order = Arc::new(Mutex::new(Vec::new()));

        let tasks: Vec<_> = (0..4u32)
            .map(|i| {
                let flight = flight.clone();
                let order = order.clone();
                tokio::spawn(async move {
                    let step = async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        order.lock().push(i);
                        i * 10
                    };
                    flight.submit(None, step.boxed()).await
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), Some(i as u32 * 10));
        }
        assert_eq!(order.lock().len(), 4);
        assert!(flight.is_empty());
        assert!(!flight.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_caller_waits_without_draining() {
        let flight = Arc::new(SingleFlight::new(Duration::from_millis(5)));
        flight.enqueue(None, tokio::time::sleep(Duration::from_millis(50)).boxed());

        let drainer = tokio::spawn({
            let flight = flight.clone();
            async move { flight.run().await }
        });
        tokio::task::yield_now().await;
        assert!(flight.is_running());

        let late = flight.run().await;
        assert_eq!(late, 0);
        assert!(!flight.is_running());
        assert_eq!(drainer.await.unwrap(), 1);
    }
}
