//! Per-subscriber delivery worker.
//!
//! [`DeliveryWorker::spawn`] creates the bounded queue, starts the worker
//! task under a child of the caller's cancellation token, and returns the
//! [`SubscriberHandle`] the broadcast tick offers updates through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Deliver, DeliveryError};
use crate::protocol::AirportLoad;
use crate::subscription::SubscriberId;

/// Default outbound queue capacity per subscriber.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default limit on a single transport write.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of failed writes in a row before the worker gives up.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Delivery settings shared by every subscriber.
#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    /// Outbound queue capacity. Zero is treated as one.
    pub queue_capacity: usize,

    /// Limit on a single `deliver` call.
    pub timeout: Duration,

    /// Consecutive failures before the subscriber is dropped. Zero disables.
    pub max_consecutive_failures: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeout: DEFAULT_DELIVERY_TIMEOUT,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// Lock-free delivery counters for one subscriber.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl DeliveryStats {
    fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Updates the transport accepted.
    pub delivered: u64,
    /// Writes that errored or timed out.
    pub failed: u64,
    /// Updates discarded because the queue was full or closed.
    pub dropped: u64,
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Its token (or the coordinator's) was cancelled.
    Cancelled,
    /// Every queue sender was dropped.
    QueueClosed,
    /// The transport failed too many times in a row.
    TooManyFailures { failures: u32 },
}

/// Drains one subscriber's queue into its transport.
pub struct DeliveryWorker {
    id: SubscriberId,
    sink: Arc<dyn Deliver>,
    queue: mpsc::Receiver<AirportLoad>,
    config: DeliveryConfig,
    stats: Arc<DeliveryStats>,
    cancel: CancellationToken,
}

impl DeliveryWorker {
    /// Start a worker for `id` and return its handle.
    ///
    /// The worker's token is a child of `parent`, so cancelling `parent`
    /// stops it too.
    pub fn spawn(
        id: SubscriberId,
        sink: Arc<dyn Deliver>,
        config: &DeliveryConfig,
        parent: &CancellationToken,
    ) -> SubscriberHandle {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(DeliveryStats::default());
        let cancel = parent.child_token();

        let worker = Self {
            id,
            sink,
            queue: rx,
            config: config.clone(),
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        SubscriberHandle {
            id,
            queue: tx,
            cancel,
            stats,
            task,
        }
    }

    /// Deliver queued updates until cancelled, the queue closes, or the
    /// transport keeps failing.
    pub async fn run(mut self) -> WorkerExit {
        let target = self.sink.describe();
        debug!(subscriber = %self.id, target = %target, "Delivery worker started");

        let mut failures: u32 = 0;
        let exit = 'deliver: loop {
            let update = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break 'deliver WorkerExit::Cancelled,

                update = self.queue.recv() => match update {
                    Some(update) => update,
                    None => break 'deliver WorkerExit::QueueClosed,
                },
            };

            let code = update.airport_code.clone();
            let result = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break 'deliver WorkerExit::Cancelled,

                result = tokio::time::timeout(self.config.timeout, self.sink.deliver(update)) => {
                    result.unwrap_or(Err(DeliveryError::Timeout(self.config.timeout)))
                }
            };

            match result {
                Ok(()) => {
                    failures = 0;
                    self.stats.record_delivered();
                }
                Err(e) => {
                    failures += 1;
                    self.stats.record_failed();
                    debug!(
                        subscriber = %self.id,
                        airport = %code,
                        failures,
                        error = %e,
                        "Delivery failed"
                    );

                    if self.config.max_consecutive_failures > 0
                        && failures >= self.config.max_consecutive_failures
                    {
                        warn!(
                            subscriber = %self.id,
                            target = %target,
                            failures,
                            error = %e,
                            "Subscriber unreachable, dropping"
                        );
                        break 'deliver WorkerExit::TooManyFailures { failures };
                    }
                }
            }
        };

        info!(subscriber = %self.id, exit = ?exit, "Delivery worker stopped");
        exit
    }
}

/// Coordinator-side handle to a running [`DeliveryWorker`].
#[derive(Debug)]
pub struct SubscriberHandle {
    id: SubscriberId,
    queue: mpsc::Sender<AirportLoad>,
    cancel: CancellationToken,
    stats: Arc<DeliveryStats>,
    task: JoinHandle<WorkerExit>,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Queue an update without waiting.
    ///
    /// Returns `false` (and counts a drop) when the queue is full or the
    /// worker has stopped.
    pub fn offer(&self, update: AirportLoad) -> bool {
        match self.queue.try_send(update) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(update)) => {
                self.stats.record_dropped();
                debug!(subscriber = %self.id, airport = %update.airport_code, "Queue full, update dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.record_dropped();
                false
            }
        }
    }

    /// Whether the worker task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the worker. Queued updates are discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait for the worker to exit. `None` if the task panicked or was
    /// aborted.
    pub async fn join(self) -> Option<WorkerExit> {
        self.task.await.ok()
    }
}
