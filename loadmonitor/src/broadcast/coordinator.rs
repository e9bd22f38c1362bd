//! Periodic scan and fan-out.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::policy::{CoordinatorConfig, PushPolicy, SubscriptionMode};
use crate::catalog::LocationCatalog;
use crate::delivery::{Deliver, DeliveryWorker, StatsSnapshot, SubscriberHandle};
use crate::feed::FeedError;
use crate::protocol::AirportLoad;
use crate::subscription::{CodeSet, SubscriberId, SubscriberIdAllocator, SubscriptionRegistry};
use crate::tracker::{FlightTracker, ScanReport};

/// Lifecycle of a [`BroadcastCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Constructed; subscribers may register, no ticks yet.
    Idle,
    /// Tick loop running.
    Running,
    /// Shut down; workers stopped, no further ticks.
    Stopped,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// Errors returned by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Coordinator cannot start from state '{0}'")]
    AlreadyStarted(CoordinatorState),

    #[error("Coordinator has stopped")]
    Stopped,

    #[error("Unknown subscriber {0}")]
    UnknownSubscriber(SubscriberId),

    #[error("Scan failed: {0}")]
    Scan(#[from] FeedError),
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub arrivals: usize,
    pub departures: usize,
    /// Subscribers that had at least one watched code.
    pub subscribers: usize,
    /// Updates accepted into subscriber queues.
    pub queued: usize,
    /// Updates dropped on full or closed queues.
    pub dropped: usize,
    /// Subscribers removed because their worker had exited.
    pub evicted: usize,
}

struct Shared {
    config: CoordinatorConfig,
    catalog: Arc<LocationCatalog>,
    tracker: Mutex<FlightTracker>,
    registry: SubscriptionRegistry,
    handles: DashMap<SubscriberId, SubscriberHandle>,
    ids: SubscriberIdAllocator,
    state: Mutex<CoordinatorState>,
    workers: CancellationToken,
}

/// Drives the tracker on a fixed period and pushes per-airport updates to
/// subscribers.
///
/// Cheap to clone; clones share one coordinator. Transport handlers call
/// [`subscribe`](Self::subscribe) / [`update_subscription`](Self::update_subscription)
/// / [`unsubscribe`](Self::unsubscribe) concurrently with the tick loop.
///
/// # Example
///
/// ```ignore
/// let coordinator = BroadcastCoordinator::new(tracker, CoordinatorConfig::default());
/// let shutdown = CancellationToken::new();
/// let tick_loop = coordinator.start(shutdown.clone())?;
///
/// let (sink, mut updates) = ChannelSink::new("console");
/// coordinator.subscribe(["LAX", "JFK"], Arc::new(sink))?;
/// ```
#[derive(Clone)]
pub struct BroadcastCoordinator {
    shared: Arc<Shared>,
}

impl fmt::Debug for BroadcastCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastCoordinator")
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl BroadcastCoordinator {
    pub fn new(tracker: FlightTracker, config: CoordinatorConfig) -> Self {
        let catalog = Arc::clone(tracker.catalog());
        Self {
            shared: Arc::new(Shared {
                config,
                catalog,
                tracker: Mutex::new(tracker),
                registry: SubscriptionRegistry::new(),
                handles: DashMap::new(),
                ids: SubscriberIdAllocator::new(),
                state: Mutex::new(CoordinatorState::Idle),
                workers: CancellationToken::new(),
            }),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *self.shared.lock_state()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    pub fn catalog(&self) -> &Arc<LocationCatalog> {
        &self.shared.catalog
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.handles.len()
    }

    /// Current watched set for a subscriber.
    pub fn subscription(&self, id: SubscriberId) -> Option<CodeSet> {
        self.shared.registry.subscription(id)
    }

    /// Delivery counters for a subscriber.
    pub fn subscriber_stats(&self, id: SubscriberId) -> Option<StatsSnapshot> {
        self.shared.handles.get(&id).map(|handle| handle.stats())
    }

    /// Register a subscriber and start its delivery worker.
    pub fn subscribe<I, S>(
        &self,
        codes: I,
        sink: Arc<dyn Deliver>,
    ) -> Result<SubscriberId, CoordinatorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let shared = &self.shared;

        // Held until both inserts land so `stop` cannot clear in between.
        let state = shared.lock_state();
        if *state == CoordinatorState::Stopped {
            return Err(CoordinatorError::Stopped);
        }

        let id = shared.ids.allocate();
        let target = sink.describe();
        let handle =
            DeliveryWorker::spawn(id, sink, &shared.config.delivery, &shared.workers);
        shared.handles.insert(id, handle);
        let codes = shared.registry.set_subscription(id, codes);
        drop(state);

        shared.warn_unknown(id, &codes);

        info!(subscriber = %id, target = %target, codes = ?codes, "Subscribed");
        Ok(id)
    }

    /// Replace a subscriber's watched airports.
    ///
    /// Under [`SubscriptionMode::Fixed`] the request is ignored and the
    /// original set is returned.
    pub fn update_subscription<I, S>(
        &self,
        id: SubscriberId,
        codes: I,
    ) -> Result<CodeSet, CoordinatorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let shared = &self.shared;
        let current = shared
            .registry
            .subscription(id)
            .ok_or(CoordinatorError::UnknownSubscriber(id))?;

        match shared.config.mode {
            SubscriptionMode::Fixed => {
                warn!(subscriber = %id, "Subscription is fixed, replace request ignored");
                Ok(current)
            }
            SubscriptionMode::Replaceable => {
                let codes = shared.registry.set_subscription(id, codes);
                shared.warn_unknown(id, &codes);
                info!(subscriber = %id, codes = ?codes, "Subscription replaced");
                Ok(codes)
            }
        }
    }

    /// Remove a subscriber and stop its worker.
    pub fn unsubscribe(&self, id: SubscriberId) -> Result<(), CoordinatorError> {
        if self.shared.remove_subscriber(id) {
            info!(subscriber = %id, "Unsubscribed");
            Ok(())
        } else {
            Err(CoordinatorError::UnknownSubscriber(id))
        }
    }

    /// Start the tick loop.
    ///
    /// The loop runs until `shutdown` is cancelled, then stops every
    /// delivery worker and moves the coordinator to
    /// [`CoordinatorState::Stopped`].
    pub fn start(&self, shutdown: CancellationToken) -> Result<JoinHandle<()>, CoordinatorError> {
        {
            let mut state = self.shared.lock_state();
            if *state != CoordinatorState::Idle {
                return Err(CoordinatorError::AlreadyStarted(*state));
            }
            *state = CoordinatorState::Running;
        }

        let shared = Arc::clone(&self.shared);
        Ok(tokio::spawn(async move {
            let period = shared.config.interval;
            info!(
                interval_secs = period.as_secs_f64(),
                airports = shared.catalog.len(),
                mode = %shared.config.mode,
                push_policy = %shared.config.push_policy,
                "Broadcast loop starting"
            );

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => break,

                    _ = interval.tick() => {
                        if let Err(e) = shared.tick() {
                            warn!(error = %e, "Tick failed, retrying next period");
                        }
                    }
                }
            }

            shared.stop();
            info!("Broadcast loop stopped");
        }))
    }

    /// Run one scan and fan-out immediately.
    ///
    /// Meant for driving an idle coordinator by hand; while the loop is
    /// running it owns the ticks.
    pub fn tick(&self) -> Result<TickSummary, CoordinatorError> {
        match self.state() {
            CoordinatorState::Idle => self.shared.tick(),
            CoordinatorState::Running => Err(CoordinatorError::AlreadyStarted(CoordinatorState::Running)),
            CoordinatorState::Stopped => Err(CoordinatorError::Stopped),
        }
    }

    /// Stop every worker and refuse further subscriptions.
    ///
    /// A running tick loop should be stopped through its shutdown token
    /// instead; this is for coordinators that were never started.
    pub fn shutdown(&self) {
        self.shared.stop();
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_tracker(&self) -> MutexGuard<'_, FlightTracker> {
        self.tracker.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tick(&self) -> Result<TickSummary, CoordinatorError> {
        let started = Instant::now();
        let evicted = self.reap_finished();

        let report = self.lock_tracker().scan()?;

        let mut summary = self.fan_out(&report);
        summary.evicted = evicted;

        debug!(
            arrivals = summary.arrivals,
            departures = summary.departures,
            subscribers = summary.subscribers,
            queued = summary.queued,
            dropped = summary.dropped,
            evicted = summary.evicted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tick complete"
        );
        Ok(summary)
    }

    fn fan_out(&self, report: &ScanReport) -> TickSummary {
        let mut summary = TickSummary {
            arrivals: report.total_arrivals(),
            departures: report.total_departures(),
            ..TickSummary::default()
        };

        for (id, codes) in self.registry.snapshot() {
            let Some(handle) = self.handles.get(&id) else {
                continue;
            };
            if !codes.is_empty() {
                summary.subscribers += 1;
            }

            for code in codes.iter() {
                let Some(events) = report.get(code) else {
                    continue;
                };
                if self.config.push_policy == PushPolicy::ActiveOnly && events.is_empty() {
                    continue;
                }

                if handle.offer(AirportLoad::from_events(code, events)) {
                    summary.queued += 1;
                } else {
                    summary.dropped += 1;
                }
            }
        }

        summary
    }

    /// Drop subscribers whose worker has already exited.
    fn reap_finished(&self) -> usize {
        let finished: Vec<SubscriberId> = self
            .handles
            .iter()
            .filter(|entry| entry.value().is_finished())
            .map(|entry| *entry.key())
            .collect();

        for id in &finished {
            self.remove_subscriber(*id);
            info!(subscriber = %id, "Removed subscriber after its worker exited");
        }
        finished.len()
    }

    fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let had_codes = self.registry.remove(id).is_some();
        let handle = self.handles.remove(&id).map(|(_, handle)| handle);
        if let Some(handle) = &handle {
            handle.cancel();
        }
        had_codes || handle.is_some()
    }

    fn warn_unknown(&self, id: SubscriberId, codes: &CodeSet) {
        let unknown: Vec<&str> = codes
            .iter()
            .map(String::as_str)
            .filter(|code| !self.catalog.contains(code))
            .collect();
        if !unknown.is_empty() {
            warn!(subscriber = %id, unknown = ?unknown, "Subscription names airports not in the catalog");
        }
    }

    fn stop(&self) {
        let mut state = self.lock_state();
        *state = CoordinatorState::Stopped;
        self.workers.cancel();
        self.handles.clear();
        let ids: Vec<SubscriberId> = self.registry.snapshot().into_iter().map(|(id, _)| id).collect();
        for id in ids {
            self.registry.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Location;
    use crate::delivery::{ChannelSink, DeliveryError, FnSink};
    use crate::feed::{Observation, StaticFeed};
    use crate::tracker::RangeConfig;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn catalog() -> Arc<LocationCatalog> {
        Arc::new(LocationCatalog::new(vec![
            Location::new("Los Angeles", "LAX", 33.94, -118.41),
            Location::new("New York", "JFK", 40.64, -73.78),
            Location::new("Seattle", "SEA", 47.45, -122.31),
        ]))
    }

    fn coordinator(feed: StaticFeed, config: CoordinatorConfig) -> BroadcastCoordinator {
        let tracker = FlightTracker::new(catalog(), Box::new(feed), RangeConfig::default());
        BroadcastCoordinator::new(tracker, config)
    }

    fn near_lax(id: &str) -> Observation {
        Observation::new(id, 33.95, -118.40, 50.0, 5.0)
    }

    async fn next(rx: &mut UnboundedReceiver<AirportLoad>) -> AirportLoad {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_tick_pushes_watched_airports() {
        let feed = StaticFeed::new();
        feed.push_batch(vec![near_lax("UAL1")]);
        let coordinator = coordinator(feed, CoordinatorConfig::default());

        let (sink, mut rx) = ChannelSink::new("test");
        let id = coordinator.subscribe(["lax", "JFK"], Arc::new(sink)).unwrap();
        assert_eq!(id.to_string(), "sub-1");

        let summary = coordinator.tick().unwrap();
        assert_eq!(summary.arrivals, 1);
        assert_eq!(summary.queued, 2);

        // Codes are delivered in sorted order: JFK then LAX
        let jfk = next(&mut rx).await;
        assert_eq!(jfk.airport_code, "JFK");
        assert!(jfk.is_quiet());

        let lax = next(&mut rx).await;
        assert_eq!(lax.airport_code, "LAX");
        assert_eq!(lax.arriving_flights, vec!["UAL1"]);
    }

    #[tokio::test]
    async fn test_active_only_skips_quiet_airports() {
        let feed = StaticFeed::new();
        feed.push_batch(vec![near_lax("UAL1")]);
        let config = CoordinatorConfig::default().with_push_policy(PushPolicy::ActiveOnly);
        let coordinator = coordinator(feed, config);

        let (sink, mut rx) = ChannelSink::new("test");
        coordinator.subscribe(["LAX", "JFK"], Arc::new(sink)).unwrap();

        let summary = coordinator.tick().unwrap();
        assert_eq!(summary.queued, 1);
        assert_eq!(next(&mut rx).await.airport_code, "LAX");
    }

    #[tokio::test]
    async fn test_replace_takes_effect_next_tick() {
        let feed = StaticFeed::repeating();
        feed.push_batch(vec![]);
        let coordinator = coordinator(feed, CoordinatorConfig::default());

        let (sink, mut rx) = ChannelSink::new("test");
        let id = coordinator.subscribe(["LAX", "JFK"], Arc::new(sink)).unwrap();
        coordinator.update_subscription(id, ["SEA"]).unwrap();

        let summary = coordinator.tick().unwrap();
        assert_eq!(summary.queued, 1);
        assert_eq!(next(&mut rx).await.airport_code, "SEA");
    }

    #[tokio::test]
    async fn test_fixed_mode_ignores_replace() {
        let feed = StaticFeed::repeating();
        feed.push_batch(vec![]);
        let config = CoordinatorConfig::default().with_mode(SubscriptionMode::Fixed);
        let coordinator = coordinator(feed, config);

        let (sink, mut rx) = ChannelSink::new("test");
        let id = coordinator.subscribe(["LAX"], Arc::new(sink)).unwrap();
        let kept = coordinator.update_subscription(id, ["SEA"]).unwrap();
        assert!(kept.contains("LAX"));

        coordinator.tick().unwrap();
        assert_eq!(next(&mut rx).await.airport_code, "LAX");
    }

    #[tokio::test]
    async fn test_unknown_codes_never_produce_updates() {
        let feed = StaticFeed::new();
        feed.push_batch(vec![]);
        let coordinator = coordinator(feed, CoordinatorConfig::default());

        let (sink, _rx) = ChannelSink::new("test");
        coordinator.subscribe(["ZZZ"], Arc::new(sink)).unwrap();

        let summary = coordinator.tick().unwrap();
        assert_eq!(summary.queued, 0);
        assert_eq!(summary.dropped, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_updates() {
        let feed = StaticFeed::repeating();
        feed.push_batch(vec![]);
        let coordinator = coordinator(feed, CoordinatorConfig::default());

        let (sink, mut rx) = ChannelSink::new("test");
        let id = coordinator.subscribe(["LAX"], Arc::new(sink)).unwrap();
        coordinator.unsubscribe(id).unwrap();

        assert_eq!(coordinator.subscriber_count(), 0);
        assert!(coordinator.subscription(id).is_none());
        assert!(matches!(
            coordinator.unsubscribe(id),
            Err(CoordinatorError::UnknownSubscriber(_))
        ));
        assert!(matches!(
            coordinator.update_subscription(id, ["SEA"]),
            Err(CoordinatorError::UnknownSubscriber(_))
        ));

        assert_eq!(coordinator.tick().unwrap().queued, 0);
        // Worker exited and dropped the sink
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_subscriber_is_evicted_without_affecting_others() {
        let feed = StaticFeed::repeating();
        feed.push_batch(vec![]);
        let coordinator = coordinator(feed, CoordinatorConfig::default());

        let broken = FnSink::new(|_: &AirportLoad| Err(DeliveryError::Closed));
        let bad = coordinator.subscribe(["LAX"], Arc::new(broken)).unwrap();
        let (sink, mut rx) = ChannelSink::new("healthy");
        let good = coordinator.subscribe(["LAX"], Arc::new(sink)).unwrap();

        for _ in 0..3 {
            coordinator.tick().unwrap();
            assert_eq!(next(&mut rx).await.airport_code, "LAX");
        }

        // Let the failing worker notice its third failure
        while coordinator
            .subscriber_stats(bad)
            .is_some_and(|stats| stats.failed < 3)
        {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;

        let mut evicted = 0;
        for _ in 0..100 {
            evicted += coordinator.tick().unwrap().evicted;
            next(&mut rx).await;
            if evicted > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(evicted, 1);
        assert!(coordinator.subscription(bad).is_none());
        assert!(coordinator.subscription(good).is_some());
        assert_eq!(coordinator.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_feed_error_is_reported_and_recoverable() {
        let feed = StaticFeed::new();
        feed.push_outage("down");
        feed.push_batch(vec![near_lax("UAL1")]);
        let coordinator = coordinator(feed, CoordinatorConfig::default());

        assert!(matches!(coordinator.tick(), Err(CoordinatorError::Scan(_))));
        assert_eq!(coordinator.tick().unwrap().arrivals, 1);
    }

    #[tokio::test]
    async fn test_state_machine() {
        let coordinator = coordinator(StaticFeed::repeating(), CoordinatorConfig::default());
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        let shutdown = CancellationToken::new();
        let task = coordinator.start(shutdown.clone()).unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Running);
        assert!(matches!(
            coordinator.start(shutdown.clone()),
            Err(CoordinatorError::AlreadyStarted(CoordinatorState::Running))
        ));
        assert!(matches!(
            coordinator.tick(),
            Err(CoordinatorError::AlreadyStarted(_))
        ));

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
        assert!(matches!(
            coordinator.start(CancellationToken::new()),
            Err(CoordinatorError::AlreadyStarted(CoordinatorState::Stopped))
        ));

        let (sink, _rx) = ChannelSink::new("late");
        assert!(matches!(
            coordinator.subscribe(["LAX"], Arc::new(sink)),
            Err(CoordinatorError::Stopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_ticks_on_interval_and_survives_feed_errors() {
        let feed = StaticFeed::new();
        feed.push_outage("first fetch fails");
        feed.push_batch(vec![near_lax("UAL1")]);
        feed.push_batch(vec![]);
        let config = CoordinatorConfig::default().with_interval(Duration::from_secs(10));
        let coordinator = coordinator(feed, config);

        let (sink, mut rx) = ChannelSink::new("test");
        coordinator.subscribe(["LAX"], Arc::new(sink)).unwrap();

        let shutdown = CancellationToken::new();
        let task = coordinator.start(shutdown.clone()).unwrap();

        let arrival = rx.recv().await.unwrap();
        assert_eq!(arrival.arriving_flights, vec!["UAL1"]);

        let departure = rx.recv().await.unwrap();
        assert_eq!(departure.departing_flights, vec!["UAL1"]);

        shutdown.cancel();
        task.await.unwrap();
        // Workers are stopped along with the loop
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_without_start() {
        let coordinator = coordinator(StaticFeed::new(), CoordinatorConfig::default());
        let (sink, mut rx) = ChannelSink::new("test");
        coordinator.subscribe(["LAX"], Arc::new(sink)).unwrap();

        coordinator.shutdown();
        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
        assert_eq!(coordinator.subscriber_count(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscribe_racing_shutdown_leaves_nothing_behind() {
        let coordinator = coordinator(StaticFeed::new(), CoordinatorConfig::default());

        let subscribers: Vec<_> = (0..4)
            .map(|n| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    let mut ids = Vec::new();
                    loop {
                        let (sink, _rx) = ChannelSink::new(format!("racer-{n}"));
                        match coordinator.subscribe(["LAX"], Arc::new(sink)) {
                            Ok(id) => ids.push(id),
                            Err(CoordinatorError::Stopped) => break,
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                        tokio::task::yield_now().await;
                    }
                    ids
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.shutdown();

        for task in subscribers {
            for id in task.await.unwrap() {
                assert!(coordinator.subscription(id).is_none());
                assert!(coordinator.subscriber_stats(id).is_none());
            }
        }
        assert_eq!(coordinator.subscriber_count(), 0);
        assert!(coordinator.subscribe(["LAX"], Arc::new(ChannelSink::new("late").0)).is_err());
    }
}
