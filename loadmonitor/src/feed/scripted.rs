//! Scripted in-memory feed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{FeedError, Observation, PositionFeed};

#[derive(Debug, Clone)]
enum Step {
    Batch(Vec<Observation>),
    Outage(String),
}

/// Feed that replays queued batches, one per fetch.
///
/// Clones share the same queue, so a test can keep a handle and push more
/// batches while a coordinator owns the feed. Once the queue is drained the
/// feed either repeats the last batch (see [`StaticFeed::repeating`]) or
/// reports [`FeedError::Exhausted`].
///
/// ```
/// use loadmonitor::feed::{Observation, PositionFeed, StaticFeed};
///
/// let mut feed = StaticFeed::new();
/// feed.push_batch(vec![Observation::new("UAL1", 33.95, -118.40, 50.0, 5.0)]);
///
/// assert_eq!(feed.fetch().unwrap().len(), 1);
/// assert!(feed.fetch().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    inner: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<Step>,
    last: Option<Vec<Observation>>,
    repeat_last: bool,
}

impl StaticFeed {
    /// Create an empty feed that reports exhaustion when drained.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a feed that keeps returning its last batch once drained.
    pub fn repeating() -> Self {
        let feed = Self::default();
        feed.state().repeat_last = true;
        feed
    }

    /// Queue a batch for a future fetch.
    pub fn push_batch(&self, batch: Vec<Observation>) {
        self.state().steps.push_back(Step::Batch(batch));
    }

    /// Queue a simulated outage for a future fetch.
    pub fn push_outage(&self, reason: impl Into<String>) {
        self.state().steps.push_back(Step::Outage(reason.into()));
    }

    /// Number of queued steps not yet fetched.
    pub fn pending(&self) -> usize {
        self.state().steps.len()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        // A panic while holding the lock cannot leave the queue half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PositionFeed for StaticFeed {
    fn fetch(&mut self) -> Result<Vec<Observation>, FeedError> {
        let mut state = self.state();
        match state.steps.pop_front() {
            Some(Step::Batch(batch)) => {
                state.last = Some(batch.clone());
                Ok(batch)
            }
            Some(Step::Outage(reason)) => Err(FeedError::Unavailable(reason)),
            None => match (&state.last, state.repeat_last) {
                (Some(last), true) => Ok(last.clone()),
                _ => Err(FeedError::Exhausted),
            },
        }
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(id: &str) -> Observation {
        Observation::new(id, 0.0, 0.0, 10.0, 1.0)
    }

    #[test]
    fn test_batches_in_order() {
        let mut feed = StaticFeed::new();
        feed.push_batch(vec![obs("A")]);
        feed.push_batch(vec![obs("B"), obs("C")]);

        assert_eq!(feed.fetch().unwrap().len(), 1);
        assert_eq!(feed.fetch().unwrap().len(), 2);
        assert!(matches!(feed.fetch(), Err(FeedError::Exhausted)));
    }

    #[test]
    fn test_outage_step() {
        let mut feed = StaticFeed::new();
        feed.push_outage("upstream down");
        feed.push_batch(vec![obs("A")]);

        assert!(matches!(feed.fetch(), Err(FeedError::Unavailable(_))));
        assert_eq!(feed.fetch().unwrap().len(), 1);
    }

    #[test]
    fn test_repeating_feed_reuses_last_batch() {
        let mut feed = StaticFeed::repeating();
        feed.push_batch(vec![obs("A")]);

        assert_eq!(feed.fetch().unwrap()[0].identifier, "A");
        assert_eq!(feed.fetch().unwrap()[0].identifier, "A");
    }

    #[test]
    fn test_clones_share_queue() {
        let feed = StaticFeed::new();
        let mut owned = feed.clone();

        feed.push_batch(vec![obs("A")]);
        assert_eq!(feed.pending(), 1);
        assert_eq!(owned.fetch().unwrap().len(), 1);
        assert_eq!(feed.pending(), 0);
    }
}
