//! Subscriber interest registry.
//!
//! Maps each subscriber to the set of airport codes it currently watches.
//! Writers (transport handlers) and the reader (the broadcast tick) run
//! concurrently. Every update swaps in a whole new `Arc<BTreeSet>`, so a
//! reader holding a snapshot never sees a half-applied change.
//!
//! # Example
//!
//! ```
//! use loadmonitor::subscription::{SubscriberId, SubscriptionRegistry};
//!
//! let registry = SubscriptionRegistry::new();
//! let id = SubscriberId::new(1);
//!
//! registry.set_subscription(id, ["lax", "SFO"]);
//! registry.set_subscription(id, ["JFK"]); // replaces, does not merge
//!
//! assert!(registry.interested_subscribers("LAX").is_empty());
//! assert!(registry.interested_subscribers("JFK").contains(&id));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Opaque subscriber identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Allocates unique subscriber ids.
#[derive(Debug, Default)]
pub struct SubscriberIdAllocator {
    next: AtomicU64,
}

impl SubscriberIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> SubscriberId {
        SubscriberId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Immutable snapshot of one subscriber's watched airports.
pub type CodeSet = Arc<BTreeSet<String>>;

/// Normalize airport codes: trimmed, upper case, blanks dropped.
pub fn normalize_codes<I, S>(codes: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    codes
        .into_iter()
        .map(|code| code.as_ref().trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect()
}

/// Concurrent subscriber → airport codes map with last-write-wins updates.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: DashMap<SubscriberId, CodeSet>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the subscriber's watched airports.
    ///
    /// Returns the normalized set now in effect.
    pub fn set_subscription<I, S>(&self, id: SubscriberId, codes: I) -> CodeSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes: CodeSet = Arc::new(normalize_codes(codes));
        self.subscriptions.insert(id, Arc::clone(&codes));
        codes
    }

    /// Drop all interest for a subscriber. Returns its last set, if any.
    pub fn remove(&self, id: SubscriberId) -> Option<CodeSet> {
        self.subscriptions.remove(&id).map(|(_, codes)| codes)
    }

    /// Current snapshot of a subscriber's watched airports.
    pub fn subscription(&self, id: SubscriberId) -> Option<CodeSet> {
        self.subscriptions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Subscribers currently watching `code`.
    pub fn interested_subscribers(&self, code: &str) -> BTreeSet<SubscriberId> {
        self.subscriptions
            .iter()
            .filter(|entry| entry.value().contains(code))
            .map(|entry| *entry.key())
            .collect()
    }

    /// Snapshot of every subscription.
    pub fn snapshot(&self) -> Vec<(SubscriberId, CodeSet)> {
        self.subscriptions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
