//! Broadcast policy knobs and coordinator configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::delivery::DeliveryConfig;

/// Default time between scans.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// A policy name that does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized policy '{0}'")]
pub struct UnknownPolicy(pub String);

/// How a subscriber's interest may change after subscribing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Each new request replaces the watched set; re-read every tick.
    #[default]
    Replaceable,
    /// The set given at subscribe time holds for the subscriber's lifetime.
    Fixed,
}

impl fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replaceable => "replaceable",
            Self::Fixed => "fixed",
        })
    }
}

impl FromStr for SubscriptionMode {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replaceable" => Ok(Self::Replaceable),
            "fixed" => Ok(Self::Fixed),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// Which watched airports get an update on a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PushPolicy {
    /// Every watched airport, even with nothing to report.
    #[default]
    EveryTick,
    /// Only airports with at least one arrival or departure.
    ActiveOnly,
}

impl fmt::Display for PushPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EveryTick => "every_tick",
            Self::ActiveOnly => "active_only",
        })
    }
}

impl FromStr for PushPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "every_tick" => Ok(Self::EveryTick),
            "active_only" => Ok(Self::ActiveOnly),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// Configuration for [`BroadcastCoordinator`](super::BroadcastCoordinator).
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Time between scans.
    pub interval: Duration,

    pub mode: SubscriptionMode,

    pub push_policy: PushPolicy,

    /// Per-subscriber queue and transport settings.
    pub delivery: DeliveryConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            mode: SubscriptionMode::default(),
            push_policy: PushPolicy::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_mode(mut self, mode: SubscriptionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_push_policy(mut self, policy: PushPolicy) -> Self {
        self.push_policy = policy;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.delivery = delivery;
        self
    }
}
