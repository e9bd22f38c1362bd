//! Per-subscriber delivery.
//!
//! The broadcast tick never talks to a transport directly. Each subscriber
//! gets a bounded outbound queue and a dedicated [`DeliveryWorker`] task that
//! drains it and performs the actual write through a [`Deliver`]
//! implementation:
//!
//! ```text
//! tick ──try_send──► [queue] ──► DeliveryWorker ──timeout(deliver)──► transport
//!                     (bounded)    (one per subscriber)
//! ```
//!
//! A slow or dead subscriber only fills its own queue; the tick drops the
//! overflow for that subscriber and moves on.
//!
//! # Variants
//!
//! - [`ChannelSink`] - fire-and-forget hand-off to an in-process receiver
//! - [`FnSink`] - wraps a synchronous push callback
//! - [`WebSocketSink`] - persistent per-connection stream to a remote client

mod sink;
mod worker;

pub use sink::{ChannelSink, FnSink, WebSocketSink};
pub use worker::{
    DeliveryConfig, DeliveryStats, DeliveryWorker, StatsSnapshot, SubscriberHandle, WorkerExit,
    DEFAULT_DELIVERY_TIMEOUT, DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_QUEUE_CAPACITY,
};

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::AirportLoad;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur while pushing an update to a subscriber.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The receiving side has gone away.
    #[error("Subscriber channel closed")]
    Closed,

    /// The transport write did not finish in time.
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The update could not be encoded.
    #[error("Failed to encode update: {0}")]
    Encode(#[from] serde_json::Error),

    /// Transport-specific failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Capability to push one update to one subscriber.
///
/// Uses `Pin<Box<dyn Future>>` so workers can hold `Arc<dyn Deliver>`.
pub trait Deliver: Send + Sync {
    /// Push one update. Called only from the subscriber's own worker.
    fn deliver(&self, update: AirportLoad) -> BoxFuture<'_, Result<(), DeliveryError>>;

    /// Short description for logs (peer address, channel name, ...).
    fn describe(&self) -> String {
        "subscriber".to_string()
    }
}
