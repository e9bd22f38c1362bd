//! Periodic broadcast of airport load to subscribers.
//!
//! ```text
//!            ┌──────────────── BroadcastCoordinator ────────────────┐
//!  interval ─┤ tick: FlightTracker::scan ─► ScanReport ─► fan-out   │
//!            │                                         │            │
//!            │  SubscriptionRegistry (who watches what)│            │
//!            └─────────────────────────────────────────┼────────────┘
//!                                  try_send per subscriber
//!                                                      ▼
//!                                      SubscriberHandle ─► DeliveryWorker
//! ```
//!
//! The tick task is the only code that touches the tracker while the loop
//! runs. Subscribe, replace and unsubscribe calls go straight to the
//! registry and take effect on the next tick.

mod coordinator;
mod policy;

pub use coordinator::{BroadcastCoordinator, CoordinatorError, CoordinatorState, TickSummary};
pub use policy::{
    CoordinatorConfig, PushPolicy, SubscriptionMode, UnknownPolicy, DEFAULT_TICK_INTERVAL,
};
