//! # Lifecycle event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging custom observers
//! into the runtime: metrics exporters, audit logs, restart alerting.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Bounded queue** (configurable capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and logged)
//!
//! ## Rules
//! - Slow subscribers only affect themselves (queue overflow drops the
//!   event for that subscriber alone)
//! - Panics do not crash the runtime or other subscribers
//! - Subscribers never block publishers

use async_trait::async_trait;

use crate::events::ClusterEvent;

/// Observer of cluster lifecycle events.
///
/// Receives the ungated event stream: respawn-suppressed `online`s and
/// keep-alive crashes are visible here even though the user listener
/// surface hides them.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task in FIFO order. Handle errors
    /// internally; a panic is caught and reported, not propagated.
    async fn on_event(&self, event: &ClusterEvent);

    /// Returns the subscriber name for logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
