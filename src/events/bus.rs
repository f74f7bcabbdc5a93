//! # Event bus for broadcasting cluster lifecycle events.
//!
//! [`Bus`] is a wrapper around [`tokio::sync::broadcast`] that lets the
//! lifecycle controller publish [`ClusterEvent`]s to any number of
//! subscribers.
//!
//! ## Key characteristics:
//! - **Broadcast semantics**: all active subscribers receive a clone of each event
//! - **Non-persistent**: events are lost if there are no active subscribers
//! - **Bounded capacity**: old events are dropped when the channel is full
//!
//! [`Bus::publish`] is non-blocking; [`Bus::subscribe`] creates a receiver
//! for all future events. The subscriber fan-out loop and the `LogWriter`
//! consume this stream; user code can tap it through
//! [`Cluster::events`](crate::Cluster::events).

use tokio::sync::broadcast;

use super::event::ClusterEvent;

/// Broadcast channel for cluster lifecycle events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<ClusterEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// When capacity is exceeded, the oldest unsent events are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no active subscribers, the event is dropped silently.
    /// The runtime operates the same with or without observers.
    pub fn publish(&self, ev: ClusterEvent) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.tx.subscribe()
    }
}
