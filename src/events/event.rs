//! # Lifecycle events emitted by the cluster runtime.
//!
//! The [`ClusterEventKind`] enum classifies transitions of the worker
//! pool: forks, connections, exits, respawns, and shutdown milestones.
//! The [`ClusterEvent`] struct carries the affected worker ID, the child
//! PID, and exit metadata.
//!
//! These events describe what the runtime *did* and are delivered to
//! [`Subscribe`](crate::Subscribe) implementations ungated; the
//! user-facing `online`/`exit` listener surface applies its own
//! suppression rules (respawned children do not re-announce, keep-alive
//! crashes are silent).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that
//! increases monotonically, so subscribers can order events even when
//! delivered through independent queues.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::handle::WorkerId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of cluster runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterEventKind {
    // === Worker lifecycle ===
    /// A child process was forked for a worker ID.
    Forked,
    /// A child reported ready and was sent its bootstrap message.
    Online,
    /// A child process terminated (any classification).
    Exited,
    /// A replacement child is being forked under the same ID.
    Respawned,
    /// The master asked a child to terminate with the reboot code.
    RebootSent,
    /// A low-level channel error was reported for a child.
    Errored,

    // === Shutdown ===
    /// Cluster shutdown was requested.
    ShutdownRequested,
    /// All children exited within the configured grace period.
    AllStoppedWithin,
    /// Grace period exceeded; some children did not exit in time.
    GraceExceeded,

    // === Subscriber plumbing ===
    /// A subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
    /// A subscriber panicked during event processing.
    SubscriberPanicked,
}

/// Cluster runtime event with optional metadata.
#[derive(Debug, Clone)]
pub struct ClusterEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: ClusterEventKind,
    /// Affected worker ID, if applicable.
    pub id: Option<WorkerId>,
    /// OS-level PID of the affected child, if applicable.
    pub pid: Option<u32>,
    /// Child exit code, for exit events.
    pub code: Option<i32>,
    /// Terminating signal name, for exit events.
    pub signal: Option<String>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// True when the event concerns a respawned child.
    pub reborn: bool,
}

impl ClusterEvent {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn now(kind: ClusterEventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            id: None,
            pid: None,
            code: None,
            signal: None,
            error: None,
            reborn: false,
        }
    }

    /// Attaches the affected worker ID.
    pub fn with_id(mut self, id: impl Into<WorkerId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attaches the child PID.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches exit metadata.
    pub fn with_exit(mut self, code: Option<i32>, signal: Option<&str>) -> Self {
        self.code = code;
        self.signal = signal.map(str::to_string);
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Marks the event as concerning a respawned child.
    pub fn with_reborn(mut self, reborn: bool) -> Self {
        self.reborn = reborn;
        self
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        ClusterEvent::now(ClusterEventKind::SubscriberOverflow)
            .with_error(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        ClusterEvent::now(ClusterEventKind::SubscriberPanicked)
            .with_error(format!("subscriber={subscriber} info={info}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = ClusterEvent::now(ClusterEventKind::Forked);
        let b = ClusterEvent::now(ClusterEventKind::Online);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_attach_metadata() {
        let ev = ClusterEvent::now(ClusterEventKind::Exited)
            .with_id("cache")
            .with_pid(42)
            .with_exit(Some(1), Some("SIGKILL"))
            .with_reborn(true);

        assert_eq!(ev.id.as_ref().map(|i| i.as_str()), Some("cache"));
        assert_eq!(ev.pid, Some(42));
        assert_eq!(ev.code, Some(1));
        assert_eq!(ev.signal.as_deref(), Some("SIGKILL"));
        assert!(ev.reborn);
    }
}
