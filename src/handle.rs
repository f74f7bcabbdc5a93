//! # Worker handle: the per-ID event-emitter façade.
//!
//! A [`Worker`] is the unit of event subscription and emission. One handle
//! exists per worker ID per process; in the master it is created by
//! [`Cluster::fork`](crate::Cluster::fork), in the worker it materializes
//! when the bootstrap envelope arrives. The handle hides which role the
//! calling process has: `emit` from the master writes to the child's
//! channel, `emit` from a worker routes through the master hub.
//!
//! ## Addressing modes
//! ```text
//! w.emit("e", data)              self: the worker's own channel (master)
//!                                      or the master-side handle (worker)
//! w.to(["a", "b"]).emit(...)     targeted set, consumed by this emit
//! w.broadcast("e", data)         every worker, sender included
//! ```
//!
//! ## Rules
//! - The receivers set stored by [`Worker::to`] is one-shot: the next
//!   `emit` consumes it, and a reserved-name rejection clears it too.
//! - Reserved names (`online`, `error`, `exit`, and any `----…----`
//!   control spelling) are masked: `emit`/`broadcast` return `false` and
//!   produce no channel traffic. The lifecycle controller raises `error`
//!   and `exit` on the handle internally.
//! - The listener table lives as long as the handle. Respawning the child
//!   under a keep-alive ID never touches registered listeners.

use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Core;
use crate::error::ClusterError;
use crate::events::{Emitter, EventListener, EventName};

/// Stable, user-chosen worker identifier.
///
/// Opaque and non-empty; unique among live workers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty string, which is never a valid ID.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        WorkerId(s.to_string())
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        WorkerId(s)
    }
}

impl Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Child forked, not yet ready.
    Connecting,
    /// Child connected and addressable.
    Online,
    /// Child gone; the handle is detached from any process.
    Closed,
}

/// # Specification for forking a worker.
///
/// Bundles the worker ID with its keep-alive flag.
///
/// ## Example
/// ```
/// use procvisor::WorkerSpec;
///
/// let plain = WorkerSpec::new("cache");
/// assert!(!plain.is_keep_alive());
///
/// let durable = WorkerSpec::keep_alive("queue");
/// assert!(durable.is_keep_alive());
/// ```
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    id: WorkerId,
    keep_alive: bool,
}

impl WorkerSpec {
    /// Creates a spec for a worker whose exits are always terminal.
    pub fn new(id: impl Into<WorkerId>) -> Self {
        Self {
            id: id.into(),
            keep_alive: false,
        }
    }

    /// Creates a spec for a worker that respawns after accidental exits.
    pub fn keep_alive(id: impl Into<WorkerId>) -> Self {
        Self {
            id: id.into(),
            keep_alive: true,
        }
    }

    /// Returns the worker ID.
    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Returns the keep-alive flag.
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }
}

/// Conversion into a receiver set for [`Worker::to`].
///
/// Accepts single IDs, handles, and homogeneous collections of either;
/// nested collections flatten.
pub trait IntoReceivers {
    /// Flattens `self` into a list of worker IDs.
    fn into_receivers(self) -> Vec<WorkerId>;
}

impl IntoReceivers for &str {
    fn into_receivers(self) -> Vec<WorkerId> {
        vec![self.into()]
    }
}

impl IntoReceivers for String {
    fn into_receivers(self) -> Vec<WorkerId> {
        vec![self.into()]
    }
}

impl IntoReceivers for WorkerId {
    fn into_receivers(self) -> Vec<WorkerId> {
        vec![self]
    }
}

impl IntoReceivers for &WorkerId {
    fn into_receivers(self) -> Vec<WorkerId> {
        vec![self.clone()]
    }
}

impl IntoReceivers for &Worker {
    fn into_receivers(self) -> Vec<WorkerId> {
        vec![self.id().clone()]
    }
}

impl IntoReceivers for &Arc<Worker> {
    fn into_receivers(self) -> Vec<WorkerId> {
        vec![self.id().clone()]
    }
}

impl<T: IntoReceivers> IntoReceivers for Vec<T> {
    fn into_receivers(self) -> Vec<WorkerId> {
        self.into_iter().flat_map(T::into_receivers).collect()
    }
}

impl<T: IntoReceivers, const N: usize> IntoReceivers for [T; N] {
    fn into_receivers(self) -> Vec<WorkerId> {
        self.into_iter().flat_map(T::into_receivers).collect()
    }
}

/// Per-ID worker handle.
///
/// Cheap to share as `Arc<Worker>`; all methods take `&self`.
pub struct Worker {
    id: WorkerId,
    keep_alive: bool,
    state: RwLock<WorkerState>,
    receivers: Mutex<Option<Vec<WorkerId>>>,
    emitter: Emitter,
    core: Weak<dyn Core>,
    me: Weak<Worker>,
}

impl Worker {
    pub(crate) fn create(
        id: WorkerId,
        keep_alive: bool,
        state: WorkerState,
        core: Weak<dyn Core>,
        max_listeners: usize,
    ) -> Arc<Worker> {
        Arc::new_cyclic(|me| Worker {
            id,
            keep_alive,
            state: RwLock::new(state),
            receivers: Mutex::new(None),
            emitter: Emitter::new(max_listeners),
            core,
            me: me.clone(),
        })
    }

    /// Returns the worker ID.
    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Returns the keep-alive flag.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.read().expect("worker state poisoned")
    }

    /// Registers `f` for every delivery of `event` on this handle.
    ///
    /// In the master, user events arriving from this worker's channel fire
    /// the listener; `error` and `exit` are raised by the lifecycle
    /// controller. In a worker, the listener joins the process-wide bus
    /// under `event`, so it observes deliveries from the master regardless
    /// of which handle they were addressed through.
    pub fn on<F>(&self, event: impl Into<String>, f: F)
    where
        F: Fn(&Worker, &[Value]) + Send + Sync + 'static,
    {
        self.subscribe(&event.into(), Arc::new(f), false);
    }

    /// Like [`Worker::on`], but the listener unregisters after one call.
    pub fn once<F>(&self, event: impl Into<String>, f: F)
    where
        F: Fn(&Worker, &[Value]) + Send + Sync + 'static,
    {
        self.subscribe(&event.into(), Arc::new(f), true);
    }

    /// Emits a user event.
    ///
    /// With a pending [`Worker::to`] set, delivers to exactly those
    /// workers; otherwise self-addressed (see the module docs). Returns
    /// `false` for reserved names, `true` otherwise, even when the target
    /// has no live channel (delivery is best-effort).
    pub fn emit(&self, event: &str, data: Vec<Value>) -> bool {
        let receivers = self.take_receivers();
        if EventName::is_reserved(event) {
            return false;
        }
        if let Some(core) = self.core.upgrade() {
            core.emit_from(self, receivers, event, &data);
        }
        true
    }

    /// Stores a one-shot receiver set for the next [`Worker::emit`].
    pub fn to<R: IntoReceivers>(&self, receivers: R) -> &Self {
        *self.receivers.lock().expect("receivers poisoned") = Some(receivers.into_receivers());
        self
    }

    /// Emits a user event to every worker, the current one included.
    ///
    /// From a worker this traverses the master, which fans out to all
    /// channels; the sender observes its own broadcast after the round
    /// trip. Returns `false` for reserved names.
    pub fn broadcast(&self, event: &str, data: Vec<Value>) -> bool {
        if EventName::is_reserved(event) {
            return false;
        }
        if let Some(core) = self.core.upgrade() {
            core.broadcast_from(self, event, &data);
        }
        true
    }

    /// Terminates the worker.
    ///
    /// Master: kills the child process. Worker: terminates the current
    /// process with exit code 0.
    pub fn exit(&self) {
        if let Some(core) = self.core.upgrade() {
            core.exit_worker(self);
        }
    }

    /// Requests a controlled respawn.
    ///
    /// Master: marks the handle closed and asks the child to terminate
    /// with the reboot code. Worker: terminates the current process with
    /// the reboot code. Either way a fresh child is forked under the same
    /// ID and no user-visible `exit` fires.
    pub fn reboot(&self) {
        if let Some(core) = self.core.upgrade() {
            core.reboot_worker(self);
        }
    }

    /// Resolves the online worker set.
    ///
    /// Master: the registry's online handles. Worker: a control-plane
    /// round trip; the returned list reuses this process's own handle for
    /// its own ID.
    pub async fn workers(&self) -> Result<Vec<Arc<Worker>>, ClusterError> {
        let core = self.core.upgrade().ok_or(ClusterError::Detached)?;
        let me = self.me.upgrade().ok_or(ClusterError::Detached)?;
        core.workers_for(&me).await
    }

    /// Adjusts this handle's listener limit and recomputes the
    /// cluster-wide budget.
    pub fn set_max_listeners(&self, n: usize) {
        self.emitter.set_max(n);
        if let Some(core) = self.core.upgrade() {
            core.listener_limits_changed();
        }
    }

    /// Number of listeners registered under `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.emitter.listener_count(event)
    }

    fn subscribe(&self, event: &str, listener: EventListener, once: bool) {
        self.emitter.on(event, listener, once);
        if let (Some(core), Some(me)) = (self.core.upgrade(), self.me.upgrade()) {
            core.note_listener(&me);
        }
    }

    fn take_receivers(&self) -> Option<Vec<WorkerId>> {
        self.receivers.lock().expect("receivers poisoned").take()
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        *self.state.write().expect("worker state poisoned") = state;
    }

    /// Fires this handle's own listeners. Internal delivery path; the
    /// reserved-name guard does not apply here.
    pub(crate) fn fire_local(&self, event: &str, data: &[Value]) -> usize {
        self.emitter.fire(self, event, data)
    }

    pub(crate) fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Handle wired to no runtime; unit-test support.
    #[cfg(test)]
    pub(crate) fn orphan(id: &str, state: WorkerState) -> Arc<Worker> {
        let core: Weak<dyn Core> = Weak::<crate::core::master::MasterCore>::new();
        Worker::create(id.into(), false, state, core, 10)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("keep_alive", &self.keep_alive)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orphan(id: &str) -> Arc<Worker> {
        Worker::orphan(id, WorkerState::Online)
    }

    #[test]
    fn receivers_flatten_mixed_sources() {
        let w = orphan("c");
        let ids = vec!["a".into_receivers(), (&w).into_receivers()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![WorkerId::from("a"), WorkerId::from("c")]);

        let nested = vec![vec!["x", "y"], vec!["z"]].into_receivers();
        assert_eq!(nested.len(), 3);
        assert_eq!(nested[2], "z");
    }

    #[test]
    fn reserved_emit_clears_pending_receivers() {
        let w = orphan("a");
        w.to(["b", "c"]);
        assert!(!w.emit("online", vec![]));
        // The stale set must not leak into the next emit.
        assert!(w.take_receivers().is_none());
    }

    #[test]
    fn emit_on_detached_handle_reports_success() {
        let w = orphan("a");
        assert!(w.emit("hello", vec![json!(1)]));
        assert!(!w.emit("exit", vec![]));
        assert!(!w.broadcast("----reboot----", vec![]));
    }

    #[test]
    fn state_roundtrip() {
        let w = orphan("a");
        assert_eq!(w.state(), WorkerState::Online);
        w.set_state(WorkerState::Closed);
        assert_eq!(w.state(), WorkerState::Closed);
    }
}
