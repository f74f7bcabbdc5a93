//! Runtime core: role-specific supervision and routing.
//!
//! Every handle operation has a master branch and a worker branch. The
//! [`Core`] trait is the single shared interface; [`MasterCore`] and
//! [`WorkerCore`] are its two implementations, and each [`Worker`] handle
//! holds a weak reference to the core that created it.
//!
//! ## Files & responsibilities
//! - **master.rs**: owns the registry, the spawner, and one signal pump
//!   per child; classifies exits, respawns keep-alive workers, routes
//!   inbound envelopes, answers online-set queries, drives shutdown.
//! - **worker.rs**: consumes the inbound envelope stream, materializes the
//!   self handle on bootstrap, dispatches user events to the process-wide
//!   bus, wraps outbound operations into control envelopes, and terminates
//!   the process for `exit`/`reboot`.
//! - **registry.rs**: ID ↔ handle ↔ channel ↔ PID maps (master only).
//! - **lifecycle.rs**: exit classification and the reboot code.
//!
//! ## Wiring (master)
//! ```text
//! Cluster::fork(spec)
//!   ├─ registry.insert(handle{connecting})
//!   ├─ spawner.spawn(id) ─► SpawnedChild{pid, channel, signals}
//!   └─ spawn pump(signals):
//!        Online        → state=online, send Bootstrap,
//!                        fire on_online unless reborn
//!        Message(env)  → route: User / Transmit / Broadcast / GetWorkers
//!        Error(err)    → handle.error listeners
//!        Exit(code,sig)→ classify:
//!                          Reboot | Accidental → respawn (silent)
//!                          Terminal → close, fire exit, drop from maps
//! ```
//!
//! ## Wiring (worker)
//! ```text
//! inbound ToWorker stream:
//!   Bootstrap{id, keep_alive} → create self handle, release waiters,
//!                               fire on_online
//!   User{event, data}         → fire every subscribed handle's listeners
//!   Workers{workers}          → resolve one pending online-set query
//!   Reboot                    → process::exit(826)
//! ```

pub(crate) mod lifecycle;
pub(crate) mod master;
pub(crate) mod registry;
pub(crate) mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClusterError;
use crate::handle::{Worker, WorkerId};

pub use lifecycle::REBOOT_EXIT_CODE;

/// Cluster-level `online` listener.
pub(crate) type OnlineListener = Arc<dyn Fn(&Worker) + Send + Sync>;
/// Cluster-level `exit` listener.
pub(crate) type ExitListener = Arc<dyn Fn(&Worker, Option<i32>, Option<&str>) + Send + Sync>;

/// Role-specific behavior behind the handle and cluster façades.
#[async_trait]
pub(crate) trait Core: Send + Sync {
    /// Delivers a user event from a handle, honoring a consumed receiver
    /// set (`None` means self-addressed).
    fn emit_from(&self, from: &Worker, receivers: Option<Vec<WorkerId>>, event: &str, data: &[Value]);

    /// Delivers a user event to every worker, sender included.
    fn broadcast_from(&self, from: &Worker, event: &str, data: &[Value]);

    /// Terminates the worker behind the handle.
    fn exit_worker(&self, from: &Worker);

    /// Requests a controlled respawn of the worker behind the handle.
    fn reboot_worker(&self, from: &Worker);

    /// Called when a handle registers a listener; the worker side uses
    /// this to join the handle to the process-wide bus.
    fn note_listener(&self, handle: &Arc<Worker>);

    /// Called after a handle's listener limit changed.
    fn listener_limits_changed(&self);

    /// Resolves the online worker set for the given handle.
    async fn workers_for(&self, from: &Arc<Worker>) -> Result<Vec<Arc<Worker>>, ClusterError>;
}
