//! # Cluster: the per-process supervisor façade.
//!
//! One [`Cluster`] value exists per process and owns the role-specific
//! runtime. In the master it forks workers and routes every message; in a
//! worker it wraps the channel back to the master. Handles created by a
//! cluster stay wired to it, so dropping the cluster detaches them.
//!
//! ## Role surface
//!
//! | Op | Master | Worker |
//! |----|--------|--------|
//! | `fork` | forks a child, returns the handle | error |
//! | `on_online` | first birth of each ID | own bootstrap |
//! | `on_exit` | final exit of each ID | own clean/terminal exit |
//! | `emit`/`to`/`broadcast` | cluster-level fan-out | error |
//! | `workers` | online set from the registry | round trip via the master |
//! | `worker` | error | own handle, waits for bootstrap |
//! | `shutdown` | kill children, wait for grace | error |
//!
//! ```no_run
//! use std::sync::Arc;
//! use procvisor::{Cluster, Config, WorkerSpec};
//! use procvisor::testing::SimSpawner;
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spawner = Arc::new(SimSpawner::new());
//!     let cluster = Cluster::master(spawner.clone(), Config::default(), Vec::new());
//!
//!     cluster.on_online(|w| println!("online: {}", w.id()));
//!
//!     let cache = cluster.fork(WorkerSpec::keep_alive("cache")).await?;
//!     cache.on("hit", |w, data| println!("{} hit: {:?}", w.id(), data));
//!     cache.emit("warm", vec![json!("users")]);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::core::master::MasterCore;
use crate::core::worker::WorkerCore;
use crate::error::ClusterError;
use crate::events::ClusterEvent;
use crate::handle::{IntoReceivers, Worker, WorkerSpec};
use crate::role::Role;
use crate::subscribers::Subscribe;
use crate::wire::{MasterLink, Spawner, ToWorker};

enum Inner {
    Master(Arc<MasterCore>),
    Worker(Arc<WorkerCore>),
}

/// Per-process supervisor and event-bus endpoint.
pub struct Cluster {
    inner: Inner,
}

impl Cluster {
    /// Creates the master-side runtime.
    ///
    /// `spawner` forks children on request; `subscribers` observe the
    /// ungated lifecycle event stream.
    pub fn master(
        spawner: Arc<dyn Spawner>,
        cfg: Config,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Cluster {
        Cluster {
            inner: Inner::Master(MasterCore::new(spawner, cfg, subscribers)),
        }
    }

    /// Creates the worker-side runtime over a link to the master.
    ///
    /// `inbound` carries envelopes from the master; the runtime consumes
    /// it until the link closes.
    pub fn worker_side(
        link: Arc<dyn MasterLink>,
        inbound: mpsc::UnboundedReceiver<ToWorker>,
        cfg: Config,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Cluster {
        Cluster {
            inner: Inner::Worker(WorkerCore::new(link, inbound, cfg, subscribers)),
        }
    }

    /// Role this cluster runs as.
    pub fn role(&self) -> Role {
        match &self.inner {
            Inner::Master(_) => Role::Master,
            Inner::Worker(_) => Role::Worker,
        }
    }

    /// True in the supervisor process.
    pub fn is_master(&self) -> bool {
        self.role().is_master()
    }

    /// True in a managed child process.
    pub fn is_worker(&self) -> bool {
        self.role().is_worker()
    }

    /// Forks a worker and returns its handle in `connecting` state.
    pub async fn fork(&self, spec: WorkerSpec) -> Result<Arc<Worker>, ClusterError> {
        match &self.inner {
            Inner::Master(core) => core.fork(spec).await,
            Inner::Worker(_) => Err(ClusterError::MasterOnly { op: "fork" }),
        }
    }

    /// Looks up a live handle by ID (master registry; `None` in workers).
    pub fn get(&self, id: &str) -> Option<Arc<Worker>> {
        match &self.inner {
            Inner::Master(core) => core.get(id),
            Inner::Worker(_) => None,
        }
    }

    /// Registers a listener for the first birth of each worker ID.
    ///
    /// Master: fires once per fork; keep-alive respawns stay silent.
    /// Worker: fires when this process's own bootstrap arrives.
    pub fn on_online<F>(&self, f: F)
    where
        F: Fn(&Worker) + Send + Sync + 'static,
    {
        let listener = Arc::new(f);
        match &self.inner {
            Inner::Master(core) => core.add_online_listener(listener),
            Inner::Worker(core) => core.add_online_listener(listener),
        }
    }

    /// Registers a listener for the final exit of each worker ID.
    ///
    /// Keep-alive respawns and reboots never fire it.
    pub fn on_exit<F>(&self, f: F)
    where
        F: Fn(&Worker, Option<i32>, Option<&str>) + Send + Sync + 'static,
    {
        let listener = Arc::new(f);
        match &self.inner {
            Inner::Master(core) => core.add_exit_listener(listener),
            Inner::Worker(core) => core.add_exit_listener(listener),
        }
    }

    /// Stores a one-shot receiver set for the next cluster-level
    /// [`emit`](Cluster::emit). Master-only.
    pub fn to<R: IntoReceivers>(&self, receivers: R) -> Result<&Self, ClusterError> {
        match &self.inner {
            Inner::Master(core) => {
                core.class_to(receivers.into_receivers());
                Ok(self)
            }
            Inner::Worker(_) => Err(ClusterError::MasterOnly { op: "to" }),
        }
    }

    /// Emits a user event to the stored receiver set, consuming it.
    /// Master-only. Returns `false` for reserved names.
    pub fn emit(&self, event: &str, data: Vec<Value>) -> Result<bool, ClusterError> {
        match &self.inner {
            Inner::Master(core) => Ok(core.class_emit(event, data)),
            Inner::Worker(_) => Err(ClusterError::MasterOnly { op: "emit" }),
        }
    }

    /// Emits a user event to every worker. Master-only. Returns `false`
    /// for reserved names.
    pub fn broadcast(&self, event: &str, data: Vec<Value>) -> Result<bool, ClusterError> {
        match &self.inner {
            Inner::Master(core) => Ok(core.class_broadcast(event, data)),
            Inner::Worker(_) => Err(ClusterError::MasterOnly { op: "broadcast" }),
        }
    }

    /// Resolves the online worker set.
    ///
    /// Master: handles whose state is `online`. Worker: a control-plane
    /// round trip; this process's own ID maps to its own handle.
    pub async fn workers(&self) -> Result<Vec<Arc<Worker>>, ClusterError> {
        match &self.inner {
            Inner::Master(core) => Ok(core.online()),
            Inner::Worker(core) => core.query_workers().await,
        }
    }

    /// Resolves this process's own handle, waiting for bootstrap if
    /// needed. Worker-only.
    pub async fn worker(&self) -> Result<Arc<Worker>, ClusterError> {
        match &self.inner {
            Inner::Master(_) => Err(ClusterError::WorkerOnly { op: "worker" }),
            Inner::Worker(core) => core.self_worker().await,
        }
    }

    /// Subscribes to the ungated lifecycle event stream.
    pub fn events(&self) -> broadcast::Receiver<ClusterEvent> {
        match &self.inner {
            Inner::Master(core) => core.bus().subscribe(),
            Inner::Worker(core) => core.bus().subscribe(),
        }
    }

    /// Current cluster-wide listener budget: the configured baseline plus
    /// the sum of per-handle limits.
    pub fn listener_budget(&self) -> usize {
        match &self.inner {
            Inner::Master(core) => core.listener_budget(),
            Inner::Worker(core) => core.listener_budget(),
        }
    }

    /// Kills every child and waits up to the configured grace period for
    /// them to exit. Master-only; respawn is disabled afterwards.
    pub async fn shutdown(&self) -> Result<(), ClusterError> {
        match &self.inner {
            Inner::Master(core) => core.shutdown().await,
            Inner::Worker(_) => Err(ClusterError::MasterOnly { op: "shutdown" }),
        }
    }
}
