//! # procvisor
//!
//! **Procvisor** is a process-pool supervisor and cross-process event bus
//! for a single host. A master process forks child workers, each under a
//! stable string ID, and both sides share one event-emitter API: the
//! master can emit to one, many, or all workers; a worker can emit to the
//! master or relay to peers through it. Workers flagged *keep-alive*
//! respawn transparently after accidental exits, preserving their
//! registered listeners.
//!
//! ## Features
//!
//! | Area             | Description                                                  | Key types / traits                     |
//! |------------------|--------------------------------------------------------------|----------------------------------------|
//! | **Supervision**  | Fork, keep-alive respawn, reboot, shutdown with grace.       | [`Cluster`], [`WorkerSpec`]            |
//! | **Event bus**    | Symmetric emit/targeted/broadcast across processes.          | [`Worker`], [`IntoReceivers`]          |
//! | **Transport**    | Seams the host wires to real process forking and channels.   | [`Spawner`], [`ChildChannel`], [`MasterLink`] |
//! | **Observability**| Lifecycle event stream with pluggable subscribers.           | [`ClusterEvent`], [`Subscribe`]        |
//! | **Errors**       | Typed errors for role misuse and runtime failures.           | [`ClusterError`]                       |
//! | **Configuration**| Centralized runtime settings.                                | [`Config`]                             |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ```no_run
//! use std::sync::Arc;
//! use procvisor::{Cluster, Config, WorkerSpec};
//! use procvisor::testing::SimSpawner;
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Tests and demos run over the in-memory transport; a real host
//!     // provides a Spawner that forks processes and pipes envelopes.
//!     let spawner = Arc::new(SimSpawner::new());
//!     let cluster = Cluster::master(spawner, Config::default(), Vec::new());
//!
//!     cluster.on_online(|w| println!("{} is online", w.id()));
//!     cluster.on_exit(|w, code, _signal| println!("{} exited: {:?}", w.id(), code));
//!
//!     let cache = cluster.fork(WorkerSpec::keep_alive("cache")).await?;
//!     cache.on("hit", |w, data| println!("{} reported a hit: {:?}", w.id(), data));
//!     cache.emit("warm", vec![json!("users"), json!(128)]);
//!     Ok(())
//! }
//! ```
//!
//! ---

mod cluster;
mod config;
mod core;
mod error;
mod events;
mod handle;
mod role;
mod subscribers;
mod wire;

pub mod testing;

// ---- Public re-exports ----

pub use cluster::Cluster;
pub use config::Config;
pub use crate::core::REBOOT_EXIT_CODE;
pub use error::ClusterError;
pub use events::{ClusterEvent, ClusterEventKind, ControlName, EventName, LifecycleName};
pub use handle::{IntoReceivers, Worker, WorkerId, WorkerSpec, WorkerState};
pub use role::{Role, WORKER_ENV};
pub use subscribers::Subscribe;
pub use wire::{
    ChildChannel, ChildSignal, MasterLink, SpawnedChild, Spawner, ToMaster, ToWorker,
    WorkerDescriptor,
};

// Optional: expose a simple built-in logging subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
