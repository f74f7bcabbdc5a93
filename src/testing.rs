//! # In-memory transport for tests and demos.
//!
//! No processes are forked: [`SimSpawner`] hands the master a
//! [`SimChild`] per fork request, and the test script drives the child's
//! side of the conversation (`online`, envelopes, exits). On the worker
//! side, [`sim_link`] builds the master-link pair the same way.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use procvisor::{Cluster, Config, WorkerSpec};
//! # use procvisor::testing::SimSpawner;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spawner = Arc::new(SimSpawner::new());
//! let cluster = Cluster::master(spawner.clone(), Config::default(), Vec::new());
//!
//! let _w = cluster.fork(WorkerSpec::new("a")).await?;
//! spawner.child(0).online(); // the "child" reports ready
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::handle::WorkerId;
use crate::wire::{
    ChildChannel, ChildSignal, MasterLink, SpawnedChild, Spawner, ToMaster, ToWorker,
};

/// Script-driven child process stand-in.
///
/// The master writes to it through the [`ChildChannel`] impl; the test
/// drives its lifecycle and outbound traffic explicitly.
pub struct SimChild {
    id: WorkerId,
    pid: u32,
    signals: mpsc::UnboundedSender<ChildSignal>,
    sent: Mutex<Vec<ToWorker>>,
    killed: AtomicBool,
}

impl SimChild {
    /// Worker ID this child was forked under.
    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Simulated OS PID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Reports the child ready.
    pub fn online(&self) {
        let _ = self.signals.send(ChildSignal::Online);
    }

    /// Sends an envelope to the master.
    pub fn message(&self, env: ToMaster) {
        let _ = self.signals.send(ChildSignal::Message(env));
    }

    /// Raises a channel error.
    pub fn fail(&self, err: &str) {
        let _ = self.signals.send(ChildSignal::Error(err.to_string()));
    }

    /// Terminates the child with the given exit metadata.
    pub fn exit(&self, code: Option<i32>, signal: Option<&str>) {
        let _ = self.signals.send(ChildSignal::Exit {
            code,
            signal: signal.map(str::to_string),
        });
    }

    /// Everything the master has sent to this child so far.
    pub fn sent(&self) -> Vec<ToWorker> {
        self.sent.lock().expect("sim child poisoned").clone()
    }

    /// True after the master killed this child.
    pub fn killed(&self) -> bool {
        self.killed.load(AtomicOrdering::Relaxed)
    }
}

impl ChildChannel for SimChild {
    fn send(&self, envelope: ToWorker) {
        self.sent.lock().expect("sim child poisoned").push(envelope);
    }

    fn kill(&self) {
        self.killed.store(true, AtomicOrdering::Relaxed);
    }
}

/// Spawner that records every fork and never touches the OS.
pub struct SimSpawner {
    next_pid: AtomicU32,
    children: Mutex<Vec<Arc<SimChild>>>,
}

impl SimSpawner {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(100),
            children: Mutex::new(Vec::new()),
        }
    }

    /// All children forked so far, in fork order.
    pub fn children(&self) -> Vec<Arc<SimChild>> {
        self.children.lock().expect("sim spawner poisoned").clone()
    }

    /// Child at fork index; panics when out of range.
    pub fn child(&self, index: usize) -> Arc<SimChild> {
        self.children()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("no child at fork index {index}"))
    }

    /// Most recent child forked under `id`.
    pub fn latest(&self, id: &str) -> Option<Arc<SimChild>> {
        self.children()
            .into_iter()
            .rev()
            .find(|c| c.id() == &WorkerId::from(id))
    }

    /// Number of forks performed.
    pub fn spawn_count(&self) -> usize {
        self.children.lock().expect("sim spawner poisoned").len()
    }
}

impl Default for SimSpawner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Spawner for SimSpawner {
    async fn spawn(&self, id: &WorkerId) -> std::io::Result<SpawnedChild> {
        let pid = self.next_pid.fetch_add(1, AtomicOrdering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let child = Arc::new(SimChild {
            id: id.clone(),
            pid,
            signals: tx,
            sent: Mutex::new(Vec::new()),
            killed: AtomicBool::new(false),
        });
        self.children
            .lock()
            .expect("sim spawner poisoned")
            .push(Arc::clone(&child));
        Ok(SpawnedChild {
            pid,
            channel: child,
            signals: rx,
        })
    }
}

/// Master process stand-in for worker-side tests.
pub struct SimMaster {
    received: Mutex<Vec<ToMaster>>,
    outbound: mpsc::UnboundedSender<ToWorker>,
}

impl SimMaster {
    /// Delivers an envelope to the worker runtime.
    pub fn push(&self, env: ToWorker) {
        let _ = self.outbound.send(env);
    }

    /// Everything the worker has sent to the master so far.
    pub fn received(&self) -> Vec<ToMaster> {
        self.received.lock().expect("sim master poisoned").clone()
    }
}

impl MasterLink for SimMaster {
    fn send(&self, envelope: ToMaster) {
        self.received
            .lock()
            .expect("sim master poisoned")
            .push(envelope);
    }
}

/// Builds the worker-side link pair: the link to hand to
/// [`Cluster::worker_side`](crate::Cluster::worker_side) plus the inbound receiver.
pub fn sim_link() -> (Arc<SimMaster>, mpsc::UnboundedReceiver<ToWorker>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let master = Arc::new(SimMaster {
        received: Mutex::new(Vec::new()),
        outbound: tx,
    });
    (master, rx)
}
