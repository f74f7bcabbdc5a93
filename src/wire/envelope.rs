//! # Wire envelopes exchanged between master and workers.
//!
//! The hub topology is star-shaped: every message either travels
//! master → worker ([`ToWorker`]) or worker → master ([`ToMaster`]).
//! Worker-to-worker traffic is expressed as a `Transmit` or `Broadcast`
//! request that the master unpacks and re-dispatches.
//!
//! Envelopes are tagged enums; the `kind` field selects the variant, so
//! control traffic can never collide with user event names. Payloads are
//! positional lists of structured values, delivered verbatim.
//!
//! ```text
//! worker a                    master                     worker b
//!    │  Transmit{receivers:[b]} │                           │
//!    ├──────────────────────────►  unpack, guard, fan out   │
//!    │                          ├───────────────────────────►
//!    │                          │   User{event, data}       │
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handle::{WorkerId, WorkerState};

/// Serializable snapshot of a worker handle.
///
/// The master answers online-set queries with these; the worker side
/// reconstructs peer handles from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    /// Stable worker ID.
    pub id: WorkerId,
    /// Whether accidental exits respawn this worker.
    pub keep_alive: bool,
    /// Lifecycle state at snapshot time.
    pub state: WorkerState,
}

/// Envelope sent from the master to a child process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToWorker {
    /// First message after the child reports ready; triggers handle
    /// creation on the worker side.
    Bootstrap {
        /// ID the child was forked under.
        id: WorkerId,
        /// Whether accidental exits respawn this worker.
        keep_alive: bool,
    },
    /// User event with positional arguments.
    User {
        /// Event name; never a reserved name.
        event: String,
        /// Positional payload values.
        data: Vec<Value>,
    },
    /// Response to an online-set query.
    Workers {
        /// Snapshot of every online worker.
        workers: Vec<WorkerDescriptor>,
    },
    /// Terminate with the reboot exit code.
    Reboot,
}

/// Envelope sent from a child process to the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToMaster {
    /// User event addressed to the sender's master-side handle.
    User {
        /// ID of the handle the event targets.
        id: WorkerId,
        /// Event name; never a reserved name.
        event: String,
        /// Positional payload values.
        data: Vec<Value>,
    },
    /// Relay a user event to the named workers.
    Transmit {
        /// Originating worker ID.
        id: WorkerId,
        /// Target worker IDs.
        receivers: Vec<WorkerId>,
        /// Event name to deliver.
        event: String,
        /// Positional payload values.
        data: Vec<Value>,
    },
    /// Relay a user event to every worker, sender included.
    Broadcast {
        /// Originating worker ID.
        id: WorkerId,
        /// Event name to deliver.
        event: String,
        /// Positional payload values.
        data: Vec<Value>,
    },
    /// Request the current online worker list.
    GetWorkers {
        /// Originating worker ID.
        id: WorkerId,
    },
}
