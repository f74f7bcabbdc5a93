//! # Error types used by the cluster runtime.
//!
//! [`ClusterError`] covers failures of the orchestration layer itself:
//! role misuse, registry conflicts, spawn failures, and shutdown
//! overruns. Event delivery never reports errors through this type;
//! `emit` is best-effort and channel failures surface as `error` events
//! on the affected handle.
//!
//! The type provides `as_label` for stable snake_case labels in logs
//! and metrics.

use std::time::Duration;

use thiserror::Error;

use crate::handle::WorkerId;

/// # Errors produced by the cluster runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClusterError {
    /// A master-only operation was invoked from a worker process.
    #[error("operation '{op}' is only available in the master process")]
    MasterOnly {
        /// Name of the rejected operation.
        op: &'static str,
    },

    /// A worker-only operation was invoked from the master process.
    #[error("operation '{op}' is only available in worker processes")]
    WorkerOnly {
        /// Name of the rejected operation.
        op: &'static str,
    },

    /// Worker IDs must be non-empty strings.
    #[error("worker id must be a non-empty string")]
    EmptyWorkerId,

    /// A live worker with this ID already exists.
    #[error("worker '{id}' already exists")]
    WorkerExists {
        /// The duplicate worker ID.
        id: WorkerId,
    },

    /// The spawner collaborator failed to fork a child process.
    #[error("failed to spawn child process: {reason}")]
    SpawnFailed {
        /// Underlying failure description.
        reason: String,
    },

    /// The channel to the master closed before a pending request resolved.
    #[error("channel to master closed")]
    LinkClosed,

    /// The handle outlived the cluster it was created by.
    #[error("cluster has been dropped")]
    Detached,

    /// Shutdown grace period was exceeded; some children had not exited.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// IDs of workers whose children did not exit in time.
        stuck: Vec<WorkerId>,
    },
}

impl ClusterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClusterError::MasterOnly { .. } => "cluster_master_only",
            ClusterError::WorkerOnly { .. } => "cluster_worker_only",
            ClusterError::EmptyWorkerId => "cluster_empty_worker_id",
            ClusterError::WorkerExists { .. } => "cluster_worker_exists",
            ClusterError::SpawnFailed { .. } => "cluster_spawn_failed",
            ClusterError::LinkClosed => "cluster_link_closed",
            ClusterError::Detached => "cluster_detached",
            ClusterError::GraceExceeded { .. } => "cluster_grace_exceeded",
        }
    }
}

impl From<std::io::Error> for ClusterError {
    fn from(e: std::io::Error) -> Self {
        ClusterError::SpawnFailed {
            reason: e.to_string(),
        }
    }
}
