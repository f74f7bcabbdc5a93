//! # Process-role probe.
//!
//! A cluster consists of one master process and any number of worker
//! processes forked by it. The role never changes for the lifetime of a
//! process: the spawner marks children by setting [`WORKER_ENV`] in the
//! child environment, and [`Role::probe`] reads that marker back.

use std::env;

/// Environment variable a spawner sets for forked children.
///
/// The value is the worker ID the child was forked under. The master
/// process must not have this variable set.
pub const WORKER_ENV: &str = "PROCVISOR_WORKER";

/// Role of the current process within the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The supervisor process; the only owner of child channels.
    Master,
    /// A child process managed by the master.
    Worker,
}

impl Role {
    /// Determines the role of the current process from [`WORKER_ENV`].
    pub fn probe() -> Role {
        match env::var_os(WORKER_ENV) {
            Some(_) => Role::Worker,
            None => Role::Master,
        }
    }

    /// True if this is the supervisor process.
    pub fn is_master(self) -> bool {
        matches!(self, Role::Master)
    }

    /// True if this is a managed child process.
    pub fn is_worker(self) -> bool {
        matches!(self, Role::Worker)
    }
}
