//! # Master-side worker registry.
//!
//! Maps worker ID to handle, ID to child channel, and child PID to its
//! logical worker. Only master-running tasks touch these maps.
//!
//! ## Rules
//! - Every ID with a channel entry has a handle entry in `connecting` or
//!   `online` state; `closed` handles are removed.
//! - At most one live child exists per ID; the PID map resolves inbound
//!   lifecycle signals back to the logical worker and carries the
//!   `reborn` flag that suppresses duplicate `online` announcements.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::handle::{Worker, WorkerId, WorkerState};
use crate::wire::{ChildChannel, WorkerDescriptor};

/// Resolution record for one child PID.
#[derive(Debug, Clone)]
pub(crate) struct PidRecord {
    /// Logical worker the PID belongs to.
    pub id: WorkerId,
    /// Keep-alive flag at fork time.
    pub keep_alive: bool,
    /// True when this child replaced an earlier one under the same ID.
    pub reborn: bool,
}

/// Concurrent registry of live workers.
pub(crate) struct Registry {
    workers: DashMap<WorkerId, Arc<Worker>>,
    channels: DashMap<WorkerId, Arc<dyn ChildChannel>>,
    pids: DashMap<u32, PidRecord>,
    pumps: DashMap<WorkerId, JoinHandle<()>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            workers: DashMap::new(),
            channels: DashMap::new(),
            pids: DashMap::new(),
            pumps: DashMap::new(),
        }
    }

    pub(crate) fn insert_worker(&self, worker: Arc<Worker>) {
        self.workers.insert(worker.id().clone(), worker);
    }

    pub(crate) fn worker(&self, id: &str) -> Option<Arc<Worker>> {
        self.workers.get(id).map(|e| Arc::clone(e.value()))
    }

    pub(crate) fn remove_worker(&self, id: &str) {
        self.workers.remove(id);
    }

    pub(crate) fn workers_snapshot(&self) -> Vec<Arc<Worker>> {
        self.workers.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Handles whose state is `online`, the single source of truth for
    /// the online set.
    pub(crate) fn online(&self) -> Vec<Arc<Worker>> {
        self.workers
            .iter()
            .map(|e| Arc::clone(e.value()))
            .filter(|w| w.state() == WorkerState::Online)
            .collect()
    }

    /// Serialized snapshot of the online set.
    pub(crate) fn online_descriptors(&self) -> Vec<WorkerDescriptor> {
        self.online()
            .into_iter()
            .map(|w| WorkerDescriptor {
                id: w.id().clone(),
                keep_alive: w.keep_alive(),
                state: w.state(),
            })
            .collect()
    }

    pub(crate) fn set_channel(&self, id: WorkerId, channel: Arc<dyn ChildChannel>) {
        self.channels.insert(id, channel);
    }

    pub(crate) fn channel(&self, id: &str) -> Option<Arc<dyn ChildChannel>> {
        self.channels.get(id).map(|e| Arc::clone(e.value()))
    }

    pub(crate) fn remove_channel(&self, id: &str) -> Option<Arc<dyn ChildChannel>> {
        self.channels.remove(id).map(|(_, c)| c)
    }

    pub(crate) fn channels_snapshot(&self) -> Vec<Arc<dyn ChildChannel>> {
        self.channels.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub(crate) fn channel_ids(&self) -> Vec<WorkerId> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }

    pub(crate) fn record_pid(&self, pid: u32, record: PidRecord) {
        self.pids.insert(pid, record);
    }

    pub(crate) fn pid_record(&self, pid: u32) -> Option<PidRecord> {
        self.pids.get(&pid).map(|e| e.value().clone())
    }

    pub(crate) fn take_pid(&self, pid: u32) -> Option<PidRecord> {
        self.pids.remove(&pid).map(|(_, r)| r)
    }

    pub(crate) fn set_pump(&self, id: WorkerId, pump: JoinHandle<()>) {
        self.pumps.insert(id, pump);
    }

    pub(crate) fn remove_pump(&self, id: &str) {
        self.pumps.remove(id);
    }

    pub(crate) fn drain_pumps(&self) -> Vec<(WorkerId, JoinHandle<()>)> {
        let ids: Vec<WorkerId> = self.pumps.iter().map(|e| e.key().clone()).collect();
        ids.into_iter()
            .filter_map(|id| self.pumps.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: &str, state: WorkerState) -> Arc<Worker> {
        Worker::orphan(id, state)
    }

    #[test]
    fn online_filters_by_state() {
        let reg = Registry::new();
        reg.insert_worker(handle("a", WorkerState::Online));
        reg.insert_worker(handle("b", WorkerState::Connecting));

        let online = reg.online();
        assert_eq!(online.len(), 1);
        assert_eq!(*online[0].id(), "a");

        let descs = reg.online_descriptors();
        assert_eq!(descs.len(), 1);
        assert_eq!(descs[0].state, WorkerState::Online);
    }

    #[test]
    fn pid_records_resolve_and_drain() {
        let reg = Registry::new();
        reg.record_pid(
            7,
            PidRecord {
                id: "a".into(),
                keep_alive: true,
                reborn: false,
            },
        );

        assert!(reg.pid_record(7).is_some());
        let taken = reg.take_pid(7).unwrap();
        assert_eq!(taken.id, "a");
        assert!(reg.take_pid(7).is_none());
    }
}
