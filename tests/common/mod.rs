#![allow(dead_code)]
//! Shared helpers for integration tests over the in-memory transport.
//!
//! The master runtime processes child signals on spawned pump tasks, so
//! tests drive the child side and then [`settle`] before asserting.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use procvisor::testing::SimSpawner;
use procvisor::{Cluster, Config};

/// Yields long enough for pump tasks to drain pending signals.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

/// Master cluster over a fresh sim spawner, default config.
pub fn sim_master() -> (Cluster, Arc<SimSpawner>) {
    sim_master_with(Config::default())
}

/// Master cluster over a fresh sim spawner with explicit config.
pub fn sim_master_with(cfg: Config) -> (Cluster, Arc<SimSpawner>) {
    let spawner = Arc::new(SimSpawner::new());
    let cluster = Cluster::master(spawner.clone(), cfg, Vec::new());
    (cluster, spawner)
}

/// Shared log a listener closure can append to.
pub type Log<T> = Arc<Mutex<Vec<T>>>;

pub fn log<T>() -> Log<T> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries<T: Clone>(log: &Log<T>) -> Vec<T> {
    log.lock().unwrap().clone()
}

/// Renders `(worker id, payload)` deliveries for compact asserts.
pub fn delivery(id: &str, data: &[Value]) -> (String, Vec<Value>) {
    (id.to_string(), data.to_vec())
}
