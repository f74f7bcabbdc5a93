//! Keep-alive respawn walkthrough with the built-in LogWriter.
//!
//! Crashes a keep-alive worker and a plain one; the first respawns
//! silently, the second exits for good.
//!
//! ```sh
//! cargo run --example keepalive --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use procvisor::testing::SimSpawner;
use procvisor::{Cluster, Config, LogWriter, Subscribe, WorkerSpec};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let spawner = Arc::new(SimSpawner::new());
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let cluster = Cluster::master(spawner.clone(), Config::default(), subscribers);

    cluster.on_online(|w| println!("announced: {}", w.id()));
    cluster.on_exit(|w, code, signal| println!("gone: {} code={code:?} signal={signal:?}", w.id()));

    cluster.fork(WorkerSpec::keep_alive("durable")).await?;
    cluster.fork(WorkerSpec::new("fragile")).await?;
    spawner.child(0).online();
    spawner.child(1).online();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Both crash. "durable" respawns with its listeners intact and no
    // announcement; "fragile" exits terminally.
    spawner.child(0).exit(Some(1), None);
    spawner.child(1).exit(Some(1), None);
    tokio::time::sleep(Duration::from_millis(20)).await;

    spawner.latest("durable").unwrap().online();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let online = cluster.workers().await?;
    println!(
        "online now: {:?}",
        online.iter().map(|w| w.id().to_string()).collect::<Vec<_>>()
    );

    spawner.latest("durable").unwrap().exit(Some(0), None);
    tokio::time::sleep(Duration::from_millis(20)).await;
    cluster.shutdown().await?;
    Ok(())
}
