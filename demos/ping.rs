//! Round-trip walkthrough over the in-memory transport.
//!
//! Forks two workers, scripts their side of the conversation, and shows
//! self-addressed, targeted, and broadcast deliveries.
//!
//! ```sh
//! cargo run --example ping
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use procvisor::testing::SimSpawner;
use procvisor::{Cluster, Config, ToMaster, WorkerSpec};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spawner = Arc::new(SimSpawner::new());
    let cluster = Cluster::master(spawner.clone(), Config::default(), Vec::new());

    cluster.on_online(|w| println!("online: {}", w.id()));

    let ping = cluster.fork(WorkerSpec::new("ping")).await?;
    let _pong = cluster.fork(WorkerSpec::new("pong")).await?;

    // The script below plays the children; a real host would run worker
    // processes that answer through their own Cluster::worker_side runtime.
    spawner.child(0).online();
    spawner.child(1).online();
    tokio::time::sleep(Duration::from_millis(20)).await;

    ping.on("pong", |w, data| println!("{} answered: {:?}", w.id(), data));

    // Master -> worker, self-addressed.
    ping.emit("ping", vec![json!(1)]);

    // Worker answers its master-side handle.
    spawner.child(0).message(ToMaster::User {
        id: "ping".into(),
        event: "pong".into(),
        data: vec![json!(1)],
    });

    // Worker relays to a named peer through the hub.
    spawner.child(0).message(ToMaster::Transmit {
        id: "ping".into(),
        receivers: vec!["pong".into()],
        event: "ping".into(),
        data: vec![json!(2)],
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    for child in spawner.children() {
        println!("{} received: {:?}", child.id(), child.sent());
    }

    // Script clean exits so shutdown resolves immediately.
    spawner.child(0).exit(Some(0), None);
    spawner.child(1).exit(Some(0), None);
    tokio::time::sleep(Duration::from_millis(20)).await;

    cluster.shutdown().await?;
    Ok(())
}
