//! Reserved-name masking: lifecycle and control names never cross the
//! user surface and never produce channel traffic.

mod common;

use common::{entries, log, settle, sim_master};

use serde_json::json;

use procvisor::{ToMaster, WorkerSpec};

const RESERVED: &[&str] = &[
    "online",
    "error",
    "exit",
    "----transmit----",
    "----broadcast----",
    "----reboot----",
    "----get-workers----",
    "----online----",
    "----anything-else----",
];

/// Every reserved name is rejected on the instance surface with no
/// traffic to any child.
#[tokio::test]
async fn instance_surface_masks_reserved_names() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let _b = cluster.fork(WorkerSpec::new("b")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    settle().await;

    let before: Vec<usize> = (0..2).map(|i| spawner.child(i).sent().len()).collect();

    for name in RESERVED {
        assert!(!a.emit(name, vec![json!(1)]), "{name} must be rejected");
        assert!(!a.broadcast(name, vec![]), "{name} must be rejected");
        assert!(
            !a.to(["b"]).emit(name, vec![]),
            "{name} must be rejected with receivers"
        );
    }
    settle().await;

    let after: Vec<usize> = (0..2).map(|i| spawner.child(i).sent().len()).collect();
    assert_eq!(before, after, "reserved emits must move nothing");
}

/// Rejection consumes a pending receiver set, so the next emit cannot
/// fan out to a stale target list.
#[tokio::test]
async fn rejection_clears_receiver_set() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let _b = cluster.fork(WorkerSpec::new("b")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    settle().await;

    assert!(!a.to(["b"]).emit("online", vec![]));
    assert!(a.emit("ok", vec![]));
    settle().await;

    // Self-addressed: "a" got it, "b" saw nothing beyond bootstrap.
    assert_eq!(spawner.child(0).sent().len(), 2);
    assert_eq!(spawner.child(1).sent().len(), 1);
}

/// The cluster-level surface masks the same names.
#[tokio::test]
async fn cluster_surface_masks_reserved_names() {
    let (cluster, spawner) = sim_master();
    cluster.fork(WorkerSpec::new("a")).await.unwrap();
    spawner.child(0).online();
    settle().await;

    let before = spawner.child(0).sent().len();
    for name in RESERVED {
        assert!(!cluster.to(["a"]).unwrap().emit(name, vec![]).unwrap());
        assert!(!cluster.broadcast(name, vec![]).unwrap());
    }
    settle().await;
    assert_eq!(spawner.child(0).sent().len(), before);
}

/// Relays re-enter the guarded surface: a control envelope smuggling a
/// reserved event name is dropped at the hub.
#[tokio::test]
async fn relays_drop_reserved_event_names() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let _b = cluster.fork(WorkerSpec::new("b")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    settle().await;

    let seen = log();
    {
        let seen = seen.clone();
        a.on("exit", move |_, data| seen.lock().unwrap().push(data.to_vec()));
    }

    let before = spawner.child(1).sent().len();
    spawner.child(0).message(ToMaster::Transmit {
        id: "a".into(),
        receivers: vec!["b".into()],
        event: "exit".into(),
        data: vec![],
    });
    spawner.child(0).message(ToMaster::Broadcast {
        id: "a".into(),
        event: "----reboot----".into(),
        data: vec![],
    });
    spawner.child(0).message(ToMaster::User {
        id: "a".into(),
        event: "online".into(),
        data: vec![],
    });
    settle().await;

    assert_eq!(spawner.child(1).sent().len(), before);
    assert!(entries(&seen).is_empty(), "exit listener must not fire");
}
