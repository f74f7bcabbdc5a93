//! Master-side routing: self emits, targeted sets, broadcasts, relays,
//! and online-set queries, all driven over the in-memory transport.

mod common;

use common::{delivery, entries, log, settle, sim_master};

use serde_json::json;

use procvisor::{ToMaster, ToWorker, WorkerSpec, WorkerState};

/// Counts user-event envelopes sent to one sim child.
fn user_events(sent: &[ToWorker]) -> Vec<(String, Vec<serde_json::Value>)> {
    sent.iter()
        .filter_map(|env| match env {
            ToWorker::User { event, data } => Some((event.clone(), data.clone())),
            _ => None,
        })
        .collect()
}

/// A worker's plain emit lands on master-side listeners of its own
/// handle, exactly once, with the listener bound to that handle.
#[tokio::test]
async fn self_emit_round_trip() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let child = spawner.child(0);
    child.online();
    settle().await;

    let seen = log();
    {
        let seen = seen.clone();
        a.on("hello", move |w, data| {
            seen.lock().unwrap().push(delivery(w.id().as_str(), data));
        });
    }

    child.message(ToMaster::User {
        id: "a".into(),
        event: "hello".into(),
        data: vec![json!(1), json!("x")],
    });
    settle().await;

    assert_eq!(
        entries(&seen),
        vec![("a".to_string(), vec![json!(1), json!("x")])]
    );
}

/// A worker can address a peer's master-side handle by ID.
#[tokio::test]
async fn inbound_user_event_dispatches_by_id() {
    let (cluster, spawner) = sim_master();
    let _a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let b = cluster.fork(WorkerSpec::new("b")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    settle().await;

    let seen = log();
    {
        let seen = seen.clone();
        b.on("poke", move |w, data| {
            seen.lock().unwrap().push(delivery(w.id().as_str(), data));
        });
    }

    // Child "a" addresses handle "b".
    spawner.child(0).message(ToMaster::User {
        id: "b".into(),
        event: "poke".into(),
        data: vec![json!(true)],
    });
    settle().await;

    assert_eq!(entries(&seen), vec![("b".to_string(), vec![json!(true)])]);
}

/// `to(...)` delivers to exactly the named set and is consumed by the
/// emit; the next emit reverts to self-addressing.
#[tokio::test]
async fn targeted_set_is_one_shot() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let _b = cluster.fork(WorkerSpec::new("b")).await.unwrap();
    let _c = cluster.fork(WorkerSpec::new("c")).await.unwrap();
    for i in 0..3 {
        spawner.child(i).online();
    }
    settle().await;

    assert!(a.to(["b", "c"]).emit("job", vec![json!(7)]));
    settle().await;

    assert!(user_events(&spawner.child(0).sent()).is_empty());
    assert_eq!(
        user_events(&spawner.child(1).sent()),
        vec![("job".to_string(), vec![json!(7)])]
    );
    assert_eq!(
        user_events(&spawner.child(2).sent()),
        vec![("job".to_string(), vec![json!(7)])]
    );

    // The set was consumed: this one self-addresses to "a" only.
    assert!(a.emit("follow-up", vec![]));
    settle().await;

    assert_eq!(
        user_events(&spawner.child(0).sent()),
        vec![("follow-up".to_string(), vec![])]
    );
    assert_eq!(user_events(&spawner.child(1).sent()).len(), 1);
}

/// Instance broadcast reaches every live channel.
#[tokio::test]
async fn broadcast_reaches_all_channels() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let _b = cluster.fork(WorkerSpec::new("b")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    settle().await;

    assert!(a.broadcast("news", vec![json!("v2")]));
    settle().await;

    for i in 0..2 {
        assert_eq!(
            user_events(&spawner.child(i).sent()),
            vec![("news".to_string(), vec![json!("v2")])]
        );
    }
}

/// Cluster-level `to(...).emit(...)` mirrors the instance semantics over
/// the class slot; an emit with no stored set produces no traffic.
#[tokio::test]
async fn cluster_level_targeted_emit() {
    let (cluster, spawner) = sim_master();
    cluster.fork(WorkerSpec::new("a")).await.unwrap();
    cluster.fork(WorkerSpec::new("b")).await.unwrap();
    cluster.fork(WorkerSpec::new("c")).await.unwrap();
    for i in 0..3 {
        spawner.child(i).online();
    }
    settle().await;

    assert!(cluster
        .to(["a", "c"])
        .unwrap()
        .emit("config", vec![json!({"ttl": 60})])
        .unwrap());
    settle().await;

    assert_eq!(user_events(&spawner.child(0).sent()).len(), 1);
    assert!(user_events(&spawner.child(1).sent()).is_empty());
    assert_eq!(user_events(&spawner.child(2).sent()).len(), 1);

    // No stored set: nothing moves.
    assert!(cluster.emit("config", vec![]).unwrap());
    settle().await;
    assert_eq!(user_events(&spawner.child(0).sent()).len(), 1);
}

/// A relayed targeted send reaches only the named workers; the sender's
/// master-side listeners stay quiet.
#[tokio::test]
async fn transmit_relays_to_named_workers() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let _b = cluster.fork(WorkerSpec::new("b")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    settle().await;

    let seen = log();
    {
        let seen = seen.clone();
        a.on("ping", move |w, data| {
            seen.lock().unwrap().push(delivery(w.id().as_str(), data));
        });
    }

    spawner.child(0).message(ToMaster::Transmit {
        id: "a".into(),
        receivers: vec!["b".into()],
        event: "ping".into(),
        data: vec![json!(42)],
    });
    settle().await;

    assert_eq!(
        user_events(&spawner.child(1).sent()),
        vec![("ping".to_string(), vec![json!(42)])]
    );
    assert!(user_events(&spawner.child(0).sent()).is_empty());
    assert!(entries(&seen).is_empty());
}

/// A relayed broadcast fans out to every worker, the sender included.
#[tokio::test]
async fn broadcast_relay_includes_sender() {
    let (cluster, spawner) = sim_master();
    cluster.fork(WorkerSpec::new("a")).await.unwrap();
    cluster.fork(WorkerSpec::new("b")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    settle().await;

    spawner.child(0).message(ToMaster::Broadcast {
        id: "a".into(),
        event: "news".into(),
        data: vec![json!(7)],
    });
    settle().await;

    for i in 0..2 {
        assert_eq!(
            user_events(&spawner.child(i).sent()),
            vec![("news".to_string(), vec![json!(7)])]
        );
    }
}

/// An online-set query is answered on the originating channel with the
/// current online descriptors.
#[tokio::test]
async fn get_workers_replies_with_online_set() {
    let (cluster, spawner) = sim_master();
    cluster.fork(WorkerSpec::new("a")).await.unwrap();
    cluster.fork(WorkerSpec::keep_alive("b")).await.unwrap();
    cluster.fork(WorkerSpec::new("late")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    // "late" never connects; it must not appear in the reply.
    settle().await;

    spawner.child(0).message(ToMaster::GetWorkers { id: "a".into() });
    settle().await;

    let reply = spawner
        .child(0)
        .sent()
        .into_iter()
        .find_map(|env| match env {
            ToWorker::Workers { workers } => Some(workers),
            _ => None,
        })
        .expect("missing worker-list reply");

    let mut ids: Vec<String> = reply.iter().map(|d| d.id.to_string()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(reply.iter().all(|d| d.state == WorkerState::Online));
    assert!(reply.iter().any(|d| d.keep_alive));
}
