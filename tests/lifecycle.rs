//! Lifecycle behavior: online announcements, keep-alive respawn,
//! listener preservation, terminal exits, reboot, and shutdown.

mod common;

use std::time::Duration;

use common::{entries, log, settle, sim_master, sim_master_with};

use serde_json::json;

use procvisor::{
    ClusterEventKind, Config, ToMaster, ToWorker, WorkerSpec, WorkerState, REBOOT_EXIT_CODE,
};

/// Online fires once per ID; a keep-alive crash respawns silently and
/// the replacement never re-announces.
#[tokio::test]
async fn online_fires_once_per_id() {
    let (cluster, spawner) = sim_master();

    let online = log();
    {
        let online = online.clone();
        cluster.on_online(move |w| online.lock().unwrap().push(w.id().to_string()));
    }
    let exits = log();
    {
        let exits = exits.clone();
        cluster.on_exit(move |w, _, _| exits.lock().unwrap().push(w.id().to_string()));
    }

    cluster.fork(WorkerSpec::new("a")).await.unwrap();
    cluster.fork(WorkerSpec::keep_alive("b")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    settle().await;
    assert_eq!(entries(&online), vec!["a", "b"]);

    // SIGKILL under keep-alive: silent respawn.
    spawner.child(1).exit(None, Some("SIGKILL"));
    settle().await;

    assert_eq!(spawner.spawn_count(), 3);
    let reborn = spawner.child(2);
    assert_eq!(reborn.id(), &procvisor::WorkerId::from("b"));

    reborn.online();
    settle().await;

    // Still announced exactly once each; no exit observed.
    assert_eq!(entries(&online), vec!["a", "b"]);
    assert!(entries(&exits).is_empty());

    // The replacement still gets its bootstrap.
    assert!(matches!(
        reborn.sent().first(),
        Some(ToWorker::Bootstrap { keep_alive: true, .. })
    ));
}

/// Listeners registered before a keep-alive crash survive the respawn
/// in the same order; no user-visible online or exit fires.
#[tokio::test]
async fn listeners_survive_respawn() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::keep_alive("a")).await.unwrap();
    spawner.child(0).online();
    settle().await;

    let seen = log();
    for tag in ["first", "second", "third"] {
        let seen = seen.clone();
        a.on("beat", move |_, _| seen.lock().unwrap().push(tag));
    }

    let exits = log::<String>();
    {
        let exits = exits.clone();
        cluster.on_exit(move |w, _, _| exits.lock().unwrap().push(w.id().to_string()));
    }

    spawner.child(0).exit(Some(3), None);
    settle().await;
    let reborn = spawner.child(1);
    reborn.online();
    settle().await;

    assert_eq!(a.state(), WorkerState::Online);
    assert_eq!(a.listener_count("beat"), 3);
    assert!(entries(&exits).is_empty());

    // Same handle, same order, through the replacement child.
    reborn.message(ToMaster::User {
        id: "a".into(),
        event: "beat".into(),
        data: vec![],
    });
    settle().await;
    assert_eq!(entries(&seen), vec!["first", "second", "third"]);
}

/// A non-keep-alive worker killed via `exit()` produces exactly one exit
/// event; later emits report success but move nothing.
#[tokio::test]
async fn terminal_exit_fires_once() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let child = spawner.child(0);
    child.online();
    settle().await;

    let handle_exits = log();
    {
        let handle_exits = handle_exits.clone();
        a.on("exit", move |_, data| {
            handle_exits.lock().unwrap().push(data.to_vec())
        });
    }
    let cluster_exits = log();
    {
        let cluster_exits = cluster_exits.clone();
        cluster.on_exit(move |w, code, signal| {
            cluster_exits
                .lock()
                .unwrap()
                .push((w.id().to_string(), code, signal.map(str::to_string)));
        });
    }

    a.exit();
    assert!(child.killed());
    child.exit(None, Some("SIGKILL"));
    settle().await;

    assert_eq!(a.state(), WorkerState::Closed);
    assert_eq!(
        entries(&handle_exits),
        vec![vec![json!(null), json!("SIGKILL")]]
    );
    assert_eq!(
        entries(&cluster_exits),
        vec![("a".to_string(), None, Some("SIGKILL".to_string()))]
    );
    assert!(cluster.get("a").is_none());
    assert_eq!(spawner.spawn_count(), 1);

    // Best-effort surface: success without a channel.
    let before = child.sent().len();
    assert!(a.emit("late", vec![json!(1)]));
    settle().await;
    assert_eq!(child.sent().len(), before);
}

/// `reboot()` closes the handle, asks the child to terminate with the
/// reserved code, and the exit respawns exactly once with no user exit.
#[tokio::test]
async fn reboot_respawns_without_exit_event() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let child = spawner.child(0);
    child.online();
    settle().await;

    let online = log::<String>();
    {
        let online = online.clone();
        cluster.on_online(move |w| online.lock().unwrap().push(w.id().to_string()));
    }
    let exits = log::<String>();
    {
        let exits = exits.clone();
        cluster.on_exit(move |w, _, _| exits.lock().unwrap().push(w.id().to_string()));
    }

    a.reboot();
    assert_eq!(a.state(), WorkerState::Closed);
    assert!(child.sent().contains(&ToWorker::Reboot));

    child.exit(Some(REBOOT_EXIT_CODE), None);
    settle().await;

    assert_eq!(spawner.spawn_count(), 2);
    let reborn = spawner.child(1);
    reborn.online();
    settle().await;

    assert_eq!(a.state(), WorkerState::Online);
    assert!(entries(&exits).is_empty());
    // The respawn carries the reborn flag, so no announcement either.
    assert!(entries(&online).is_empty());
}

/// The online set tracks state transitions exactly.
#[tokio::test]
async fn online_set_is_single_source_of_truth() {
    let (cluster, spawner) = sim_master();
    cluster.fork(WorkerSpec::new("a")).await.unwrap();
    cluster.fork(WorkerSpec::new("b")).await.unwrap();

    spawner.child(0).online();
    settle().await;
    let ids: Vec<String> = cluster
        .workers()
        .await
        .unwrap()
        .iter()
        .map(|w| w.id().to_string())
        .collect();
    assert_eq!(ids, vec!["a"]);

    spawner.child(1).online();
    settle().await;
    let mut ids: Vec<String> = cluster
        .workers()
        .await
        .unwrap()
        .iter()
        .map(|w| w.id().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);

    spawner.child(0).exit(Some(0), None);
    settle().await;
    let ids: Vec<String> = cluster
        .workers()
        .await
        .unwrap()
        .iter()
        .map(|w| w.id().to_string())
        .collect();
    assert_eq!(ids, vec!["b"]);
}

/// Channel errors surface on the handle's `error` listeners.
#[tokio::test]
async fn channel_error_reaches_handle() {
    let (cluster, spawner) = sim_master();
    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    spawner.child(0).online();
    settle().await;

    let errors = log();
    {
        let errors = errors.clone();
        a.on("error", move |_, data| {
            errors.lock().unwrap().push(data.to_vec())
        });
    }

    spawner.child(0).fail("pipe burst");
    settle().await;

    assert_eq!(entries(&errors), vec![vec![json!("pipe burst")]]);
    // Errors are not exits; the worker stays online.
    assert_eq!(a.state(), WorkerState::Online);
}

/// Duplicate and empty IDs are rejected at fork time.
#[tokio::test]
async fn fork_validates_ids() {
    let (cluster, spawner) = sim_master();
    cluster.fork(WorkerSpec::new("a")).await.unwrap();

    let dup = cluster.fork(WorkerSpec::new("a")).await;
    assert!(matches!(
        dup,
        Err(procvisor::ClusterError::WorkerExists { .. })
    ));

    let empty = cluster.fork(WorkerSpec::new("")).await;
    assert!(matches!(empty, Err(procvisor::ClusterError::EmptyWorkerId)));

    assert_eq!(spawner.spawn_count(), 1);

    // A terminal exit frees the ID.
    spawner.child(0).online();
    settle().await;
    spawner.child(0).exit(Some(0), None);
    settle().await;
    cluster.fork(WorkerSpec::new("a")).await.unwrap();
    assert_eq!(spawner.spawn_count(), 2);
}

/// Shutdown kills every child, disables respawn, and resolves once the
/// children exit within the grace period.
#[tokio::test]
async fn shutdown_waits_for_children() {
    let mut cfg = Config::default();
    cfg.grace = Duration::from_secs(5);
    let (cluster, spawner) = sim_master_with(cfg);

    cluster.fork(WorkerSpec::keep_alive("a")).await.unwrap();
    cluster.fork(WorkerSpec::new("b")).await.unwrap();
    spawner.child(0).online();
    spawner.child(1).online();
    settle().await;

    let cluster = std::sync::Arc::new(cluster);
    let task = {
        let cluster = cluster.clone();
        tokio::spawn(async move { cluster.shutdown().await })
    };
    settle().await;

    assert!(spawner.child(0).killed());
    assert!(spawner.child(1).killed());

    // Keep-alive must not resurrect during shutdown.
    spawner.child(0).exit(None, Some("SIGKILL"));
    spawner.child(1).exit(None, Some("SIGKILL"));

    task.await.unwrap().unwrap();
    assert_eq!(spawner.spawn_count(), 2);
    assert!(cluster.workers().await.unwrap().is_empty());
}

/// The cluster-wide listener budget is the baseline plus the sum of
/// per-handle limits, tracking forks and adjustments.
#[tokio::test]
async fn listener_budget_tracks_handle_limits() {
    let (cluster, _spawner) = sim_master();
    assert_eq!(cluster.listener_budget(), 10);

    let a = cluster.fork(WorkerSpec::new("a")).await.unwrap();
    let _b = cluster.fork(WorkerSpec::new("b")).await.unwrap();
    assert_eq!(cluster.listener_budget(), 30);

    a.set_max_listeners(25);
    assert_eq!(cluster.listener_budget(), 45);
}

/// The observability stream reports every transition, including the
/// silent respawn the listener surface hides.
#[tokio::test]
async fn lifecycle_stream_reports_transitions() {
    let (cluster, spawner) = sim_master();
    let mut events = cluster.events();

    cluster.fork(WorkerSpec::keep_alive("a")).await.unwrap();
    spawner.child(0).online();
    spawner.child(0).exit(Some(1), None);
    settle().await;

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    for expected in [
        ClusterEventKind::Forked,
        ClusterEventKind::Online,
        ClusterEventKind::Exited,
        ClusterEventKind::Respawned,
    ] {
        assert!(kinds.contains(&expected), "missing {expected:?}");
    }
}

/// A child that never exits trips the grace period and is reported stuck.
#[tokio::test]
async fn shutdown_reports_stuck_children() {
    let mut cfg = Config::default();
    cfg.grace = Duration::from_millis(100);
    let (cluster, spawner) = sim_master_with(cfg);

    cluster.fork(WorkerSpec::new("wedged")).await.unwrap();
    spawner.child(0).online();
    settle().await;

    let err = cluster.shutdown().await.unwrap_err();
    match err {
        procvisor::ClusterError::GraceExceeded { stuck, .. } => {
            assert_eq!(stuck.len(), 1);
            assert_eq!(stuck[0], "wedged");
        }
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
}
