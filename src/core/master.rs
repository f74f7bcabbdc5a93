use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use async_trait::async_trait;

use crate::config::Config;
use crate::core::lifecycle::{classify_exit, ExitClass};
use crate::core::registry::{PidRecord, Registry};
use crate::core::{Core, ExitListener, OnlineListener};
use crate::error::ClusterError;
use crate::events::{Bus, ClusterEvent, ClusterEventKind, EventName};
use crate::handle::{Worker, WorkerId, WorkerSpec, WorkerState};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::wire::{ChildSignal, Spawner, ToMaster, ToWorker};

/// Master-side runtime: owns the registry, the spawner, and one signal
/// pump per child.
pub(crate) struct MasterCore {
    cfg: Config,
    bus: Bus,
    registry: Registry,
    spawner: Arc<dyn Spawner>,
    subs: Arc<SubscriberSet>,

    // One-shot receiver set for the cluster-level emit.
    class_receivers: Mutex<Option<Vec<WorkerId>>>,

    online_listeners: Mutex<Vec<OnlineListener>>,
    exit_listeners: Mutex<Vec<ExitListener>>,
    listener_budget: AtomicUsize,

    closing: CancellationToken,
    me: Weak<MasterCore>,
}

impl MasterCore {
    pub(crate) fn new(
        spawner: Arc<dyn Spawner>,
        cfg: Config,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Arc<Self> {
        let bus = Bus::new(cfg.bus_capacity);
        let subs = Arc::new(SubscriberSet::new(subscribers));
        let budget = cfg.base_listeners;

        let core = Arc::new_cyclic(|me| Self {
            cfg,
            bus,
            registry: Registry::new(),
            spawner,
            subs,
            class_receivers: Mutex::new(None),
            online_listeners: Mutex::new(Vec::new()),
            exit_listeners: Mutex::new(Vec::new()),
            listener_budget: AtomicUsize::new(budget),
            closing: CancellationToken::new(),
            me: me.clone(),
        });
        core.spawn_subscriber_listener();
        core
    }

    fn core_weak(&self) -> Weak<dyn Core> {
        let weak: Weak<dyn Core> = self.me.clone();
        weak
    }

    /// Forks a child under a new handle in `connecting` state.
    ///
    /// IDs are unique among live workers; a `closed` handle has already
    /// left the registry, so its ID may be reused.
    pub(crate) async fn fork(self: &Arc<Self>, spec: WorkerSpec) -> Result<Arc<Worker>, ClusterError> {
        if spec.id().is_empty() {
            return Err(ClusterError::EmptyWorkerId);
        }
        if self.registry.worker(spec.id().as_str()).is_some() {
            return Err(ClusterError::WorkerExists {
                id: spec.id().clone(),
            });
        }

        let worker = Worker::create(
            spec.id().clone(),
            spec.is_keep_alive(),
            WorkerState::Connecting,
            self.core_weak(),
            self.cfg.max_listeners,
        );
        self.registry.insert_worker(Arc::clone(&worker));
        self.recompute_listener_budget();

        if let Err(e) = self.spawn_child(&worker, false).await {
            self.registry.remove_worker(worker.id().as_str());
            return Err(e);
        }
        Ok(worker)
    }

    /// Forks a child for an existing handle and wires its signal pump.
    ///
    /// `reborn` marks respawns; the flag lands in the PID record and
    /// suppresses the user-visible `online` announcement later.
    ///
    /// Boxed because this mutually recurses with [`Self::pump`] and
    /// [`Self::child_exit`] through the respawn path; an `async fn` here
    /// would give the chain an unresolvable recursive type.
    fn spawn_child<'a>(
        self: &'a Arc<Self>,
        worker: &'a Arc<Worker>,
        reborn: bool,
    ) -> futures::future::BoxFuture<'a, Result<(), ClusterError>> {
        Box::pin(async move {
            let spawned = self.spawner.spawn(worker.id()).await?;

            worker.set_state(WorkerState::Connecting);
            self.registry.record_pid(
                spawned.pid,
                PidRecord {
                    id: worker.id().clone(),
                    keep_alive: worker.keep_alive(),
                    reborn,
                },
            );
            self.registry
                .set_channel(worker.id().clone(), Arc::clone(&spawned.channel));

            let pump = tokio::spawn(Self::pump(
                Arc::clone(self),
                Arc::clone(worker),
                spawned.pid,
                spawned.signals,
            ));
            self.registry.set_pump(worker.id().clone(), pump);

            self.bus.publish(
                ClusterEvent::now(ClusterEventKind::Forked)
                    .with_id(worker.id().clone())
                    .with_pid(spawned.pid)
                    .with_reborn(reborn),
            );
            Ok(())
        })
    }

    /// Consumes one child's signal stream until it exits.
    async fn pump(
        core: Arc<MasterCore>,
        worker: Arc<Worker>,
        pid: u32,
        mut signals: mpsc::UnboundedReceiver<ChildSignal>,
    ) {
        while let Some(sig) = signals.recv().await {
            match sig {
                ChildSignal::Online => core.child_online(&worker, pid),
                ChildSignal::Message(env) => core.route(&worker, env),
                ChildSignal::Error(err) => core.child_error(&worker, err),
                ChildSignal::Exit { code, signal } => {
                    core.child_exit(&worker, pid, code, signal.as_deref()).await;
                    return;
                }
            }
        }
        // Transport dropped without an exit notification.
        core.child_exit(&worker, pid, None, None).await;
    }

    fn child_online(&self, worker: &Arc<Worker>, pid: u32) {
        worker.set_state(WorkerState::Online);
        if let Some(channel) = self.registry.channel(worker.id().as_str()) {
            channel.send(ToWorker::Bootstrap {
                id: worker.id().clone(),
                keep_alive: worker.keep_alive(),
            });
        }

        let reborn = self
            .registry
            .pid_record(pid)
            .map(|r| r.reborn)
            .unwrap_or(false);
        self.bus.publish(
            ClusterEvent::now(ClusterEventKind::Online)
                .with_id(worker.id().clone())
                .with_pid(pid)
                .with_reborn(reborn),
        );

        // Only the first birth of an ID announces itself.
        if !reborn {
            let listeners = self
                .online_listeners
                .lock()
                .expect("online listeners poisoned")
                .clone();
            for listener in listeners {
                listener(worker);
            }
        }
    }

    fn child_error(&self, worker: &Arc<Worker>, err: String) {
        self.bus.publish(
            ClusterEvent::now(ClusterEventKind::Errored)
                .with_id(worker.id().clone())
                .with_error(err.clone()),
        );
        worker.fire_local("error", &[Value::String(err)]);
    }

    async fn child_exit(
        self: &Arc<Self>,
        worker: &Arc<Worker>,
        pid: u32,
        code: Option<i32>,
        signal: Option<&str>,
    ) {
        let record = self.registry.take_pid(pid);
        if let Some(record) = &record {
            debug_assert_eq!(record.id, *worker.id());
        }
        let keep_alive = record.map(|r| r.keep_alive).unwrap_or(worker.keep_alive());
        self.registry.remove_channel(worker.id().as_str());

        self.bus.publish(
            ClusterEvent::now(ClusterEventKind::Exited)
                .with_id(worker.id().clone())
                .with_pid(pid)
                .with_exit(code, signal),
        );

        let class = if self.closing.is_cancelled() {
            ExitClass::Terminal
        } else {
            classify_exit(code, signal, keep_alive)
        };

        match class {
            ExitClass::Reboot | ExitClass::Accidental => {
                self.bus.publish(
                    ClusterEvent::now(ClusterEventKind::Respawned).with_id(worker.id().clone()),
                );
                if let Err(e) = self.spawn_child(worker, true).await {
                    tracing::warn!(id = %worker.id(), error = %e, "respawn failed, closing worker");
                    self.finalize_exit(worker, code, signal);
                }
            }
            ExitClass::Terminal => {
                self.registry.remove_pump(worker.id().as_str());
                self.finalize_exit(worker, code, signal);
            }
        }
    }

    fn finalize_exit(&self, worker: &Arc<Worker>, code: Option<i32>, signal: Option<&str>) {
        worker.set_state(WorkerState::Closed);
        worker.fire_local("exit", &[json!(code), json!(signal)]);
        self.registry.remove_worker(worker.id().as_str());
        self.recompute_listener_budget();

        let listeners = self
            .exit_listeners
            .lock()
            .expect("exit listeners poisoned")
            .clone();
        for listener in listeners {
            listener(worker, code, signal);
        }
    }

    /// Routes one inbound envelope from a child.
    fn route(&self, from: &Arc<Worker>, env: ToMaster) {
        match env {
            ToMaster::User { id, event, data } => self.dispatch_user(&id, &event, &data),
            ToMaster::Transmit {
                receivers,
                event,
                data,
                ..
            } => self.fan_out(&receivers, &event, &data),
            ToMaster::Broadcast { event, data, .. } => self.fan_out_all(&event, &data),
            ToMaster::GetWorkers { .. } => {
                if let Some(channel) = self.registry.channel(from.id().as_str()) {
                    channel.send(ToWorker::Workers {
                        workers: self.registry.online_descriptors(),
                    });
                }
            }
        }
    }

    /// Fires master-side listeners of the handle with the given ID.
    fn dispatch_user(&self, id: &WorkerId, event: &str, data: &[Value]) {
        if EventName::is_reserved(event) {
            tracing::warn!(%id, event, "dropping reserved event from child");
            return;
        }
        if let Some(worker) = self.registry.worker(id.as_str()) {
            worker.fire_local(event, data);
        }
    }

    /// Delivers a user event to the named workers' channels.
    fn fan_out(&self, receivers: &[WorkerId], event: &str, data: &[Value]) {
        if EventName::is_reserved(event) {
            tracing::warn!(event, "dropping reserved event in relay");
            return;
        }
        for rid in receivers {
            match self.registry.channel(rid.as_str()) {
                Some(channel) => channel.send(ToWorker::User {
                    event: event.to_string(),
                    data: data.to_vec(),
                }),
                None => tracing::debug!(%rid, event, "no channel for receiver, dropping"),
            }
        }
    }

    /// Delivers a user event to every live channel.
    fn fan_out_all(&self, event: &str, data: &[Value]) {
        if EventName::is_reserved(event) {
            tracing::warn!(event, "dropping reserved event in broadcast");
            return;
        }
        for channel in self.registry.channels_snapshot() {
            channel.send(ToWorker::User {
                event: event.to_string(),
                data: data.to_vec(),
            });
        }
    }

    // ---------------------------
    // Cluster-level surface
    // ---------------------------

    pub(crate) fn class_to(&self, receivers: Vec<WorkerId>) {
        *self.class_receivers.lock().expect("class receivers poisoned") = Some(receivers);
    }

    pub(crate) fn class_emit(&self, event: &str, data: Vec<Value>) -> bool {
        let receivers = self
            .class_receivers
            .lock()
            .expect("class receivers poisoned")
            .take();
        if EventName::is_reserved(event) {
            return false;
        }
        if let Some(receivers) = receivers {
            self.fan_out(&receivers, event, &data);
        }
        true
    }

    pub(crate) fn class_broadcast(&self, event: &str, data: Vec<Value>) -> bool {
        if EventName::is_reserved(event) {
            return false;
        }
        self.fan_out_all(event, &data);
        true
    }

    pub(crate) fn add_online_listener(&self, listener: OnlineListener) {
        self.online_listeners
            .lock()
            .expect("online listeners poisoned")
            .push(listener);
    }

    pub(crate) fn add_exit_listener(&self, listener: ExitListener) {
        self.exit_listeners
            .lock()
            .expect("exit listeners poisoned")
            .push(listener);
    }

    pub(crate) fn get(&self, id: &str) -> Option<Arc<Worker>> {
        self.registry.worker(id)
    }

    pub(crate) fn online(&self) -> Vec<Arc<Worker>> {
        self.registry.online()
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn listener_budget(&self) -> usize {
        self.listener_budget.load(AtomicOrdering::Relaxed)
    }

    fn recompute_listener_budget(&self) {
        let sum: usize = self
            .registry
            .workers_snapshot()
            .iter()
            .map(|w| w.emitter().max())
            .sum();
        self.listener_budget
            .store(self.cfg.base_listeners + sum, AtomicOrdering::Relaxed);
    }

    /// Kills every child and waits up to the grace period for their
    /// pumps to drain. Respawn is disabled for the duration.
    pub(crate) async fn shutdown(&self) -> Result<(), ClusterError> {
        self.closing.cancel();
        self.bus
            .publish(ClusterEvent::now(ClusterEventKind::ShutdownRequested));

        let pumps = self.registry.drain_pumps();
        for channel in self.registry.channels_snapshot() {
            channel.kill();
        }

        let done = async {
            for (_, pump) in pumps {
                let _ = pump.await;
            }
        };
        match timeout(self.cfg.grace, done).await {
            Ok(()) => {
                self.bus
                    .publish(ClusterEvent::now(ClusterEventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.registry.channel_ids();
                self.bus
                    .publish(ClusterEvent::now(ClusterEventKind::GraceExceeded));
                Err(ClusterError::GraceExceeded {
                    grace: self.cfg.grace,
                    stuck,
                })
            }
        }
    }

    fn spawn_subscriber_listener(self: &Arc<Self>) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => subs.emit(&ev),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });
    }
}

#[async_trait]
impl Core for MasterCore {
    fn emit_from(
        &self,
        from: &Worker,
        receivers: Option<Vec<WorkerId>>,
        event: &str,
        data: &[Value],
    ) {
        match receivers {
            Some(receivers) => self.fan_out(&receivers, event, data),
            None => match self.registry.channel(from.id().as_str()) {
                Some(channel) => channel.send(ToWorker::User {
                    event: event.to_string(),
                    data: data.to_vec(),
                }),
                None => tracing::debug!(id = %from.id(), event, "no channel, dropping emit"),
            },
        }
    }

    fn broadcast_from(&self, _from: &Worker, event: &str, data: &[Value]) {
        self.fan_out_all(event, data);
    }

    fn exit_worker(&self, from: &Worker) {
        if let Some(channel) = self.registry.channel(from.id().as_str()) {
            channel.kill();
        }
    }

    fn reboot_worker(&self, from: &Worker) {
        from.set_state(WorkerState::Closed);
        if let Some(channel) = self.registry.remove_channel(from.id().as_str()) {
            channel.send(ToWorker::Reboot);
            self.bus.publish(
                ClusterEvent::now(ClusterEventKind::RebootSent).with_id(from.id().clone()),
            );
        }
    }

    fn note_listener(&self, _handle: &Arc<Worker>) {}

    fn listener_limits_changed(&self) {
        self.recompute_listener_budget();
    }

    async fn workers_for(&self, _from: &Arc<Worker>) -> Result<Vec<Arc<Worker>>, ClusterError> {
        Ok(self.registry.online())
    }
}
