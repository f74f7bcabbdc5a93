use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use async_trait::async_trait;

use crate::config::Config;
use crate::core::lifecycle::REBOOT_EXIT_CODE;
use crate::core::{Core, ExitListener, OnlineListener};
use crate::error::ClusterError;
use crate::events::{Bus, ClusterEvent, ClusterEventKind, EventName};
use crate::handle::{Worker, WorkerId, WorkerState};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::wire::{MasterLink, ToMaster, ToWorker, WorkerDescriptor};

/// Worker-side runtime: consumes the inbound envelope stream and wraps
/// outbound operations into control envelopes for the master hub.
pub(crate) struct WorkerCore {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    link: Arc<dyn MasterLink>,

    // Self handle, populated by the bootstrap envelope.
    self_slot: RwLock<Option<Arc<Worker>>>,
    ready_tx: watch::Sender<bool>,

    // Handles subscribed to the process-wide bus.
    bus_handles: Mutex<Vec<Weak<Worker>>>,

    // Online-set queries awaiting their response, in request order.
    pending_workers: Mutex<VecDeque<oneshot::Sender<Vec<WorkerDescriptor>>>>,

    online_listeners: Mutex<Vec<OnlineListener>>,
    exit_listeners: Mutex<Vec<ExitListener>>,
    listener_limit: AtomicUsize,

    me: Weak<WorkerCore>,
}

impl WorkerCore {
    pub(crate) fn new(
        link: Arc<dyn MasterLink>,
        inbound: mpsc::UnboundedReceiver<ToWorker>,
        cfg: Config,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Arc<Self> {
        let bus = Bus::new(cfg.bus_capacity);
        let subs = Arc::new(SubscriberSet::new(subscribers));
        let (ready_tx, _) = watch::channel(false);
        let limit = cfg.base_listeners;

        let core = Arc::new_cyclic(|me| Self {
            cfg,
            bus,
            subs,
            link,
            self_slot: RwLock::new(None),
            ready_tx,
            bus_handles: Mutex::new(Vec::new()),
            pending_workers: Mutex::new(VecDeque::new()),
            online_listeners: Mutex::new(Vec::new()),
            exit_listeners: Mutex::new(Vec::new()),
            listener_limit: AtomicUsize::new(limit),
            me: me.clone(),
        });
        core.spawn_subscriber_listener();
        tokio::spawn(Self::run(Arc::clone(&core), inbound));
        core
    }

    fn core_weak(&self) -> Weak<dyn Core> {
        let weak: Weak<dyn Core> = self.me.clone();
        weak
    }

    /// Consumes envelopes from the master until the link closes.
    async fn run(core: Arc<WorkerCore>, mut inbound: mpsc::UnboundedReceiver<ToWorker>) {
        while let Some(env) = inbound.recv().await {
            match env {
                ToWorker::Bootstrap { id, keep_alive } => core.on_bootstrap(id, keep_alive),
                ToWorker::User { event, data } => core.dispatch(&event, &data),
                ToWorker::Workers { workers } => core.resolve_workers(workers),
                ToWorker::Reboot => core.terminate(REBOOT_EXIT_CODE),
            }
        }
        // Master gone; dropping the senders fails pending queries.
        core.pending_workers
            .lock()
            .expect("pending queries poisoned")
            .clear();
    }

    fn on_bootstrap(&self, id: WorkerId, keep_alive: bool) {
        let created = {
            let mut slot = self.self_slot.write().expect("self slot poisoned");
            if slot.is_none() {
                let worker = Worker::create(
                    id.clone(),
                    keep_alive,
                    WorkerState::Online,
                    self.core_weak(),
                    self.cfg.max_listeners,
                );
                *slot = Some(Arc::clone(&worker));
                Some(worker)
            } else {
                None
            }
        };

        let Some(worker) = created else {
            return;
        };
        let _ = self.ready_tx.send(true);
        self.bus
            .publish(ClusterEvent::now(ClusterEventKind::Online).with_id(id));

        let listeners = self
            .online_listeners
            .lock()
            .expect("online listeners poisoned")
            .clone();
        for listener in listeners {
            listener(&worker);
        }
    }

    /// Re-emits a user event on the process-wide bus: every handle with a
    /// subscription fires, whichever ID the delivery was addressed through.
    fn dispatch(&self, event: &str, data: &[Value]) {
        if EventName::is_reserved(event) {
            tracing::warn!(event, "dropping reserved event from master");
            return;
        }
        let handles: Vec<Arc<Worker>> = {
            let mut registered = self.bus_handles.lock().expect("bus handles poisoned");
            registered.retain(|w| w.strong_count() > 0);
            registered.iter().filter_map(Weak::upgrade).collect()
        };
        for handle in handles {
            handle.fire_local(event, data);
        }
    }

    fn resolve_workers(&self, workers: Vec<WorkerDescriptor>) {
        let pending = self
            .pending_workers
            .lock()
            .expect("pending queries poisoned")
            .pop_front();
        match pending {
            Some(tx) => {
                let _ = tx.send(workers);
            }
            None => tracing::debug!("unsolicited worker list, dropping"),
        }
    }

    /// Terminates the current process.
    ///
    /// Exit listeners fire for a clean exit or a non-keep-alive worker;
    /// the reboot code is a respawn request and never announces an exit.
    fn terminate(&self, code: i32) -> ! {
        if code != REBOOT_EXIT_CODE {
            let me = self
                .self_slot
                .read()
                .expect("self slot poisoned")
                .clone();
            if let Some(worker) = me {
                if code == 0 || !worker.keep_alive() {
                    let listeners = self
                        .exit_listeners
                        .lock()
                        .expect("exit listeners poisoned")
                        .clone();
                    for listener in listeners {
                        listener(&worker, Some(code), None);
                    }
                }
            }
        }
        std::process::exit(code);
    }

    async fn await_ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        // The sender lives in self, so this resolves on bootstrap.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn self_handle(&self) -> Option<Arc<Worker>> {
        self.self_slot.read().expect("self slot poisoned").clone()
    }

    fn make_peer(&self, desc: WorkerDescriptor) -> Arc<Worker> {
        Worker::create(
            desc.id,
            desc.keep_alive,
            desc.state,
            self.core_weak(),
            self.cfg.max_listeners,
        )
    }

    /// Resolves this process's own handle, deferring until bootstrap.
    pub(crate) async fn self_worker(&self) -> Result<Arc<Worker>, ClusterError> {
        self.await_ready().await;
        self.self_handle().ok_or(ClusterError::LinkClosed)
    }

    /// Resolves the online worker set through the master.
    ///
    /// Waits for bootstrap, issues the query, and rebuilds handles from
    /// the response. The self ID maps to this process's own handle so
    /// listener registrations are never split across two objects.
    pub(crate) async fn query_workers(&self) -> Result<Vec<Arc<Worker>>, ClusterError> {
        let me = self.self_worker().await?;

        let (tx, rx) = oneshot::channel();
        self.pending_workers
            .lock()
            .expect("pending queries poisoned")
            .push_back(tx);
        self.link.send(ToMaster::GetWorkers {
            id: me.id().clone(),
        });

        let descriptors = rx.await.map_err(|_| ClusterError::LinkClosed)?;
        Ok(descriptors
            .into_iter()
            .map(|desc| {
                if desc.id == *me.id() {
                    Arc::clone(&me)
                } else {
                    self.make_peer(desc)
                }
            })
            .collect())
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

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn listener_budget(&self) -> usize {
        self.listener_limit.load(AtomicOrdering::Relaxed)
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
impl Core for WorkerCore {
    fn emit_from(
        &self,
        from: &Worker,
        receivers: Option<Vec<WorkerId>>,
        event: &str,
        data: &[Value],
    ) {
        let env = match receivers {
            Some(receivers) => ToMaster::Transmit {
                id: from.id().clone(),
                receivers,
                event: event.to_string(),
                data: data.to_vec(),
            },
            None => ToMaster::User {
                id: from.id().clone(),
                event: event.to_string(),
                data: data.to_vec(),
            },
        };
        self.link.send(env);
    }

    fn broadcast_from(&self, from: &Worker, event: &str, data: &[Value]) {
        self.link.send(ToMaster::Broadcast {
            id: from.id().clone(),
            event: event.to_string(),
            data: data.to_vec(),
        });
    }

    fn exit_worker(&self, _from: &Worker) {
        self.terminate(0);
    }

    fn reboot_worker(&self, _from: &Worker) {
        self.terminate(REBOOT_EXIT_CODE);
    }

    fn note_listener(&self, handle: &Arc<Worker>) {
        let mut registered = self.bus_handles.lock().expect("bus handles poisoned");
        let present = registered
            .iter()
            .filter_map(Weak::upgrade)
            .any(|w| Arc::ptr_eq(&w, handle));
        if !present {
            registered.push(Arc::downgrade(handle));
        }
    }

    fn listener_limits_changed(&self) {
        let mut handles: Vec<Arc<Worker>> = Vec::new();
        if let Some(me) = self.self_handle() {
            handles.push(me);
        }
        for worker in self
            .bus_handles
            .lock()
            .expect("bus handles poisoned")
            .iter()
            .filter_map(Weak::upgrade)
        {
            if !handles.iter().any(|h| Arc::ptr_eq(h, &worker)) {
                handles.push(worker);
            }
        }
        let sum: usize = handles.iter().map(|w| w.emitter().max()).sum();
        self.listener_limit
            .store(self.cfg.base_listeners + sum, AtomicOrdering::Relaxed);
    }

    async fn workers_for(&self, _from: &Arc<Worker>) -> Result<Vec<Arc<Worker>>, ClusterError> {
        self.query_workers().await
    }
}
