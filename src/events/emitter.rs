//! # Per-handle listener table.
//!
//! [`Emitter`] holds the ordered listener lists behind a worker handle's
//! `on`/`once` surface. The table is the unit of preservation across
//! respawn: a handle keeps one emitter for its whole life, so replacing
//! the child process under it never touches registered listeners.
//!
//! ## Rules
//! - Listeners fire in registration order.
//! - `once` entries are unregistered before their callback runs, so a
//!   listener that emits recursively cannot fire itself twice.
//! - Callbacks run outside the table lock; registering from inside a
//!   callback is allowed.
//! - Crossing the listener limit logs a warning but never rejects the
//!   registration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use serde_json::Value;
use std::sync::Arc;

use crate::handle::Worker;

/// Callback invoked with the bound handle and the event's positional data.
pub(crate) type EventListener = Arc<dyn Fn(&Worker, &[Value]) + Send + Sync>;

struct Entry {
    id: u64,
    once: bool,
    listener: EventListener,
}

/// Ordered listener lists keyed by event name.
pub(crate) struct Emitter {
    table: Mutex<HashMap<String, Vec<Entry>>>,
    next_id: AtomicU64,
    max: AtomicUsize,
}

impl Emitter {
    pub(crate) fn new(max_listeners: usize) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            max: AtomicUsize::new(max_listeners),
        }
    }

    /// Registers a listener under `event`, preserving registration order.
    pub(crate) fn on(&self, event: &str, listener: EventListener, once: bool) {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let mut table = self.table.lock().expect("emitter table poisoned");
        let entries = table.entry(event.to_string()).or_default();
        entries.push(Entry { id, once, listener });

        let limit = self.max.load(AtomicOrdering::Relaxed);
        if entries.len() == limit + 1 {
            tracing::warn!(
                event,
                listeners = entries.len(),
                limit,
                "listener limit exceeded"
            );
        }
    }

    /// Invokes every listener registered under `event`.
    ///
    /// `once` entries are removed before their callback runs. Returns the
    /// number of listeners invoked.
    pub(crate) fn fire(&self, bound: &Worker, event: &str, data: &[Value]) -> usize {
        let batch: Vec<EventListener> = {
            let mut table = self.table.lock().expect("emitter table poisoned");
            let Some(entries) = table.get_mut(event) else {
                return 0;
            };
            let batch = entries
                .iter()
                .map(|e| Arc::clone(&e.listener))
                .collect::<Vec<_>>();
            entries.retain(|e| !e.once);
            if entries.is_empty() {
                table.remove(event);
            }
            batch
        };

        for listener in &batch {
            listener(bound, data);
        }
        batch.len()
    }

    /// Number of listeners currently registered under `event`.
    pub(crate) fn listener_count(&self, event: &str) -> usize {
        self.table
            .lock()
            .expect("emitter table poisoned")
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Stable IDs of the listeners under `event`, in registration order.
    ///
    /// IDs survive respawn with the emitter; tests use them to check
    /// that listener lists are untouched by lifecycle churn.
    pub(crate) fn listener_ids(&self, event: &str) -> Vec<u64> {
        self.table
            .lock()
            .expect("emitter table poisoned")
            .get(event)
            .map(|entries| entries.iter().map(|e| e.id).collect())
            .unwrap_or_default()
    }

    pub(crate) fn set_max(&self, n: usize) {
        self.max.store(n, AtomicOrdering::Relaxed);
    }

    pub(crate) fn max(&self) -> usize {
        self.max.load(AtomicOrdering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{Worker, WorkerState};
    use serde_json::json;

    fn orphan() -> Arc<Worker> {
        Worker::orphan("t", WorkerState::Online)
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> EventListener {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Arc::new(move |_, _| log.lock().unwrap().push(tag.clone()))
    }

    #[test]
    fn fires_in_registration_order() {
        let w = orphan();
        let em = Emitter::new(10);
        let log = Arc::new(Mutex::new(Vec::new()));

        em.on("e", recorder(&log, "first"), false);
        em.on("e", recorder(&log, "second"), false);
        em.on("e", recorder(&log, "third"), false);

        assert_eq!(em.fire(&w, "e", &[json!(1)]), 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn once_entries_fire_a_single_time() {
        let w = orphan();
        let em = Emitter::new(10);
        let log = Arc::new(Mutex::new(Vec::new()));

        em.on("e", recorder(&log, "sticky"), false);
        em.on("e", recorder(&log, "oneshot"), true);

        em.fire(&w, "e", &[]);
        em.fire(&w, "e", &[]);

        assert_eq!(*log.lock().unwrap(), vec!["sticky", "oneshot", "sticky"]);
        assert_eq!(em.listener_count("e"), 1);
    }

    #[test]
    fn listener_ids_are_stable() {
        let em = Emitter::new(10);
        em.on("e", Arc::new(|_, _| {}), false);
        em.on("e", Arc::new(|_, _| {}), false);

        let before = em.listener_ids("e");
        assert_eq!(before.len(), 2);
        assert_eq!(em.listener_ids("e"), before);
    }

    #[test]
    fn missing_event_fires_nothing() {
        let w = orphan();
        let em = Emitter::new(10);
        assert_eq!(em.fire(&w, "nope", &[]), 0);
    }
}
