//! Cluster events: name classification, lifecycle records, and the bus.
//!
//! ## Contents
//! - [`EventName`] classification of event names into lifecycle, control,
//!   and user classes; the reserved-name guard of the `emit` surface
//! - [`ClusterEvent`], [`ClusterEventKind`] lifecycle observability records
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//! - `Emitter` (crate-internal) per-handle listener table
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod emitter;
mod event;
mod name;

pub use bus::Bus;
pub use event::{ClusterEvent, ClusterEventKind};
pub use name::{ControlName, EventName, LifecycleName};

pub(crate) use emitter::{Emitter, EventListener};
