//! # Transport seams provided by the host program.
//!
//! The runtime does not fork processes or own file descriptors. The host
//! supplies:
//! - a [`Spawner`] that forks one child per request and returns its
//!   [`SpawnedChild`] bundle (PID, outbound channel, signal stream),
//! - on the worker side, a [`MasterLink`] for outbound envelopes plus an
//!   inbound `mpsc` receiver handed to
//!   [`Cluster::worker_side`](crate::Cluster::worker_side).
//!
//! ## Contract
//! - A spawner must set [`WORKER_ENV`](crate::role::WORKER_ENV) in the
//!   child environment so the child's role probe resolves to worker.
//! - Per channel, delivery order matches send order.
//! - [`ChildChannel::send`] and [`MasterLink::send`] are fire-and-forget;
//!   transport failures surface as [`ChildSignal::Error`], never as
//!   return values.
//! - After [`ChildSignal::Exit`] the transport stops emitting signals for
//!   that child; dropping the signal sender without an exit is treated as
//!   a closed channel.
//!
//! An in-memory implementation for tests and demos lives in
//! [`testing`](crate::testing).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::envelope::{ToMaster, ToWorker};
use crate::handle::WorkerId;

/// Asynchronous signal from one child's transport.
#[derive(Debug)]
pub enum ChildSignal {
    /// Child is ready to receive messages.
    Online,
    /// Envelope sent by the child.
    Message(ToMaster),
    /// Low-level channel error.
    Error(String),
    /// Child has terminated.
    Exit {
        /// Process exit code, absent when killed by a signal.
        code: Option<i32>,
        /// Terminating signal name, if any.
        signal: Option<String>,
    },
}

/// Outbound half of one child's duplex channel.
pub trait ChildChannel: Send + Sync + 'static {
    /// Queues an envelope for delivery to the child. Fire-and-forget.
    fn send(&self, envelope: ToWorker);

    /// Forcibly terminates the child process.
    fn kill(&self);
}

/// Everything the master needs to supervise one forked child.
pub struct SpawnedChild {
    /// OS-level PID of the child.
    pub pid: u32,
    /// Outbound channel to the child.
    pub channel: Arc<dyn ChildChannel>,
    /// Stream of lifecycle signals and inbound envelopes.
    pub signals: mpsc::UnboundedReceiver<ChildSignal>,
}

/// Forks child processes on behalf of the master.
#[async_trait]
pub trait Spawner: Send + Sync + 'static {
    /// Forks one child for the given worker ID.
    async fn spawn(&self, id: &WorkerId) -> std::io::Result<SpawnedChild>;
}

/// Worker-side outbound channel to the master process.
pub trait MasterLink: Send + Sync + 'static {
    /// Queues an envelope for delivery to the master. Fire-and-forget.
    fn send(&self, envelope: ToMaster);
}
