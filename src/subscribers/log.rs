//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] renders lifecycle events as human-readable log lines.
//!
//! ## Output format
//! ```text
//! [forked] worker=cache pid=312
//! [online] worker=cache pid=312 reborn=false
//! [exited] worker=cache pid=312 code=Some(1) signal=None
//! [respawned] worker=cache
//! [shutdown-requested]
//! ```

use async_trait::async_trait;

use crate::events::{ClusterEvent, ClusterEventKind};

use super::Subscribe;

/// Built-in logging subscriber.
///
/// Enabled via the `logging` feature. Not intended for production;
/// implement a custom [`Subscribe`] for structured export.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &ClusterEvent) {
        match e.kind {
            ClusterEventKind::Forked => {
                tracing::info!("[forked] worker={:?} pid={:?}", e.id, e.pid);
            }
            ClusterEventKind::Online => {
                tracing::info!(
                    "[online] worker={:?} pid={:?} reborn={}",
                    e.id,
                    e.pid,
                    e.reborn
                );
            }
            ClusterEventKind::Exited => {
                tracing::info!(
                    "[exited] worker={:?} pid={:?} code={:?} signal={:?}",
                    e.id,
                    e.pid,
                    e.code,
                    e.signal
                );
            }
            ClusterEventKind::Respawned => {
                tracing::info!("[respawned] worker={:?}", e.id);
            }
            ClusterEventKind::RebootSent => {
                tracing::info!("[reboot-sent] worker={:?}", e.id);
            }
            ClusterEventKind::Errored => {
                tracing::warn!("[errored] worker={:?} err={:?}", e.id, e.error);
            }
            ClusterEventKind::ShutdownRequested => {
                tracing::info!("[shutdown-requested]");
            }
            ClusterEventKind::AllStoppedWithin => {
                tracing::info!("[all-stopped-within-grace]");
            }
            ClusterEventKind::GraceExceeded => {
                tracing::warn!("[grace-exceeded]");
            }
            ClusterEventKind::SubscriberOverflow => {
                tracing::warn!("[subscriber-overflow] err={:?}", e.error);
            }
            ClusterEventKind::SubscriberPanicked => {
                tracing::warn!("[subscriber-panicked] err={:?}", e.error);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
