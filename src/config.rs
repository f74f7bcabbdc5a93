//! # Global runtime configuration.
//!
//! [`Config`] defines the cluster runtime behavior: shutdown grace period,
//! lifecycle bus capacity, and listener limits.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use procvisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.grace = Duration::from_secs(10);
//! cfg.max_listeners = 32;
//!
//! assert_eq!(cfg.max_listeners, 32);
//! ```

use std::time::Duration;

/// Global configuration for the cluster runtime.
///
/// Controls shutdown grace, lifecycle bus capacity, and listener limits.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for children to exit during shutdown.
    pub grace: Duration,
    /// Capacity of the lifecycle event bus channel.
    pub bus_capacity: usize,
    /// Default per-handle listener limit before a warning is logged.
    pub max_listeners: usize,
    /// Baseline added to the sum of per-handle limits when computing the
    /// cluster-wide listener budget. Covers the cluster-level `online` and
    /// `exit` subscriptions.
    pub base_listeners: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - `max_listeners = 10`
    /// - `base_listeners = 10`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            max_listeners: 10,
            base_listeners: 10,
        }
    }
}
