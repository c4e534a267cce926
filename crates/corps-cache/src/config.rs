//! Configuration for the TTL cache.

use std::time::Duration;

use crate::ttl::MEDIUM_TTL;

/// Default interval between background sweeps (10 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Configuration for the TTL cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied by [`TtlCache::set`](crate::TtlCache::set).
    pub default_ttl: Duration,

    /// Whether [`TtlCache::spawn_sweeper`](crate::TtlCache::spawn_sweeper) starts a task.
    /// If false, expired entries are only dropped on access or manual sweeps.
    pub enable_sweep_task: bool,

    /// Interval for the sweep task.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: MEDIUM_TTL,
            enable_sweep_task: true,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL used when callers do not pass one.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enable or disable the background sweep task.
    pub fn with_sweep_task(mut self, enabled: bool) -> Self {
        self.enable_sweep_task = enabled;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
