//! TTL cache with lazy expiry and a background sweep.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::ttl::deadline;

/// Entry stored in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry<V = Value> {
    /// Cached value.
    pub value: V,

    /// When this entry was written.
    pub created_at: Instant,

    /// Last instant at which the entry is still visible.
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Create a new entry that expires `ttl` from now.
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: deadline(now, ttl),
        }
    }

    /// Whether a reader at `now` may see this entry.
    pub fn is_visible_at(&self, now: Instant) -> bool {
        now <= self.expires_at
    }

    /// Time left before the entry expires.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Inner state protected by a mutex.
#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
}

impl CacheInner {
    /// Look up a visible entry, dropping it if it has expired.
    fn live_entry(&mut self, key: &str, now: Instant) -> Option<&CacheEntry> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => !entry.is_visible_at(now),
        };

        if expired {
            debug!(key = %key, "Cache entry expired, removing");
            self.entries.remove(key);
            return None;
        }

        self.entries.get(key)
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at >= now);
        before - self.entries.len()
    }
}

/// Shared key/value cache with per-entry TTL.
///
/// Values of any serializable type can be stored; the type is chosen per
/// call. Cloning the cache yields another handle onto the same store, so the
/// application builds one instance at startup and hands clones to consumers.
///
/// Expired entries are never returned: `get` and `has` check the deadline and
/// drop stale entries on the spot. `len` and `keys` report the physical store
/// and may include expired entries until the next sweep.
#[derive(Clone)]
pub struct TtlCache {
    inner: Arc<Mutex<CacheInner>>,
    config: CacheConfig,
}

impl TtlCache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store a value with the configured default TTL.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.config.default_ttl)
    }

    /// Store a value that expires after `ttl`.
    ///
    /// Any existing entry for `key` is replaced wholesale.
    pub fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: impl Into<Duration>,
    ) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        let ttl = ttl.into();

        let mut inner = self.inner.lock();
        inner
            .entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));

        trace!(
            key = %key,
            ttl_ms = ttl.as_millis() as u64,
            cache_size = inner.entries.len(),
            "Cache entry stored"
        );

        Ok(())
    }

    /// Get a value if present and not expired.
    ///
    /// Returns an error only when the stored value cannot be read back as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_value(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| CacheError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Get the stored value without decoding it.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let value = inner
            .live_entry(key, Instant::now())
            .map(|entry| entry.value.clone());

        if value.is_some() {
            trace!(key = %key, "Cache hit");
        } else {
            trace!(key = %key, "Cache miss");
        }

        value
    }

    /// Check whether a live entry exists for `key`.
    pub fn has(&self, key: &str) -> bool {
        self.inner.lock().live_entry(key, Instant::now()).is_some()
    }

    /// Remove an entry. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().entries.remove(key).is_some()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        debug!(count = count, "Cache cleared");
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// All stored keys, including expired ones not yet swept.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    /// Drop every entry whose deadline has passed.
    ///
    /// Called by the sweep task, but can also be called manually.
    pub fn sweep_expired(&self) -> usize {
        let count = self.inner.lock().sweep(Instant::now());
        if count > 0 {
            debug!(count = count, "Swept expired cache entries");
        }
        count
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let now = Instant::now();
        let live = inner
            .entries
            .values()
            .filter(|entry| entry.is_visible_at(now))
            .count();

        CacheStats {
            size: inner.entries.len(),
            live,
            expired_pending: inner.entries.len() - live,
        }
    }

    /// Start the periodic sweep on the current tokio runtime.
    ///
    /// Returns `None` when the sweep task is disabled in the config. The task
    /// stops when the handle is dropped or when every cache handle is gone.
    pub fn spawn_sweeper(&self) -> Option<SweepHandle> {
        if !self.config.enable_sweep_task {
            return None;
        }

        let period = self.config.sweep_interval;
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(sweep_loop(weak, period));

        debug!(interval_secs = period.as_secs(), "Cache sweep task started");
        Some(SweepHandle { handle })
    }
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("size", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

async fn sweep_loop(inner: Weak<Mutex<CacheInner>>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            debug!("Cache dropped, stopping sweep task");
            break;
        };

        let count = inner.lock().sweep(Instant::now());
        if count > 0 {
            debug!(count = count, "Swept expired cache entries");
        }
    }
}

/// Handle to the background sweep task. Dropping it stops the task.
#[derive(Debug)]
pub struct SweepHandle {
    handle: JoinHandle<()>,
}

impl SweepHandle {
    /// Stop the sweep task.
    pub fn stop(self) {}
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries physically stored.
    pub size: usize,

    /// Entries still visible to readers.
    pub live: usize,

    /// Expired entries waiting for a read or a sweep.
    pub expired_pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ttl::{SHORT_TTL, TtlPreset};
    use serde::Deserialize;
    use tokio::time::{advance, sleep};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Cadet {
        name: String,
        platoon: String,
        squad: u8,
    }

    fn cadet(name: &str) -> Cadet {
        Cadet {
            name: name.to_string(),
            platoon: "10-1".to_string(),
            squad: 1,
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = TtlCache::new(CacheConfig::new());

        cache.set("cadets", &vec![cadet("Petrov")]).unwrap();

        let cadets: Vec<Cadet> = cache.get("cadets").unwrap().unwrap();
        assert_eq!(cadets, vec![cadet("Petrov")]);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let cache = TtlCache::new(CacheConfig::new());

        let value: Option<String> = cache.get("nothing").unwrap();
        assert_eq!(value, None);
        assert!(!cache.has("nothing"));
    }

    #[tokio::test]
    async fn test_expiry_with_real_clock() {
        let cache = TtlCache::new(CacheConfig::new());

        cache
            .set_with_ttl("k", "v", Duration::from_millis(100))
            .unwrap();
        let value: Option<String> = cache.get("k").unwrap();
        assert_eq!(value.as_deref(), Some("v"));

        sleep(Duration::from_millis(150)).await;

        let value: Option<String> = cache.get("k").unwrap();
        assert_eq!(value, None);
        assert!(!cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_visible_until_deadline() {
        let cache = TtlCache::new(CacheConfig::new());
        cache.set_with_ttl("k", &1, Duration::from_secs(5)).unwrap();

        advance(Duration::from_secs(5)).await;
        assert!(cache.has("k"));

        advance(Duration::from_millis(1)).await;
        assert!(!cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_removes_expired_entry() {
        let cache = TtlCache::new(CacheConfig::new());
        cache.set_with_ttl("k", &1, Duration::from_secs(1)).unwrap();

        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.keys(), vec!["k".to_string()]);

        let value: Option<i32> = cache.get("k").unwrap();
        assert_eq!(value, None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let cache = TtlCache::new(CacheConfig::new());

        cache.set("k", "v1").unwrap();
        cache.set("k", "v2").unwrap();

        let value: Option<String> = cache.get("k").unwrap();
        assert_eq!(value.as_deref(), Some("v2"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_expiry() {
        let cache = TtlCache::new(CacheConfig::new());
        cache.set_with_ttl("k", "v1", Duration::from_secs(10)).unwrap();

        advance(Duration::from_secs(8)).await;
        cache.set_with_ttl("k", "v2", Duration::from_secs(10)).unwrap();

        advance(Duration::from_secs(8)).await;
        let value: Option<String> = cache.get("k").unwrap();
        assert_eq!(value.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_default_ttl_from_config() {
        let config = CacheConfig::new().with_default_ttl(SHORT_TTL);
        let cache = TtlCache::new(config);

        cache.set("k", &true).unwrap();

        let remaining = cache.inner.lock().entries["k"].remaining();
        assert!(remaining <= SHORT_TTL);
        assert!(remaining > SHORT_TTL - Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_preset_ttl() {
        let cache = TtlCache::new(CacheConfig::new());
        cache.set_with_ttl("news", &["a", "b"], TtlPreset::Long).unwrap();

        let remaining = cache.inner.lock().entries["news"].remaining();
        assert!(remaining > TtlPreset::Medium.duration());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_decode_error() {
        let cache = TtlCache::new(CacheConfig::new());
        cache.set("k", "not a number").unwrap();

        let result: Result<Option<u32>> = cache.get("k");
        assert!(matches!(result, Err(CacheError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = TtlCache::new(CacheConfig::new());
        cache.set("k", "v").unwrap();

        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert!(!cache.has("k"));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = TtlCache::new(CacheConfig::new());
        for i in 1..=3 {
            cache.set(&format!("k{}", i), &i).unwrap();
        }
        assert_eq!(cache.len(), 3);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_store() {
        let cache = TtlCache::new(CacheConfig::new());
        let other = cache.clone();

        cache.set("k", "v").unwrap();
        assert!(other.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_sweep_after_clock_advance() {
        let cache = TtlCache::new(CacheConfig::new());
        cache
            .set_with_ttl("k", "v", Duration::from_millis(5000))
            .unwrap();
        assert_eq!(cache.len(), 1);

        advance(Duration::from_millis(5001)).await;

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_entries() {
        let cache = TtlCache::new(CacheConfig::new());
        cache.set_with_ttl("short", &1, Duration::from_secs(1)).unwrap();
        cache.set_with_ttl("long", &2, Duration::from_secs(60)).unwrap();

        advance(Duration::from_secs(2)).await;

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.keys(), vec!["long".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats() {
        let cache = TtlCache::new(CacheConfig::new());
        cache.set_with_ttl("a", &1, Duration::from_secs(1)).unwrap();
        cache.set_with_ttl("b", &2, Duration::from_secs(60)).unwrap();

        advance(Duration::from_secs(2)).await;

        assert_eq!(
            cache.stats(),
            CacheStats {
                size: 2,
                live: 1,
                expired_pending: 1,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep() {
        let config = CacheConfig::new().with_sweep_interval(Duration::from_secs(600));
        let cache = TtlCache::new(config);
        let _sweeper = cache.spawn_sweeper().unwrap();

        cache.set_with_ttl("k", "v", Duration::from_secs(5)).unwrap();

        sleep(Duration::from_secs(599)).await;
        assert_eq!(cache.len(), 1);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_disabled() {
        let cache = TtlCache::new(CacheConfig::new().with_sweep_task(false));
        assert!(cache.spawn_sweeper().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_when_handle_dropped() {
        let config = CacheConfig::new().with_sweep_interval(Duration::from_secs(1));
        let cache = TtlCache::new(config);
        let sweeper = cache.spawn_sweeper().unwrap();
        sweeper.stop();

        cache.set_with_ttl("k", "v", Duration::from_millis(10)).unwrap();
        sleep(Duration::from_secs(5)).await;

        assert_eq!(cache.len(), 1);
    }
}
