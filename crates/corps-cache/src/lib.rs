//! Key/value cache with per-entry TTL.
//!
//! This crate provides the portal's shared read cache for slow-changing data
//! (cadet lists, news, achievements):
//! - Per-entry expiry, checked lazily on every read
//! - Named TTL presets for short, medium and long lived data
//! - An optional background sweep that bounds memory use
//!
//! # Example
//!
//! ```rust,ignore
//! use corps_cache::{keys, CacheConfig, TtlCache, TtlPreset};
//!
//! let cache = TtlCache::new(CacheConfig::default());
//! let _sweeper = cache.spawn_sweeper();
//!
//! cache.set_with_ttl(keys::CADETS, &cadets, TtlPreset::Short)?;
//! let cadets: Option<Vec<Cadet>> = cache.get(keys::CADETS)?;
//! ```

mod cache;
mod config;
mod error;
pub mod keys;
mod ttl;

pub use cache::{CacheEntry, CacheStats, SweepHandle, TtlCache};
pub use config::{CacheConfig, DEFAULT_SWEEP_INTERVAL};
pub use error::{CacheError, Result};
pub use ttl::{LONG_TTL, MEDIUM_TTL, SHORT_TTL, TtlPreset};
