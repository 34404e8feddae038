//! FX rate caching with TTL support.
//!
//! A single reader/writer lock guards the whole entry map. Reads (`get`,
//! `len`, `stats`) share it; writes and the background sweep take it
//! exclusively. Expired entries stay in the map, invisible to `get`, until the
//! sweep removes them.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use parking_lot::RwLock;
use ratekeeper_common::{constants, CurrencyPair};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{FxError, FxResult};

/// Cache key. `date: None` is the "latest" key space, distinct from every
/// explicit date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    pair: CurrencyPair,
    date: Option<NaiveDate>,
}

impl CacheKey {
    fn new(pair: &CurrencyPair, date: Option<NaiveDate>) -> Self {
        Self {
            pair: pair.clone(),
            date,
        }
    }
}

/// Cached rate entry.
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    rate: f64,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Configuration for rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Lifetime of every cached rate.
    pub ttl: Duration,
    /// How often the background sweep drops expired entries.
    pub sweep_interval: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: constants::cache_ttl(),
            sweep_interval: constants::sweep_interval(),
        }
    }
}

impl RateCacheConfig {
    /// Config with the given TTL and the default sweep interval.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Default::default()
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> FxResult<()> {
        if self.ttl.is_zero() {
            return Err(FxError::InvalidConfig("Cache TTL cannot be 0".to_string()));
        }

        if self.sweep_interval.is_zero() {
            return Err(FxError::InvalidConfig(
                "Sweep interval cannot be 0".to_string(),
            ));
        }

        let max = constants::max_interval();
        if self.ttl > max {
            return Err(FxError::InvalidConfig(format!(
                "Cache TTL cannot exceed {}s",
                max.as_secs()
            )));
        }

        if self.sweep_interval > max {
            return Err(FxError::InvalidConfig(format!(
                "Sweep interval cannot exceed {}s",
                max.as_secs()
            )));
        }

        Ok(())
    }
}

/// Thread-safe rate cache with TTL.
pub struct RateCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a cache with the given TTL and no background sweep.
    pub fn new(ttl: Duration) -> Self {
        Self::with_config(RateCacheConfig::with_ttl(ttl))
    }

    /// Create a cache with custom configuration and no background sweep.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Create a shared cache and start its background sweep.
    ///
    /// The sweep runs until [`SweeperHandle::shutdown`] is awaited, the handle
    /// is dropped, or every `Arc` to the cache is gone. Must be called from
    /// within a Tokio runtime; panics if `sweep_interval` is zero.
    pub fn spawn(config: RateCacheConfig) -> (Arc<Self>, SweeperHandle) {
        let interval = config.sweep_interval;
        let cache = Arc::new(Self::with_config(config));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_sweep_loop(
            Arc::downgrade(&cache),
            interval,
            shutdown_rx,
        ));

        info!(
            ttl_secs = cache.config.ttl.as_secs_f64(),
            sweep_interval_secs = interval.as_secs_f64(),
            "Rate cache started"
        );

        (cache, SweeperHandle { shutdown_tx, handle })
    }

    /// Get a rate if present and not expired.
    pub fn get(&self, pair: &CurrencyPair, date: Option<NaiveDate>) -> Option<f64> {
        let key = CacheKey::new(pair, date);
        let entries = self.entries.read();

        match entries.get(&key) {
            Some(entry) if !entry.is_expired_at(Instant::now()) => {
                debug!(pair = %pair, ?date, "Cache hit");
                Some(entry.rate)
            }
            Some(_) => {
                debug!(pair = %pair, ?date, "Cache entry expired");
                None
            }
            None => {
                debug!(pair = %pair, ?date, "Cache miss");
                None
            }
        }
    }

    /// Insert or overwrite a rate, restarting its TTL.
    pub fn set(&self, pair: &CurrencyPair, date: Option<NaiveDate>, rate: f64) {
        let entry = CacheEntry {
            rate,
            expires_at: Instant::now() + self.config.ttl,
        };
        self.entries.write().insert(CacheKey::new(pair, date), entry);
    }

    /// Remove a rate from cache.
    pub fn delete(&self, pair: &CurrencyPair, date: Option<NaiveDate>) {
        self.entries.write().remove(&CacheKey::new(pair, date));
    }

    /// Clear all cached rates.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        let now = Instant::now();
        let expired = entries.values().filter(|e| e.is_expired_at(now)).count();

        CacheStats {
            total_items: entries.len(),
            valid_items: entries.len() - expired,
            expired_items: expired,
            ttl_seconds: self.config.ttl.as_secs_f64(),
        }
    }

    /// Drop every expired entry, holding the write lock for the whole scan.
    pub(crate) fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }
}

async fn run_sweep_loop(
    cache: Weak<RateCache>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "Swept expired rates");
                }
            }
        }
    }

    debug!("Rate cache sweeper stopped");
}

/// Owned handle to a cache's background sweep.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.handle.await {
            warn!(error = %e, "Rate cache sweeper ended abnormally");
        }
    }

    /// Whether the sweep task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_items: usize,
    pub valid_items: usize,
    pub expired_items: usize,
    pub ttl_seconds: f64,
}
