//! In-memory result cache with TTL expiry and LRU eviction
//!
//! Entries expire after their time-to-live and are removed on the read that
//! observes the expiry or by the periodic sweep, whichever happens first. When
//! the cache is full the least recently accessed entry (by last `get` or `set`)
//! is evicted before a new key is inserted.
//!
//! A cached value may itself represent "nothing found". Callers distinguish a
//! cached negative result from a miss by whether `get` returned `Some`.

use super::sweeper::SweepTask;
use crate::config::PipelineSettings;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Build a cache key of the form `<namespace>:<query>`.
///
/// ```
/// use platebot_core::pipeline::cache_key;
/// assert_eq!(cache_key("vehicle", "12345678"), "vehicle:12345678");
/// ```
#[must_use]
pub fn cache_key(namespace: &str, query: &str) -> String {
    format!("{namespace}:{query}")
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
    last_access: Instant,
    // Logical clock; orders accesses that share an `Instant`
    recency: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Metadata about one cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    /// When the entry was stored
    pub created_at: Instant,
    /// When the entry stops being served
    pub expires_at: Instant,
    /// Time left before expiry; zero once expired
    pub remaining_ttl: Duration,
    /// Number of hits served from this entry
    pub access_count: u64,
    /// Last `get` or `set` of this entry
    pub last_access: Instant,
    /// Whether the entry has expired but not been removed yet
    pub expired: bool,
}

/// Cache counters and size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that returned nothing
    pub misses: u64,
    /// Stored values
    pub sets: u64,
    /// Removed entries (explicit, expired or evicted)
    pub deletes: u64,
    /// LRU evictions
    pub evictions: u64,
    /// Sweeps that removed at least one entry
    pub cleanups: u64,
    /// `hits + misses`
    pub total_requests: u64,
    /// Hit percentage rounded to two decimals
    pub hit_rate: f64,
    /// Entries currently stored
    pub current_size: usize,
    /// Capacity
    pub max_size: usize,
    /// Default time-to-live in milliseconds
    pub ttl_ms: u128,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    cleanups: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.sets,
            &self.deletes,
            &self.evictions,
            &self.cleanups,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[derive(Debug)]
struct CacheState<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    clock: AtomicU64,
    counters: Counters,
    ttl: Duration,
    max_size: usize,
}

impl<V> CacheState<V> {
    /// Next recency stamp. Callers must hold the `entries` lock so stamps
    /// follow lock acquisition order.
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            Counters::bump(&self.counters.deletes, removed as u64);
            Counters::bump(&self.counters.cleanups, 1);
            debug!(removed, "Cache sweep removed expired entries");
        }
        removed
    }
}

/// TTL + LRU cache shared by all lookup kinds.
///
/// # Examples
///
/// ```
/// use platebot_core::pipeline::ResultCache;
/// use std::time::Duration;
///
/// let cache: ResultCache<Option<u32>> = ResultCache::new(Duration::from_secs(60), 100, Duration::ZERO);
/// cache.set("vehicle:1234567", None, None);
/// // Cached negative result is still a hit
/// assert_eq!(cache.get("vehicle:1234567"), Some(None));
/// assert_eq!(cache.get("vehicle:7654321"), None);
/// ```
#[derive(Debug)]
pub struct ResultCache<V> {
    state: Arc<CacheState<V>>,
    sweeper: Option<SweepTask>,
}

impl<V> ResultCache<V>
where
    V: Clone + Send + 'static,
{
    /// Create a cache with the default `ttl` and capacity `max_size`.
    ///
    /// Inside a tokio runtime, expired entries are swept every
    /// `cleanup_interval`; a zero interval disables the sweep.
    #[must_use]
    pub fn new(ttl: Duration, max_size: usize, cleanup_interval: Duration) -> Self {
        let state = Arc::new(CacheState {
            entries: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
            ttl,
            max_size: max_size.max(1),
        });
        let sweeper = SweepTask::spawn("result_cache", Arc::downgrade(&state), cleanup_interval, |s| {
            s.sweep(Instant::now());
        });
        Self { state, sweeper }
    }

    /// Create a cache from pipeline settings
    #[must_use]
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(
            settings.cache_ttl(),
            settings.cache_max_size,
            settings.cache_cleanup_interval(),
        )
    }

    /// Store `value` under `key`, with `ttl` overriding the default.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.set_at(key, value, ttl, Instant::now());
    }

    /// Same as [`ResultCache::set`] with an explicit clock reading.
    pub fn set_at(&self, key: impl Into<String>, value: V, ttl: Option<Duration>, now: Instant) {
        let key = key.into();
        let state = &self.state;
        let mut entries = state.entries.lock();
        let recency = state.tick();

        if !entries.contains_key(&key) && entries.len() >= state.max_size {
            let victim = entries
                .iter()
                .min_by_key(|(_, e)| e.recency)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                entries.remove(&victim);
                Counters::bump(&state.counters.evictions, 1);
                Counters::bump(&state.counters.deletes, 1);
                debug!(key = %victim, "Cache evicted least recently used entry");
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl.unwrap_or(state.ttl),
                access_count: 0,
                last_access: now,
                recency,
            },
        );
        drop(entries);
        Counters::bump(&state.counters.sets, 1);
    }

    /// Fetch the value stored under `key`, or `None` on a miss.
    ///
    /// An expired entry counts as a miss and is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Same as [`ResultCache::get`] with an explicit clock reading.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let state = &self.state;
        let mut entries = state.entries.lock();
        let recency = state.tick();

        let Some(entry) = entries.get_mut(key) else {
            drop(entries);
            Counters::bump(&state.counters.misses, 1);
            return None;
        };

        if entry.is_expired(now) {
            entries.remove(key);
            drop(entries);
            Counters::bump(&state.counters.deletes, 1);
            Counters::bump(&state.counters.misses, 1);
            return None;
        }

        entry.access_count += 1;
        entry.last_access = now;
        entry.recency = recency;
        let value = entry.value.clone();
        drop(entries);
        Counters::bump(&state.counters.hits, 1);
        Some(value)
    }

    /// Returns `true` if `key` holds an unexpired entry. Does not count as an
    /// access.
    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, Instant::now())
    }

    /// Same as [`ResultCache::has`] with an explicit clock reading.
    pub fn has_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.state.entries.lock();
        match entries.get(key).map(|e| e.is_expired(now)) {
            None => false,
            Some(true) => {
                entries.remove(key);
                drop(entries);
                Counters::bump(&self.state.counters.deletes, 1);
                false
            }
            Some(false) => true,
        }
    }

    /// Remove `key`. Returns `true` if an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.state.entries.lock().remove(key).is_some();
        if removed {
            Counters::bump(&self.state.counters.deletes, 1);
        }
        removed
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut entries = self.state.entries.lock();
        let size = entries.len() as u64;
        entries.clear();
        drop(entries);
        Counters::bump(&self.state.counters.deletes, size);
    }

    /// Keys currently stored, expired ones included
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.entries.lock().keys().cloned().collect()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.entries.lock().len()
    }

    /// Returns `true` if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metadata about `key` without touching its recency
    #[must_use]
    pub fn info(&self, key: &str) -> Option<CacheInfo> {
        self.info_at(key, Instant::now())
    }

    /// Same as [`ResultCache::info`] with an explicit clock reading.
    #[must_use]
    pub fn info_at(&self, key: &str, now: Instant) -> Option<CacheInfo> {
        let entries = self.state.entries.lock();
        entries.get(key).map(|e| CacheInfo {
            created_at: e.created_at,
            expires_at: e.expires_at,
            remaining_ttl: e.expires_at.saturating_duration_since(now),
            access_count: e.access_count,
            last_access: e.last_access,
            expired: e.is_expired(now),
        })
    }

    /// Counters, hit rate and size
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let c = &self.state.counters;
        let hits = c.hits.load(Ordering::Relaxed);
        let misses = c.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;

        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if total_requests == 0 {
            0.0
        } else {
            (hits as f64 / total_requests as f64 * 10_000.0).round() / 100.0
        };

        CacheStats {
            hits,
            misses,
            sets: c.sets.load(Ordering::Relaxed),
            deletes: c.deletes.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            cleanups: c.cleanups.load(Ordering::Relaxed),
            total_requests,
            hit_rate,
            current_size: self.len(),
            max_size: self.state.max_size,
            ttl_ms: self.state.ttl.as_millis(),
        }
    }

    /// Zero all counters
    pub fn reset_stats(&self) {
        self.state.counters.reset();
    }

    /// Remove all expired entries now. Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.state.sweep(Instant::now())
    }

    /// Same as [`ResultCache::sweep`] with an explicit clock reading.
    pub fn sweep_at(&self, now: Instant) -> usize {
        self.state.sweep(now)
    }

    /// Stop the sweep task and drop every entry.
    pub fn destroy(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
        self.clear();
    }
}
