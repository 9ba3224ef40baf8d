//! Bounded TTL cache in front of the durable store.
//!
//! Entries expire by write-time TTL, eviction removes the oldest entry by
//! write timestamp when the cache is full, and invalidation works either by
//! exact key or by substring pattern. A corrupt cached value is treated as a
//! miss, never surfaced as an error; callers fall back to the store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

mod keys;

pub use keys::CacheKey;

/// TTL defaults tuned per data volatility: wallet balances mutate often,
/// the realm/game catalogs barely change.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl: Duration,
    /// Key-prefix to TTL table, consulted when no explicit TTL is given.
    pub prefix_ttls: Vec<(String, Duration)>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Duration::from_secs(300),
            prefix_ttls: vec![
                ("wallet".to_string(), Duration::from_secs(120)),
                ("realms".to_string(), Duration::from_secs(600)),
                ("games".to_string(), Duration::from_secs(600)),
                ("user_transactions".to_string(), Duration::from_secs(30)),
                ("transactions".to_string(), Duration::from_secs(60)),
                ("conversion_fees".to_string(), Duration::from_secs(1800)),
            ],
        }
    }
}

struct Entry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

#[derive(Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    counters: Counters,
}

/// Cumulative cache statistics plus current size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// The process-wide TTL cache. Constructed explicitly and shared via `Arc`;
/// there is deliberately no global instance.
pub struct TtlCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl TtlCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Fetch a typed value. Expired or undecodable entries count as misses
    /// and are removed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut state = self.lock();
        let now = Instant::now();

        let value = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(key);
                state.counters.misses += 1;
                state.counters.evictions += 1;
                debug!(key, "cache entry expired");
                return None;
            }
            None => {
                state.counters.misses += 1;
                debug!(key, "cache miss");
                return None;
            }
        };

        match value.and_then(|v| serde_json::from_value(v).ok()) {
            Some(decoded) => {
                state.counters.hits += 1;
                debug!(key, "cache hit");
                Some(decoded)
            }
            None => {
                // Corrupt entry: drop it and report a miss.
                state.entries.remove(key);
                state.counters.misses += 1;
                warn!(key, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Store a value with an explicit TTL, or the TTL resolved from the
    /// key-prefix table (global default if no prefix matches).
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let encoded = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "skipping unencodable cache value");
                return;
            }
        };
        let ttl = ttl.unwrap_or_else(|| self.resolve_ttl(key));

        let mut state = self.lock();
        if !state.entries.contains_key(key) && state.entries.len() >= self.config.max_entries {
            self.evict_oldest(&mut state);
        }
        state.entries.insert(
            key.to_string(),
            Entry {
                value: encoded,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Read-through helper: cached value, or compute, store, and return.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key) {
            return Ok(cached);
        }
        let value = compute().await?;
        self.set(key, &value, ttl);
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().entries.remove(key);
    }

    /// Remove every entry whose key contains `pattern`. O(n) in cache size,
    /// acceptable because the cache is bounded. Returns the removal count.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|k, _| !k.contains(pattern));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(pattern, removed, "invalidated cache entries");
        }
        removed
    }

    /// Sweep out all expired entries. Intended to run on a periodic tick.
    pub fn cleanup(&self) -> usize {
        let mut state = self.lock();
        let now = Instant::now();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - state.entries.len();
        state.counters.evictions += removed as u64;
        removed
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            hits: state.counters.hits,
            misses: state.counters.misses,
            evictions: state.counters.evictions,
            size: state.entries.len(),
        }
    }

    fn resolve_ttl(&self, key: &str) -> Duration {
        self.config
            .prefix_ttls
            .iter()
            .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, ttl)| *ttl)
            .unwrap_or(self.config.default_ttl)
    }

    /// Approximate LRU: evict the single oldest entry by write timestamp.
    fn evict_oldest(&self, state: &mut CacheState) {
        let oldest = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            state.entries.remove(&key);
            state.counters.evictions += 1;
            debug!(key, "evicted oldest cache entry");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
