//! In-process TTL cache with namespaced invalidation
//!
//! Values are stored as `serde_json::Value` so any serializable aggregate
//! can live here. Expiry is checked lazily on `get`; a background sweep
//! every 10 minutes bounds memory for keys that are never read again.
//!
//! Keys follow two namespaces:
//! - `user:<id>:<suffix>` for per-user data
//! - `analytics:<id>:<type>[:<params>]` for aggregates (`<id>` may be the
//!   literal `global` for unscoped aggregates)
//!
//! Invalidation by user walks a secondary owner index (owner id -> key
//! set), so it touches only the affected keys instead of scanning the
//! whole map.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

/// Default TTL when callers don't specify one: 5 minutes
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Interval of the background expiry sweep: 10 minutes
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// One cached value with its expiry bookkeeping
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    written_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.written_at) > self.ttl
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Owner id -> keys in that owner's namespace
    by_owner: HashMap<String, HashSet<String>>,
}

impl CacheInner {
    fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            if let Some(owner) = owner_of(key) {
                if let Some(keys) = self.by_owner.get_mut(owner) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.by_owner.remove(owner);
                    }
                }
            }
        }
        removed
    }
}

/// Extract the owner id from a namespaced key, if it has one
fn owner_of(key: &str) -> Option<&str> {
    let rest = key
        .strip_prefix("user:")
        .or_else(|| key.strip_prefix("analytics:"))?;
    let end = rest.find(':')?;
    Some(&rest[..end])
}

/// Thread-safe in-process TTL cache
///
/// No LRU or size-based eviction: growth is bounded only by TTL expiry and
/// the sweep, which is fine at dashboard scale.
#[derive(Debug, Default)]
pub struct CacheStore {
    inner: RwLock<CacheInner>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value if present and fresh; expired entries are dropped here
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();

        {
            let inner = self.inner.read();
            match inner.entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: take the write lock and remove it
        let mut inner = self.inner.write();
        if let Some(entry) = inner.entries.get(key) {
            if entry.is_expired(now) {
                inner.remove(key);
            } else {
                // Refreshed between locks
                return Some(inner.entries[key].value.clone());
            }
        }
        None
    }

    /// Store a value under `key` for `ttl`
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut inner = self.inner.write();
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                written_at: Instant::now(),
                ttl,
            },
        );
        if let Some(owner) = owner_of(key) {
            let owner = owner.to_string();
            inner
                .by_owner
                .entry(owner)
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Remove a single key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.write().remove(key)
    }

    /// Number of live entries (expired-but-unswept included)
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// All current keys, for diagnostics
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().entries.keys().cloned().collect()
    }

    /// Return the cached value for `key` if fresh, else run `producer`,
    /// cache its result under `ttl`, and return it.
    ///
    /// The producer runs at most once per call. Two concurrent calls that
    /// both miss will both run their producers; the second write wins.
    /// Acceptable because producers are idempotent reads.
    pub async fn remember<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key) {
            if let Ok(value) = serde_json::from_value(cached) {
                return Ok(value);
            }
            // Shape changed since the entry was written; recompute
            self.delete(key);
        }

        let result = producer().await?;
        if let Ok(value) = serde_json::to_value(&result) {
            self.set(key, value, ttl);
        }
        Ok(result)
    }

    /// Delete every key in a user's namespace
    ///
    /// Covers both `user:<id>:*` and `analytics:<id>:*`. Keys owned by
    /// other users are untouched.
    pub fn invalidate_user(&self, user_id: &str) {
        let mut inner = self.inner.write();
        if let Some(keys) = inner.by_owner.remove(user_id) {
            for key in keys {
                inner.entries.remove(&key);
            }
        }
    }

    /// Remove all expired entries
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    /// Cache key for per-user data: `user:<id>:<suffix>`
    pub fn user_key(user_id: &str, suffix: &str) -> String {
        format!("user:{}:{}", user_id, suffix)
    }

    /// Cache key for analytics aggregates: `analytics:<id>:<type>[:<params>]`
    pub fn analytics_key(user_id: &str, stat_type: &str, params: Option<&str>) -> String {
        match params {
            Some(p) => format!("analytics:{}:{}:{}", user_id, stat_type, p),
            None => format!("analytics:{}:{}", user_id, stat_type),
        }
    }

    /// Spawn the periodic sweep task for a shared cache
    pub fn spawn_sweeper(cache: Arc<CacheStore>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await; // first tick is immediate
            loop {
                interval.tick().await;
                let removed = cache.cleanup();
                if removed > 0 {
                    eprintln!("[Cache] Sweep removed {} expired entries", removed);
                }
            }
        })
    }
}
