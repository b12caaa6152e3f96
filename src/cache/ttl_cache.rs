//! Generic TTL + LRU cache with hit/miss/eviction stats.
//!
//! A single mutex guards the whole map: hit rate, not throughput, is the
//! scaling axis here (per-cache contention is expected to be low since each
//! named cache in [`crate::cache::manager::CacheManager`] fronts a distinct
//! collaborator).

use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expire_at: Instant,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u64,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions_ttl: u64,
    pub evictions_lru: u64,
    pub evictions_memory_pressure: u64,
    pub hit_rate: f64,
    pub oldest_entry_age_secs: Option<f64>,
    pub newest_entry_age_secs: Option<f64>,
}

impl CacheStats {
    pub fn total_evictions(&self) -> u64 {
        self.evictions_ttl + self.evictions_lru + self.evictions_memory_pressure
    }
}

struct Inner<K, V> {
    map: HashMap<K, Entry<V>>,
    hits: u64,
    misses: u64,
    evictions_ttl: u64,
    evictions_lru: u64,
    evictions_memory_pressure: u64,
}

pub struct TTLCache<K, V> {
    default_ttl: Duration,
    max_size: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TTLCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(default_ttl: Duration, max_size: usize) -> Self {
        Self {
            default_ttl,
            max_size,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions_ttl: 0,
                evictions_lru: 0,
                evictions_memory_pressure: 0,
            }),
        }
    }

    /// Returns the stored value iff present and unexpired; otherwise removes
    /// the entry (if present-but-expired) and records a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("ttl cache lock poisoned");
        let expired = match inner.map.get(key) {
            Some(entry) => now >= entry.expire_at,
            None => {
                inner.misses += 1;
                return None;
            }
        };
        if expired {
            inner.map.remove(key);
            inner.evictions_ttl += 1;
            inner.misses += 1;
            return None;
        }
        inner.hits += 1;
        let entry = inner.map.get_mut(key).expect("just checked present");
        entry.last_accessed = now;
        entry.access_count += 1;
        Some(entry.value.clone())
    }

    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut inner = self.inner.lock().expect("ttl cache lock poisoned");
        inner.map.insert(
            key,
            Entry {
                value,
                expire_at: now + ttl,
                created_at: now,
                last_accessed: now,
                access_count: 0,
            },
        );
        Self::evict_lru_locked(&mut inner, self.max_size);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("ttl cache lock poisoned");
        inner.map.clear();
    }

    /// Evict least-recently-accessed entries (tie-break: oldest `created_at`)
    /// until `size <= max_size`. Returns the number evicted.
    fn evict_lru_locked(inner: &mut Inner<K, V>, max_size: usize) -> usize {
        let mut evicted = 0;
        while inner.map.len() > max_size {
            let victim = inner
                .map
                .iter()
                .min_by(|a, b| {
                    a.1.last_accessed
                        .cmp(&b.1.last_accessed)
                        .then(a.1.created_at.cmp(&b.1.created_at))
                })
                .map(|(k, _)| k.clone());
            match victim {
                Some(k) => {
                    inner.map.remove(&k);
                    inner.evictions_lru += 1;
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    /// Memory-pressure-driven eviction: evict up to `n` least-recently-used
    /// entries regardless of `max_size`. Used by the background monitor.
    pub fn evict_lru(&self, n: usize) -> usize {
        let mut inner = self.inner.lock().expect("ttl cache lock poisoned");
        let mut evicted = 0;
        for _ in 0..n {
            let victim = inner
                .map
                .iter()
                .min_by(|a, b| {
                    a.1.last_accessed
                        .cmp(&b.1.last_accessed)
                        .then(a.1.created_at.cmp(&b.1.created_at))
                })
                .map(|(k, _)| k.clone());
            match victim {
                Some(k) => {
                    inner.map.remove(&k);
                    inner.evictions_memory_pressure += 1;
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    pub fn get_stats(&self) -> CacheStats {
        let now = Instant::now();
        let inner = self.inner.lock().expect("ttl cache lock poisoned");
        let total = inner.hits + inner.misses;
        let hit_rate = if total > 0 {
            inner.hits as f64 / total as f64
        } else {
            0.0
        };
        let (oldest, newest) = if inner.map.is_empty() {
            (None, None)
        } else {
            let ages: Vec<f64> = inner
                .map
                .values()
                .map(|e| now.duration_since(e.created_at).as_secs_f64())
                .collect();
            let oldest = ages.iter().cloned().fold(f64::MIN, f64::max);
            let newest = ages.iter().cloned().fold(f64::MAX, f64::min);
            (Some(oldest), Some(newest))
        };
        CacheStats {
            size: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions_ttl: inner.evictions_ttl,
            evictions_lru: inner.evictions_lru,
            evictions_memory_pressure: inner.evictions_memory_pressure,
            hit_rate,
            oldest_entry_age_secs: oldest,
            newest_entry_age_secs: newest,
        }
    }

    /// Remove every entry whose TTL has expired. Intended for a periodic
    /// background sweep; `get` already reclaims expired entries lazily, so
    /// this is purely a memory-reclamation optimization.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("ttl cache lock poisoned");
        let expired_keys: Vec<K> = inner
            .map
            .iter()
            .filter(|(_, e)| now >= e.expire_at)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired_keys {
            inner.map.remove(key);
            inner.evictions_ttl += 1;
        }
        expired_keys.len()
    }
}
