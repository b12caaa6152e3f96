//! Process-wide registry of named [`TTLCache`]s with a background
//! memory-pressure monitor.
//!
//! Deliberately not a singleton: construct one per process (or per test) via
//! [`CacheManager::init_default`], and call [`CacheManager::shutdown`] to
//! stop its background task. No `OnceLock`/`lazy_static`, no hidden global.

use super::ttl_cache::{CacheStats, TTLCache};
use crate::comments::types::ReferenceComment;
use crate::forecast::types::ForecastCollection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

const API_RESPONSES_TTL: Duration = Duration::from_secs(300);
const API_RESPONSES_MAX: usize = 500;
const COMMENTS_TTL: Duration = Duration::from_secs(3600);
const COMMENTS_MAX: usize = 1000;
const WEATHER_FORECASTS_TTL: Duration = Duration::from_secs(600);
const WEATHER_FORECASTS_MAX: usize = 200;

/// Defaults applied to a named cache auto-created by [`CacheManager::get_cache`].
const NAMED_CACHE_DEFAULT_TTL: Duration = API_RESPONSES_TTL;
const NAMED_CACHE_DEFAULT_MAX: usize = API_RESPONSES_MAX;

const MEMORY_PRESSURE_POLL_INTERVAL: Duration = Duration::from_secs(30);
const MEMORY_PRESSURE_EVICT_FRACTION: f64 = 0.1;

/// Construction parameters for a cache created via [`CacheManager::create_cache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: NAMED_CACHE_DEFAULT_TTL,
            max_size: NAMED_CACHE_DEFAULT_MAX,
        }
    }
}

pub struct CacheManager {
    pub api_responses: Arc<TTLCache<String, serde_json::Value>>,
    pub comments: Arc<TTLCache<String, Vec<ReferenceComment>>>,
    pub weather_forecasts: Arc<TTLCache<String, ForecastCollection>>,
    /// Additional caches created on demand by name, per §4.3's
    /// `get_cache`/`create_cache` contract. Keyed on the name passed in.
    named: Mutex<HashMap<String, Arc<TTLCache<String, serde_json::Value>>>>,
    monitor_handle: Option<JoinHandle<()>>,
}

impl CacheManager {
    /// Construct the three default caches the system always needs, with no
    /// background monitor running yet.
    pub fn new() -> Self {
        Self {
            api_responses: Arc::new(TTLCache::new(API_RESPONSES_TTL, API_RESPONSES_MAX)),
            comments: Arc::new(TTLCache::new(COMMENTS_TTL, COMMENTS_MAX)),
            weather_forecasts: Arc::new(TTLCache::new(
                WEATHER_FORECASTS_TTL,
                WEATHER_FORECASTS_MAX,
            )),
            named: Mutex::new(HashMap::new()),
            monitor_handle: None,
        }
    }

    /// Fetch the named cache, auto-creating it with [`CacheConfig::default`]
    /// on first access. Subsequent calls with the same `name` return the
    /// same underlying cache.
    pub fn get_cache(&self, name: &str) -> Arc<TTLCache<String, serde_json::Value>> {
        let mut named = self.named.lock().expect("named cache registry poisoned");
        Arc::clone(
            named
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(TTLCache::new(CacheConfig::default().ttl, CacheConfig::default().max_size))),
        )
    }

    /// Create (or replace) the named cache with an explicit [`CacheConfig`].
    /// Unlike `get_cache`, this always builds a fresh cache even if `name`
    /// already exists — any entries in the previous cache are dropped.
    pub fn create_cache(&self, name: &str, config: CacheConfig) -> Arc<TTLCache<String, serde_json::Value>> {
        let cache = Arc::new(TTLCache::new(config.ttl, config.max_size));
        let mut named = self.named.lock().expect("named cache registry poisoned");
        named.insert(name.to_string(), Arc::clone(&cache));
        cache
    }

    /// Construct the default caches and start the memory-pressure monitor.
    pub fn init_default(memory_pressure_threshold_pct: f64) -> Self {
        let mut manager = Self::new();
        manager.start_memory_pressure_monitor(memory_pressure_threshold_pct);
        manager
    }

    fn start_memory_pressure_monitor(&mut self, threshold_pct: f64) {
        let api_responses = Arc::clone(&self.api_responses);
        let comments = Arc::clone(&self.comments);
        let weather_forecasts = Arc::clone(&self.weather_forecasts);

        let handle = tokio::spawn(async move {
            let mut system = sysinfo::System::new();
            let mut interval = tokio::time::interval(MEMORY_PRESSURE_POLL_INTERVAL);
            loop {
                interval.tick().await;
                system.refresh_memory();
                let total = system.total_memory();
                if total == 0 {
                    // Memory cannot be queried on this platform; best-effort
                    // no-op, never a correctness requirement.
                    continue;
                }
                let used_pct = (system.used_memory() as f64 / total as f64) * 100.0;
                if used_pct > threshold_pct {
                    let evicted_api = api_responses
                        .evict_lru(evict_count(api_responses.get_stats().size));
                    let evicted_comments =
                        comments.evict_lru(evict_count(comments.get_stats().size));
                    let evicted_weather =
                        weather_forecasts.evict_lru(evict_count(weather_forecasts.get_stats().size));
                    tracing::warn!(
                        used_pct,
                        evicted_api,
                        evicted_comments,
                        evicted_weather,
                        "memory pressure eviction triggered"
                    );
                }
            }
        });
        self.monitor_handle = Some(handle);
    }

    /// Stop the background monitor task. Consumes `self` since the manager
    /// is no longer usable afterward in the teacher's explicit-lifecycle
    /// style.
    pub fn shutdown(mut self) {
        if let Some(handle) = self.monitor_handle.take() {
            handle.abort();
        }
    }

    pub fn clear_all(&self) {
        self.api_responses.clear();
        self.comments.clear();
        self.weather_forecasts.clear();
        let named = self.named.lock().expect("named cache registry poisoned");
        for cache in named.values() {
            cache.clear();
        }
    }

    pub fn stats_summary(&self) -> HashMap<String, CacheStats> {
        let mut summary = HashMap::new();
        summary.insert("api_responses".to_string(), self.api_responses.get_stats());
        summary.insert("comments".to_string(), self.comments.get_stats());
        summary.insert(
            "weather_forecasts".to_string(),
            self.weather_forecasts.get_stats(),
        );
        let named = self.named.lock().expect("named cache registry poisoned");
        for (name, cache) in named.iter() {
            summary.insert(name.clone(), cache.get_stats());
        }
        summary
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

fn evict_count(size: usize) -> usize {
    ((size as f64) * MEMORY_PRESSURE_EVICT_FRACTION).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_three_default_caches_empty() {
        let manager = CacheManager::new();
        let summary = manager.stats_summary();
        assert_eq!(summary.len(), 3);
        assert!(summary.values().all(|s| s.size == 0));
    }

    #[test]
    fn clear_all_empties_every_cache() {
        let manager = CacheManager::new();
        manager
            .api_responses
            .set("k".to_string(), serde_json::json!({"a": 1}), None);
        manager.clear_all();
        assert_eq!(manager.api_responses.get_stats().size, 0);
    }

    #[test]
    fn evict_count_rounds_up() {
        assert_eq!(evict_count(9), 1);
        assert_eq!(evict_count(10), 1);
        assert_eq!(evict_count(11), 2);
        assert_eq!(evict_count(0), 0);
    }

    #[tokio::test]
    async fn init_default_starts_and_shutdown_stops_monitor() {
        let manager = CacheManager::init_default(80.0);
        assert!(manager.monitor_handle.is_some());
        manager.shutdown();
    }

    #[test]
    fn get_cache_auto_creates_with_defaults_and_is_idempotent() {
        let manager = CacheManager::new();
        let first = manager.get_cache("llm_responses");
        first.set("k".to_string(), serde_json::json!(1), None);

        let second = manager.get_cache("llm_responses");
        assert_eq!(second.get_stats().size, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn create_cache_applies_explicit_config_and_replaces_existing() {
        let manager = CacheManager::new();
        let original = manager.get_cache("session");
        original.set("k".to_string(), serde_json::json!(1), None);

        let replaced = manager.create_cache(
            "session",
            CacheConfig { ttl: Duration::from_secs(5), max_size: 2 },
        );
        assert_eq!(replaced.get_stats().size, 0);
        assert_eq!(manager.get_cache("session").get_stats().size, 0);
    }

    #[test]
    fn named_caches_appear_in_stats_summary() {
        let manager = CacheManager::new();
        manager.get_cache("llm_responses");
        let summary = manager.stats_summary();
        assert_eq!(summary.len(), 4);
        assert!(summary.contains_key("llm_responses"));
    }
}
