//! Runs N independent per-location pipelines with bounded parallelism,
//! progress reporting, and partial-failure isolation.
//!
//! Grounded in `original_source/src/controllers/async_batch_processor.py`:
//! the two-phase `fetch_all_weather_data_async` + sequential
//! `generate_comments_batch_async` loop becomes, here, an optional
//! pre-fetch fan-out followed by a semaphore-bounded `tokio::spawn` loop —
//! the Rust runtime gives true task-level concurrency where the Python
//! original used `asyncio.gather`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::errors::ErrorType;
use crate::forecast::client::ForecastClient;
use crate::location::LocationIndex;
use crate::pipeline::executor::PipelineExecutor;
use crate::pipeline::state::{BatchResult, LocationResult};

/// `(completed_index_0based, total, location_name)`, fired on completion.
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Default soft per-location budget (spec §5: `timeout_per_location`,
/// default 30s) guarded by the batch layer — the only backstop for
/// `select_pair`/`generate`, since the LLM-selection call itself is
/// "effectively unbounded at this layer".
const DEFAULT_PIPELINE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BatchOrchestrator {
    pub executor: Arc<PipelineExecutor>,
    pub location_index: Arc<LocationIndex>,
    pub worker_cap: usize,
    pub pipeline_timeout: Duration,
}

/// A location string resolved to coordinates, or a terminal failure if
/// resolution itself fails (unknown name, no coordinates supplied).
enum ResolvedLocation {
    Ready { name: String, lat: f64, lon: f64 },
    Failed(LocationResult),
}

impl BatchOrchestrator {
    pub fn new(executor: Arc<PipelineExecutor>, location_index: Arc<LocationIndex>, worker_cap: usize) -> Self {
        Self {
            executor,
            location_index,
            worker_cap,
            pipeline_timeout: DEFAULT_PIPELINE_TIMEOUT,
        }
    }

    /// Same as [`Self::new`] but with an explicit per-location soft budget,
    /// wired from `AppConfig::pipeline_timeout_secs` in `main.rs`.
    pub fn with_pipeline_timeout(
        executor: Arc<PipelineExecutor>,
        location_index: Arc<LocationIndex>,
        worker_cap: usize,
        pipeline_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            location_index,
            worker_cap,
            pipeline_timeout,
        }
    }

    /// `W = min(max(2 * num_cpus, 1), 16, locations.len())`.
    fn worker_count(&self, total: usize) -> usize {
        if total == 0 {
            return 0;
        }
        let heuristic = (2 * num_cpus::get()).max(1);
        heuristic.min(self.worker_cap).min(total)
    }

    /// Parse one location string: a canonical name, or a `"name,lat,lon"`
    /// triple. Unknown names with coordinates succeed synthetically;
    /// unknown names without coordinates fail with `location_not_found`.
    fn resolve(&self, raw: &str) -> ResolvedLocation {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();

        if parts.len() == 3 {
            let name = parts[0];
            if name.is_empty() {
                return ResolvedLocation::Failed(LocationResult::failure(
                    raw,
                    ErrorType::LocationNotFound,
                    serde_json::json!({"reason": "empty location name"}),
                ));
            }
            match (parts[1].parse::<f64>(), parts[2].parse::<f64>()) {
                (Ok(lat), Ok(lon)) => {
                    return ResolvedLocation::Ready { name: name.to_string(), lat, lon };
                }
                _ => {
                    return ResolvedLocation::Failed(LocationResult::failure(
                        name,
                        ErrorType::ValidationError,
                        serde_json::json!({"reason": "unparseable coordinates"}),
                    ));
                }
            }
        }

        let name = parts[0];
        if name.is_empty() {
            return ResolvedLocation::Failed(LocationResult::failure(
                raw,
                ErrorType::LocationNotFound,
                serde_json::json!({"reason": "empty location name"}),
            ));
        }

        match self.location_index.lookup(name) {
            Some(location) => match (location.latitude, location.longitude) {
                (Some(lat), Some(lon)) => {
                    ResolvedLocation::Ready { name: location.name.clone(), lat, lon }
                }
                _ => ResolvedLocation::Failed(LocationResult::failure(
                    name,
                    ErrorType::LocationNotFound,
                    serde_json::json!({"reason": "catalogue entry has no coordinates"}),
                )),
            },
            None => ResolvedLocation::Failed(LocationResult::failure(
                name,
                ErrorType::LocationNotFound,
                serde_json::json!({"reason": "unknown location and no coordinates supplied"}),
            )),
        }
    }

    pub async fn generate(
        &self,
        locations: &[String],
        llm_provider: &str,
        target_date: NaiveDate,
        progress_cb: Option<ProgressCallback>,
    ) -> BatchResult {
        self.run(locations, llm_provider, target_date, None, progress_cb).await
    }

    /// Pre-fetch mode: fetch all forecasts for resolvable locations in one
    /// bounded fan-out before any pipeline starts, then each pipeline skips
    /// its own `fetch_forecast` stage.
    pub async fn generate_with_prefetch(
        &self,
        locations: &[String],
        llm_provider: &str,
        target_date: NaiveDate,
        forecast_client: Arc<ForecastClient>,
        progress_cb: Option<ProgressCallback>,
    ) -> BatchResult {
        let mut prefetch_set = JoinSet::new();
        let mut prefetched = std::collections::HashMap::new();
        for raw in locations {
            if let ResolvedLocation::Ready { name, lat, lon } = self.resolve(raw) {
                let client = Arc::clone(&forecast_client);
                prefetch_set.spawn(async move {
                    let result = client.fetch(&name, lat, lon, target_date).await;
                    (name, result)
                });
            }
        }
        while let Some(joined) = prefetch_set.join_next().await {
            if let Ok((name, result)) = joined {
                if let Ok(collection) = result {
                    prefetched.insert(name, collection);
                }
            }
        }

        self.run(locations, llm_provider, target_date, Some(prefetched), progress_cb).await
    }

    async fn run(
        &self,
        locations: &[String],
        llm_provider: &str,
        target_date: NaiveDate,
        prefetched: Option<std::collections::HashMap<String, crate::forecast::types::ForecastCollection>>,
        progress_cb: Option<ProgressCallback>,
    ) -> BatchResult {
        let start = Instant::now();
        let total = locations.len();
        if total == 0 {
            return BatchResult::from_results(Vec::new(), start.elapsed().as_millis() as u64);
        }

        let worker_count = self.worker_count(total).max(1);
        let semaphore = Arc::new(Semaphore::new(worker_count));
        let mut join_set = JoinSet::new();
        let completed_counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        for (index, raw) in locations.iter().cloned().enumerate() {
            let resolved = self.resolve(&raw);
            let permit = Arc::clone(&semaphore);
            let executor = Arc::clone(&self.executor);
            let llm_provider = llm_provider.to_string();
            let progress_cb = progress_cb.clone();
            let completed_counter = Arc::clone(&completed_counter);
            let pipeline_timeout = self.pipeline_timeout;
            let pre_fetched_weather = match &resolved {
                ResolvedLocation::Ready { name, .. } => {
                    prefetched.as_ref().and_then(|m| m.get(name).cloned())
                }
                ResolvedLocation::Failed(_) => None,
            };

            join_set.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                let (result, location_name) = match resolved {
                    ResolvedLocation::Ready { name, lat, lon } => {
                        // Soft per-location budget (spec §5): abandon the
                        // pipeline on expiry rather than block the worker
                        // slot indefinitely on an unbounded LLM call.
                        let run_future =
                            executor.run(&name, lat, lon, target_date, &llm_provider, pre_fetched_weather);
                        let result = match tokio::time::timeout(pipeline_timeout, run_future).await {
                            Ok(result) => result,
                            Err(_) => {
                                tracing::warn!(location = %name, "pipeline exceeded per-location timeout, abandoning");
                                LocationResult::failure(
                                    &name,
                                    ErrorType::TimeoutError,
                                    serde_json::json!({"reason": "per-location pipeline timeout exceeded"}),
                                )
                            }
                        };
                        let location_name = result.location.clone();
                        (result, location_name)
                    }
                    ResolvedLocation::Failed(result) => {
                        let location_name = result.location.clone();
                        (result, location_name)
                    }
                };

                if let Some(cb) = progress_cb {
                    // Progress callback errors must never abort the batch;
                    // a plain `Fn` cannot itself fail, so this is simply a
                    // best-effort, never-propagated invocation. The index
                    // passed here reflects completion order, not the
                    // location's submission-order position.
                    let completed_index = completed_counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    cb(completed_index, total, &location_name);
                }

                (index, result)
            });
        }

        let mut indexed_results: Vec<(usize, LocationResult)> = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(pair) => indexed_results.push(pair),
                Err(join_err) => {
                    tracing::error!(%join_err, "pipeline task panicked, recording as system_error");
                    indexed_results.push((
                        indexed_results.len(),
                        LocationResult::failure(
                            "unknown",
                            ErrorType::SystemError,
                            serde_json::json!({"reason": "pipeline task panicked"}),
                        ),
                    ));
                }
            }
        }
        indexed_results.sort_by_key(|(index, _)| *index);
        let results = indexed_results.into_iter().map(|(_, r)| r).collect();

        BatchResult::from_results(results, start.elapsed().as_millis() as u64)
    }
}
