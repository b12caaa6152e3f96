use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Asia::Tokyo;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weather_commentary_engine::batch::{self, BatchOrchestrator};
use weather_commentary_engine::cache::CacheManager;
use weather_commentary_engine::comments::repository::CommentRepository;
use weather_commentary_engine::config::AppConfig;
use weather_commentary_engine::forecast::client::ForecastClient;
use weather_commentary_engine::location::{self, LocationIndex};
use weather_commentary_engine::persistence::{CacheStatsSnapshotWriter, HistoryLog};
use weather_commentary_engine::pipeline::{
    CommentGenerator, PipelineExecutor, PipelineMode, StaticCommentGenerator,
};

/// Parse the locations the batch should run over from CLI args (everything
/// after the binary name). Each arg is either a canonical catalogue name or
/// a `"name,lat,lon"` triple — [`BatchOrchestrator`] resolves the rest.
fn parse_locations() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_commentary_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let locations = parse_locations();
    if locations.is_empty() {
        eprintln!("usage: weather-commentary-engine <location> [location...]");
        eprintln!("  each <location> is a catalogue name (e.g. 東京) or a \"name,lat,lon\" triple");
        std::process::exit(1);
    }

    tracing::info!(catalogue_path = %config.location_catalogue_path, "loading location catalogue");
    let catalogue = location::load_from_csv(&config.location_catalogue_path);
    let location_index = Arc::new(LocationIndex::build(catalogue));
    tracing::info!(count = location_index.len(), "location catalogue loaded");

    let cache_manager = CacheManager::init_default(config.memory_pressure_threshold_pct);

    let forecast_client = Arc::new(ForecastClient::new(
        config.forecast_api_base_url.as_str(),
        config.forecast_api_key.as_str(),
        config.forecast_http_timeout_secs,
        config.rate_limit_rps,
        Arc::clone(&cache_manager.weather_forecasts),
    ));

    let comment_repository = Arc::new(CommentRepository::with_cache(
        config.comment_data_dir.as_str(),
        Arc::clone(&cache_manager.comments),
    ));

    // The core never bundles a concrete LLM provider adapter (out of scope
    // per SPEC_FULL §1); `StaticCommentGenerator` stands in as the only
    // `CommentGenerator` this binary ships, so the pipeline is runnable
    // end-to-end without a network-backed LLM dependency.
    let generator: Arc<dyn CommentGenerator> = Arc::new(StaticCommentGenerator);

    let mut executor = PipelineExecutor::new(
        Arc::clone(&forecast_client),
        Arc::clone(&comment_repository),
        generator,
        PipelineMode::Classic,
    );
    executor.max_retry_count = config.max_retry_count;
    executor.fanout_timeout = std::time::Duration::from_secs(config.fanout_timeout_secs);
    let executor = Arc::new(executor);

    let orchestrator = BatchOrchestrator::with_pipeline_timeout(
        executor,
        Arc::clone(&location_index),
        config.batch_worker_cap,
        std::time::Duration::from_secs(config.pipeline_timeout_secs),
    );

    let target_date = Utc::now().with_timezone(&Tokyo).date_naive() + chrono::Duration::days(1);
    tracing::info!(%target_date, locations = locations.len(), "starting batch generation");

    let progress_cb: batch::ProgressCallback = Arc::new(|completed, total, location| {
        tracing::info!(completed = completed + 1, total, location, "location finished");
    });

    let batch_result = orchestrator
        .generate(&locations, "static-generator", target_date, Some(progress_cb))
        .await;

    tracing::info!(
        total = batch_result.total_count,
        success = batch_result.success_count,
        failed = batch_result.failed_count,
        elapsed_ms = batch_result.processing_time_ms,
        "batch generation complete"
    );

    let history_log = HistoryLog::new(config.history_log_path.as_str());
    for result in &batch_result.results {
        history_log.append(result);
    }

    let snapshot_writer = CacheStatsSnapshotWriter::new(config.cache_stats_snapshot_path.as_str());
    let stats_summary = cache_manager.stats_summary();
    snapshot_writer.record(&serde_json::json!(stats_summary));

    match serde_json::to_string_pretty(&batch_result) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "failed to serialize batch result to stdout"),
    }

    cache_manager.shutdown();

    if batch_result.failed_count > 0 && batch_result.success_count == 0 {
        std::process::exit(1);
    }
}
