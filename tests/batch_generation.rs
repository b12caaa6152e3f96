//! End-to-end coverage of spec §8's six batch-generation scenarios, against
//! a mocked forecast service. Styled after
//! `examples/markpasternak-terminal-weather/tests/caching.rs`'s
//! `wiremock::{Mock, MockServer, ResponseTemplate, matchers::method}` setup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Tokyo;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_commentary_engine::batch::BatchOrchestrator;
use weather_commentary_engine::cache::TTLCache;
use weather_commentary_engine::comments::CommentRepository;
use weather_commentary_engine::forecast::ForecastClient;
use weather_commentary_engine::location::{Location, LocationIndex};
use weather_commentary_engine::pipeline::{PipelineExecutor, PipelineMode, StaticCommentGenerator};

/// Today in JST — used as the target date throughout so the mocked
/// `wxdata` entries always fall inside `select_target_hour_forecasts`'s
/// window regardless of when the test suite actually runs.
fn today_jst() -> NaiveDate {
    Utc::now().with_timezone(&Tokyo).date_naive()
}

/// A well-formed `wxtech`-shaped payload with entries at all four target
/// hours (09/12/15/18 JST) of `date`, plus a couple of off-hour entries to
/// exercise the nearest-hour selection.
fn wxdata_payload(date: NaiveDate) -> serde_json::Value {
    let entry = |hour: u32, minute: u32, temp: f64| {
        serde_json::json!({
            "jst": format!("{} {:02}:{:02}:00", date, hour, minute),
            "temp": temp,
            "rh": 55.0,
            "prec": 0.0,
            "wdir": 180.0,
            "wspd": 3.0,
            "weather": "100",
        })
    };
    serde_json::json!({
        "wxdata": [{
            "srf": [
                entry(8, 30, 26.0),
                entry(9, 0, 27.0),
                entry(12, 0, 30.0),
                entry(15, 0, 29.0),
                entry(18, 0, 24.0),
                entry(18, 45, 23.0),
            ],
            "mrf": [],
        }],
    })
}

fn build_executor(base_url: &str) -> Arc<PipelineExecutor> {
    // No reference-comment partitions are seeded; CommentRepository treats a
    // missing partition file as an empty one rather than an error, so an
    // empty tempdir is a valid fixture here. Leaked deliberately: the
    // repository only reads lazily and the OS reclaims it at process exit.
    let comment_dir = tempfile::tempdir().unwrap();
    let forecast_cache = Arc::new(TTLCache::new(Duration::from_secs(600), 200));
    let forecast_client = Arc::new(ForecastClient::new(base_url, "test-key", 5, 100, forecast_cache));
    let repository = Arc::new(CommentRepository::new(comment_dir.path()));
    let generator = Arc::new(StaticCommentGenerator);
    std::mem::forget(comment_dir);
    Arc::new(PipelineExecutor::new(forecast_client, repository, generator, PipelineMode::Classic))
}

#[tokio::test]
async fn single_location_happy_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wxdata_payload(today_jst())))
        .mount(&server)
        .await;

    let executor = build_executor(&server.uri());
    let index = Arc::new(LocationIndex::build(vec![Location::new(
        "東京",
        Some(35.6895),
        Some(139.6917),
    )]));
    let orchestrator = BatchOrchestrator::new(executor, index, 16);

    let result = orchestrator
        .generate(&["東京".to_string()], "test-provider", today_jst(), None)
        .await;

    assert_eq!(result.total_count, 1);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failed_count, 0);
    let location = &result.results[0];
    assert!(location.success);
    assert!(!location.comment.as_deref().unwrap_or("").is_empty());
    let node_times = location.generation_metadata.get("node_execution_times").unwrap();
    for stage in ["input", "fetch_forecast", "retrieve_comments", "select_pair", "generate"] {
        assert!(node_times.get(stage).is_some(), "missing stage timing for {stage}");
    }
    assert!(location.generation_metadata.get("weather_condition").is_some());
}

#[tokio::test]
async fn forecast_service_retries_on_500_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wxdata_payload(today_jst())))
        .mount(&server)
        .await;

    let executor = build_executor(&server.uri());
    let index = Arc::new(LocationIndex::build(vec![Location::new(
        "大阪",
        Some(34.6937),
        Some(135.5023),
    )]));
    let orchestrator = BatchOrchestrator::new(executor, index, 16);

    let result = orchestrator
        .generate(&["大阪".to_string()], "test-provider", today_jst(), None)
        .await;

    assert_eq!(result.success_count, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn unknown_location_with_coordinates_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wxdata_payload(today_jst())))
        .mount(&server)
        .await;

    let executor = build_executor(&server.uri());
    let index = Arc::new(LocationIndex::build(vec![]));
    let orchestrator = BatchOrchestrator::new(executor, index, 16);

    let result = orchestrator
        .generate(&["架空市,35.0,140.0".to_string()], "test-provider", today_jst(), None)
        .await;

    assert_eq!(result.success_count, 1);
    assert_eq!(result.results[0].location, "架空市");
    assert_ne!(result.results[0].error.as_deref(), Some("location_not_found"));
}

#[tokio::test]
async fn batch_isolates_one_bad_location_among_valid_ones() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wxdata_payload(today_jst())))
        .mount(&server)
        .await;

    let executor = build_executor(&server.uri());
    let index = Arc::new(LocationIndex::build(vec![
        Location::new("東京", Some(35.6895), Some(139.6917)),
        Location::new("大阪", Some(34.6937), Some(135.5023)),
    ]));
    let orchestrator = BatchOrchestrator::new(executor, index, 16);

    let locations = vec!["東京".to_string(), "".to_string(), "大阪".to_string()];
    let result = orchestrator
        .generate(&locations, "test-provider", today_jst(), None)
        .await;

    assert_eq!(result.total_count, 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failed_count, 1);
    let failed = result.results.iter().find(|r| !r.success).unwrap();
    assert_eq!(failed.error.as_deref(), Some("location_not_found"));
}

#[tokio::test]
async fn cache_hit_on_second_call_makes_no_http_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wxdata_payload(today_jst())))
        .mount(&server)
        .await;

    let forecast_cache = Arc::new(TTLCache::new(Duration::from_secs(600), 200));
    let forecast_client = ForecastClient::new(server.uri(), "test-key", 5, 100, Arc::clone(&forecast_cache));

    let first = forecast_client.fetch("東京", 35.6895, 139.6917, today_jst()).await.unwrap();
    assert!(!first.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    let stats_after_first = forecast_cache.get_stats();

    let second = forecast_client.fetch("東京", 35.6895, 139.6917, today_jst()).await.unwrap();
    assert_eq!(second.forecasts.len(), first.forecasts.len());
    // No second HTTP request: the mock only ever received the first call.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    let stats_after_second = forecast_cache.get_stats();
    assert_eq!(stats_after_second.hits, stats_after_first.hits + 1);
    assert_eq!(stats_after_second.misses, stats_after_first.misses);
}

#[tokio::test]
async fn hour_window_selects_exactly_four_target_hour_forecasts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wxdata_payload(today_jst())))
        .mount(&server)
        .await;

    let forecast_cache = Arc::new(TTLCache::new(Duration::from_secs(600), 200));
    let forecast_client = ForecastClient::new(server.uri(), "test-key", 5, 100, forecast_cache);

    let collection = forecast_client
        .fetch("東京", 35.6895, 139.6917, today_jst())
        .await
        .unwrap();

    assert_eq!(collection.forecasts.len(), 4);
    assert!(collection.is_strictly_increasing());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let url = requests[0].url.to_string();
    let hours: u32 = url
        .split("hours=")
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("request carries a positive hours parameter");
    assert!(hours >= 1);
}
