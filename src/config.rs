/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub forecast_api_base_url: String,
    pub forecast_api_key: String,
    pub forecast_http_timeout_secs: u64,
    pub location_catalogue_path: String,
    pub comment_data_dir: String,
    pub history_log_path: String,
    pub cache_stats_snapshot_path: String,
    pub max_retry_count: u32,
    pub memory_pressure_threshold_pct: f64,
    pub batch_worker_cap: usize,
    pub pipeline_timeout_secs: u64,
    pub fanout_timeout_secs: u64,
    pub rate_limit_rps: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            forecast_api_base_url: std::env::var("FORECAST_API_BASE_URL")
                .unwrap_or_else(|_| "https://wxtech.example/api/v1".to_string()),
            forecast_api_key: std::env::var("FORECAST_API_KEY")
                .expect("FORECAST_API_KEY must be set"),
            forecast_http_timeout_secs: std::env::var("FORECAST_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("FORECAST_HTTP_TIMEOUT_SECS must be a valid u64"),
            location_catalogue_path: std::env::var("LOCATION_CATALOGUE_PATH")
                .unwrap_or_else(|_| "./data/locations.csv".to_string()),
            comment_data_dir: std::env::var("COMMENT_DATA_DIR")
                .unwrap_or_else(|_| "./data/comments".to_string()),
            history_log_path: std::env::var("HISTORY_LOG_PATH")
                .unwrap_or_else(|_| "./data/history.jsonl".to_string()),
            cache_stats_snapshot_path: std::env::var("CACHE_STATS_SNAPSHOT_PATH")
                .unwrap_or_else(|_| "./data/cache_stats.json".to_string()),
            max_retry_count: std::env::var("MAX_RETRY_COUNT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("MAX_RETRY_COUNT must be a valid u32"),
            memory_pressure_threshold_pct: std::env::var("MEMORY_PRESSURE_THRESHOLD_PCT")
                .unwrap_or_else(|_| "80".to_string())
                .parse()
                .expect("MEMORY_PRESSURE_THRESHOLD_PCT must be a valid f64"),
            batch_worker_cap: std::env::var("BATCH_WORKER_CAP")
                .unwrap_or_else(|_| "16".to_string())
                .parse()
                .expect("BATCH_WORKER_CAP must be a valid usize"),
            pipeline_timeout_secs: std::env::var("PIPELINE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("PIPELINE_TIMEOUT_SECS must be a valid u64"),
            fanout_timeout_secs: std::env::var("FANOUT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("FANOUT_TIMEOUT_SECS must be a valid u64"),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("RATE_LIMIT_RPS must be a valid u32"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        // NOTE: set_var/remove_var in tests is unsafe in multi-threaded contexts
        // (Rust may run tests in parallel). However, this test exercises the
        // default-value logic which only needs env vars. We accept the risk
        // since cargo test runs this module's tests sequentially within one
        // test binary. If Rust editions mark these as `unsafe`, wrap accordingly.
        unsafe {
            std::env::set_var("FORECAST_API_KEY", "test-key");
            std::env::remove_var("FORECAST_API_BASE_URL");
            std::env::remove_var("MAX_RETRY_COUNT");
            std::env::remove_var("BATCH_WORKER_CAP");
            std::env::remove_var("RATE_LIMIT_RPS");
        }

        let config = AppConfig::from_env();

        assert_eq!(config.max_retry_count, 5);
        assert_eq!(config.batch_worker_cap, 16);
        assert_eq!(config.rate_limit_rps, 10);
        assert!(config.forecast_api_base_url.starts_with("https://"));
    }
}
