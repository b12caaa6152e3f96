//! Forecast client: fetches the minimal hour window from the upstream
//! wxtech-shaped forecast service, filters to the four target hours, and
//! fronts the whole thing with the `weather_forecasts` TTL cache.
//!
//! Ported from the teacher's `services/yr.rs::YrClient` — same
//! struct-nesting JSON shape, same `unwrap_or_warn` missing-field handling —
//! generalized to a schema with explicit retry/backoff, rate limiting, and
//! the §4.4 hour-window optimization, none of which `YrClient` needed (yr.no
//! never required minimizing the request window).

use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Tokyo;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant as TokioInstant;

use super::types::{Forecast, ForecastCollection};
use super::window::{compute_hours, select_target_hour_forecasts};
use crate::cache::TTLCache;
use crate::errors::AppError;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const BACKOFF_MULTIPLIER: u32 = 2;
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// Process-wide rate gate: the simplest correct construction for "at most
/// one outgoing request per `MIN_REQUEST_INTERVAL`", following the
/// teacher's preference for a single guarded primitive over a dedicated
/// rate-limiting crate.
struct RateLimiter {
    min_interval: Duration,
    last_request: AsyncMutex<Option<TokioInstant>>,
}

impl RateLimiter {
    fn new(requests_per_second: u32) -> Self {
        let min_interval = MIN_REQUEST_INTERVAL.max(Duration::from_secs_f64(
            1.0 / requests_per_second.max(1) as f64,
        ));
        Self {
            min_interval,
            last_request: AsyncMutex::new(None),
        }
    }

    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(TokioInstant::now());
    }
}

#[derive(Clone)]
pub struct ForecastClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: Arc<TTLCache<String, ForecastCollection>>,
    rate_limiter: Arc<RateLimiter>,
}

impl ForecastClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http_timeout_secs: u64,
        rate_limit_rps: u32,
        cache: Arc<TTLCache<String, ForecastCollection>>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(http_timeout_secs))
            .build()
            .expect("failed to build forecast HTTP client");
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            cache,
            rate_limiter: Arc::new(RateLimiter::new(rate_limit_rps)),
        }
    }

    /// Fetch the four target-hour forecasts for `target_date`, fronted by
    /// the TTL cache and retried on transient upstream failures.
    pub async fn fetch(
        &self,
        location_name: &str,
        lat: f64,
        lon: f64,
        target_date: NaiveDate,
    ) -> Result<ForecastCollection, AppError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::validation_error(format!(
                "latitude {lat} out of range [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::validation_error(format!(
                "longitude {lon} out of range [-180, 180]"
            )));
        }

        let now_jst = Utc::now().with_timezone(&Tokyo);
        let hours = compute_hours(now_jst, target_date);
        if hours == 0 {
            return Err(AppError::validation_error("computed hour window is zero"));
        }

        let cache_key = Self::cache_key(lat, lon, target_date, hours);
        if let Some(mut cached) = self.cache.get(&cache_key) {
            tracing::debug!(%cache_key, "weather_forecasts cache hit");
            cached.location_name = location_name.to_string();
            return Ok(cached);
        }

        let mut collection = self
            .fetch_with_retry(lat, lon, hours, target_date)
            .await?;
        collection.location_name = location_name.to_string();
        self.cache.set(cache_key, collection.clone(), None);
        Ok(collection)
    }

    fn cache_key(lat: f64, lon: f64, target_date: NaiveDate, hours: u32) -> String {
        format!(
            "{:.6},{:.6},{},{}",
            round6(lat),
            round6(lon),
            target_date,
            hours
        )
    }

    async fn fetch_with_retry(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
        target_date: NaiveDate,
    ) -> Result<ForecastCollection, AppError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            match self.fetch_once(lat, lon, hours).await {
                Ok(raw) => {
                    let forecasts = parse_response(raw, target_date)?;
                    if forecasts.is_empty() {
                        return Err(AppError::api_response_error(
                            "forecast service returned no usable records",
                        ));
                    }
                    let selected = select_target_hour_forecasts(&forecasts, target_date);
                    return Ok(ForecastCollection::new(String::new(), selected));
                }
                Err(err) if Self::is_retryable(&err) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        "forecast fetch failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= BACKOFF_MULTIPLIER;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::unknown_error("forecast fetch exhausted retries")))
    }

    /// 403/404 are tagged `retryable=false` at the call site since the
    /// taxonomy has no dedicated variant for them; everything else
    /// classified `ApiError` (5xx, unexpected statuses) is retryable.
    fn is_retryable(err: &AppError) -> bool {
        match err.classify() {
            crate::errors::ErrorType::NetworkError | crate::errors::ErrorType::TimeoutError => true,
            crate::errors::ErrorType::ApiError => {
                err.details.get("retryable").map(String::as_str) != Some("false")
            }
            _ => false,
        }
    }

    async fn fetch_once(&self, lat: f64, lon: f64, hours: u32) -> Result<WxResponse, AppError> {
        let url = format!("{}?lat={}&lon={}&hours={}", self.base_url, lat, lon, hours);
        let response = self
            .http
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(&e))?;

        match response.status().as_u16() {
            200 => response
                .json::<WxResponse>()
                .await
                .map_err(|e| AppError::api_response_error(format!("invalid JSON body: {e}"))),
            401 => Err(AppError::missing_credential("forecast API key invalid")),
            403 | 404 => Err(AppError::new(
                crate::errors::ErrorType::ApiError,
                format!("forecast service returned {}", response.status()),
            )
            .with_detail("retryable", "false")),
            429 => Err(AppError::rate_limit_error("forecast service rate limit")),
            status if (500..600).contains(&status) => Err(AppError::api_error(format!(
                "forecast service server error {status}"
            ))),
            status => Err(AppError::api_error(format!(
                "unexpected forecast service status {status}"
            ))),
        }
    }
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

// --- wxtech-shaped response types, mirrored from `yr.rs`'s nested-struct
// pattern and renamed to the wxtech field names named in SPEC_FULL §4.4. ---

#[derive(Debug, Deserialize)]
struct WxResponse {
    wxdata: Vec<WxData>,
}

#[derive(Debug, Deserialize)]
struct WxData {
    #[serde(default)]
    srf: Vec<WxEntry>,
    #[serde(default)]
    mrf: Vec<WxEntry>,
}

#[derive(Debug, Deserialize)]
struct WxEntry {
    jst: String,
    temp: Option<f64>,
    rh: Option<f64>,
    prec: Option<f64>,
    wdir: Option<f64>,
    wspd: Option<f64>,
    weather: Option<String>,
}

fn parse_response(raw: WxResponse, _target_date: NaiveDate) -> Result<Vec<Forecast>, AppError> {
    let mut forecasts = Vec::new();
    for block in &raw.wxdata {
        for entry in block.srf.iter().chain(block.mrf.iter()) {
            match parse_entry(entry) {
                Some(f) => forecasts.push(f),
                None => continue,
            }
        }
    }
    Ok(forecasts)
}

fn parse_entry(entry: &WxEntry) -> Option<Forecast> {
    let naive = chrono::NaiveDateTime::parse_from_str(&entry.jst, "%Y-%m-%d %H:%M:%S").ok()?;
    let datetime = Tokyo
        .from_local_datetime(&naive)
        .single()?
        .with_timezone(&Utc);

    let temperature = unwrap_or_warn(entry.temp, "temp", &entry.jst);
    let humidity_pct = unwrap_or_warn(entry.rh, "rh", &entry.jst);
    let precipitation_mm = entry.prec.unwrap_or(0.0);
    let wind_direction_deg = unwrap_or_warn(entry.wdir, "wdir", &entry.jst);
    let wind_speed_mps = unwrap_or_warn(entry.wspd, "wspd", &entry.jst);
    let weather_code = entry.weather.clone().unwrap_or_else(|| "unknown".to_string());

    let forecast = Forecast {
        datetime,
        temperature,
        weather_code: weather_code.clone(),
        weather_description: weather_code,
        precipitation_mm,
        humidity_pct,
        wind_speed_mps,
        wind_direction_deg,
    };
    if !forecast.is_valid() {
        tracing::warn!(jst = %entry.jst, "skipping forecast entry with non-finite fields");
        return None;
    }
    Some(forecast)
}

/// Missing optional numeric field -> warn and default to 0.0, mirroring the
/// teacher's `unwrap_or_warn` closure in `yr.rs::parse_timeseries_entry`.
fn unwrap_or_warn(field: Option<f64>, name: &str, jst: &str) -> f64 {
    match field {
        Some(v) => v,
        None => {
            tracing::warn!(jst, field = name, "forecast entry missing mandatory field, defaulting to 0.0");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_rounds_coordinates_to_six_decimals() {
        let target = NaiveDate::from_ymd_opt(2026, 7, 29).unwrap();
        let key = ForecastClient::cache_key(35.1234567, 139.0, target, 10);
        assert!(key.starts_with("35.123457,139.000000"));
    }

    #[test]
    fn parse_entry_defaults_missing_fields_with_warning() {
        let entry = WxEntry {
            jst: "2026-07-29 09:00:00".to_string(),
            temp: Some(28.0),
            rh: None,
            prec: None,
            wdir: None,
            wspd: None,
            weather: None,
        };
        let forecast = parse_entry(&entry).unwrap();
        assert_eq!(forecast.temperature, 28.0);
        assert_eq!(forecast.humidity_pct, 0.0);
        assert_eq!(forecast.weather_code, "unknown");
    }

    #[test]
    fn parse_entry_rejects_unparseable_timestamp() {
        let entry = WxEntry {
            jst: "not-a-date".to_string(),
            temp: Some(1.0),
            rh: Some(1.0),
            prec: Some(0.0),
            wdir: Some(0.0),
            wspd: Some(0.0),
            weather: Some("100".to_string()),
        };
        assert!(parse_entry(&entry).is_none());
    }

    #[test]
    fn parse_response_skips_bad_rows_keeps_good_ones() {
        let raw = WxResponse {
            wxdata: vec![WxData {
                srf: vec![
                    WxEntry {
                        jst: "2026-07-29 09:00:00".to_string(),
                        temp: Some(27.5),
                        rh: Some(60.0),
                        prec: Some(0.0),
                        wdir: Some(90.0),
                        wspd: Some(2.0),
                        weather: Some("100".to_string()),
                    },
                    WxEntry {
                        jst: "garbage".to_string(),
                        temp: Some(1.0),
                        rh: Some(1.0),
                        prec: Some(0.0),
                        wdir: Some(0.0),
                        wspd: Some(0.0),
                        weather: Some("100".to_string()),
                    },
                ],
                mrf: vec![],
            }],
        };
        let target = NaiveDate::from_ymd_opt(2026, 7, 29).unwrap();
        let forecasts = parse_response(raw, target).unwrap();
        assert_eq!(forecasts.len(), 1);
    }
}
