//! Per-location pipeline state and its terminal products.
//!
//! [`PipelineState`] is owned exclusively by the [`crate::pipeline::executor::PipelineExecutor`]
//! that creates it and is never shared across locations — there is no
//! `Arc`/`Mutex` here, just a plain struct threaded through one async call
//! chain. The source system modelled validation results and state with
//! ad-hoc duck typing; here that becomes the tagged [`ValidationResult`] enum.

use crate::comments::types::ReferenceComment;
use crate::errors::ErrorType;
use crate::forecast::types::{Forecast, ForecastCollection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// `Valid{score} | Invalid{score, reasons}` — the tagged replacement for the
/// source's Protocol-based validation-result duck typing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid { score: f64 },
    Invalid { score: f64, reasons: Vec<String> },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    pub fn score(&self) -> f64 {
        match self {
            ValidationResult::Valid { score } => *score,
            ValidationResult::Invalid { score, .. } => *score,
        }
    }
}

/// The numerical + textual context handed to the LLM-selection collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherContext {
    pub location_name: String,
    pub target_datetime: DateTime<Utc>,
    pub forecasts: Vec<Forecast>,
    pub weather_condition: String,
}

impl WeatherContext {
    /// Summarize the dominant weather description across the target-hour
    /// forecasts (first non-empty description wins — there is no "average"
    /// of a categorical field).
    pub fn from_forecasts(location_name: &str, target_datetime: DateTime<Utc>, forecasts: Vec<Forecast>) -> Self {
        let weather_condition = forecasts
            .iter()
            .map(|f| f.weather_description.clone())
            .find(|d| !d.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            location_name: location_name.to_string(),
            target_datetime,
            forecasts,
            weather_condition,
        }
    }
}

/// What a `CommentGenerator` call returns: the selected pair, the finalized
/// text, and (optionally) its own validation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub weather_comment: String,
    pub advice_comment: String,
    pub final_text: String,
    pub validation_result: Option<ValidationResult>,
}

/// Mutable state carried through one per-location pipeline run.
pub struct PipelineState {
    pub location_name: String,
    pub target_datetime: DateTime<Utc>,
    pub llm_provider: String,
    pub exclude_previous: bool,
    pub retry_count: u32,
    pub weather_data: Option<ForecastCollection>,
    pub past_comments: Option<Vec<ReferenceComment>>,
    pub selected_pair: Option<(String, String)>,
    pub final_comment: Option<String>,
    pub validation_result: Option<ValidationResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub node_execution_times: HashMap<String, u64>,
    pub workflow_start_time: Instant,
}

impl PipelineState {
    pub fn new(location_name: impl Into<String>, target_datetime: DateTime<Utc>, llm_provider: impl Into<String>) -> Self {
        Self {
            location_name: location_name.into(),
            target_datetime,
            llm_provider: llm_provider.into(),
            exclude_previous: false,
            retry_count: 0,
            weather_data: None,
            past_comments: None,
            selected_pair: None,
            final_comment: None,
            validation_result: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            node_execution_times: HashMap::new(),
            workflow_start_time: Instant::now(),
        }
    }

    pub fn record_stage_time(&mut self, stage_name: &str, elapsed_ms: u64) {
        self.node_execution_times.insert(stage_name.to_string(), elapsed_ms);
    }
}

/// One location's terminal outcome, immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationResult {
    pub location: String,
    pub success: bool,
    pub comment: Option<String>,
    pub advice_comment: Option<String>,
    pub error: Option<String>,
    pub generation_metadata: serde_json::Value,
    pub source_files: Option<Vec<String>>,
}

impl LocationResult {
    pub fn success(
        location: impl Into<String>,
        comment: String,
        advice_comment: String,
        generation_metadata: serde_json::Value,
    ) -> Self {
        Self {
            location: location.into(),
            success: true,
            comment: Some(comment),
            advice_comment: Some(advice_comment),
            error: None,
            generation_metadata,
            source_files: None,
        }
    }

    pub fn failure(
        location: impl Into<String>,
        error_type: ErrorType,
        generation_metadata: serde_json::Value,
    ) -> Self {
        Self {
            location: location.into(),
            success: false,
            comment: None,
            advice_comment: None,
            error: Some(error_type.as_str().to_string()),
            generation_metadata,
            source_files: None,
        }
    }
}

/// Batch-level aggregate, invariant `success_count + failed_count == total_count == results.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<LocationResult>,
    pub processing_time_ms: u64,
}

impl BatchResult {
    pub fn from_results(results: Vec<LocationResult>, processing_time_ms: u64) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        let failed_count = results.len() - success_count;
        Self {
            total_count: results.len(),
            success_count,
            failed_count,
            results,
            processing_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_result_reports_validity_and_score() {
        let valid = ValidationResult::Valid { score: 0.9 };
        assert!(valid.is_valid());
        assert_eq!(valid.score(), 0.9);

        let invalid = ValidationResult::Invalid { score: 0.2, reasons: vec!["too short".into()] };
        assert!(!invalid.is_valid());
        assert_eq!(invalid.score(), 0.2);
    }

    #[test]
    fn weather_context_picks_first_nonempty_description() {
        let forecasts = vec![
            Forecast {
                datetime: Utc::now(),
                temperature: 20.0,
                weather_code: "100".into(),
                weather_description: "".into(),
                precipitation_mm: 0.0,
                humidity_pct: 50.0,
                wind_speed_mps: 1.0,
                wind_direction_deg: 0.0,
            },
            Forecast {
                datetime: Utc::now(),
                temperature: 21.0,
                weather_code: "101".into(),
                weather_description: "晴れ".into(),
                precipitation_mm: 0.0,
                humidity_pct: 50.0,
                wind_speed_mps: 1.0,
                wind_direction_deg: 0.0,
            },
        ];
        let ctx = WeatherContext::from_forecasts("東京", Utc::now(), forecasts);
        assert_eq!(ctx.weather_condition, "晴れ");
    }

    #[test]
    fn batch_result_invariant_holds() {
        let results = vec![
            LocationResult::success("東京", "晴れ".into(), "傘は不要".into(), serde_json::json!({})),
            LocationResult::failure("存在しない", ErrorType::LocationNotFound, serde_json::json!({})),
        ];
        let batch = BatchResult::from_results(results, 42);
        assert_eq!(batch.total_count, 2);
        assert_eq!(batch.success_count + batch.failed_count, batch.total_count);
    }
}
