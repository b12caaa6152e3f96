//! Drives the fixed per-location DAG:
//! `input -> parallel{fetch_forecast, retrieve_comments} -> select_pair ->
//! (retry loop) -> generate -> output`.
//!
//! The parallel fan-out is expressed with `tokio::join!` — the teacher joins
//! a homogeneous vector of futures with `futures::future::join_all`; here
//! the fan-out is always exactly the two named futures, so `tokio::join!`
//! is the more direct fit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};

use crate::comments::repository::CommentRepository;
use crate::comments::types::{ReferenceComment, Season};
use crate::errors::ErrorType;
use crate::forecast::client::ForecastClient;
use crate::forecast::types::ForecastCollection;

use super::evaluation::{evaluate_pair, EvaluationMode};
use super::generator::CommentGenerator;
use super::state::{GenerationOutcome, LocationResult, PipelineState, WeatherContext};

/// `select_pair`/`generate` can either be two distinct LLM calls
/// (`Classic`, retry re-runs only selection) or one combined call
/// (`Unified`, retry re-runs the whole thing) — see DESIGN.md for why both
/// are kept rather than picking one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    Unified,
    Classic,
}

pub const MAX_RETRY_COUNT: u32 = 5;
const STAGE_INPUT: &str = "input";
const STAGE_FETCH_FORECAST: &str = "fetch_forecast";
const STAGE_RETRIEVE_COMMENTS: &str = "retrieve_comments";
const STAGE_SELECT_PAIR: &str = "select_pair";
const STAGE_UNIFIED: &str = "unified";
const STAGE_GENERATE: &str = "generate";
const STAGE_OUTPUT: &str = "output";

pub struct PipelineExecutor {
    pub forecast_client: Arc<ForecastClient>,
    pub comment_repository: Arc<CommentRepository>,
    pub generator: Arc<dyn CommentGenerator>,
    pub mode: PipelineMode,
    pub evaluation_mode: EvaluationMode,
    pub max_retry_count: u32,
    pub fanout_timeout: Duration,
}

impl PipelineExecutor {
    pub fn new(
        forecast_client: Arc<ForecastClient>,
        comment_repository: Arc<CommentRepository>,
        generator: Arc<dyn CommentGenerator>,
        mode: PipelineMode,
    ) -> Self {
        Self {
            forecast_client,
            comment_repository,
            generator,
            mode,
            evaluation_mode: EvaluationMode::Moderate,
            max_retry_count: MAX_RETRY_COUNT,
            fanout_timeout: Duration::from_secs(30),
        }
    }

    /// Run the DAG for one already-resolved location. `lat`/`lon` must
    /// already be resolved (catalogue lookup or synthetic) by the caller —
    /// resolution failures ("name not found, no coordinates") are the
    /// batch layer's concern, not the pipeline's.
    pub async fn run(
        &self,
        location_name: &str,
        lat: f64,
        lon: f64,
        target_date: NaiveDate,
        llm_provider: &str,
        pre_fetched_weather: Option<ForecastCollection>,
    ) -> LocationResult {
        let target_datetime = Utc::now();
        let mut state = PipelineState::new(location_name, target_datetime, llm_provider);
        self.stage_input(&mut state);

        let fanout_result = self
            .run_fanout(&mut state, lat, lon, target_date, pre_fetched_weather)
            .await;
        if let Err(error_type) = fanout_result {
            return self.finish_failure(state, error_type);
        }

        let outcome = match self.mode {
            PipelineMode::Classic => self.run_classic(&mut state).await,
            PipelineMode::Unified => self.run_unified(&mut state).await,
        };

        match outcome {
            Ok(outcome) => self.stage_output(state, outcome),
            Err(error_type) => self.finish_failure(state, error_type),
        }
    }

    fn stage_input(&self, state: &mut PipelineState) {
        let start = Instant::now();
        // Nothing to normalize beyond what the caller already resolved;
        // this stage exists to seed workflow_start_time and timing.
        state.record_stage_time(STAGE_INPUT, start.elapsed().as_millis() as u64);
    }

    async fn run_fanout(
        &self,
        state: &mut PipelineState,
        lat: f64,
        lon: f64,
        target_date: NaiveDate,
        pre_fetched_weather: Option<ForecastCollection>,
    ) -> Result<(), ErrorType> {
        let fetch_start = Instant::now();
        let comments_start = Instant::now();

        let fetch_future = async {
            if let Some(pre_fetched) = pre_fetched_weather {
                Ok(pre_fetched)
            } else {
                self.forecast_client
                    .fetch(&state.location_name, lat, lon, target_date)
                    .await
            }
        };
        let comments_future = self.comment_repository.get_by_season(
            &Season::relevant_for_month(target_date.format("%m").to_string().parse().unwrap_or(1)),
            50,
        );

        let joined = tokio::time::timeout(self.fanout_timeout, async {
            tokio::join!(fetch_future, comments_future)
        })
        .await;

        let (forecast_result, comments_result) = match joined {
            Ok(pair) => pair,
            Err(_) => {
                state.record_stage_time(STAGE_FETCH_FORECAST, fetch_start.elapsed().as_millis() as u64);
                state.record_stage_time(STAGE_RETRIEVE_COMMENTS, comments_start.elapsed().as_millis() as u64);
                state.errors.push("fan-out deadline exceeded".to_string());
                return Err(ErrorType::TimeoutError);
            }
        };

        state.record_stage_time(STAGE_FETCH_FORECAST, fetch_start.elapsed().as_millis() as u64);
        match forecast_result {
            Ok(collection) => state.weather_data = Some(collection),
            Err(err) => {
                state.errors.push(err.message.clone());
                return Err(err.classify());
            }
        }

        state.record_stage_time(STAGE_RETRIEVE_COMMENTS, comments_start.elapsed().as_millis() as u64);
        match comments_result {
            Ok(comments) => state.past_comments = Some(comments),
            Err(err) => {
                state.errors.push(err.message.clone());
                return Err(err.classify());
            }
        }

        Ok(())
    }

    fn context(&self, state: &PipelineState) -> WeatherContext {
        let forecasts = state
            .weather_data
            .as_ref()
            .map(|c| c.forecasts.clone())
            .unwrap_or_default();
        WeatherContext::from_forecasts(&state.location_name, state.target_datetime, forecasts)
    }

    fn candidates(&self, state: &PipelineState) -> Vec<ReferenceComment> {
        state.past_comments.clone().unwrap_or_default()
    }

    /// `select_pair` then `generate` as distinct stages; retry re-runs only
    /// `select_pair`, `generate` always re-runs once a valid pair exists.
    async fn run_classic(&self, state: &mut PipelineState) -> Result<GenerationOutcome, ErrorType> {
        let ctx = self.context(state);
        let candidates = self.candidates(state);

        let pair = loop {
            let start = Instant::now();
            let pair = self.generator.select_pair(&ctx, &candidates).await;
            state.record_stage_time(STAGE_SELECT_PAIR, start.elapsed().as_millis() as u64);

            let pair = match pair {
                Ok(p) => p,
                Err(err) => {
                    state.errors.push(err.message.clone());
                    return Err(err.classify());
                }
            };

            let verdict = evaluate_pair(&ctx, &pair, self.evaluation_mode);
            state.validation_result = Some(verdict.clone());

            if verdict.is_valid() || state.retry_count >= self.max_retry_count {
                break pair;
            }

            state.retry_count += 1;
            state.warnings.push(format!(
                "select_pair produced an invalid pair, retrying (attempt {})",
                state.retry_count
            ));
        };

        state.selected_pair = Some(pair.clone());
        let gen_start = Instant::now();
        let outcome = self.generator.generate(&ctx, &pair).await;
        state.record_stage_time(STAGE_GENERATE, gen_start.elapsed().as_millis() as u64);

        let outcome = match outcome {
            Ok(o) => o,
            Err(err) => {
                state.errors.push(err.message.clone());
                return Err(err.classify());
            }
        };
        state.final_comment = Some(outcome.final_text.clone());
        Ok(outcome)
    }

    /// `select_pair` and `generate` collapse into one call; retry re-runs
    /// the whole combined call.
    async fn run_unified(&self, state: &mut PipelineState) -> Result<GenerationOutcome, ErrorType> {
        loop {
            let start = Instant::now();
            let ctx = self.context(state);
            let candidates = self.candidates(state);
            let outcome = self.generator.select_and_generate(&ctx, &candidates).await;
            state.record_stage_time(STAGE_UNIFIED, start.elapsed().as_millis() as u64);

            let outcome = match outcome {
                Ok(o) => o,
                Err(err) => {
                    state.errors.push(err.message.clone());
                    return Err(err.classify());
                }
            };

            let pair = (outcome.weather_comment.clone(), outcome.advice_comment.clone());
            let verdict = outcome
                .validation_result
                .clone()
                .unwrap_or_else(|| evaluate_pair(&ctx, &pair, self.evaluation_mode));
            state.validation_result = Some(verdict.clone());

            if verdict.is_valid() || state.retry_count >= self.max_retry_count {
                state.selected_pair = Some(pair);
                state.final_comment = Some(outcome.final_text.clone());
                return Ok(outcome);
            }

            state.retry_count += 1;
            state.warnings.push(format!(
                "unified call produced an invalid pair, retrying (attempt {})",
                state.retry_count
            ));
        }
    }

    fn stage_output(&self, state: PipelineState, outcome: GenerationOutcome) -> LocationResult {
        let start = Instant::now();
        let execution_time_ms = state.workflow_start_time.elapsed().as_millis() as u64;

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "node_execution_times".to_string(),
            serde_json::to_value(&state.node_execution_times).unwrap_or(serde_json::Value::Null),
        );
        metadata.insert("execution_time_ms".to_string(), serde_json::json!(execution_time_ms));
        metadata.insert(
            "weather_condition".to_string(),
            serde_json::json!(self.context(&state).weather_condition),
        );
        metadata.insert("retry_count".to_string(), serde_json::json!(state.retry_count));
        if let Some(validation) = &state.validation_result {
            metadata.insert(
                "validation_result".to_string(),
                serde_json::to_value(validation).unwrap_or(serde_json::Value::Null),
            );
        }
        if !state.warnings.is_empty() {
            metadata.insert("warnings".to_string(), serde_json::json!(state.warnings));
        }

        // The `output` stage's own deliverable: a stable JSON blob capturing
        // what was produced, independent of the surrounding metadata map's
        // shape. Serialized as a string so it stays a single opaque field
        // rather than another layer of structure to keep in sync.
        let output_snapshot = serde_json::json!({
            "location_name": state.location_name,
            "weather_comment": outcome.weather_comment,
            "advice_comment": outcome.advice_comment,
            "retry_count": state.retry_count,
            "execution_time_ms": execution_time_ms,
        });
        metadata.insert(
            "output_json".to_string(),
            serde_json::json!(serde_json::to_string(&output_snapshot).unwrap_or_default()),
        );

        // `output` stage itself is near-instant (just serialization); still
        // recorded for the `node_execution_times` completeness invariant.
        let output_elapsed = start.elapsed().as_millis() as u64;
        metadata.insert(STAGE_OUTPUT.to_string(), serde_json::json!(output_elapsed));

        LocationResult::success(
            state.location_name.clone(),
            outcome.weather_comment,
            outcome.advice_comment,
            serde_json::Value::Object(metadata),
        )
    }

    fn finish_failure(&self, state: PipelineState, error_type: ErrorType) -> LocationResult {
        let execution_time_ms = state.workflow_start_time.elapsed().as_millis() as u64;
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "node_execution_times".to_string(),
            serde_json::to_value(&state.node_execution_times).unwrap_or(serde_json::Value::Null),
        );
        metadata.insert("execution_time_ms".to_string(), serde_json::json!(execution_time_ms));
        metadata.insert("errors".to_string(), serde_json::json!(state.errors));
        if !state.warnings.is_empty() {
            metadata.insert("warnings".to_string(), serde_json::json!(state.warnings));
        }
        LocationResult::failure(state.location_name.clone(), error_type, serde_json::Value::Object(metadata))
    }
}
