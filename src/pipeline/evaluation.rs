//! Validation framework: a small set of scoring functions folded into one
//! verdict, replacing the source's eight-class scorer-inheritance hierarchy.
//!
//! Each criterion is a plain function producing a [`CriterionScore`]; the
//! registry is just a `Vec` of them, keyed by `criterion_id` for
//! pluggability — no trait object, no base class.

use super::state::{ValidationResult, WeatherContext};
use serde::{Deserialize, Serialize};

/// One scorer's verdict on one candidate pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion_id: String,
    pub score: f64,
    pub weight: f64,
    pub reason: Option<String>,
}

/// The three modes the source calls `strict`/`moderate`/`relaxed`, each a
/// fixed threshold table — behavior never exceeds what the table encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    Strict,
    Moderate,
    Relaxed,
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdSet {
    pub min_score: f64,
    pub max_reasons: usize,
}

impl EvaluationMode {
    pub fn thresholds(&self) -> ThresholdSet {
        match self {
            EvaluationMode::Strict => ThresholdSet { min_score: 0.8, max_reasons: 0 },
            EvaluationMode::Moderate => ThresholdSet { min_score: 0.6, max_reasons: 1 },
            EvaluationMode::Relaxed => ThresholdSet { min_score: 0.4, max_reasons: 3 },
        }
    }
}

type CriterionFn = fn(&WeatherContext, &(String, String)) -> CriterionScore;

/// The registry of criterion functions, in fold order.
const CRITERIA: &[CriterionFn] = &[
    nonempty_text,
    length_within_bounds,
    mentions_weather_condition,
];

fn nonempty_text(_ctx: &WeatherContext, pair: &(String, String)) -> CriterionScore {
    let ok = !pair.0.trim().is_empty() && !pair.1.trim().is_empty();
    CriterionScore {
        criterion_id: "nonempty_text".to_string(),
        score: if ok { 1.0 } else { 0.0 },
        weight: 1.0,
        reason: if ok { None } else { Some("comment or advice text is empty".to_string()) },
    }
}

fn length_within_bounds(_ctx: &WeatherContext, pair: &(String, String)) -> CriterionScore {
    const MAX_LEN: usize = 200;
    let ok = pair.0.chars().count() <= MAX_LEN && pair.1.chars().count() <= MAX_LEN;
    CriterionScore {
        criterion_id: "length_within_bounds".to_string(),
        score: if ok { 1.0 } else { 0.3 },
        weight: 0.5,
        reason: if ok { None } else { Some("comment exceeds 200 characters".to_string()) },
    }
}

fn mentions_weather_condition(ctx: &WeatherContext, pair: &(String, String)) -> CriterionScore {
    if ctx.weather_condition.is_empty() || ctx.weather_condition == "unknown" {
        return CriterionScore {
            criterion_id: "mentions_weather_condition".to_string(),
            score: 1.0,
            weight: 0.3,
            reason: None,
        };
    }
    let ok = pair.0.contains(&ctx.weather_condition) || pair.1.contains(&ctx.weather_condition);
    CriterionScore {
        criterion_id: "mentions_weather_condition".to_string(),
        score: if ok { 1.0 } else { 0.6 },
        weight: 0.3,
        reason: if ok { None } else { Some("comment does not reference the forecast weather condition".to_string()) },
    }
}

/// Fold the registry into one weighted score, compare against `mode`'s
/// threshold table, and return the tagged verdict.
pub fn evaluate_pair(ctx: &WeatherContext, pair: &(String, String), mode: EvaluationMode) -> ValidationResult {
    let scores: Vec<CriterionScore> = CRITERIA.iter().map(|f| f(ctx, pair)).collect();

    let total_weight: f64 = scores.iter().map(|s| s.weight).sum();
    let weighted_score = if total_weight > 0.0 {
        scores.iter().map(|s| s.score * s.weight).sum::<f64>() / total_weight
    } else {
        1.0
    };

    let reasons: Vec<String> = scores.iter().filter_map(|s| s.reason.clone()).collect();
    let thresholds = mode.thresholds();

    if weighted_score >= thresholds.min_score && reasons.len() <= thresholds.max_reasons {
        ValidationResult::Valid { score: weighted_score }
    } else {
        ValidationResult::Invalid { score: weighted_score, reasons }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ctx() -> WeatherContext {
        WeatherContext {
            location_name: "東京".to_string(),
            target_datetime: Utc::now(),
            forecasts: vec![],
            weather_condition: "晴れ".to_string(),
        }
    }

    #[test]
    fn relaxed_mode_accepts_borderline_pair() {
        let pair = ("少し曇り".to_string(), "折りたたみ傘を".to_string());
        let verdict = evaluate_pair(&ctx(), &pair, EvaluationMode::Relaxed);
        assert!(verdict.is_valid());
    }

    #[test]
    fn strict_mode_rejects_pair_missing_weather_mention() {
        let pair = ("少し曇り".to_string(), "折りたたみ傘を".to_string());
        let verdict = evaluate_pair(&ctx(), &pair, EvaluationMode::Strict);
        assert!(!verdict.is_valid());
    }

    #[test]
    fn empty_text_is_always_invalid() {
        let pair = ("".to_string(), "advice".to_string());
        let verdict = evaluate_pair(&ctx(), &pair, EvaluationMode::Relaxed);
        assert!(!verdict.is_valid());
    }

    #[test]
    fn matching_weather_condition_satisfies_strict_mode() {
        let pair = ("今日は晴れです".to_string(), "日焼け止めを忘れずに".to_string());
        let verdict = evaluate_pair(&ctx(), &pair, EvaluationMode::Strict);
        assert!(verdict.is_valid());
    }
}
