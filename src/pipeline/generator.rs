//! The LLM-selection collaborator boundary.
//!
//! The core never speaks a concrete provider's wire format; it depends only
//! on this trait, following the distilled spec's "capability object"
//! language. `async_trait` is used because this trait must be object-safe
//! (`Arc<dyn CommentGenerator>`) and native AFIT-in-dyn-trait is not stable.

use crate::comments::types::ReferenceComment;
use crate::errors::AppError;
use crate::pipeline::state::{GenerationOutcome, WeatherContext};

#[async_trait::async_trait]
pub trait CommentGenerator: Send + Sync {
    /// Pick `(weather_comment, advice_comment)` from `candidates`. This is
    /// the step Classic mode's retry loop re-runs on its own: an invalid
    /// pair is re-selected without paying for a second `generate` call.
    async fn select_pair(
        &self,
        context: &WeatherContext,
        candidates: &[ReferenceComment],
    ) -> Result<(String, String), AppError>;

    /// Turn an already-selected pair into the final rendered comment text.
    async fn generate(
        &self,
        context: &WeatherContext,
        pair: &(String, String),
    ) -> Result<GenerationOutcome, AppError>;

    /// Unified mode's single call: select and generate together, retried as
    /// one unit. The default chains `select_pair` then `generate`, which is
    /// exactly what a provider with no real combined endpoint needs.
    async fn select_and_generate(
        &self,
        context: &WeatherContext,
        candidates: &[ReferenceComment],
    ) -> Result<GenerationOutcome, AppError> {
        let pair = self.select_pair(context, candidates).await?;
        self.generate(context, &pair).await
    }
}

/// A deterministic in-memory double for end-to-end tests: picks the
/// highest-`count` candidate of each kind and concatenates them for the
/// final text. Never calls out to any real LLM provider. Kept as a plain,
/// ungated module (rather than `#[cfg(test)]`) so integration tests under
/// `tests/` can use it too.
pub struct StaticCommentGenerator;

#[async_trait::async_trait]
impl CommentGenerator for StaticCommentGenerator {
    async fn select_pair(
        &self,
        context: &WeatherContext,
        candidates: &[ReferenceComment],
    ) -> Result<(String, String), AppError> {
        use crate::comments::types::CommentKind;

        let weather_comment = candidates
            .iter()
            .filter(|c| c.kind == CommentKind::WeatherComment)
            .max_by_key(|c| c.count)
            .map(|c| c.text.clone())
            .unwrap_or_else(|| format!("{}は{}です", context.location_name, context.weather_condition));

        let advice_comment = candidates
            .iter()
            .filter(|c| c.kind == CommentKind::Advice)
            .max_by_key(|c| c.count)
            .map(|c| c.text.clone())
            .unwrap_or_else(|| "念のため折りたたみ傘を持っていきましょう".to_string());

        Ok((weather_comment, advice_comment))
    }

    async fn generate(
        &self,
        _context: &WeatherContext,
        pair: &(String, String),
    ) -> Result<GenerationOutcome, AppError> {
        let (weather_comment, advice_comment) = pair.clone();
        let final_text = format!("{} {}", weather_comment, advice_comment);

        Ok(GenerationOutcome {
            weather_comment,
            advice_comment,
            final_text,
            validation_result: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::types::{CommentKind, Season};
    use chrono::Utc;

    #[tokio::test]
    async fn static_generator_prefers_highest_count_candidate() {
        let generator = StaticCommentGenerator;
        let ctx = WeatherContext {
            location_name: "東京".to_string(),
            target_datetime: Utc::now(),
            forecasts: vec![],
            weather_condition: "晴れ".to_string(),
        };
        let candidates = vec![
            ReferenceComment {
                text: "曇りがち".to_string(),
                kind: CommentKind::WeatherComment,
                season: Season::Summer,
                source_row: 1,
                count: 2,
            },
            ReferenceComment {
                text: "快晴です".to_string(),
                kind: CommentKind::WeatherComment,
                season: Season::Summer,
                source_row: 2,
                count: 9,
            },
        ];
        let outcome = generator.select_and_generate(&ctx, &candidates).await.unwrap();
        assert_eq!(outcome.weather_comment, "快晴です");
    }
}
