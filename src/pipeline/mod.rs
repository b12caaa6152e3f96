pub mod evaluation;
pub mod executor;
pub mod generator;
pub mod state;

pub use evaluation::{evaluate_pair, CriterionScore, EvaluationMode, ThresholdSet};
pub use executor::{PipelineExecutor, PipelineMode};
pub use generator::{CommentGenerator, StaticCommentGenerator};
pub use state::{BatchResult, GenerationOutcome, LocationResult, PipelineState, ValidationResult, WeatherContext};
