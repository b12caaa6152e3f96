pub mod orchestrator;

pub use orchestrator::{BatchOrchestrator, ProgressCallback};
