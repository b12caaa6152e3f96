//! Weather commentary generation pipeline: fetches forecasts, retrieves
//! human-authored reference comments, and drives an LLM-selection
//! collaborator to produce a `(weather comment, advice comment)` pair per
//! location, across a batch of locations with bounded parallelism.
//!
//! See `DESIGN.md` for the grounding ledger and `SPEC_FULL.md` for the
//! full requirements this crate implements. The library surface exists so
//! integration tests (`tests/`) can drive the pipeline end-to-end with a
//! mocked forecast service and a deterministic `CommentGenerator`, the same
//! way `src/main.rs` drives it against a real one.

pub mod batch;
pub mod cache;
pub mod comments;
pub mod config;
pub mod errors;
pub mod forecast;
pub mod location;
pub mod persistence;
pub mod pipeline;
