// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod assist;
pub mod config;
pub mod error;
pub mod metrics;
pub mod posts;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{AnalysisRequest, Category, ContentPipeline, PostAnalysis};
pub use crate::api::router;
pub use crate::error::GenerationError;

use axum::Router;

/// Build the full in-process app from the environment (config, rules,
/// telemetry, metrics). Must be called inside a Tokio runtime.
pub async fn app() -> anyhow::Result<Router> {
    let state = api::AppState::from_env()?;
    Ok(api::router(state))
}
