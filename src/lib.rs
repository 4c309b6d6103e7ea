// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod insights;
pub mod metrics;
pub mod mood;
pub mod normalize;
pub mod orchestrator;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{aggregate, MoodCounts, MoodTrend, MoodWindow, TrendDelta, WindowSpec};
pub use crate::api::{router, AppState};
pub use crate::config::EngineConfig;
pub use crate::error::{ClassifierUnavailable, NoDataError, ValidationError};
pub use crate::insights::{Insight, InsightGenerator};
pub use crate::mood::{
    ClassifiedEntry, DatedMood, DecisionSource, EmotionScores, JournalEntry, MoodDecision,
    MoodLabel,
};
pub use crate::normalize::{NormalizedText, Normalizer};
pub use crate::orchestrator::Orchestrator;

use axum::Router;
use tracing::info;

/// Build the full application from `EngineConfig::load()` (config file + env).
pub fn app() -> anyhow::Result<Router> {
    let cfg = EngineConfig::load()?;
    info!(environment = cfg.environment.as_str(), "building mood insight engine");
    let state = AppState::from_config(cfg)?;
    Ok(router(state))
}
