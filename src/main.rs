//! Mood insight engine: binary entrypoint.
//! Loads config, sets up tracing and serves the Axum router on Shuttle.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use mood_insight_engine::{api, telemetry, AppState, EngineConfig};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    let cfg = EngineConfig::load().context("loading engine config")?;
    telemetry::init_tracing(cfg.environment, &cfg.logging);

    let state = AppState::from_config(cfg).context("building classifier pipeline")?;
    let router = api::router(state);

    Ok(router.into())
}
