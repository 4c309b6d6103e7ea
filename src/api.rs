// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::aggregate::{aggregate, WindowSpec};
use crate::config::{EngineConfig, ServerConfig};
use crate::error::ValidationError;
use crate::insights::InsightGenerator;
use crate::metrics;
use crate::mood::{DatedMood, EmotionScores, MoodLabel};
use crate::orchestrator::{Orchestrator, SharedOrchestrator};

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SharedOrchestrator,
    pub insights: Arc<InsightGenerator>,
    pub config: Arc<EngineConfig>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, insights: InsightGenerator, config: EngineConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            insights: Arc::new(insights),
            config: Arc::new(config),
        }
    }

    pub fn from_config(config: EngineConfig) -> anyhow::Result<Self> {
        let orchestrator = Orchestrator::from_config(&config)?;
        let insights = InsightGenerator::new(config.insights.clone());
        Ok(Self::new(orchestrator, insights, config))
    }
}

/// Build the public router: routes at the root and again under `/api/v1`,
/// plus `/metrics` when enabled in config.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .merge(routes())
        .nest(API_PREFIX, routes());

    if state.config.server.metrics_routes {
        match metrics::install() {
            Ok(handle) => app = app.merge(metrics::router(handle)),
            Err(e) => warn!(error = %e, "metrics routes requested but recorder unavailable"),
        }
    }

    let cors = cors_layer(&state.config.server);
    app.layer(cors).with_state(state)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/insights", post(insights))
}

fn cors_layer(cfg: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() || cfg.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::very_permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

// ---------- errors ----------

/// JSON error body: `{"error": "...", "status_code": 400}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::new(e.status(), e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        let body = json!({
            "error": self.message,
            "status_code": self.status.as_u16(),
        });
        (self.status, Json(body)).into_response()
    }
}

// ---------- handlers ----------

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Mood insight engine",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "api": API_PREFIX,
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "environment": state.config.environment.as_str(),
        "primary_enabled": state.orchestrator.primary_enabled(),
        "insights_available": true,
    }))
}

#[derive(Debug, Deserialize)]
struct AnalyzeReq {
    #[serde(default)]
    text: String,
    /// Echo the primary model's per-emotion scores.
    #[serde(default)]
    include_emotions: bool,
}

#[derive(Debug, Serialize)]
struct AnalyzeResp {
    mood: MoodLabel,
    confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    emotions: Option<EmotionScores>,
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeReq>, JsonRejection>,
) -> Result<Json<AnalyzeResp>, ApiError> {
    let Json(req) = payload?;
    let decision = state.orchestrator.classify(&req.text).await?;
    Ok(Json(AnalyzeResp {
        mood: decision.label,
        confidence: decision.confidence,
        emotions: decision.emotions.filter(|_| req.include_emotions),
    }))
}

/// `{"label": "sad", "timestamp": "..."}` or a bare `"sad"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MoodItem {
    Dated {
        label: MoodLabel,
        timestamp: DateTime<Utc>,
    },
    Bare(MoodLabel),
}

impl MoodItem {
    fn dated(&self, now: DateTime<Utc>) -> DatedMood {
        match *self {
            MoodItem::Dated { label, timestamp } => DatedMood::new(label, timestamp),
            MoodItem::Bare(label) => DatedMood::new(label, now),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsightsReq {
    #[serde(default)]
    moods: Vec<MoodItem>,
}

#[derive(Debug, Serialize)]
struct InsightsResp {
    suggestion: &'static str,
    trigger_rule: &'static str,
    mood_trend: &'static str,
    dominant_emotion: Option<MoodLabel>,
}

async fn insights(
    State(state): State<AppState>,
    payload: Result<Json<InsightsReq>, JsonRejection>,
) -> Result<Json<InsightsResp>, ApiError> {
    let Json(req) = payload?;
    let now = Utc::now();
    let moods: Vec<DatedMood> = req.moods.iter().map(|m| m.dated(now)).collect();

    let spec = WindowSpec::Weekly;
    let anchor = moods.iter().map(|m| m.timestamp).max().unwrap_or(now);
    let current = aggregate(moods.iter().copied(), spec, anchor);
    let previous = aggregate(moods.iter().copied(), spec, spec.previous_anchor(anchor));

    let insight = state.insights.generate(&current, Some(&previous));
    info!(
        entries = moods.len(),
        in_window = current.total(),
        rule = insight.trigger_rule,
        "insight served"
    );
    Ok(Json(InsightsResp {
        suggestion: insight.text,
        trigger_rule: insight.trigger_rule,
        mood_trend: insight.trend.as_str(),
        dominant_emotion: insight.dominant_emotion(),
    }))
}
