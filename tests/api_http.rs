// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET / and GET /health
// - POST /analyze (primary accepted, primary unavailable, timeout, validation)
// - POST /insights (empty, rising negative, bare labels, bad labels)
// - /api/v1 mirrors

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use mood_insight_engine::classify::{DisabledProvider, FallbackScorer, MockProvider, PrimaryAdapter};
use mood_insight_engine::{api, AppState, EngineConfig, InsightGenerator, MoodLabel, Normalizer, Orchestrator};

const BODY_LIMIT: usize = 1024 * 1024;
const HAPPY_TEXT: &str = "I had a wonderful day with my friends, feeling great!";

fn router_with(primary: Option<PrimaryAdapter>, timeout_ms: u64) -> Router {
    let mut cfg = EngineConfig::default();
    cfg.classifier.primary_timeout_ms = timeout_ms;
    let orchestrator = Orchestrator::new(
        Normalizer::new(&cfg.normalizer),
        primary,
        FallbackScorer::default(),
        cfg.classifier.clone(),
    );
    let insights = InsightGenerator::new(cfg.insights.clone());
    api::router(AppState::new(orchestrator, insights, cfg))
}

fn mock_router(label: MoodLabel, confidence: f32) -> Router {
    let adapter = PrimaryAdapter::new(Arc::new(MockProvider::new(label, confidence)));
    router_with(Some(adapter), 3_000)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Json) {
    let mut req = Request::builder().method(method).uri(uri);
    if body.is_some() {
        req = req.header("content-type", "application/json");
    }
    let req = req
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

async fn post_json(app: Router, uri: &str, payload: Json) -> (StatusCode, Json) {
    send(app, "POST", uri, Some(payload.to_string())).await
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, v) = send(mock_router(MoodLabel::Neutral, 0.9), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "ok");
    assert_eq!(v["environment"], "development");
    assert_eq!(v["primary_enabled"], true);
}

#[tokio::test]
async fn root_returns_service_info() {
    let (status, v) = send(router_with(None, 3_000), "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["health"], "/health");
    assert!(v["version"].is_string());
}

#[tokio::test]
async fn analyze_accepts_confident_primary() {
    let app = mock_router(MoodLabel::Happy, 0.91);
    let (status, v) = post_json(app, "/analyze", json!({ "text": HAPPY_TEXT })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["mood"], "happy");
    let conf = v["confidence"].as_f64().expect("confidence is a number");
    assert!((conf - 0.91).abs() < 1e-6, "confidence was {conf}");
    assert_eq!(v.as_object().map(|o| o.len()), Some(2), "body: {v}");
}

#[tokio::test]
async fn analyze_echoes_emotions_only_on_request() {
    let app = mock_router(MoodLabel::Happy, 0.91);
    let payload = json!({ "text": HAPPY_TEXT, "include_emotions": true });
    let (status, v) = post_json(app, "/analyze", payload).await;
    assert_eq!(status, StatusCode::OK);
    let emotions = v["emotions"].as_object().expect("emotions map");
    assert!((emotions["happy"].as_f64().unwrap() - 0.91).abs() < 1e-6, "body: {v}");

    // Fallback decisions carry no emotion scores.
    let app = router_with(Some(PrimaryAdapter::new(Arc::new(DisabledProvider))), 3_000);
    let payload = json!({ "text": HAPPY_TEXT, "include_emotions": true });
    let (status, v) = post_json(app, "/analyze", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert!(v.get("emotions").is_none(), "body: {v}");
}

#[tokio::test]
async fn analyze_falls_back_when_primary_unavailable() {
    let app = router_with(Some(PrimaryAdapter::new(Arc::new(DisabledProvider))), 3_000);
    let (status, v) = post_json(app, "/analyze", json!({ "text": HAPPY_TEXT })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["mood"], "happy");
    assert!((v["confidence"].as_f64().unwrap() - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn analyze_falls_back_on_primary_timeout() {
    let slow = MockProvider::new(MoodLabel::Happy, 0.99).with_latency(Duration::from_secs(10));
    let app = router_with(Some(PrimaryAdapter::new(Arc::new(slow))), 100);
    let started = Instant::now();
    let (status, v) = post_json(app, "/analyze", json!({ "text": "so stressed and overwhelmed" })).await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["mood"], "stressed");
    assert!((v["confidence"].as_f64().unwrap() - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn analyze_rejects_empty_missing_and_long_text() {
    for payload in [
        json!({ "text": "" }),
        json!({ "text": "   \n\t" }),
        json!({}),
        json!({ "text": "a".repeat(5_001) }),
    ] {
        let (status, v) = post_json(mock_router(MoodLabel::Happy, 0.9), "/analyze", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["status_code"], 400);
        assert!(v["error"].is_string());
    }
}

#[tokio::test]
async fn analyze_rejects_malformed_json_with_json_error() {
    let app = mock_router(MoodLabel::Happy, 0.9);
    let (status, v) = send(app, "POST", "/analyze", Some("{not json".into())).await;
    assert!(status.is_client_error(), "got {status}");
    assert_eq!(v["status_code"], status.as_u16());
}

#[tokio::test]
async fn routes_are_mirrored_under_api_v1() {
    let app = mock_router(MoodLabel::Sad, 0.8);
    let (status, v) = post_json(app, "/api/v1/analyze", json!({ "text": "rainy" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["mood"], "sad");

    let (status, _) = send(router_with(None, 3_000), "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn insights_with_no_moods_is_no_data() {
    let (status, v) = post_json(router_with(None, 3_000), "/insights", json!({ "moods": [] })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(v["suggestion"].as_str().unwrap().starts_with("No entries yet"));
    assert_eq!(v["trigger_rule"], "no-data");
    assert_eq!(v["mood_trend"], "insufficient-data");
    assert!(v["dominant_emotion"].is_null());
}

#[tokio::test]
async fn insights_detects_rising_negative_week() {
    let mut moods = Vec::new();
    // Current ISO week: Mon 2024-10-14 .. Mon 2024-10-21.
    for (label, n) in [("stressed", 7), ("anxious", 1), ("happy", 2)] {
        for i in 0..n {
            moods.push(json!({ "label": label, "timestamp": format!("2024-10-1{}T0{}:00:00Z", 4 + i % 4, i) }));
        }
    }
    // Previous week: 40% negative.
    for (label, n) in [("sad", 4), ("happy", 6)] {
        for i in 0..n {
            moods.push(json!({ "label": label, "timestamp": format!("2024-10-0{}T0{}:00:00Z", 7 + i % 3, i) }));
        }
    }
    let (status, v) = post_json(router_with(None, 3_000), "/insights", json!({ "moods": moods })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["trigger_rule"], "rising-negative");
    assert_eq!(v["mood_trend"], "declining");
    assert_eq!(v["dominant_emotion"], "stressed");
}

#[tokio::test]
async fn insights_accepts_bare_labels() {
    let payload = json!({ "moods": ["sad", "anxious", "neutral", "sad", "stressed"] });
    let (status, v) = post_json(router_with(None, 3_000), "/api/v1/insights", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["trigger_rule"], "rising-negative");
    assert_eq!(v["dominant_emotion"], "sad");
    assert_eq!(v["mood_trend"], "insufficient-data");
}

#[tokio::test]
async fn insights_happy_week_is_sustained_positive() {
    let payload = json!({ "moods": ["happy", "happy", "happy", "neutral"] });
    let (status, v) = post_json(router_with(None, 3_000), "/insights", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["trigger_rule"], "sustained-positive");
    assert_eq!(v["dominant_emotion"], "happy");
}

#[tokio::test]
async fn insights_rejects_unknown_label() {
    let payload = json!({ "moods": ["ecstatic"] });
    let (status, v) = post_json(router_with(None, 3_000), "/insights", payload).await;
    assert!(status.is_client_error(), "got {status}");
    assert_eq!(v["status_code"], status.as_u16());
}
