// src/metrics.rs
use std::time::Duration;

use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::mood::DecisionSource;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder (once per process) and return its handle.
pub fn install() -> anyhow::Result<PrometheusHandle> {
    let handle = HANDLE.get_or_try_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))
    })?;
    ensure_described();
    Ok(handle.clone())
}

/// Router exposing `/metrics` in the Prometheus exposition format.
pub fn router<S>(handle: PrometheusHandle) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "mood_classifications_total",
            "Mood decisions emitted, by source (primary/fallback)."
        );
        describe_counter!(
            "mood_primary_unavailable_total",
            "Primary classifier failures or timeouts absorbed by the fallback."
        );
        describe_counter!(
            "mood_primary_low_confidence_total",
            "Primary answers below the acceptance threshold."
        );
        describe_counter!(
            "mood_validation_rejected_total",
            "Inputs rejected before classification."
        );
        describe_counter!("mood_insights_total", "Insights generated, by trigger rule.");
        describe_histogram!(
            "mood_classify_duration_ms",
            "End-to-end classification time in milliseconds."
        );
    });
}

pub(crate) fn record_decision(source: DecisionSource, elapsed: Duration) {
    counter!("mood_classifications_total", "source" => source.as_str()).increment(1);
    histogram!("mood_classify_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

pub(crate) fn record_primary_unavailable() {
    counter!("mood_primary_unavailable_total").increment(1);
}

pub(crate) fn record_primary_low_confidence() {
    counter!("mood_primary_low_confidence_total").increment(1);
}

pub(crate) fn record_validation_rejected() {
    counter!("mood_validation_rejected_total").increment(1);
}

pub(crate) fn record_insight(rule: &'static str) {
    counter!("mood_insights_total", "rule" => rule).increment(1);
}
