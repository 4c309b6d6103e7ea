//! Primary classifier adapter: provider abstraction + timeout enforcement.
//!
//! A provider is an opaque emotion model (remote inference API, mock, or
//! disabled). The adapter bounds every call with a timeout and folds every
//! failure into `ClassifierUnavailable`, so the orchestrator never has to
//! tell a network error from a timeout or a malformed body.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Scored;
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ClassifierUnavailable;
use crate::mood::{top_by_priority, EmotionScores, MoodLabel};
use crate::normalize::NormalizedText;

// ------------------------------------------------------------
// Provider abstraction
// ------------------------------------------------------------

/// One (label, probability) pair as returned by an emotion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub label: String,
    pub score: f32,
}

impl EmotionScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Low-level provider: does the actual inference call. Only ever receives
/// redacted text.
#[async_trait]
pub trait EmotionProvider: Send + Sync {
    async fn infer(&self, text: &NormalizedText) -> anyhow::Result<Vec<EmotionScore>>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynProvider = Arc<dyn EmotionProvider>;

/// Hugging Face inference API (text-classification pipeline).
pub struct HuggingFaceProvider {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl HuggingFaceProvider {
    pub fn new(cfg: &ProviderConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mood-insight-engine/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building inference http client")?;
        Ok(Self {
            http,
            url: format!("{}/{}", cfg.endpoint, cfg.model),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl EmotionProvider for HuggingFaceProvider {
    async fn infer(&self, text: &NormalizedText) -> anyhow::Result<Vec<EmotionScore>> {
        if self.api_key.is_empty() {
            bail!("no inference api key configured");
        }

        #[derive(Serialize)]
        struct Req<'a> {
            inputs: &'a str,
        }
        // The pipeline answers `[[{label, score}, ...]]` for a single input;
        // some deployments drop the outer array.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Resp {
            Nested(Vec<Vec<EmotionScore>>),
            Flat(Vec<EmotionScore>),
        }

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&Req {
                inputs: text.as_str(),
            })
            .send()
            .await
            .context("inference request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("inference api returned {status}");
        }
        let body: Resp = resp.json().await.context("malformed inference response")?;
        Ok(match body {
            Resp::Nested(outer) => outer.into_iter().next().unwrap_or_default(),
            Resp::Flat(v) => v,
        })
    }

    fn name(&self) -> &'static str {
        "huggingface"
    }
}

/// Fixed answer after an optional delay; for tests and offline runs.
#[derive(Debug, Clone)]
pub struct MockProvider {
    pub label: MoodLabel,
    pub confidence: f32,
    pub latency: Duration,
}

impl MockProvider {
    pub fn new(label: MoodLabel, confidence: f32) -> Self {
        Self {
            label,
            confidence,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl EmotionProvider for MockProvider {
    async fn infer(&self, _text: &NormalizedText) -> anyhow::Result<Vec<EmotionScore>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(vec![EmotionScore::new(self.label.as_str(), self.confidence)])
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always unavailable; forces the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

#[async_trait]
impl EmotionProvider for DisabledProvider {
    async fn infer(&self, _text: &NormalizedText) -> anyhow::Result<Vec<EmotionScore>> {
        Err(anyhow!("primary classifier disabled"))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Factory: build the provider the configuration asks for.
pub fn build_provider(cfg: &ProviderConfig) -> anyhow::Result<DynProvider> {
    Ok(match cfg.kind {
        ProviderKind::HuggingFace => Arc::new(HuggingFaceProvider::new(cfg)?),
        ProviderKind::Mock => Arc::new(
            MockProvider::new(cfg.mock_label, cfg.mock_confidence)
                .with_latency(Duration::from_millis(cfg.mock_latency_ms)),
        ),
        ProviderKind::Disabled => Arc::new(DisabledProvider),
    })
}

// ------------------------------------------------------------
// Adapter
// ------------------------------------------------------------

#[derive(Clone)]
pub struct PrimaryAdapter {
    provider: DynProvider,
}

impl PrimaryAdapter {
    pub fn new(provider: DynProvider) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// One bounded attempt. Any failure, including the timeout, is
    /// `ClassifierUnavailable`.
    pub async fn classify(
        &self,
        text: &NormalizedText,
        timeout: Duration,
    ) -> Result<Scored, ClassifierUnavailable> {
        let scores = match tokio::time::timeout(timeout, self.provider.infer(text)).await {
            Err(_) => {
                return Err(ClassifierUnavailable::new(format!(
                    "timed out after {} ms",
                    timeout.as_millis()
                )))
            }
            Ok(Err(e)) => return Err(ClassifierUnavailable::new(format!("{e:#}"))),
            Ok(Ok(scores)) => scores,
        };
        fold_scores(&scores)
    }
}

/// Fold model emotion scores into the mood set. Scores mapping onto the same
/// mood are summed; unknown labels are ignored. The raw scores ride along.
fn fold_scores(scores: &[EmotionScore]) -> Result<Scored, ClassifierUnavailable> {
    let mut sums = [0f32; 5];
    let mut emotions = EmotionScores::new();
    let mut mapped = 0usize;
    for s in scores {
        if !s.score.is_finite() || !(0.0..=1.0).contains(&s.score) {
            return Err(ClassifierUnavailable::new(format!(
                "score out of range for `{}`: {}",
                s.label, s.score
            )));
        }
        *emotions.entry(s.label.trim().to_ascii_lowercase()).or_default() += s.score;
        if let Some(label) = MoodLabel::from_emotion(&s.label) {
            sums[slot(label)] += s.score;
            mapped += 1;
        }
    }
    if mapped == 0 {
        return Err(ClassifierUnavailable::new("no recognisable labels in response"));
    }
    let (label, conf) = top_by_priority(|l| sums[slot(l)]);
    Ok(Scored {
        label,
        confidence: conf.clamp(0.0, 1.0),
        emotions: Some(emotions),
    })
}

fn slot(label: MoodLabel) -> usize {
    MoodLabel::ALL
        .iter()
        .position(|l| *l == label)
        .unwrap_or_default()
}
