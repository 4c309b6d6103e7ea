// src/config/provider.rs
use serde::Deserialize;

use crate::mood::MoodLabel;

pub const ENV_PROVIDER: &str = "MOOD_PROVIDER";
pub const ENV_MODEL: &str = "SENTIMENT_MODEL";
pub const ENV_HF_TOKEN: &str = "HUGGINGFACE_TOKEN";

pub const DEFAULT_MODEL: &str = "j-hartmann/emotion-english-distilroberta-base";
pub const DEFAULT_ENDPOINT: &str = "https://api-inference.huggingface.co/models";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_mock_label() -> MoodLabel {
    MoodLabel::Neutral
}
fn default_mock_confidence() -> f32 {
    0.9
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    #[serde(alias = "hf")]
    HuggingFace,
    Mock,
    Disabled,
}

impl ProviderKind {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hf" => Ok(ProviderKind::HuggingFace),
            "mock" => Ok(ProviderKind::Mock),
            "disabled" | "off" | "none" => Ok(ProviderKind::Disabled),
            other => anyhow::bail!("Unsupported mood provider: {other}"),
        }
    }
}

/// Primary classifier backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// "ENV" means: read from HUGGINGFACE_TOKEN. Resolved in `sanitize`.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Mock provider answer (tests / offline runs).
    #[serde(default = "default_mock_label")]
    pub mock_label: MoodLabel,
    #[serde(default = "default_mock_confidence")]
    pub mock_confidence: f32,
    #[serde(default)]
    pub mock_latency_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: default_model(),
            endpoint: default_endpoint(),
            api_key: default_api_key(),
            mock_label: default_mock_label(),
            mock_confidence: default_mock_confidence(),
            mock_latency_ms: 0,
        }
    }
}

impl ProviderConfig {
    pub(crate) fn apply_overrides<F>(&mut self, get: &F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get(ENV_PROVIDER) {
            self.kind = ProviderKind::parse(&v)?;
        }
        if let Some(v) = get(ENV_MODEL).filter(|s| !s.trim().is_empty()) {
            self.model = v.trim().to_string();
        }
        // Resolve api key if "ENV"
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = get(ENV_HF_TOKEN).unwrap_or_default().trim().to_string();
        }
        Ok(())
    }

    pub(crate) fn sanitize(&mut self) {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            // Never resolved (no override pass ran) => no key.
            self.api_key.clear();
        }
        self.endpoint = self.endpoint.trim_end_matches('/').to_string();
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        if !(0.0..=1.0).contains(&self.mock_confidence) {
            self.mock_confidence = default_mock_confidence();
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}
