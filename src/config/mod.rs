// src/config/mod.rs
//! Engine configuration: TOML file + environment overrides.
//!
//! Resolution order:
//! 1) `$MOOD_CONFIG_PATH`, else `config/engine.toml` (missing file => defaults)
//! 2) environment variables (see `ENV_*` constants) override file values
//! 3) `sanitize()` clamps everything into a usable range
//!
//! A file that exists but does not parse is an error; we never silently run
//! with half a config.

pub mod provider;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub use provider::{ProviderConfig, ProviderKind};

pub const DEFAULT_CONFIG_PATH: &str = "config/engine.toml";

pub const ENV_CONFIG_PATH: &str = "MOOD_CONFIG_PATH";
pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";
pub const ENV_ACCEPT_THRESHOLD: &str = "MOOD_ACCEPT_THRESHOLD";
pub const ENV_PRIMARY_TIMEOUT_MS: &str = "MOOD_PRIMARY_TIMEOUT_MS";
pub const ENV_FALLBACK_CONFIDENCE: &str = "MOOD_FALLBACK_CONFIDENCE";
pub const ENV_MAX_TEXT_LENGTH: &str = "MOOD_MAX_TEXT_LENGTH";
pub const ENV_LEXICON_PATH: &str = "MOOD_LEXICON_PATH";
pub const ENV_CORS_ORIGINS: &str = "CORS_ORIGINS";
pub const ENV_METRICS_ROUTES: &str = "METRICS_ROUTES";
pub const ENV_MIN_ENTRIES: &str = "MIN_ENTRIES_FOR_INSIGHTS";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "LOG_FILE";

pub const DEFAULT_ACCEPT_THRESHOLD: f32 = 0.6;
pub const DEFAULT_PRIMARY_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_FALLBACK_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 5_000;
pub const DEFAULT_NEGATION_WINDOW: usize = 3;
pub const DEFAULT_NEGATIVE_SHARE_THRESHOLD: f32 = 0.6;
pub const DEFAULT_POSITIVE_SHARE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MIN_ENTRIES: u32 = 1;

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 30_000;
const MAX_NEGATION_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(anyhow!(
                "ENVIRONMENT must be one of development/staging/production, got `{other}`"
            )),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// `tracing` has no critical level; it maps to error.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            other => Err(anyhow!(
                "LOG_LEVEL must be one of debug/info/warning/error/critical, got `{other}`"
            )),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Orchestrator policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Primary results below this confidence go to the fallback scorer.
    pub accept_threshold: f32,
    pub primary_timeout_ms: u64,
    /// Fixed confidence stamped on every fallback decision.
    pub fallback_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            primary_timeout_ms: DEFAULT_PRIMARY_TIMEOUT_MS,
            fallback_confidence: DEFAULT_FALLBACK_CONFIDENCE,
        }
    }
}

impl ClassifierConfig {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub max_text_length: usize,
    /// Extra names to redact regardless of context (case-insensitive, whole word).
    pub known_names: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            known_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    /// JSON lexicon replacing the embedded one.
    pub path: Option<PathBuf>,
    /// Tokens looked back for a negator; 0 disables negation.
    pub negation_window: usize,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            path: None,
            negation_window: DEFAULT_NEGATION_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub negative_share_threshold: f32,
    pub positive_share_threshold: f32,
    /// Fewer entries than this in the current window => insufficient-data rule.
    pub min_entries: u32,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            negative_share_threshold: DEFAULT_NEGATIVE_SHARE_THRESHOLD,
            positive_share_threshold: DEFAULT_POSITIVE_SHARE_THRESHOLD,
            min_entries: DEFAULT_MIN_ENTRIES,
        }
    }
}

/// Log verbosity and optional rotating log file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `RUST_LOG` still wins when set.
    pub level: Option<LogLevel>,
    /// Rotated daily, five files kept.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Empty => permissive CORS (local development).
    pub cors_origins: Vec<String>,
    /// Expose `/metrics`.
    pub metrics_routes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:19006".to_string(),
            ],
            metrics_routes: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub environment: Environment,
    pub classifier: ClassifierConfig,
    pub provider: ProviderConfig,
    pub normalizer: NormalizerConfig,
    pub lexicon: LexiconConfig,
    pub insights: InsightConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load using `$MOOD_CONFIG_PATH` (or the default path) and process env.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = Self::from_path_or_default(&path)?;
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Parse `path` if it exists; defaults otherwise.
    pub fn from_path_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing engine config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: EngineConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    /// Apply overrides from a key lookup (process env in production,
    /// a closure over a map in tests).
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get(ENV_ENVIRONMENT) {
            self.environment = v.parse()?;
        }
        if let Some(v) = parse_env::<f32>(&get, ENV_ACCEPT_THRESHOLD)? {
            self.classifier.accept_threshold = v;
        }
        if let Some(v) = parse_env::<u64>(&get, ENV_PRIMARY_TIMEOUT_MS)? {
            self.classifier.primary_timeout_ms = v;
        }
        if let Some(v) = parse_env::<f32>(&get, ENV_FALLBACK_CONFIDENCE)? {
            self.classifier.fallback_confidence = v;
        }
        if let Some(v) = parse_env::<usize>(&get, ENV_MAX_TEXT_LENGTH)? {
            self.normalizer.max_text_length = v;
        }
        if let Some(v) = get(ENV_LEXICON_PATH).filter(|s| !s.trim().is_empty()) {
            self.lexicon.path = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get(ENV_CORS_ORIGINS) {
            self.server.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get(ENV_METRICS_ROUTES) {
            self.server.metrics_routes = v.trim() == "1";
        }
        if let Some(v) = parse_env::<u32>(&get, ENV_MIN_ENTRIES)? {
            self.insights.min_entries = v;
        }
        if let Some(v) = parse_env::<LogLevel>(&get, ENV_LOG_LEVEL)? {
            self.logging.level = Some(v);
        }
        if let Some(v) = get(ENV_LOG_FILE).filter(|s| !s.trim().is_empty()) {
            self.logging.file = Some(PathBuf::from(v.trim()));
        }
        self.provider.apply_overrides(&get)?;
        Ok(())
    }

    /// Clamp values into their valid ranges.
    pub fn sanitize(&mut self) {
        let c = &mut self.classifier;
        c.accept_threshold = clamp_unit(c.accept_threshold, DEFAULT_ACCEPT_THRESHOLD);
        c.fallback_confidence = clamp_unit(c.fallback_confidence, DEFAULT_FALLBACK_CONFIDENCE);
        c.primary_timeout_ms = c.primary_timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);

        if self.normalizer.max_text_length == 0 {
            self.normalizer.max_text_length = DEFAULT_MAX_TEXT_LENGTH;
        }
        self.normalizer
            .known_names
            .retain(|n| !n.trim().is_empty());

        self.lexicon.negation_window = self.lexicon.negation_window.min(MAX_NEGATION_WINDOW);

        let i = &mut self.insights;
        i.negative_share_threshold =
            clamp_unit(i.negative_share_threshold, DEFAULT_NEGATIVE_SHARE_THRESHOLD);
        i.positive_share_threshold =
            clamp_unit(i.positive_share_threshold, DEFAULT_POSITIVE_SHARE_THRESHOLD);
        i.min_entries = i.min_entries.max(1);

        self.provider.sanitize();
    }
}

fn parse_env<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match get(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("{key} has an invalid value: `{raw}`")),
    }
}

/// NaN or infinite => default; otherwise clamp into `[0, 1]`.
fn clamp_unit(v: f32, default: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        default
    }
}
