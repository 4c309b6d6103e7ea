// src/orchestrator.rs
//! Classification orchestrator.
//!
//! Per request: `Normalizing -> ClassifyingPrimary -> (Accepted | Fallback) -> Done`.
//!
//! * empty / over-long input stops at `Normalizing` with a `ValidationError`
//! * the primary model gets exactly one bounded attempt (no retries)
//! * unavailable or under-threshold primary answers go to the fallback scorer,
//!   which is total, so every validated request ends with one `MoodDecision`
//!
//! No state is shared between requests; one `Orchestrator` behind an `Arc`
//! serves any number of concurrent callers.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::classify::{build_provider, Attempt, FallbackScorer, PrimaryAdapter, Scored, Strategy};
use crate::config::{ClassifierConfig, EngineConfig, ProviderKind};
use crate::error::ValidationError;
use crate::metrics;
use crate::mood::{ClassifiedEntry, DecisionSource, EntryId, JournalEntry, MoodDecision};
use crate::normalize::{NormalizedText, Normalizer};
use crate::telemetry::anon_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalizing,
    ClassifyingPrimary,
    Accepted,
    Fallback,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Normalizing => "normalizing",
            Stage::ClassifyingPrimary => "classifying_primary",
            Stage::Accepted => "accepted",
            Stage::Fallback => "fallback",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

pub type SharedOrchestrator = Arc<Orchestrator>;

pub struct Orchestrator {
    normalizer: Normalizer,
    /// `None` when the provider is disabled: skip straight to the fallback.
    primary: Option<PrimaryAdapter>,
    fallback: FallbackScorer,
    policy: ClassifierConfig,
}

impl Orchestrator {
    pub fn new(
        normalizer: Normalizer,
        primary: Option<PrimaryAdapter>,
        fallback: FallbackScorer,
        policy: ClassifierConfig,
    ) -> Self {
        Self {
            normalizer,
            primary,
            fallback,
            policy,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> anyhow::Result<Self> {
        let fallback =
            FallbackScorer::from_config(&cfg.lexicon, cfg.classifier.fallback_confidence)
                .context("loading fallback lexicon")?;
        // Mood words from a custom lexicon must survive name redaction too.
        let normalizer = Normalizer::new(&cfg.normalizer).with_vocabulary(fallback.tokens());
        let primary = match cfg.provider.kind {
            ProviderKind::Disabled => None,
            _ => Some(PrimaryAdapter::new(
                build_provider(&cfg.provider).context("building primary classifier")?,
            )),
        };
        if cfg.provider.kind == ProviderKind::HuggingFace && !cfg.provider.has_api_key() {
            warn!("no inference api key set; every request will use the fallback scorer");
        }
        info!(
            provider = primary.as_ref().map(|p| p.provider_name()).unwrap_or("none"),
            accept_threshold = cfg.classifier.accept_threshold,
            timeout_ms = cfg.classifier.primary_timeout_ms,
            lexicon_entries = fallback.lexicon_len(),
            "orchestrator ready"
        );
        Ok(Self::new(normalizer, primary, fallback, cfg.classifier.clone()))
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn policy(&self) -> &ClassifierConfig {
        &self.policy
    }

    pub fn fallback_confidence(&self) -> f32 {
        self.fallback.confidence()
    }

    pub fn primary_enabled(&self) -> bool {
        self.primary.is_some()
    }

    /// Normalize and classify raw text.
    pub async fn classify(&self, raw: &str) -> Result<MoodDecision, ValidationError> {
        self.classify_with_id(raw, None).await
    }

    /// Classify a journal entry and return the record the store keeps.
    pub async fn classify_entry(
        &self,
        entry: JournalEntry,
    ) -> Result<ClassifiedEntry, ValidationError> {
        let decision = self.classify_with_id(&entry.text, Some(entry.id.clone())).await?;
        Ok(ClassifiedEntry::new(entry, &decision))
    }

    async fn classify_with_id(
        &self,
        raw: &str,
        entry_id: Option<EntryId>,
    ) -> Result<MoodDecision, ValidationError> {
        debug!(stage = %Stage::Normalizing);
        let text = match self.normalizer.normalize(raw) {
            Ok(t) => t,
            Err(e) => {
                metrics::record_validation_rejected();
                debug!(error = %e, "input rejected");
                return Err(e);
            }
        };
        Ok(self.classify_normalized(&text, entry_id).await)
    }

    /// Classify already-normalized text. Infallible.
    pub async fn classify_normalized(
        &self,
        text: &NormalizedText,
        entry_id: Option<EntryId>,
    ) -> MoodDecision {
        let started = Instant::now();
        let id = anon_hash(text.as_str());

        let outcome = match self.try_primary(&id, text).await {
            Some(scored) => Outcome {
                scored,
                source: DecisionSource::Primary,
            },
            None => {
                debug!(%id, stage = %Stage::Fallback);
                Outcome {
                    scored: self.fallback.scored(text),
                    source: DecisionSource::Fallback,
                }
            }
        };
        self.finish(&id, text, outcome, entry_id, started)
    }

    /// The single bounded primary attempt; `None` hands over to the fallback.
    async fn try_primary(&self, id: &str, text: &NormalizedText) -> Option<Scored> {
        let adapter = self.primary.as_ref()?;
        let strategy = Strategy::Primary {
            adapter,
            timeout: self.policy.primary_timeout(),
            accept_threshold: self.policy.accept_threshold,
        };
        debug!(%id, stage = %Stage::ClassifyingPrimary);
        match strategy.attempt(text).await {
            Attempt::Accepted(scored) => {
                debug!(%id, stage = %Stage::Accepted);
                Some(scored)
            }
            Attempt::LowConfidence(scored) => {
                metrics::record_primary_low_confidence();
                debug!(
                    %id,
                    label = %scored.label,
                    confidence = scored.confidence,
                    threshold = self.policy.accept_threshold,
                    "primary below threshold"
                );
                None
            }
            Attempt::Unavailable(e) => {
                metrics::record_primary_unavailable();
                warn!(%id, reason = %e.reason, "primary classifier unavailable");
                None
            }
        }
    }

    fn finish(
        &self,
        id: &str,
        text: &NormalizedText,
        outcome: Outcome,
        entry_id: Option<EntryId>,
        started: Instant,
    ) -> MoodDecision {
        let Outcome { scored, source } = outcome;
        let elapsed = started.elapsed();
        metrics::record_decision(source, elapsed);
        // Never log raw text. Only hashed id + outcome.
        info!(
            %id,
            mood = %scored.label,
            confidence = scored.confidence,
            source = source.as_str(),
            redactions = text.redactions(),
            elapsed_ms = elapsed.as_millis() as u64,
            stage = %Stage::Done,
            "mood classified"
        );
        MoodDecision {
            label: scored.label,
            confidence: scored.confidence,
            source,
            entry_id,
            emotions: scored.emotions,
        }
    }
}

/// What the pipeline settled on, before it becomes a `MoodDecision`.
struct Outcome {
    scored: Scored,
    source: DecisionSource,
}
