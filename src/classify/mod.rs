// src/classify/mod.rs
//! Classification strategies: the remote primary model and the local
//! heuristic fallback, behind one tagged union.

pub mod fallback;
pub mod primary;

use std::time::Duration;

use crate::error::ClassifierUnavailable;
use crate::mood::{DecisionSource, EmotionScores, MoodLabel};
use crate::normalize::NormalizedText;

pub use fallback::{FallbackScorer, Lexicon};
pub use primary::{
    build_provider, DisabledProvider, DynProvider, EmotionProvider, EmotionScore,
    HuggingFaceProvider, MockProvider, PrimaryAdapter,
};

/// A label with the confidence the producing strategy assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub label: MoodLabel,
    pub confidence: f32,
    /// Per-emotion model output; `None` for the lexicon scorer.
    pub emotions: Option<EmotionScores>,
}

impl Scored {
    pub fn new(label: MoodLabel, confidence: f32) -> Self {
        Self {
            label,
            confidence,
            emotions: None,
        }
    }
}

/// What a single strategy made of the text.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Accepted(Scored),
    LowConfidence(Scored),
    Unavailable(ClassifierUnavailable),
}

/// One step of the classification chain.
pub enum Strategy<'a> {
    /// Remote model; accepted only at or above `accept_threshold`.
    Primary {
        adapter: &'a PrimaryAdapter,
        timeout: Duration,
        accept_threshold: f32,
    },
    /// Lexicon scorer; always accepted.
    Fallback(&'a FallbackScorer),
}

impl Strategy<'_> {
    pub fn source(&self) -> DecisionSource {
        match self {
            Strategy::Primary { .. } => DecisionSource::Primary,
            Strategy::Fallback(_) => DecisionSource::Fallback,
        }
    }

    pub async fn attempt(&self, text: &NormalizedText) -> Attempt {
        match self {
            Strategy::Primary {
                adapter,
                timeout,
                accept_threshold,
            } => match adapter.classify(text, *timeout).await {
                Ok(scored) if scored.confidence >= *accept_threshold => Attempt::Accepted(scored),
                Ok(scored) => Attempt::LowConfidence(scored),
                Err(e) => Attempt::Unavailable(e),
            },
            Strategy::Fallback(scorer) => Attempt::Accepted(scorer.scored(text)),
        }
    }
}
