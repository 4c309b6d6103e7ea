// src/classify/fallback.rs
//! Heuristic fallback scorer: lexicon lookup, per-label weight sums.
//!
//! Total and deterministic. Used whenever the primary classifier is
//! unavailable or not confident enough. Every result carries the same fixed
//! confidence, so fallback decisions are recognisable even without `source`.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::{LexiconConfig, DEFAULT_FALLBACK_CONFIDENCE, DEFAULT_NEGATION_WINDOW};
use super::Scored;
use crate::mood::{top_by_priority, MoodLabel};
use crate::normalize::NormalizedText;

/// token -> {label: weight}
pub type Lexicon = HashMap<String, LabelWeights>;

static DEFAULT_LEXICON: Lazy<Arc<Lexicon>> = Lazy::new(|| {
    let raw = include_str!("../../mood_lexicon.json");
    Arc::new(parse_lexicon(raw).expect("valid embedded mood lexicon"))
});

/// The lexicon compiled into the binary.
pub(crate) fn embedded_lexicon() -> &'static Lexicon {
    &DEFAULT_LEXICON
}

/// Summed weight per label.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LabelWeights([f32; 5]);

impl LabelWeights {
    fn idx(label: MoodLabel) -> usize {
        match label {
            MoodLabel::Happy => 0,
            MoodLabel::Sad => 1,
            MoodLabel::Stressed => 2,
            MoodLabel::Neutral => 3,
            MoodLabel::Anxious => 4,
        }
    }

    pub fn get(&self, label: MoodLabel) -> f32 {
        self.0[Self::idx(label)]
    }

    pub fn add(&mut self, label: MoodLabel, w: f32) {
        self.0[Self::idx(label)] += w;
    }

    fn accumulate(&mut self, other: &LabelWeights) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallbackScorer {
    lexicon: Arc<Lexicon>,
    confidence: f32,
    negation_window: usize,
}

impl Default for FallbackScorer {
    fn default() -> Self {
        Self::new(
            DEFAULT_LEXICON.clone(),
            DEFAULT_FALLBACK_CONFIDENCE,
            DEFAULT_NEGATION_WINDOW,
        )
    }
}

impl FallbackScorer {
    pub fn new(lexicon: Arc<Lexicon>, confidence: f32, negation_window: usize) -> Self {
        Self {
            lexicon,
            confidence: confidence.clamp(0.0, 1.0),
            negation_window,
        }
    }

    /// Build from config; a configured lexicon file replaces the embedded one.
    pub fn from_config(cfg: &LexiconConfig, confidence: f32) -> Result<Self> {
        let lexicon = match &cfg.path {
            Some(p) => Arc::new(load_lexicon_file(p)?),
            None => DEFAULT_LEXICON.clone(),
        };
        Ok(Self::new(lexicon, confidence, cfg.negation_window))
    }

    /// The fixed confidence stamped on every fallback result.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn lexicon_len(&self) -> usize {
        self.lexicon.len()
    }

    /// Label with the highest summed weight; neutral when nothing scores.
    pub fn score(&self, text: &NormalizedText) -> (MoodLabel, f32) {
        let weights = self.weights(text);
        let (label, best) = top_by_priority(|l| weights.get(l));
        if best > 0.0 {
            (label, self.confidence)
        } else {
            (MoodLabel::Neutral, self.confidence)
        }
    }

    pub fn scored(&self, text: &NormalizedText) -> Scored {
        let (label, confidence) = self.score(text);
        Scored::new(label, confidence)
    }

    /// Tokens the lexicon knows about.
    pub fn tokens(&self) -> impl Iterator<Item = &str> + '_ {
        self.lexicon.keys().map(String::as_str)
    }

    /// Per-label weight sums over all lexicon hits (negated hits skipped).
    pub fn weights(&self, text: &NormalizedText) -> LabelWeights {
        let tokens: Vec<&str> = tokenize(text.as_str()).collect();
        let mut sums = LabelWeights::default();

        for (i, tok) in tokens.iter().enumerate() {
            let Some(w) = self.lexicon.get(*tok) else {
                continue;
            };
            let negated = (1..=self.negation_window).any(|k| i >= k && is_negator(tokens[i - k]));
            if !negated {
                sums.accumulate(w);
            }
        }
        sums
    }
}

/// Words: alphanumeric runs, inner apostrophes kept ("didn't").
fn tokenize(s: &str) -> impl Iterator<Item = &str> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "nor"
            | "hardly"
            | "without"
            | "cannot"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "weren't"
            | "won't"
            | "can't"
            | "don't"
            | "didn't"
            | "doesn't"
            | "haven't"
    )
}

/// Parse `{"token": {"label": weight, ...}, ...}`. Unknown labels are an error.
pub fn parse_lexicon(raw: &str) -> Result<Lexicon> {
    let parsed: HashMap<String, HashMap<String, f32>> = serde_json::from_str(raw)?;
    let mut out = Lexicon::with_capacity(parsed.len());
    for (token, labels) in parsed {
        let mut w = LabelWeights::default();
        for (label, weight) in labels {
            let label: MoodLabel = label
                .parse()
                .map_err(|e: String| anyhow!("lexicon entry `{token}`: {e}"))?;
            if !weight.is_finite() {
                return Err(anyhow!("lexicon entry `{token}` has a non-finite weight"));
            }
            w.add(label, weight);
        }
        out.insert(token.trim().to_lowercase(), w);
    }
    Ok(out)
}

pub fn load_lexicon_file(path: &Path) -> Result<Lexicon> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading mood lexicon from {}", path.display()))?;
    parse_lexicon(&raw).with_context(|| format!("parsing mood lexicon at {}", path.display()))
}
