//! Mood labels, decisions and the journal-entry records they attach to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed set of mood labels produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodLabel {
    Happy,
    Sad,
    Stressed,
    Neutral,
    Anxious,
}

impl MoodLabel {
    pub const ALL: [MoodLabel; 5] = [
        MoodLabel::Happy,
        MoodLabel::Sad,
        MoodLabel::Stressed,
        MoodLabel::Neutral,
        MoodLabel::Anxious,
    ];

    /// Tie-break order: negative affect first.
    pub const PRIORITY: [MoodLabel; 5] = [
        MoodLabel::Stressed,
        MoodLabel::Anxious,
        MoodLabel::Sad,
        MoodLabel::Happy,
        MoodLabel::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MoodLabel::Happy => "happy",
            MoodLabel::Sad => "sad",
            MoodLabel::Stressed => "stressed",
            MoodLabel::Neutral => "neutral",
            MoodLabel::Anxious => "anxious",
        }
    }

    pub fn is_negative(self) -> bool {
        matches!(
            self,
            MoodLabel::Stressed | MoodLabel::Anxious | MoodLabel::Sad
        )
    }

    /// Map a label from an emotion model's vocabulary onto the mood set.
    ///
    /// Accepts the mood names themselves as well as the usual 7-class emotion
    /// vocabulary (anger, disgust, fear, joy, neutral, sadness, surprise).
    pub fn from_emotion(raw: &str) -> Option<Self> {
        let l = raw.trim().to_ascii_lowercase();
        if let Ok(m) = l.parse::<MoodLabel>() {
            return Some(m);
        }
        match l.as_str() {
            "joy" | "love" | "optimism" => Some(MoodLabel::Happy),
            "sadness" | "grief" => Some(MoodLabel::Sad),
            "fear" | "nervousness" => Some(MoodLabel::Anxious),
            "anger" | "disgust" | "annoyance" => Some(MoodLabel::Stressed),
            "surprise" => Some(MoodLabel::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoodLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "happy" => Ok(MoodLabel::Happy),
            "sad" => Ok(MoodLabel::Sad),
            "stressed" => Ok(MoodLabel::Stressed),
            "neutral" => Ok(MoodLabel::Neutral),
            "anxious" => Ok(MoodLabel::Anxious),
            other => Err(format!("unknown mood label: {other}")),
        }
    }
}

/// Pick the label with the highest value, walking `MoodLabel::PRIORITY` so
/// that ties go to the earlier (more negative) label.
pub fn top_by_priority<T, F>(mut value: F) -> (MoodLabel, T)
where
    T: PartialOrd + Copy,
    F: FnMut(MoodLabel) -> T,
{
    let mut best = MoodLabel::PRIORITY[0];
    let mut best_val = value(best);
    for &label in &MoodLabel::PRIORITY[1..] {
        let v = value(label);
        if v > best_val {
            best = label;
            best_val = v;
        }
    }
    (best, best_val)
}

/// Which strategy produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Primary,
    Fallback,
}

impl DecisionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionSource::Primary => "primary",
            DecisionSource::Fallback => "fallback",
        }
    }
}

pub type EntryId = String;

/// Raw per-emotion probabilities as reported by the primary model.
pub type EmotionScores = BTreeMap<String, f32>;

/// Outcome of classifying one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodDecision {
    pub label: MoodLabel,
    /// In `[0.0, 1.0]`. Fallback decisions carry the fixed fallback constant.
    pub confidence: f32,
    pub source: DecisionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
    /// Only set for primary decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<EmotionScores>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    Structured,
    Unstructured,
}

/// Journal entry as handed over by the journaling UI (or OCR capture).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub mode: EntryMode,
}

/// Record layout the external store keeps per entry once classified.
/// Enough to re-run aggregation without classifying again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEntry {
    pub id: EntryId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub mode: EntryMode,
    pub label: MoodLabel,
    pub confidence: f32,
    pub source: DecisionSource,
}

impl ClassifiedEntry {
    pub fn new(entry: JournalEntry, decision: &MoodDecision) -> Self {
        Self {
            id: entry.id,
            text: entry.text,
            created_at: entry.created_at,
            mode: entry.mode,
            label: decision.label,
            confidence: decision.confidence,
            source: decision.source,
        }
    }

    pub fn decision(&self) -> MoodDecision {
        MoodDecision {
            label: self.label,
            confidence: self.confidence,
            source: self.source,
            entry_id: Some(self.id.clone()),
            emotions: None,
        }
    }
}

/// A label pinned to the moment it was recorded; the aggregator's input unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedMood {
    pub label: MoodLabel,
    pub timestamp: DateTime<Utc>,
}

impl DatedMood {
    pub fn new(label: MoodLabel, timestamp: DateTime<Utc>) -> Self {
        Self { label, timestamp }
    }
}

impl From<(&MoodDecision, DateTime<Utc>)> for DatedMood {
    fn from((d, ts): (&MoodDecision, DateTime<Utc>)) -> Self {
        Self::new(d.label, ts)
    }
}

impl From<&ClassifiedEntry> for DatedMood {
    fn from(e: &ClassifiedEntry) -> Self {
        Self::new(e.label, e.created_at)
    }
}
