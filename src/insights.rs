// src/insights.rs
//! Insight generator: turns a mood window (and optionally the one before it)
//! into a single suggestion.
//!
//! Rules are evaluated in table order; the first predicate that holds wins.
//! The last rule always holds, so `generate` never fails.

use serde::Serialize;
use tracing::debug;

use crate::aggregate::{trend, MoodTrend, MoodWindow};
use crate::config::InsightConfig;
use crate::metrics;
use crate::mood::MoodLabel;

pub const RULE_NO_DATA: &str = "no-data";
pub const RULE_INSUFFICIENT_DATA: &str = "insufficient-data";
pub const RULE_RISING_NEGATIVE: &str = "rising-negative";
pub const RULE_SUSTAINED_POSITIVE: &str = "sustained-positive";
pub const RULE_DEFAULT: &str = "default";

pub const NO_ENTRIES_TEXT: &str =
    "No entries yet. Write a few lines about your day to start seeing insights.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub text: &'static str,
    pub trigger_rule: &'static str,
    pub trend: MoodTrend,
    pub window: MoodWindow,
}

impl Insight {
    pub fn dominant_emotion(&self) -> Option<MoodLabel> {
        self.window.dominant_label()
    }
}

/// Everything a rule predicate may look at.
struct RuleInput<'a> {
    current: &'a MoodWindow,
    /// Only non-empty previous windows; an empty one is "no prior trend".
    previous: Option<&'a MoodWindow>,
    cfg: &'a InsightConfig,
}

struct Rule {
    id: &'static str,
    applies: fn(&RuleInput<'_>) -> bool,
    suggestions: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        id: RULE_NO_DATA,
        applies: no_data,
        suggestions: &[NO_ENTRIES_TEXT],
    },
    Rule {
        id: RULE_INSUFFICIENT_DATA,
        applies: too_few_entries,
        suggestions: &[
            "A few more entries this week will help spot patterns. Keep writing a line or two each day.",
            "Not much to go on yet. Check in again after a couple more entries.",
        ],
    },
    Rule {
        id: RULE_RISING_NEGATIVE,
        applies: rising_negative,
        suggestions: &[
            "This week has felt heavy. Try a slow breathing exercise: in for four, hold for four, out for six.",
            "Stress has been building lately. A short walk outside or ten minutes away from screens can help reset.",
            "You've been carrying a lot. Consider reaching out to someone you trust and telling them how the week went.",
            "Tough stretch. Break the next task into one small step and give yourself credit for finishing it.",
        ],
    },
    Rule {
        id: RULE_SUSTAINED_POSITIVE,
        applies: sustained_positive,
        suggestions: &[
            "You've had a bright week. Note three things that went well so you can come back to them later.",
            "Good days are adding up. Think about what made them work and how to keep a bit of it in your routine.",
            "Lots of happy entries lately. Consider thanking someone who was part of it.",
        ],
    },
    Rule {
        id: RULE_DEFAULT,
        applies: always,
        suggestions: &[
            "Take a moment to reflect: what was one thing that shaped your mood this week?",
            "Which moment this week would you like to have more of, and which one less of?",
            "Look back over your entries. Is there a pattern in when you feel most at ease?",
        ],
    },
];

fn no_data(input: &RuleInput<'_>) -> bool {
    input.current.is_empty()
}

fn too_few_entries(input: &RuleInput<'_>) -> bool {
    input.current.total() < input.cfg.min_entries
}

fn rising_negative(input: &RuleInput<'_>) -> bool {
    let share = input.current.negative_share();
    if share < input.cfg.negative_share_threshold {
        return false;
    }
    match input.previous {
        Some(prev) => share > prev.negative_share(),
        None => true,
    }
}

fn sustained_positive(input: &RuleInput<'_>) -> bool {
    input.current.dominant_label() == Some(MoodLabel::Happy)
        && input.current.share(MoodLabel::Happy) >= input.cfg.positive_share_threshold
}

fn always(_: &RuleInput<'_>) -> bool {
    true
}

/// Stable pick from a pool, keyed on the window's counts.
fn pick(pool: &'static [&'static str], window: &MoodWindow) -> &'static str {
    if pool.len() <= 1 {
        return pool.first().copied().unwrap_or(NO_ENTRIES_TEXT);
    }
    let key = window
        .counts()
        .iter()
        .enumerate()
        .fold(window.total() as usize, |acc, (i, (_, c))| {
            acc.wrapping_mul(31).wrapping_add((i + 1) * c as usize)
        });
    pool[key % pool.len()]
}

#[derive(Debug, Clone, Default)]
pub struct InsightGenerator {
    cfg: InsightConfig,
}

impl InsightGenerator {
    pub fn new(cfg: InsightConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.cfg
    }

    pub fn generate(&self, current: &MoodWindow, previous: Option<&MoodWindow>) -> Insight {
        let previous = previous.filter(|p| !p.is_empty());
        let input = RuleInput {
            current,
            previous,
            cfg: &self.cfg,
        };
        // RULES ends with an always-true entry; the fallback here is never hit.
        let rule = RULES
            .iter()
            .find(|r| (r.applies)(&input))
            .unwrap_or(&RULES[RULES.len() - 1]);

        metrics::record_insight(rule.id);
        debug!(
            rule = rule.id,
            total = current.total(),
            negative_share = current.negative_share(),
            "insight generated"
        );
        Insight {
            text: pick(rule.suggestions, current),
            trigger_rule: rule.id,
            trend: trend(current, previous).trend,
            window: current.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, MoodCounts, WindowSpec};
    use crate::mood::DatedMood;
    use chrono::{DateTime, TimeZone, Utc};

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 17, 12, 0, 0).unwrap()
    }

    fn window(counts: MoodCounts) -> MoodWindow {
        let (s, e) = WindowSpec::Weekly.bounds(anchor());
        MoodWindow::from_counts(WindowSpec::Weekly, s, e, counts)
    }

    #[test]
    fn empty_window_is_no_data() {
        let g = InsightGenerator::default();
        let w = aggregate(Vec::<DatedMood>::new(), WindowSpec::Weekly, anchor());
        let i = g.generate(&w, None);
        assert_eq!(i.trigger_rule, RULE_NO_DATA);
        assert_eq!(i.text, NO_ENTRIES_TEXT);
        assert_eq!(i.dominant_emotion(), None);
        assert_eq!(i.trend, MoodTrend::InsufficientData);
    }

    #[test]
    fn rising_negative_against_calmer_week() {
        let g = InsightGenerator::default();
        let current = window(MoodCounts {
            stressed: 7,
            anxious: 1,
            happy: 2,
            ..Default::default()
        });
        let previous = window(MoodCounts {
            sad: 2,
            stressed: 2,
            happy: 4,
            neutral: 2,
            ..Default::default()
        });
        assert!((previous.negative_share() - 0.4).abs() < 1e-6);
        let i = g.generate(&current, Some(&previous));
        assert_eq!(i.trigger_rule, RULE_RISING_NEGATIVE);
        assert_eq!(i.trend, MoodTrend::Declining);
        assert_eq!(i.dominant_emotion(), Some(MoodLabel::Stressed));
    }

    #[test]
    fn high_but_falling_negative_is_not_rising() {
        let g = InsightGenerator::default();
        let current = window(MoodCounts {
            sad: 6,
            neutral: 4,
            ..Default::default()
        });
        let previous = window(MoodCounts {
            sad: 9,
            neutral: 1,
            ..Default::default()
        });
        assert_eq!(g.generate(&current, Some(&previous)).trigger_rule, RULE_DEFAULT);
    }

    #[test]
    fn empty_previous_counts_as_no_prior_trend() {
        let g = InsightGenerator::default();
        let current = window(MoodCounts {
            anxious: 4,
            happy: 1,
            ..Default::default()
        });
        let empty = window(MoodCounts::default());
        assert_eq!(g.generate(&current, Some(&empty)).trigger_rule, RULE_RISING_NEGATIVE);
        assert_eq!(g.generate(&current, None).trigger_rule, RULE_RISING_NEGATIVE);
    }

    #[test]
    fn happy_majority_is_sustained_positive() {
        let g = InsightGenerator::default();
        let current = window(MoodCounts {
            happy: 5,
            neutral: 3,
            sad: 2,
            ..Default::default()
        });
        let i = g.generate(&current, None);
        assert_eq!(i.trigger_rule, RULE_SUSTAINED_POSITIVE);
    }

    #[test]
    fn mixed_week_gets_default_prompt() {
        let g = InsightGenerator::default();
        let current = window(MoodCounts {
            happy: 3,
            neutral: 4,
            sad: 3,
            ..Default::default()
        });
        assert_eq!(g.generate(&current, None).trigger_rule, RULE_DEFAULT);
    }

    #[test]
    fn thresholds_come_from_config() {
        let g = InsightGenerator::new(InsightConfig {
            negative_share_threshold: 0.3,
            ..Default::default()
        });
        let current = window(MoodCounts {
            sad: 4,
            neutral: 6,
            ..Default::default()
        });
        assert_eq!(g.generate(&current, None).trigger_rule, RULE_RISING_NEGATIVE);
    }

    #[test]
    fn too_few_entries_below_configured_minimum() {
        let g = InsightGenerator::new(InsightConfig {
            min_entries: 3,
            ..Default::default()
        });
        let two = window(MoodCounts {
            stressed: 2,
            ..Default::default()
        });
        let i = g.generate(&two, None);
        assert_eq!(i.trigger_rule, RULE_INSUFFICIENT_DATA);
        assert_eq!(i.dominant_emotion(), Some(MoodLabel::Stressed));

        let three = window(MoodCounts {
            stressed: 3,
            ..Default::default()
        });
        assert_eq!(g.generate(&three, None).trigger_rule, RULE_RISING_NEGATIVE);

        // Empty is still no-data, not insufficient-data.
        let empty = window(MoodCounts::default());
        assert_eq!(g.generate(&empty, None).trigger_rule, RULE_NO_DATA);

        // The default minimum of one never triggers it.
        let one = window(MoodCounts {
            sad: 1,
            ..Default::default()
        });
        assert_ne!(
            InsightGenerator::default().generate(&one, None).trigger_rule,
            RULE_INSUFFICIENT_DATA
        );
    }

    #[test]
    fn same_window_same_text() {
        let g = InsightGenerator::default();
        let current = window(MoodCounts {
            stressed: 5,
            sad: 2,
            ..Default::default()
        });
        let a = g.generate(&current, None);
        let b = g.generate(&current.clone(), None);
        assert_eq!(a.text, b.text);
        let rule = RULES.iter().find(|r| r.id == RULE_RISING_NEGATIVE).unwrap();
        assert!(rule.suggestions.contains(&a.text));
    }

    #[test]
    fn rule_table_ends_with_catch_all() {
        let last = RULES.last().unwrap();
        assert_eq!(last.id, RULE_DEFAULT);
        let w = window(MoodCounts::default());
        let cfg = InsightConfig::default();
        assert!((last.applies)(&RuleInput {
            current: &w,
            previous: None,
            cfg: &cfg,
        }));
        assert!(RULES.iter().all(|r| !r.suggestions.is_empty()));
    }
}
