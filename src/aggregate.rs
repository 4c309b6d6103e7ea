// src/aggregate.rs
//! # Mood Aggregator
//! Calendar-aligned windows over dated mood labels.
//!
//! Weekly windows follow ISO weeks (Monday 00:00 UTC up to the next Monday),
//! monthly windows the calendar month. `period_end` is exclusive. Everything
//! here is a pure function of its inputs; a window is rebuilt, never updated.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NoDataError;
use crate::mood::{top_by_priority, DatedMood, MoodLabel};

/// Shift in negative share above which a trend counts as moving.
pub const TREND_EPSILON: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowSpec {
    #[default]
    Weekly,
    Monthly,
}

impl WindowSpec {
    /// `[start, end)` of the window containing `anchor`.
    pub fn bounds(self, anchor: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let day = anchor.date_naive();
        let (start, end) = match self {
            WindowSpec::Weekly => {
                let back = u64::from(day.weekday().num_days_from_monday());
                let start = day.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN);
                let end = start.checked_add_days(Days::new(7)).unwrap_or(NaiveDate::MAX);
                (start, end)
            }
            WindowSpec::Monthly => {
                let start = day.with_day(1).unwrap_or(day);
                let end = start
                    .checked_add_months(Months::new(1))
                    .unwrap_or(NaiveDate::MAX);
                (start, end)
            }
        };
        (midnight(start), midnight(end))
    }

    /// An instant inside the window right before the one containing `anchor`.
    pub fn previous_anchor(self, anchor: DateTime<Utc>) -> DateTime<Utc> {
        let (start, _) = self.bounds(anchor);
        start - chrono::Duration::seconds(1)
    }
}

fn midnight(d: NaiveDate) -> DateTime<Utc> {
    d.and_time(NaiveTime::MIN).and_utc()
}

/// Count per label; every label is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodCounts {
    pub happy: u32,
    pub sad: u32,
    pub stressed: u32,
    pub neutral: u32,
    pub anxious: u32,
}

impl MoodCounts {
    pub fn get(&self, label: MoodLabel) -> u32 {
        match label {
            MoodLabel::Happy => self.happy,
            MoodLabel::Sad => self.sad,
            MoodLabel::Stressed => self.stressed,
            MoodLabel::Neutral => self.neutral,
            MoodLabel::Anxious => self.anxious,
        }
    }

    fn slot(&mut self, label: MoodLabel) -> &mut u32 {
        match label {
            MoodLabel::Happy => &mut self.happy,
            MoodLabel::Sad => &mut self.sad,
            MoodLabel::Stressed => &mut self.stressed,
            MoodLabel::Neutral => &mut self.neutral,
            MoodLabel::Anxious => &mut self.anxious,
        }
    }

    pub fn increment(&mut self, label: MoodLabel) {
        let c = self.slot(label);
        *c = c.saturating_add(1);
    }

    pub fn total(&self) -> u32 {
        MoodLabel::ALL.iter().map(|l| self.get(*l)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MoodLabel, u32)> + '_ {
        MoodLabel::ALL.iter().map(move |l| (*l, self.get(*l)))
    }
}

/// Distribution of moods over one calendar window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodWindow {
    spec: WindowSpec,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    counts: MoodCounts,
    total: u32,
    dominant_label: Option<MoodLabel>,
}

impl MoodWindow {
    /// Build from explicit counts; `total` and `dominant_label` are derived.
    pub fn from_counts(
        spec: WindowSpec,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        counts: MoodCounts,
    ) -> Self {
        let total = counts.total();
        let dominant_label = (total > 0).then(|| top_by_priority(|l| counts.get(l)).0);
        Self {
            spec,
            period_start,
            period_end,
            counts,
            total,
            dominant_label,
        }
    }

    pub fn empty(spec: WindowSpec, anchor: DateTime<Utc>) -> Self {
        let (start, end) = spec.bounds(anchor);
        Self::from_counts(spec, start, end, MoodCounts::default())
    }

    pub fn spec(&self) -> WindowSpec {
        self.spec
    }

    pub fn period_start(&self) -> DateTime<Utc> {
        self.period_start
    }

    pub fn period_end(&self) -> DateTime<Utc> {
        self.period_end
    }

    pub fn counts(&self) -> &MoodCounts {
        &self.counts
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn dominant_label(&self) -> Option<MoodLabel> {
        self.dominant_label
    }

    /// Dominant label, or `NoDataError` for an empty window.
    pub fn dominant(&self) -> Result<MoodLabel, NoDataError> {
        self.dominant_label.ok_or(NoDataError)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.period_start <= ts && ts < self.period_end
    }

    /// Fraction of entries with `label`; 0.0 for an empty window.
    pub fn share(&self, label: MoodLabel) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.counts.get(label) as f32 / self.total as f32
    }

    /// (stressed + anxious + sad) / total; 0.0 for an empty window.
    pub fn negative_share(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        let neg: u32 = self
            .counts
            .iter()
            .filter(|(l, _)| l.is_negative())
            .map(|(_, c)| c)
            .sum();
        neg as f32 / self.total as f32
    }
}

/// Count the decisions that fall into the window containing `anchor`.
pub fn aggregate<I>(decisions: I, spec: WindowSpec, anchor: DateTime<Utc>) -> MoodWindow
where
    I: IntoIterator,
    I::Item: Into<DatedMood>,
{
    let (start, end) = spec.bounds(anchor);
    let mut counts = MoodCounts::default();
    for d in decisions {
        let d: DatedMood = d.into();
        if start <= d.timestamp && d.timestamp < end {
            counts.increment(d.label);
        }
    }
    MoodWindow::from_counts(spec, start, end, counts)
}

/// `n` consecutive windows, oldest first, the last one containing `anchor`.
pub fn series(
    decisions: &[DatedMood],
    spec: WindowSpec,
    anchor: DateTime<Utc>,
    n: usize,
) -> Vec<MoodWindow> {
    let mut out = Vec::with_capacity(n);
    let mut at = anchor;
    for _ in 0..n {
        out.push(aggregate(decisions.iter().copied(), spec, at));
        at = spec.previous_anchor(at);
    }
    out.reverse();
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoodTrend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl MoodTrend {
    pub fn as_str(self) -> &'static str {
        match self {
            MoodTrend::Improving => "improving",
            MoodTrend::Declining => "declining",
            MoodTrend::Stable => "stable",
            MoodTrend::InsufficientData => "insufficient-data",
        }
    }
}

/// Change between two consecutive windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendDelta {
    pub negative_share: f32,
    pub previous_negative_share: Option<f32>,
    /// current - previous; absent without a usable previous window.
    pub negative_share_delta: Option<f32>,
    pub happy_share_delta: Option<f32>,
    pub trend: MoodTrend,
}

/// Compare `current` against `previous`. An empty previous window counts as
/// no prior trend.
pub fn trend(current: &MoodWindow, previous: Option<&MoodWindow>) -> TrendDelta {
    let previous = previous.filter(|p| !p.is_empty());
    let negative_share = current.negative_share();
    let previous_negative_share = previous.map(MoodWindow::negative_share);

    if current.is_empty() {
        return TrendDelta {
            negative_share,
            previous_negative_share,
            negative_share_delta: None,
            happy_share_delta: None,
            trend: MoodTrend::InsufficientData,
        };
    }

    let negative_share_delta = previous_negative_share.map(|p| negative_share - p);
    let happy_share_delta =
        previous.map(|p| current.share(MoodLabel::Happy) - p.share(MoodLabel::Happy));
    let trend = match negative_share_delta {
        None => MoodTrend::InsufficientData,
        Some(d) if d > TREND_EPSILON => MoodTrend::Declining,
        Some(d) if d < -TREND_EPSILON => MoodTrend::Improving,
        Some(_) => MoodTrend::Stable,
    };
    TrendDelta {
        negative_share,
        previous_negative_share,
        negative_share_delta,
        happy_share_delta,
        trend,
    }
}
