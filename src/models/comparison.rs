use serde::{Deserialize, Serialize};

use super::{ComparisonKind, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn from_change(pct: f64) -> Self {
        if pct > 0.0 {
            Direction::Up
        } else if pct < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    NoCurrentData,
    NoPriorData,
    /// Prior value was zero while the current one was not.
    ZeroBaseline,
}

impl MissingReason {
    pub fn describe(&self) -> &'static str {
        match self {
            MissingReason::NoCurrentData => "no data for the current period",
            MissingReason::NoPriorData => "no data for the comparison period",
            MissingReason::ZeroBaseline => "no baseline in the comparison period",
        }
    }
}

/// Outcome of comparing two window values. A computed `pct` is always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Change {
    Computed { pct: f64, direction: Direction },
    MissingData { reason: MissingReason },
}

impl Change {
    pub fn pct(&self) -> Option<f64> {
        match self {
            Change::Computed { pct, .. } => Some(*pct),
            Change::MissingData { .. } => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Change::Computed { direction, .. } => Some(*direction),
            Change::MissingData { .. } => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Change::MissingData { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub metric: String,
    pub source: Source,
    pub kind: ComparisonKind,
    pub current: Option<f64>,
    pub prior: Option<f64>,
    pub change: Change,
}

/// Query-level impressions comparison used for top-performer ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryComparison {
    pub query: String,
    pub current_impressions: f64,
    pub prior_impressions: f64,
    pub current_clicks: f64,
    pub current_position: Option<f64>,
    pub change: Change,
}

impl QueryComparison {
    pub fn absolute_change(&self) -> f64 {
        self.current_impressions - self.prior_impressions
    }
}

/// Comparison record sets per source and comparison kind. `None` means the
/// set could not be computed, usually because the current window is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparisons {
    #[serde(default)]
    pub gsc_period: Option<Vec<ComparisonRecord>>,
    #[serde(default)]
    pub gsc_year: Option<Vec<ComparisonRecord>>,
    #[serde(default)]
    pub ga4_period: Option<Vec<ComparisonRecord>>,
    #[serde(default)]
    pub ga4_year: Option<Vec<ComparisonRecord>>,
}

impl Comparisons {
    pub fn get(&self, source: Source, kind: ComparisonKind) -> Option<&[ComparisonRecord]> {
        match (source, kind) {
            (Source::Gsc, ComparisonKind::PeriodOverPeriod) => self.gsc_period.as_deref(),
            (Source::Gsc, ComparisonKind::YearOverYear) => self.gsc_year.as_deref(),
            (Source::Ga4, ComparisonKind::PeriodOverPeriod) => self.ga4_period.as_deref(),
            (Source::Ga4, ComparisonKind::YearOverYear) => self.ga4_year.as_deref(),
        }
    }

    pub fn set(
        &mut self,
        source: Source,
        kind: ComparisonKind,
        records: Option<Vec<ComparisonRecord>>,
    ) {
        let slot = match (source, kind) {
            (Source::Gsc, ComparisonKind::PeriodOverPeriod) => &mut self.gsc_period,
            (Source::Gsc, ComparisonKind::YearOverYear) => &mut self.gsc_year,
            (Source::Ga4, ComparisonKind::PeriodOverPeriod) => &mut self.ga4_period,
            (Source::Ga4, ComparisonKind::YearOverYear) => &mut self.ga4_year,
        };
        *slot = records;
    }

    /// All records of one kind across both sources, GSC first.
    pub fn for_kind(&self, kind: ComparisonKind) -> Vec<ComparisonRecord> {
        [Source::Gsc, Source::Ga4]
            .into_iter()
            .filter_map(|source| self.get(source, kind))
            .flat_map(|records| records.iter().cloned())
            .collect()
    }
}
