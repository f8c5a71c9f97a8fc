pub mod client;
pub mod comparison;
pub mod series;

pub use client::{Client, RecipientMap};
pub use comparison::{
    Change, ComparisonRecord, Comparisons, Direction, MissingReason, QueryComparison,
};
pub use series::{Aggregation, DateRange, MetricPoint, MetricSeries, MetricSpec, QueryRow};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Gsc,
    Ga4,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Gsc => "gsc",
            Source::Ga4 => "ga4",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Source::Gsc => "Google Search Console",
            Source::Ga4 => "Google Analytics",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    PeriodOverPeriod,
    YearOverYear,
}

impl ComparisonKind {
    pub const ALL: [ComparisonKind; 2] =
        [ComparisonKind::PeriodOverPeriod, ComparisonKind::YearOverYear];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonKind::PeriodOverPeriod => "period_over_period",
            ComparisonKind::YearOverYear => "year_over_year",
        }
    }

    /// Short tag used in chart file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            ComparisonKind::PeriodOverPeriod => "30vs30",
            ComparisonKind::YearOverYear => "YOY",
        }
    }
}
