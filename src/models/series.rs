use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Inclusive day count.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub metric: String,
    pub value: f64,
}

/// Daily values for one client, one source and one date window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub source: Source,
    pub range: DateRange,
    pub points: Vec<MetricPoint>,
}

impl MetricSeries {
    pub fn new(source: Source, range: DateRange) -> Self {
        Self {
            source,
            range,
            points: Vec::new(),
        }
    }

    pub fn push(&mut self, date: NaiveDate, metric: &str, value: f64) {
        self.points.push(MetricPoint {
            date,
            metric: metric.to_string(),
            value,
        });
    }

    /// Sorts by date then metric name so downstream output is stable.
    pub fn sort(&mut self) {
        self.points
            .sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.metric.cmp(&b.metric)));
    }

    pub fn values<'a>(&'a self, metric: &'a str) -> impl Iterator<Item = f64> + 'a {
        self.points
            .iter()
            .filter(move |p| p.metric == metric)
            .map(|p| p.value)
    }

    /// Aggregated window value, `None` when the series has no rows for `metric`.
    pub fn aggregate(&self, metric: &str, aggregation: Aggregation) -> Option<f64> {
        let mut count = 0usize;
        let mut total = 0.0;
        for value in self.values(metric).filter(|v| v.is_finite()) {
            count += 1;
            total += value;
        }
        if count == 0 {
            return None;
        }
        Some(match aggregation {
            Aggregation::Sum => total,
            Aggregation::Mean => total / count as f64,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    Sum,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Count,
    /// Stored as a fraction, shown as a percentage.
    Ratio,
    Decimal,
    Seconds,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub source: Source,
    pub aggregation: Aggregation,
    pub higher_is_better: bool,
    pub format: ValueFormat,
}

pub const GSC_METRICS: &[MetricSpec] = &[
    MetricSpec {
        name: "clicks",
        label: "Clicks",
        source: Source::Gsc,
        aggregation: Aggregation::Sum,
        higher_is_better: true,
        format: ValueFormat::Count,
    },
    MetricSpec {
        name: "impressions",
        label: "Impressions",
        source: Source::Gsc,
        aggregation: Aggregation::Sum,
        higher_is_better: true,
        format: ValueFormat::Count,
    },
    MetricSpec {
        name: "ctr",
        label: "CTR",
        source: Source::Gsc,
        aggregation: Aggregation::Mean,
        higher_is_better: true,
        format: ValueFormat::Ratio,
    },
    MetricSpec {
        name: "position",
        label: "Avg. Position",
        source: Source::Gsc,
        aggregation: Aggregation::Mean,
        higher_is_better: false,
        format: ValueFormat::Decimal,
    },
];

pub const GA4_METRICS: &[MetricSpec] = &[
    MetricSpec {
        name: "newUsers",
        label: "New Users",
        source: Source::Ga4,
        aggregation: Aggregation::Sum,
        higher_is_better: true,
        format: ValueFormat::Count,
    },
    MetricSpec {
        name: "sessions",
        label: "Sessions",
        source: Source::Ga4,
        aggregation: Aggregation::Sum,
        higher_is_better: true,
        format: ValueFormat::Count,
    },
    MetricSpec {
        name: "engagedSessions",
        label: "Engaged Sessions",
        source: Source::Ga4,
        aggregation: Aggregation::Sum,
        higher_is_better: true,
        format: ValueFormat::Count,
    },
    MetricSpec {
        name: "engagementRate",
        label: "Engagement Rate",
        source: Source::Ga4,
        aggregation: Aggregation::Mean,
        higher_is_better: true,
        format: ValueFormat::Ratio,
    },
    MetricSpec {
        name: "averageSessionDuration",
        label: "Avg. Session Duration",
        source: Source::Ga4,
        aggregation: Aggregation::Mean,
        higher_is_better: true,
        format: ValueFormat::Seconds,
    },
    MetricSpec {
        name: "bounceRate",
        label: "Bounce Rate",
        source: Source::Ga4,
        aggregation: Aggregation::Mean,
        higher_is_better: false,
        format: ValueFormat::Ratio,
    },
];

pub fn metrics_for(source: Source) -> &'static [MetricSpec] {
    match source {
        Source::Gsc => GSC_METRICS,
        Source::Ga4 => GA4_METRICS,
    }
}

pub fn find_metric(name: &str) -> Option<&'static MetricSpec> {
    GSC_METRICS
        .iter()
        .chain(GA4_METRICS.iter())
        .find(|m| m.name == name)
}

impl ValueFormat {
    pub fn display(&self, value: f64) -> String {
        match self {
            ValueFormat::Count => group_thousands(value.round() as i64),
            ValueFormat::Ratio => format!("{:.2}%", value * 100.0),
            ValueFormat::Decimal => format!("{value:.1}"),
            ValueFormat::Seconds => {
                let total = value.round() as i64;
                format!("{}m {:02}s", total / 60, total % 60)
            }
        }
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 { format!("-{out}") } else { out }
}

/// One Search Console query row for a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRow {
    pub query: String,
    pub clicks: f64,
    pub impressions: f64,
    pub ctr: f64,
    pub position: f64,
}
