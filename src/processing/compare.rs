use std::collections::BTreeMap;

use crate::models::series::metrics_for;
use crate::models::{
    Change, ComparisonKind, ComparisonRecord, Direction, MetricSeries, MissingReason,
    QueryComparison, QueryRow,
};

/// Percentage change as a fraction of `prior`.
///
/// A zero prior gives a flat zero when the current value is zero too and a
/// missing-data flag otherwise. Non-finite inputs are missing data.
pub fn percent_change(current: f64, prior: f64) -> Change {
    if !current.is_finite() {
        return Change::MissingData {
            reason: MissingReason::NoCurrentData,
        };
    }
    if !prior.is_finite() {
        return Change::MissingData {
            reason: MissingReason::NoPriorData,
        };
    }
    if prior == 0.0 {
        return if current == 0.0 {
            Change::Computed {
                pct: 0.0,
                direction: Direction::Flat,
            }
        } else {
            Change::MissingData {
                reason: MissingReason::ZeroBaseline,
            }
        };
    }

    let pct = (current - prior) / prior;
    if !pct.is_finite() {
        return Change::MissingData {
            reason: MissingReason::ZeroBaseline,
        };
    }
    Change::Computed {
        pct,
        direction: Direction::from_change(pct),
    }
}

pub fn compare_values(current: Option<f64>, prior: Option<f64>) -> Change {
    match (current, prior) {
        (None, _) => Change::MissingData {
            reason: MissingReason::NoCurrentData,
        },
        (Some(_), None) => Change::MissingData {
            reason: MissingReason::NoPriorData,
        },
        (Some(current), Some(prior)) => percent_change(current, prior),
    }
}

/// One record per catalogued metric of the series' source. Used unchanged for
/// period-over-period and year-over-year windows.
pub fn compare_series(
    current: &MetricSeries,
    prior: Option<&MetricSeries>,
    kind: ComparisonKind,
) -> Vec<ComparisonRecord> {
    metrics_for(current.source)
        .iter()
        .map(|spec| {
            let current_value = current.aggregate(spec.name, spec.aggregation);
            let prior_value = prior.and_then(|p| p.aggregate(spec.name, spec.aggregation));
            ComparisonRecord {
                metric: spec.name.to_string(),
                source: current.source,
                kind,
                current: current_value,
                prior: prior_value,
                change: compare_values(current_value, prior_value),
            }
        })
        .collect()
}

/// Impressions comparison per query over the union of both windows. A query
/// absent from a window counts as zero impressions there.
pub fn compare_queries(current: &[QueryRow], prior: &[QueryRow]) -> Vec<QueryComparison> {
    let mut merged: BTreeMap<&str, (Option<&QueryRow>, Option<&QueryRow>)> = BTreeMap::new();
    for row in current {
        merged.entry(row.query.as_str()).or_default().0 = Some(row);
    }
    for row in prior {
        merged.entry(row.query.as_str()).or_default().1 = Some(row);
    }

    merged
        .into_iter()
        .map(|(query, (cur, prev))| {
            let current_impressions = cur.map(|r| r.impressions).unwrap_or(0.0);
            let prior_impressions = prev.map(|r| r.impressions).unwrap_or(0.0);
            QueryComparison {
                query: query.to_string(),
                current_impressions,
                prior_impressions,
                current_clicks: cur.map(|r| r.clicks).unwrap_or(0.0),
                current_position: cur.map(|r| r.position),
                change: percent_change(current_impressions, prior_impressions),
            }
        })
        .collect()
}
