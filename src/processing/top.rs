use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{QueryComparison, QueryRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthBasis {
    Absolute,
    Percentage,
}

impl FromStr for GrowthBasis {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "absolute" => Ok(GrowthBasis::Absolute),
            "percentage" | "percent" => Ok(GrowthBasis::Percentage),
            other => Err(AppError::Config(format!(
                "TOP_PERFORMER_BASIS must be 'absolute' or 'percentage', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    Growth,
    Decline,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopPerformers {
    pub growth: Vec<QueryComparison>,
    pub decline: Vec<QueryComparison>,
    pub opportunities: Vec<QueryRow>,
}

fn score(record: &QueryComparison, basis: GrowthBasis) -> Option<f64> {
    match basis {
        GrowthBasis::Absolute => Some(record.absolute_change()),
        GrowthBasis::Percentage => record.change.pct(),
    }
}

/// Top `n` queries by growth (or decline) on `basis`. Ties go to the larger
/// current-period volume. Records without a computable percentage are
/// skipped on the percentage basis.
pub fn rank(
    records: &[QueryComparison],
    basis: GrowthBasis,
    ranking: Ranking,
    n: usize,
) -> Vec<QueryComparison> {
    let mut scored: Vec<(f64, &QueryComparison)> = records
        .iter()
        .filter_map(|r| score(r, basis).map(|s| (s, r)))
        .filter(|(s, _)| match ranking {
            Ranking::Growth => *s > 0.0,
            Ranking::Decline => *s < 0.0,
        })
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| {
        let by_score = match ranking {
            Ranking::Growth => sb.partial_cmp(sa),
            Ranking::Decline => sa.partial_cmp(sb),
        }
        .unwrap_or(Ordering::Equal);
        by_score
            .then_with(|| {
                b.current_impressions
                    .partial_cmp(&a.current_impressions)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.query.cmp(&b.query))
    });

    scored.into_iter().take(n).map(|(_, r)| r.clone()).collect()
}

/// Queries just off the first results page (positions 11 to 20) with
/// above-median impressions, most impressions first.
pub fn position_opportunities(rows: &[QueryRow], limit: usize) -> Vec<QueryRow> {
    let Some(median) = median(rows.iter().map(|r| r.impressions)) else {
        return Vec::new();
    };

    let mut candidates: Vec<&QueryRow> = rows
        .iter()
        .filter(|r| (11.0..=20.0).contains(&r.position) && r.impressions > median)
        .collect();
    candidates.sort_by(|a, b| {
        b.impressions
            .partial_cmp(&a.impressions)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.query.cmp(&b.query))
    });
    candidates.into_iter().take(limit).cloned().collect()
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut values: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

pub fn identify(
    records: &[QueryComparison],
    current_rows: &[QueryRow],
    basis: GrowthBasis,
    top_n: usize,
    opportunity_limit: usize,
) -> TopPerformers {
    TopPerformers {
        growth: rank(records, basis, Ranking::Growth, top_n),
        decline: rank(records, basis, Ranking::Decline, top_n),
        opportunities: position_opportunities(current_rows, opportunity_limit),
    }
}
