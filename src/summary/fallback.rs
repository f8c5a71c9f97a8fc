use std::cmp::Ordering;

use crate::models::series::find_metric;
use crate::models::{ComparisonKind, Direction};

use super::SummaryRequest;
use super::prompt::fit_to_length;

fn generic_text(kind: ComparisonKind) -> &'static str {
    match kind {
        ComparisonKind::PeriodOverPeriod => {
            "Performance data for the current period shows varied results across key metrics. \
             Please review the detailed data for specific insights."
        }
        ComparisonKind::YearOverYear => {
            "Year-over-year performance shows continued organic search development. \
             Detailed analysis of seasonal patterns and long-term trends is available in the full report."
        }
    }
}

fn lead_in(kind: ComparisonKind) -> &'static str {
    match kind {
        ComparisonKind::PeriodOverPeriod => "Compared with the previous period: ",
        ComparisonKind::YearOverYear => "Compared with the same period last year: ",
    }
}

/// Plain listing of the largest metric changes, bounded by `max_chars`.
pub fn fallback_summary(request: &SummaryRequest, max_chars: usize) -> String {
    let mut changes: Vec<(f64, String)> = request
        .records
        .iter()
        .filter_map(|record| {
            let pct = record.change.pct()?;
            let label = find_metric(&record.metric).map_or(record.metric.as_str(), |m| m.label);
            let phrase = match record.change.direction()? {
                Direction::Up => format!("{label} up {:.1}%", pct * 100.0),
                Direction::Down => format!("{label} down {:.1}%", pct.abs() * 100.0),
                Direction::Flat => format!("{label} unchanged"),
            };
            Some((pct.abs(), phrase))
        })
        .collect();
    changes.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let lead = lead_in(request.kind);
    let mut text = String::new();
    for (_, phrase) in &changes {
        let candidate = if text.is_empty() {
            format!("{lead}{phrase}")
        } else {
            format!("{text}, {phrase}")
        };
        if candidate.chars().count() + 1 > max_chars {
            break;
        }
        text = candidate;
    }

    if text.is_empty() {
        return fit_to_length(generic_text(request.kind), max_chars);
    }
    text.push('.');
    text
}
