use crate::models::series::find_metric;
use crate::models::{Change, ComparisonKind, ComparisonRecord};

use super::SummaryRequest;

pub fn system_prompt(min_chars: usize, max_chars: usize) -> String {
    format!(
        "You are an SEO analyst writing the opening paragraph of a weekly client report. \
         Write in plain, confident business English for a non-technical reader. \
         Describe the overall direction of organic search performance and what it suggests, \
         without quoting any numbers or percentages. \
         Keep the paragraph between {min_chars} and {max_chars} characters and end with a complete sentence."
    )
}

fn window_phrase(kind: ComparisonKind) -> &'static str {
    match kind {
        ComparisonKind::PeriodOverPeriod => {
            "the current reporting period compared with the period immediately before it"
        }
        ComparisonKind::YearOverYear => {
            "the current reporting period compared with the same period one year earlier"
        }
    }
}

pub(crate) fn describe_record(record: &ComparisonRecord) -> String {
    let (label, higher_is_better) = find_metric(&record.metric)
        .map(|m| (m.label, m.higher_is_better))
        .unwrap_or((record.metric.as_str(), true));

    match record.change {
        Change::Computed { pct, .. } => {
            let improved = if higher_is_better { pct > 0.0 } else { pct < 0.0 };
            let verdict = if pct == 0.0 {
                "unchanged"
            } else if improved {
                "improved"
            } else {
                "worsened"
            };
            format!(
                "- {label} ({}): {:+.1}% ({verdict})",
                record.source.label(),
                pct * 100.0
            )
        }
        Change::MissingData { reason } => {
            format!("- {label} ({}): not comparable, {}", record.source.label(), reason.describe())
        }
    }
}

pub fn user_prompt(request: &SummaryRequest, min_chars: usize, max_chars: usize) -> String {
    let mut prompt = format!(
        "Client: {}\nComparison: {}\n\nMetric changes:\n",
        request.client,
        window_phrase(request.kind)
    );
    for record in &request.records {
        prompt.push_str(&describe_record(record));
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nFor average position a lower value is better. \
         Write one paragraph of {min_chars} to {max_chars} characters. No numbers, no bullet points."
    ));
    prompt
}

/// Trims model output to `max_chars` characters, preferring the last full
/// sentence and otherwise the last word boundary followed by an ellipsis.
pub fn fit_to_length(text: &str, max_chars: usize) -> String {
    let text = text.trim().trim_matches('"').trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    if let Some(idx) = cut.rfind(['.', '!', '?'])
        && idx + 1 >= cut.len() / 2
    {
        return cut[..=idx].trim().to_string();
    }

    let head: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    let head = match head.rfind(char::is_whitespace) {
        Some(i) if i > head.len() / 2 => &head[..i],
        _ => head.as_str(),
    };
    format!("{}…", head.trim_end())
}
