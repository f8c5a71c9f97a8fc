use std::path::{Path, PathBuf};

use askama::Template;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::charts::ChartAsset;
use crate::error::AppResult;
use crate::models::series::{ValueFormat, find_metric};
use crate::models::{Change, Client, ComparisonKind, ComparisonRecord, Comparisons, Source};
use crate::processing::{ReportWindows, TopPerformers};
use crate::summary::{Summary, SummaryOrigin};

pub const GA4_PLACEHOLDER: &str = "Google Analytics data not available for this period.";
pub const GSC_PLACEHOLDER: &str = "Search Console data not available for this period.";
pub const SUMMARY_PLACEHOLDER: &str = "Summary not available for this period.";
pub const QUERIES_PLACEHOLDER: &str = "Query-level data not available for this period.";

const TREND_UP: &str = "color:#28a745;font-weight:bold;";
const TREND_DOWN: &str = "color:#dc3545;font-weight:bold;";
const TREND_NEUTRAL: &str = "color:#6c757d;";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedReport {
    pub path: PathBuf,
    pub subject: String,
    pub html: String,
    pub placeholders: usize,
}

/// Everything a client report is composed from. Any part may be absent.
pub struct ReportInput<'a> {
    pub client: &'a Client,
    pub week: u32,
    pub run_date: NaiveDate,
    pub windows: &'a ReportWindows,
    pub comparisons: &'a Comparisons,
    pub summaries: &'a [Summary],
    pub charts: &'a [ChartAsset],
    pub top: Option<&'a TopPerformers>,
}

pub fn report_subject(client_name: &str, week: u32) -> String {
    format!("Weekly SEO Update - {client_name} - Week {week}")
}

pub fn report_file_name(client: &Client, week: u32) -> String {
    format!("Weekly-Update-{}-SEO-Week{week}.html", client.slug())
}

struct MetricRow {
    label: String,
    current: String,
    prior: String,
    change: String,
    change_style: &'static str,
}

struct MetricTable {
    current_label: String,
    prior_label: String,
    rows: Vec<MetricRow>,
}

struct GscSection {
    heading: String,
    summary: String,
    summary_note: String,
    table: Option<MetricTable>,
    chart_src: String,
    chart_alt: String,
    placeholder: String,
}

struct Ga4Block {
    heading: String,
    table: Option<MetricTable>,
}

struct QueryLine {
    query: String,
    current: String,
    prior: String,
    change: String,
    change_style: &'static str,
}

struct OpportunityLine {
    query: String,
    impressions: String,
    clicks: String,
    position: String,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    title: String,
    client: &'a str,
    generated_on: String,
    window_note: String,
    gsc_sections: Vec<GscSection>,
    ga4_blocks: Vec<Ga4Block>,
    ga4_placeholder: &'a str,
    growth: Vec<QueryLine>,
    decline: Vec<QueryLine>,
    opportunities: Vec<OpportunityLine>,
    queries_placeholder: &'a str,
    has_queries: bool,
}

fn format_value(metric: &str, value: Option<f64>) -> String {
    let Some(value) = value else {
        return "n/a".to_string();
    };
    find_metric(metric)
        .map(|m| m.format)
        .unwrap_or(ValueFormat::Decimal)
        .display(value)
}

fn format_change(metric: &str, change: &Change) -> (String, &'static str) {
    match change {
        Change::Computed { pct, .. } => {
            let higher_is_better = find_metric(metric).is_none_or(|m| m.higher_is_better);
            let style = if *pct == 0.0 {
                TREND_NEUTRAL
            } else if (*pct > 0.0) == higher_is_better {
                TREND_UP
            } else {
                TREND_DOWN
            };
            let arrow = if *pct > 0.0 {
                "▲ "
            } else if *pct < 0.0 {
                "▼ "
            } else {
                ""
            };
            (format!("{arrow}{:+.1}%", pct * 100.0), style)
        }
        Change::MissingData { .. } => ("n/a".to_string(), TREND_NEUTRAL),
    }
}

fn window_labels(windows: &ReportWindows, kind: ComparisonKind) -> (String, String) {
    let current = format!("Current ({})", windows.current);
    let prior = match windows.comparison(kind) {
        Some(range) => match kind {
            ComparisonKind::PeriodOverPeriod => format!("Previous ({range})"),
            ComparisonKind::YearOverYear => format!("Last Year ({range})"),
        },
        None => "Comparison".to_string(),
    };
    (current, prior)
}

fn metric_table(records: &[ComparisonRecord], windows: &ReportWindows, kind: ComparisonKind) -> MetricTable {
    let (current_label, prior_label) = window_labels(windows, kind);
    let rows = records
        .iter()
        .map(|record| {
            let (change, change_style) = format_change(&record.metric, &record.change);
            MetricRow {
                label: find_metric(&record.metric)
                    .map_or_else(|| record.metric.clone(), |m| m.label.to_string()),
                current: format_value(&record.metric, record.current),
                prior: format_value(&record.metric, record.prior),
                change,
                change_style,
            }
        })
        .collect();
    MetricTable {
        current_label,
        prior_label,
        rows,
    }
}

fn section_heading(windows: &ReportWindows, kind: ComparisonKind) -> String {
    match kind {
        ComparisonKind::PeriodOverPeriod => format!(
            "{} Days vs Previous {}",
            windows.current.days(),
            windows.prior.days()
        ),
        ComparisonKind::YearOverYear => {
            format!("{} Day Year over Year Comparison", windows.current.days())
        }
    }
}

fn active_kinds(windows: &ReportWindows) -> Vec<ComparisonKind> {
    ComparisonKind::ALL
        .into_iter()
        .filter(|kind| windows.comparison(*kind).is_some())
        .collect()
}

fn query_lines(records: &[crate::models::QueryComparison]) -> Vec<QueryLine> {
    records
        .iter()
        .map(|r| {
            let (change, change_style) = format_change("impressions", &r.change);
            QueryLine {
                query: r.query.clone(),
                current: ValueFormat::Count.display(r.current_impressions),
                prior: ValueFormat::Count.display(r.prior_impressions),
                change,
                change_style,
            }
        })
        .collect()
}

/// Renders one client's report. Missing inputs become visible placeholders.
pub fn render_report(input: &ReportInput<'_>, output_dir: &Path) -> AppResult<RenderedReport> {
    let mut placeholders = 0usize;
    let kinds = active_kinds(input.windows);

    let gsc_sections = kinds
        .iter()
        .map(|&kind| {
            let summary = input.summaries.iter().find(|s| s.kind == kind);
            let chart = input.charts.iter().find(|c| c.kind == kind);
            let table = input
                .comparisons
                .get(Source::Gsc, kind)
                .map(|records| metric_table(records, input.windows, kind));
            if table.is_none() {
                placeholders += 1;
            }
            if summary.is_none() {
                placeholders += 1;
            }
            GscSection {
                heading: section_heading(input.windows, kind),
                summary: summary.map_or_else(|| SUMMARY_PLACEHOLDER.to_string(), |s| s.text.clone()),
                summary_note: match summary.map(|s| s.origin) {
                    Some(SummaryOrigin::Fallback) => "Automated summary".to_string(),
                    _ => String::new(),
                },
                table,
                chart_src: chart.map(ChartAsset::src).unwrap_or_default(),
                chart_alt: format!("{} chart", section_heading(input.windows, kind)),
                placeholder: GSC_PLACEHOLDER.to_string(),
            }
        })
        .collect::<Vec<_>>();

    let ga4_blocks: Vec<Ga4Block> = kinds
        .iter()
        .filter_map(|&kind| {
            input.comparisons.get(Source::Ga4, kind).map(|records| Ga4Block {
                heading: section_heading(input.windows, kind),
                table: Some(metric_table(records, input.windows, kind)),
            })
        })
        .collect();
    if ga4_blocks.is_empty() {
        placeholders += 1;
    }

    let (growth, decline, opportunities) = match input.top {
        Some(top) => (
            query_lines(&top.growth),
            query_lines(&top.decline),
            top.opportunities
                .iter()
                .map(|row| OpportunityLine {
                    query: row.query.clone(),
                    impressions: ValueFormat::Count.display(row.impressions),
                    clicks: ValueFormat::Count.display(row.clicks),
                    position: ValueFormat::Decimal.display(row.position),
                })
                .collect(),
        ),
        None => {
            placeholders += 1;
            (Vec::new(), Vec::new(), Vec::new())
        }
    };

    let template = ReportTemplate {
        title: format!("Weekly Update {} SEO - Week {}", input.client.name, input.week),
        client: &input.client.name,
        generated_on: input.run_date.format("%B %-d, %Y").to_string(),
        window_note: format!("Reporting period: {}", input.windows.current),
        gsc_sections,
        ga4_blocks,
        ga4_placeholder: GA4_PLACEHOLDER,
        growth,
        decline,
        opportunities,
        queries_placeholder: QUERIES_PLACEHOLDER,
        has_queries: input.top.is_some(),
    };
    let html = template.render()?;

    Ok(RenderedReport {
        path: output_dir.join(report_file_name(input.client, input.week)),
        subject: report_subject(&input.client.name, input.week),
        html,
        placeholders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, QueryComparison};
    use crate::processing::compare_values;

    fn client() -> Client {
        Client {
            name: "Acme Corp".to_string(),
            gsc_property_url: Some("sc-domain:acme.com".to_string()),
            ga4_property_id: Some("123".to_string()),
            tag: None,
        }
    }

    fn windows() -> ReportWindows {
        ReportWindows::compute(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(), 30, 30, true)
            .unwrap()
    }

    fn records(source: Source, kind: ComparisonKind) -> Vec<ComparisonRecord> {
        let metric = match source {
            Source::Gsc => "clicks",
            Source::Ga4 => "sessions",
        };
        vec![ComparisonRecord {
            metric: metric.to_string(),
            source,
            kind,
            current: Some(1200.0),
            prior: Some(1000.0),
            change: compare_values(Some(1200.0), Some(1000.0)),
        }]
    }

    fn summary(kind: ComparisonKind) -> Summary {
        Summary {
            kind,
            text: format!("Narrative for {}", kind.as_str()),
            origin: SummaryOrigin::Model,
            fallback_reason: None,
        }
    }

    #[test]
    fn test_subject_and_file_name() {
        assert_eq!(report_subject("Acme Corp", 42), "Weekly SEO Update - Acme Corp - Week 42");
        assert_eq!(report_file_name(&client(), 42), "Weekly-Update-Acme-Corp-SEO-Week42.html");
    }

    #[test]
    fn test_full_report() {
        let windows = windows();
        let mut comparisons = Comparisons::default();
        for kind in ComparisonKind::ALL {
            comparisons.set(Source::Gsc, kind, Some(records(Source::Gsc, kind)));
            comparisons.set(Source::Ga4, kind, Some(records(Source::Ga4, kind)));
        }
        let summaries = vec![
            summary(ComparisonKind::PeriodOverPeriod),
            summary(ComparisonKind::YearOverYear),
        ];
        let charts = vec![ChartAsset {
            kind: ComparisonKind::PeriodOverPeriod,
            path: PathBuf::from("graphs/GSC-30vs30-week42-Acme-Corp.svg"),
            public_url: Some("https://img.example/GSC-30vs30-week42-Acme-Corp.svg".to_string()),
        }];
        let top = TopPerformers {
            growth: vec![QueryComparison {
                query: "acme anvils".to_string(),
                current_impressions: 900.0,
                prior_impressions: 300.0,
                current_clicks: 40.0,
                current_position: Some(4.0),
                change: compare_values(Some(900.0), Some(300.0)),
            }],
            decline: vec![],
            opportunities: vec![],
        };
        let client = client();
        let input = ReportInput {
            client: &client,
            week: 42,
            run_date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            windows: &windows,
            comparisons: &comparisons,
            summaries: &summaries,
            charts: &charts,
            top: Some(&top),
        };

        let report = render_report(&input, Path::new("reports")).unwrap();
        assert_eq!(report.placeholders, 0);
        assert_eq!(
            report.path,
            PathBuf::from("reports/Weekly-Update-Acme-Corp-SEO-Week42.html")
        );
        assert!(report.html.contains("30 Days vs Previous 30"));
        assert!(report.html.contains("30 Day Year over Year Comparison"));
        assert!(report.html.contains("Narrative for year_over_year"));
        assert!(report.html.contains("https://img.example/GSC-30vs30-week42-Acme-Corp.svg"));
        assert!(report.html.contains("+20.0%"));
        assert!(report.html.contains("acme anvils"));
        assert!(report.html.contains("October 16, 2026"));
        assert!(!report.html.contains(GA4_PLACEHOLDER));
    }

    #[test]
    fn test_missing_ga4_renders_placeholder() {
        let windows = windows();
        let mut comparisons = Comparisons::default();
        comparisons.set(
            Source::Gsc,
            ComparisonKind::PeriodOverPeriod,
            Some(records(Source::Gsc, ComparisonKind::PeriodOverPeriod)),
        );
        let client = client();
        let input = ReportInput {
            client: &client,
            week: 42,
            run_date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            windows: &windows,
            comparisons: &comparisons,
            summaries: &[],
            charts: &[],
            top: None,
        };

        let report = render_report(&input, Path::new("reports")).unwrap();
        assert!(report.html.contains(GA4_PLACEHOLDER));
        assert!(report.html.contains(GSC_PLACEHOLDER));
        assert!(report.html.contains(SUMMARY_PLACEHOLDER));
        assert!(report.html.contains(QUERIES_PLACEHOLDER));
        assert!(report.html.contains("Acme Corp"));
        // year-over-year table, two summaries, ga4, queries
        assert_eq!(report.placeholders, 5);
    }

    #[test]
    fn test_year_over_year_disabled_omits_section() {
        let windows = ReportWindows {
            year_ago: None,
            ..windows()
        };
        let client = client();
        let comparisons = Comparisons::default();
        let input = ReportInput {
            client: &client,
            week: 1,
            run_date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            windows: &windows,
            comparisons: &comparisons,
            summaries: &[],
            charts: &[],
            top: None,
        };
        let report = render_report(&input, Path::new("reports")).unwrap();
        assert!(!report.html.contains("Year over Year"));
    }

    #[test]
    fn test_position_decrease_is_good() {
        let (text, style) = format_change("position", &compare_values(Some(8.0), Some(10.0)));
        assert_eq!(text, "▼ -20.0%");
        assert_eq!(style, TREND_UP);
        let (_, style) = format_change("clicks", &compare_values(Some(8.0), Some(10.0)));
        assert_eq!(style, TREND_DOWN);
    }

    #[test]
    fn test_window_label() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 9, 16).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
        );
        assert_eq!(windows().current, range);
        let (current, prior) = window_labels(&windows(), ComparisonKind::YearOverYear);
        assert_eq!(current, "Current (2026-09-16 to 2026-10-15)");
        assert_eq!(prior, "Last Year (2025-09-16 to 2025-10-15)");
    }
}
