use std::path::{Path, PathBuf};

use askama::Template;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::series::{ValueFormat, find_metric};
use crate::models::{Change, ComparisonKind, ComparisonRecord};

const CURRENT_COLOR: &str = "#103CC1";
const COMPARISON_COLOR: &str = "#FBBD09";
const UP_COLOR: &str = "#28A745";
const DOWN_COLOR: &str = "#DC3545";
const NEUTRAL_COLOR: &str = "#6c757d";

const CHART_METRICS: [&str; 2] = ["clicks", "impressions"];

const WIDTH: u32 = 800;
const HEIGHT: u32 = 360;
const PANEL_WIDTH: f64 = 360.0;
const PANEL_GAP: f64 = 40.0;
const PLOT_TOP: f64 = 80.0;
const BASELINE: f64 = 310.0;
const BAR_WIDTH: f64 = 110.0;

/// What a chart shows: current vs comparison window for clicks and impressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub client: String,
    pub slug: String,
    pub kind: ComparisonKind,
    pub week: u32,
    pub records: Vec<ComparisonRecord>,
}

impl ChartSpec {
    pub fn file_name(&self) -> String {
        format!(
            "GSC-{}-week{:02}-{}.svg",
            self.kind.file_tag(),
            self.week,
            self.slug
        )
    }

    fn labels(&self) -> (&'static str, &'static str) {
        match self.kind {
            ComparisonKind::PeriodOverPeriod => ("Current Period", "Previous Period"),
            ComparisonKind::YearOverYear => ("This Year", "Last Year"),
        }
    }
}

/// A rendered chart file and, once published, its public URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartAsset {
    pub kind: ComparisonKind,
    pub path: PathBuf,
    #[serde(default)]
    pub public_url: Option<String>,
}

impl ChartAsset {
    /// Image source for reports: the public URL when published, else the local path.
    pub fn src(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[async_trait::async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, chart: &ChartSpec) -> AppResult<PathBuf>;
}

struct Bar {
    x: String,
    y: String,
    height: String,
    color: &'static str,
    label: String,
    value: String,
    label_x: String,
    value_y: String,
}

struct Panel {
    title: String,
    change_text: String,
    change_color: &'static str,
    title_x: String,
    bars: Vec<Bar>,
    /// Empty when the panel has bars.
    note: String,
    axis_x1: String,
    axis_x2: String,
}

#[derive(Template)]
#[template(path = "chart.svg")]
struct ChartTemplate<'a> {
    title: &'a str,
    width: u32,
    height: u32,
    baseline: String,
    panels: Vec<Panel>,
}

fn fmt(v: f64) -> String {
    format!("{v:.1}")
}

fn build_panel(spec: &ChartSpec, metric: &str, index: usize) -> Panel {
    let left = 20.0 + index as f64 * (PANEL_WIDTH + PANEL_GAP);
    let label = find_metric(metric).map_or(metric, |m| m.label);
    let (current_label, comparison_label) = spec.labels();
    let record = spec.records.iter().find(|r| r.metric == metric);

    let (change_text, change_color) = match record.map(|r| r.change) {
        Some(Change::Computed { pct, .. }) => (
            format!("{:+.1}%", pct * 100.0),
            if pct >= 0.0 { UP_COLOR } else { DOWN_COLOR },
        ),
        _ => ("N/A".to_string(), NEUTRAL_COLOR),
    };

    let mut panel = Panel {
        title: label.to_uppercase(),
        change_text,
        change_color,
        title_x: fmt(left + PANEL_WIDTH / 2.0),
        bars: Vec::new(),
        note: String::new(),
        axis_x1: fmt(left),
        axis_x2: fmt(left + PANEL_WIDTH),
    };

    let Some(record) = record.filter(|r| r.current.is_some() || r.prior.is_some()) else {
        panel.note = format!("No {label} data");
        return panel;
    };

    let values = [
        (record.current, current_label, CURRENT_COLOR),
        (record.prior, comparison_label, COMPARISON_COLOR),
    ];
    let max = values
        .iter()
        .filter_map(|(v, _, _)| *v)
        .fold(0.0_f64, f64::max);
    let plot_height = BASELINE - PLOT_TOP;

    for (slot, (value, bar_label, color)) in values.into_iter().enumerate() {
        let center = left + PANEL_WIDTH * (0.3 + 0.4 * slot as f64);
        let v = value.unwrap_or(0.0).max(0.0);
        let height = if max > 0.0 { v / max * plot_height } else { 0.0 };
        panel.bars.push(Bar {
            x: fmt(center - BAR_WIDTH / 2.0),
            y: fmt(BASELINE - height),
            height: fmt(height),
            color,
            label: bar_label.to_string(),
            value: value.map_or_else(|| "n/a".to_string(), |v| ValueFormat::Count.display(v)),
            label_x: fmt(center),
            value_y: fmt(BASELINE - height - 6.0),
        });
    }
    panel
}

pub fn render_svg(spec: &ChartSpec) -> AppResult<String> {
    let title = match spec.kind {
        ComparisonKind::PeriodOverPeriod => format!("{} - Current vs Previous Period", spec.client),
        ComparisonKind::YearOverYear => format!("{} - Year over Year", spec.client),
    };
    let template = ChartTemplate {
        title: &title,
        width: WIDTH,
        height: HEIGHT,
        baseline: fmt(BASELINE),
        panels: CHART_METRICS
            .iter()
            .enumerate()
            .map(|(i, metric)| build_panel(spec, metric, i))
            .collect(),
    };
    Ok(template.render()?)
}

/// Writes SVG charts into a directory.
pub struct SvgChartRenderer {
    output_dir: PathBuf,
}

impl SvgChartRenderer {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl ChartRenderer for SvgChartRenderer {
    #[tracing::instrument(name = "chart render", skip(self, chart), fields(client = %chart.client, chart.kind = chart.kind.as_str()))]
    async fn render(&self, chart: &ChartSpec) -> AppResult<PathBuf> {
        let svg = render_svg(chart)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(chart.file_name());
        tokio::fs::write(&path, svg).await?;
        Ok(path)
    }
}
