use std::sync::Arc;

use opentelemetry::KeyValue;

use super::ClientFailures;
use crate::charts::{ChartAsset, ChartRenderer, ChartSpec};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Client, ComparisonKind, Source};
use crate::pipeline::orchestrator::{Module, ModuleContext};
use crate::pipeline::state::{ClientWorkspace, RunState};
use crate::report::{ReportInput, render_report};
use crate::telemetry::metrics::{REPORT_PLACEHOLDERS, REPORTS_RENDERED};

/// Renders the client's report from the run state and writes it to the
/// reports directory.
pub(crate) async fn write_client_report(
    config: &Config,
    state: &mut RunState,
    client: &Client,
) -> AppResult<()> {
    let empty = ClientWorkspace::default();
    let workspace = state.clients.get(&client.name).unwrap_or(&empty);
    let input = ReportInput {
        client,
        week: state.week,
        run_date: state.run_date,
        windows: &state.windows,
        comparisons: &workspace.comparisons,
        summaries: &workspace.summaries,
        charts: &workspace.charts,
        top: workspace.top.as_ref(),
    };
    let report = render_report(&input, &config.reports_dir)?;

    tokio::fs::create_dir_all(&config.reports_dir).await?;
    tokio::fs::write(&report.path, &report.html).await?;
    REPORT_PLACEHOLDERS.record(report.placeholders as f64, &[]);
    if report.placeholders > 0 {
        tracing::warn!(
            client = %client.name,
            placeholders = report.placeholders,
            "report rendered with missing sections"
        );
    }

    state.workspace_mut(&client.name).report = Some(report);
    Ok(())
}

/// One chart per client and comparison kind with Search Console records.
pub struct GenerateGraphs {
    config: Arc<Config>,
    renderer: Arc<dyn ChartRenderer>,
}

impl GenerateGraphs {
    pub fn new(config: Arc<Config>, renderer: Arc<dyn ChartRenderer>) -> Self {
        Self { config, renderer }
    }
}

#[async_trait::async_trait]
impl Module for GenerateGraphs {
    fn name(&self) -> &str {
        "generate_graphs"
    }

    #[tracing::instrument(name = "module generate_graphs", skip_all, fields(charts.count))]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let week = ctx.state.week;
        let mut failures = ClientFailures::default();
        let mut rendered = 0;

        for client in &self.config.clients {
            let Some(workspace) = ctx.state.clients.get_mut(&client.name) else {
                continue;
            };
            workspace.charts.clear();
            for kind in ComparisonKind::ALL {
                let Some(records) = workspace.comparisons.get(Source::Gsc, kind) else {
                    continue;
                };
                let spec = ChartSpec {
                    client: client.name.clone(),
                    slug: client.slug(),
                    kind,
                    week,
                    records: records.to_vec(),
                };
                match self.renderer.render(&spec).await {
                    Ok(path) => {
                        workspace.charts.push(ChartAsset {
                            kind,
                            path,
                            public_url: None,
                        });
                        rendered += 1;
                    }
                    Err(e) => failures.record(&client.name, e)?,
                }
            }
        }

        tracing::Span::current().record("charts.count", rendered);
        failures.finish(
            self.config.clients.len(),
            format!("{rendered} charts rendered"),
            AppError::Render,
        )
    }
}

/// One HTML report per configured client, with placeholders for anything
/// upstream steps could not produce.
pub struct BuildHtmlReports {
    config: Arc<Config>,
}

impl BuildHtmlReports {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Module for BuildHtmlReports {
    fn name(&self) -> &str {
        "build_html_reports"
    }

    #[tracing::instrument(name = "module build_html_reports", skip_all, fields(reports.count))]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let mut failures = ClientFailures::default();
        let mut written = 0;

        for client in &self.config.clients {
            match write_client_report(&self.config, ctx.state, client).await {
                Ok(()) => {
                    REPORTS_RENDERED.add(1, &[KeyValue::new("client", client.name.clone())]);
                    written += 1;
                }
                Err(e) => failures.record(&client.name, e)?,
            }
        }

        tracing::Span::current().record("reports.count", written);
        failures.finish(
            self.config.clients.len(),
            format!("{written} reports written to {}", self.config.reports_dir.display()),
            AppError::Render,
        )
    }
}
