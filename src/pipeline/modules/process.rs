use std::sync::Arc;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{ComparisonKind, ComparisonRecord, Source};
use crate::pipeline::orchestrator::{Module, ModuleContext};
use crate::pipeline::state::{ClientWorkspace, SourceData};
use crate::processing::{compare_queries, compare_series, top};

/// Comparison records for one source and kind, `None` without current data.
fn compare_source(data: &SourceData, kind: ComparisonKind) -> Option<Vec<ComparisonRecord>> {
    data.current
        .as_ref()
        .map(|current| compare_series(current, data.comparison(kind), kind))
}

fn compare_workspace(workspace: &mut ClientWorkspace, kind: ComparisonKind) -> usize {
    let mut sets = 0;
    for source in [Source::Gsc, Source::Ga4] {
        let data = match source {
            Source::Gsc => &workspace.gsc,
            Source::Ga4 => &workspace.ga4,
        };
        let records = compare_source(data, kind);
        if records.is_some() {
            sets += 1;
        }
        workspace.comparisons.set(source, kind, records);
    }
    sets
}

/// Current vs prior window for every client and source.
pub struct CalculateGrowthMetrics;

#[async_trait::async_trait]
impl Module for CalculateGrowthMetrics {
    fn name(&self) -> &str {
        "calculate_growth_metrics"
    }

    #[tracing::instrument(name = "module calculate_growth_metrics", skip_all, fields(comparison.sets))]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let sets: usize = ctx
            .state
            .clients
            .values_mut()
            .map(|workspace| compare_workspace(workspace, ComparisonKind::PeriodOverPeriod))
            .sum();
        tracing::Span::current().record("comparison.sets", sets);
        Ok(format!(
            "{sets} period-over-period comparison sets for {} clients",
            ctx.state.clients.len()
        ))
    }
}

/// Current vs year-ago window. A no-op when year-over-year is disabled.
pub struct CalculateYoyComparison;

#[async_trait::async_trait]
impl Module for CalculateYoyComparison {
    fn name(&self) -> &str {
        "calculate_yoy_comparison"
    }

    #[tracing::instrument(name = "module calculate_yoy_comparison", skip_all, fields(comparison.sets))]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        if ctx.state.windows.year_ago.is_none() {
            return Ok("year-over-year comparison disabled".to_string());
        }
        let sets: usize = ctx
            .state
            .clients
            .values_mut()
            .map(|workspace| compare_workspace(workspace, ComparisonKind::YearOverYear))
            .sum();
        tracing::Span::current().record("comparison.sets", sets);
        Ok(format!(
            "{sets} year-over-year comparison sets for {} clients",
            ctx.state.clients.len()
        ))
    }
}

/// Ranks Search Console queries by impression growth and decline.
pub struct IdentifyTopPerformers {
    config: Arc<Config>,
}

impl IdentifyTopPerformers {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Module for IdentifyTopPerformers {
    fn name(&self) -> &str {
        "identify_top_performers"
    }

    #[tracing::instrument(
        name = "module identify_top_performers",
        skip_all,
        fields(top.basis = ?self.config.growth_basis, top.n = self.config.top_n)
    )]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let mut ranked = 0;
        for workspace in ctx.state.clients.values_mut() {
            let Some(current) = workspace.gsc_queries.current.as_deref() else {
                workspace.top = None;
                continue;
            };
            let prior = workspace.gsc_queries.prior.as_deref().unwrap_or_default();
            let records = compare_queries(current, prior);
            workspace.top = Some(top::identify(
                &records,
                current,
                self.config.growth_basis,
                self.config.top_n,
                self.config.opportunity_limit,
            ));
            ranked += 1;
        }
        Ok(format!("ranked queries for {ranked} clients"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Change, DateRange, MetricSeries, QueryRow};
    use crate::pipeline::state::RunState;
    use crate::processing::ReportWindows;

    fn state(yoy: bool) -> RunState {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        RunState::new(date, ReportWindows::compute(date, 30, 30, yoy).unwrap())
    }

    fn series(source: Source, range: DateRange, clicks: f64) -> MetricSeries {
        let mut series = MetricSeries::new(source, range);
        series.push(range.start, "clicks", clicks);
        series
    }

    async fn run(module: &dyn Module, state: &mut RunState) -> AppResult<String> {
        let mut ctx = ModuleContext {
            run_id: uuid::Uuid::new_v4(),
            state,
            results: &[],
        };
        module.run(&mut ctx).await
    }

    #[tokio::test]
    async fn test_growth_metrics_per_source() {
        let mut state = state(true);
        let windows = state.windows;
        let workspace = state.workspace_mut("Acme");
        workspace.gsc.current = Some(series(Source::Gsc, windows.current, 120.0));
        workspace.gsc.prior = Some(series(Source::Gsc, windows.prior, 100.0));

        run(&CalculateGrowthMetrics, &mut state).await.unwrap();

        let comparisons = &state.workspace("Acme").unwrap().comparisons;
        let clicks = comparisons
            .get(Source::Gsc, ComparisonKind::PeriodOverPeriod)
            .unwrap()
            .iter()
            .find(|r| r.metric == "clicks")
            .unwrap();
        assert!((clicks.change.pct().unwrap() - 0.2).abs() < 1e-9);
        // no GA4 data at all
        assert!(comparisons.get(Source::Ga4, ComparisonKind::PeriodOverPeriod).is_none());
    }

    #[tokio::test]
    async fn test_missing_year_ago_marks_records() {
        let mut state = state(true);
        let windows = state.windows;
        state.workspace_mut("Acme").gsc.current = Some(series(Source::Gsc, windows.current, 5.0));

        run(&CalculateYoyComparison, &mut state).await.unwrap();

        let records = state
            .workspace("Acme")
            .unwrap()
            .comparisons
            .get(Source::Gsc, ComparisonKind::YearOverYear)
            .unwrap()
            .to_vec();
        assert!(records.iter().all(|r| matches!(r.change, Change::MissingData { .. })));
    }

    #[tokio::test]
    async fn test_yoy_disabled_is_noop() {
        let mut state = state(false);
        let windows = state.windows;
        state.workspace_mut("Acme").gsc.current = Some(series(Source::Gsc, windows.current, 5.0));
        let detail = run(&CalculateYoyComparison, &mut state).await.unwrap();
        assert_eq!(detail, "year-over-year comparison disabled");
        assert!(state.workspace("Acme").unwrap().comparisons.gsc_year.is_none());
    }

    #[tokio::test]
    async fn test_top_performers_from_queries() {
        let row = |query: &str, impressions: f64| QueryRow {
            query: query.to_string(),
            clicks: 1.0,
            impressions,
            ctr: 0.01,
            position: 5.0,
        };
        let mut state = state(true);
        let workspace = state.workspace_mut("Acme");
        workspace.gsc_queries.current = Some(vec![row("up", 300.0), row("down", 50.0)]);
        workspace.gsc_queries.prior = Some(vec![row("up", 100.0), row("down", 200.0)]);
        state.workspace_mut("NoQueries");

        let config = Arc::new(Config::from_lookup(|_| None).unwrap());
        let detail = run(&IdentifyTopPerformers::new(config), &mut state).await.unwrap();
        assert_eq!(detail, "ranked queries for 1 clients");

        let top = state.workspace("Acme").unwrap().top.clone().unwrap();
        assert_eq!(top.growth[0].query, "up");
        assert_eq!(top.decline[0].query, "down");
        assert!(state.workspace("NoQueries").unwrap().top.is_none());
    }
}
