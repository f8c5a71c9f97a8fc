use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::charts::ChartAsset;
use crate::delivery::DeliveryOutcome;
use crate::error::AppResult;
use crate::models::{ComparisonKind, Comparisons, MetricSeries, QueryRow};
use crate::processing::{ReportWindows, TopPerformers, report_week};
use crate::report::RenderedReport;
use crate::summary::Summary;

/// One source's series for each window. `None` means the window was not
/// fetched or the fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    pub current: Option<MetricSeries>,
    pub prior: Option<MetricSeries>,
    pub year_ago: Option<MetricSeries>,
}

impl SourceData {
    pub fn comparison(&self, kind: ComparisonKind) -> Option<&MetricSeries> {
        match kind {
            ComparisonKind::PeriodOverPeriod => self.prior.as_ref(),
            ComparisonKind::YearOverYear => self.year_ago.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryData {
    pub current: Option<Vec<QueryRow>>,
    pub prior: Option<Vec<QueryRow>>,
}

/// Per-client working data, filled in step by step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientWorkspace {
    #[serde(default)]
    pub gsc: SourceData,
    #[serde(default)]
    pub ga4: SourceData,
    #[serde(default)]
    pub gsc_queries: QueryData,
    #[serde(default)]
    pub comparisons: Comparisons,
    #[serde(default)]
    pub top: Option<TopPerformers>,
    #[serde(default)]
    pub summaries: Vec<Summary>,
    #[serde(default)]
    pub charts: Vec<ChartAsset>,
    #[serde(default)]
    pub report: Option<RenderedReport>,
    #[serde(default)]
    pub delivery: Option<DeliveryOutcome>,
}

/// Working state of one run, keyed by client name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_date: NaiveDate,
    pub week: u32,
    pub windows: ReportWindows,
    #[serde(default)]
    pub clients: BTreeMap<String, ClientWorkspace>,
}

impl RunState {
    pub fn new(run_date: NaiveDate, windows: ReportWindows) -> Self {
        Self {
            run_date,
            week: report_week(run_date),
            windows,
            clients: BTreeMap::new(),
        }
    }

    pub fn workspace(&self, client: &str) -> Option<&ClientWorkspace> {
        self.clients.get(client)
    }

    pub fn workspace_mut(&mut self, client: &str) -> &mut ClientWorkspace {
        self.clients.entry(client.to_string()).or_default()
    }

    pub async fn load(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub async fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    fn state() -> RunState {
        let run_date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        RunState::new(run_date, ReportWindows::compute(run_date, 30, 30, true).unwrap())
    }

    #[test]
    fn test_week_from_run_date() {
        assert_eq!(state().week, 42);
    }

    #[test]
    fn test_workspace_created_on_demand() {
        let mut state = state();
        assert!(state.workspace("Acme").is_none());
        state.workspace_mut("Acme").summaries.clear();
        assert!(state.workspace("Acme").is_some());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("run_state.json");
        let mut state = state();
        let windows = state.windows;
        let mut series = MetricSeries::new(Source::Gsc, windows.current);
        series.push(windows.current.start, "clicks", 12.0);
        state.workspace_mut("Acme").gsc.current = Some(series);

        state.save(&path).await.unwrap();
        let loaded = RunState::load(&path).await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunState::load(&dir.path().join("missing.json")).await.unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
