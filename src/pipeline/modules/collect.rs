use std::sync::Arc;

use super::ClientFailures;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{DateRange, MetricSeries};
use crate::pipeline::orchestrator::{Module, ModuleContext};
use crate::pipeline::state::SourceData;
use crate::processing::ReportWindows;
use crate::sources::{Ga4Fetcher, Ga4Filter, GscFetcher};

/// Fetches each window in turn. The current window is required; comparison
/// windows that fail are left empty and show up as missing data.
async fn fetch_windows<F, Fut>(windows: &ReportWindows, fetch: F) -> AppResult<SourceData>
where
    F: Fn(DateRange) -> Fut,
    Fut: Future<Output = AppResult<MetricSeries>>,
{
    let current = fetch(windows.current).await?;
    let prior = optional_window(fetch(windows.prior).await, "prior")?;
    let year_ago = match windows.year_ago {
        Some(range) => optional_window(fetch(range).await, "year_ago")?,
        None => None,
    };
    Ok(SourceData {
        current: Some(current),
        prior,
        year_ago,
    })
}

fn optional_window(
    result: AppResult<MetricSeries>,
    window: &str,
) -> AppResult<Option<MetricSeries>> {
    match result {
        Ok(series) => Ok(Some(series)),
        Err(e) if e.is_fatal_for_module() => Err(e),
        Err(e) => {
            tracing::warn!(window, error = %e, "comparison window unavailable");
            Ok(None)
        }
    }
}

pub struct FetchGscData {
    config: Arc<Config>,
    fetcher: Arc<dyn GscFetcher>,
}

impl FetchGscData {
    pub fn new(config: Arc<Config>, fetcher: Arc<dyn GscFetcher>) -> Self {
        Self { config, fetcher }
    }
}

#[async_trait::async_trait]
impl Module for FetchGscData {
    fn name(&self) -> &str {
        "fetch_gsc_data"
    }

    #[tracing::instrument(name = "module fetch_gsc_data", skip_all, fields(clients = self.config.clients.len()))]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let windows = ctx.state.windows;
        let mut failures = ClientFailures::default();
        let mut fetched = 0;
        let mut skipped = 0;

        for client in &self.config.clients {
            let Some(property) = client.gsc_property_url.as_deref() else {
                tracing::info!(client = %client.name, "no Search Console property, skipped");
                skipped += 1;
                continue;
            };

            let series = fetch_windows(&windows, |range| self.fetcher.fetch(property, range)).await;
            let data = match series {
                Ok(data) => data,
                Err(e) => {
                    failures.record(&client.name, e)?;
                    continue;
                }
            };

            let current_rows = self.fetcher.fetch_queries(property, windows.current).await;
            let prior_rows = self.fetcher.fetch_queries(property, windows.prior).await;
            let workspace = ctx.state.workspace_mut(&client.name);
            workspace.gsc = data;
            workspace.gsc_queries.current = optional_rows(current_rows, &mut failures, &client.name)?;
            workspace.gsc_queries.prior = optional_rows(prior_rows, &mut failures, &client.name)?;
            fetched += 1;
        }

        failures.finish(
            self.config.clients.len(),
            format!("fetched {fetched} clients, {skipped} without a property"),
            AppError::Fetch,
        )
    }
}

fn optional_rows<T>(
    result: AppResult<T>,
    failures: &mut ClientFailures,
    client: &str,
) -> AppResult<Option<T>> {
    match result {
        Ok(rows) => Ok(Some(rows)),
        Err(e) => {
            failures.record(client, e)?;
            Ok(None)
        }
    }
}

pub struct FetchGa4Data {
    config: Arc<Config>,
    fetcher: Arc<dyn Ga4Fetcher>,
    filters: Vec<Ga4Filter>,
}

impl FetchGa4Data {
    pub fn new(config: Arc<Config>, fetcher: Arc<dyn Ga4Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            filters: Ga4Filter::organic_search(),
        }
    }
}

#[async_trait::async_trait]
impl Module for FetchGa4Data {
    fn name(&self) -> &str {
        "fetch_ga4_data"
    }

    #[tracing::instrument(name = "module fetch_ga4_data", skip_all, fields(clients = self.config.clients.len()))]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let windows = ctx.state.windows;
        let mut failures = ClientFailures::default();
        let mut fetched = 0;
        let mut skipped = 0;

        for client in &self.config.clients {
            let Some(property) = client.ga4_property_id.as_deref() else {
                tracing::info!(client = %client.name, "no GA4 property, skipped");
                skipped += 1;
                continue;
            };

            let filters = &self.filters;
            match fetch_windows(&windows, |range| self.fetcher.fetch(property, range, filters)).await
            {
                Ok(data) => {
                    ctx.state.workspace_mut(&client.name).ga4 = data;
                    fetched += 1;
                }
                Err(e) => failures.record(&client.name, e)?,
            }
        }

        failures.finish(
            self.config.clients.len(),
            format!("fetched {fetched} clients, {skipped} without a property"),
            AppError::Fetch,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Client, QueryRow, Source};
    use crate::pipeline::state::RunState;

    struct StubGsc {
        fail_for: Option<&'static str>,
        denied_for: Option<&'static str>,
        calls: Mutex<Vec<(String, DateRange)>>,
    }

    impl StubGsc {
        fn new() -> Self {
            Self {
                fail_for: None,
                denied_for: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl GscFetcher for StubGsc {
        async fn fetch(&self, property_url: &str, range: DateRange) -> AppResult<MetricSeries> {
            self.calls
                .lock()
                .unwrap()
                .push((property_url.to_string(), range));
            if self.fail_for == Some(property_url) {
                return Err(AppError::Fetch("HTTP 500".to_string()));
            }
            if self.denied_for == Some(property_url) {
                return Err(AppError::PermissionDenied(
                    "Search Console returned 403 Forbidden".to_string(),
                ));
            }
            let mut series = MetricSeries::new(Source::Gsc, range);
            series.push(range.start, "clicks", 10.0);
            Ok(series)
        }

        async fn fetch_queries(&self, _: &str, _: DateRange) -> AppResult<Vec<QueryRow>> {
            Ok(vec![])
        }
    }

    fn client(name: &str, gsc: Option<&str>) -> Client {
        Client {
            name: name.to_string(),
            gsc_property_url: gsc.map(str::to_string),
            ga4_property_id: None,
            tag: None,
        }
    }

    fn setup(clients: Vec<Client>) -> (Arc<Config>, RunState) {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.clients = clients;
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let state = RunState::new(date, ReportWindows::compute(date, 30, 30, true).unwrap());
        (Arc::new(config), state)
    }

    #[tokio::test]
    async fn test_one_client_failure_does_not_stop_others() {
        let (config, mut state) = setup(vec![
            client("Broken", Some("sc-domain:broken.example")),
            client("Acme", Some("sc-domain:acme.example")),
            client("NoSite", None),
        ]);
        let fetcher = Arc::new(StubGsc {
            fail_for: Some("sc-domain:broken.example"),
            ..StubGsc::new()
        });
        let module = FetchGscData::new(config, fetcher.clone());

        let mut ctx = ModuleContext {
            run_id: uuid::Uuid::new_v4(),
            state: &mut state,
            results: &[],
        };
        let err = module.run(&mut ctx).await.unwrap_err();

        assert!(err.to_string().contains("1 of 3 clients failed"));
        assert!(err.to_string().contains("Broken"));
        let acme = state.workspace("Acme").unwrap();
        assert!(acme.gsc.current.is_some());
        assert!(acme.gsc.year_ago.is_some());
        assert_eq!(acme.gsc_queries.current, Some(vec![]));
        assert!(state.workspace("NoSite").is_none());
        // Broken: current only; Acme: current, prior, year ago
        assert_eq!(fetcher.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_year_over_year_disabled_skips_window() {
        let (config, mut state) = setup(vec![client("Acme", Some("sc-domain:acme.example"))]);
        state.windows.year_ago = None;
        let fetcher = Arc::new(StubGsc::new());
        let module = FetchGscData::new(config, fetcher.clone());
        let mut ctx = ModuleContext {
            run_id: uuid::Uuid::new_v4(),
            state: &mut state,
            results: &[],
        };
        module.run(&mut ctx).await.unwrap();
        assert!(state.workspace("Acme").unwrap().gsc.year_ago.is_none());
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_forbidden_property_does_not_stop_others() {
        let (config, mut state) = setup(vec![
            client("NoAccess", Some("sc-domain:noaccess.example")),
            client("Acme", Some("sc-domain:acme.example")),
        ]);
        let fetcher = Arc::new(StubGsc {
            denied_for: Some("sc-domain:noaccess.example"),
            ..StubGsc::new()
        });
        let module = FetchGscData::new(config, fetcher.clone());
        let mut ctx = ModuleContext {
            run_id: uuid::Uuid::new_v4(),
            state: &mut state,
            results: &[],
        };
        let err = module.run(&mut ctx).await.unwrap_err();

        assert_eq!(err.kind(), "fetch");
        assert!(err.to_string().contains("1 of 2 clients failed"));
        assert!(err.to_string().contains("NoAccess: Permission denied"));
        assert!(state.workspace("Acme").unwrap().gsc.current.is_some());
        assert!(state.workspace("NoAccess").is_none());
        let calls = fetcher.calls.lock().unwrap();
        assert!(calls.iter().any(|(p, _)| p == "sc-domain:acme.example"));
    }

    #[test]
    fn test_prior_window_failure_is_missing_data() {
        let result = optional_window(Err(AppError::Fetch("timeout".to_string())), "prior");
        assert_eq!(result.unwrap(), None);
        let result = optional_window(Err(AppError::Authentication("no".to_string())), "prior");
        assert!(result.is_err());
    }
}
