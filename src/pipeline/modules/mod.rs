pub mod analysis;
pub mod cleanup;
pub mod collect;
pub mod notifications;
pub mod process;
pub mod publishing;
pub mod rendering;

use std::sync::Arc;

use crate::charts::ChartRenderer;
use crate::config::Config;
use crate::error::AppError;
use crate::mail::MailClient;
use crate::publish::Publisher;
use crate::sources::{Ga4Fetcher, GscFetcher};
use crate::summary::SummaryGenerator;

use super::steps::ModuleRegistry;

/// External collaborators the modules delegate I/O to.
#[derive(Clone)]
pub struct Collaborators {
    pub gsc: Arc<dyn GscFetcher>,
    pub ga4: Arc<dyn Ga4Fetcher>,
    pub summaries: Arc<SummaryGenerator>,
    pub charts: Arc<dyn ChartRenderer>,
    pub publisher: Option<Arc<dyn Publisher>>,
    pub mail: Arc<dyn MailClient>,
}

/// Every module the step table may reference, by name.
pub fn registry(config: Arc<Config>, collaborators: Collaborators) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(Arc::new(cleanup::Cleanup::new(config.clone())));
    registry.register(Arc::new(collect::FetchGscData::new(
        config.clone(),
        collaborators.gsc,
    )));
    registry.register(Arc::new(collect::FetchGa4Data::new(
        config.clone(),
        collaborators.ga4,
    )));
    registry.register(Arc::new(process::CalculateGrowthMetrics));
    registry.register(Arc::new(process::IdentifyTopPerformers::new(config.clone())));
    registry.register(Arc::new(process::CalculateYoyComparison));
    registry.register(Arc::new(analysis::SummaryWriter::new(
        config.clone(),
        collaborators.summaries,
    )));
    registry.register(Arc::new(rendering::GenerateGraphs::new(
        config.clone(),
        collaborators.charts,
    )));
    registry.register(Arc::new(rendering::BuildHtmlReports::new(config.clone())));
    registry.register(Arc::new(publishing::UploadAssets::new(
        config.clone(),
        collaborators.publisher,
    )));
    registry.register(Arc::new(notifications::CreateEmailDrafts::new(
        config.clone(),
        collaborators.mail.clone(),
    )));
    registry.register(Arc::new(notifications::SendStatusEmail::new(
        config,
        collaborators.mail,
    )));
    registry
}

/// Per-client failures inside one module. The module keeps going for the
/// other clients and reports these at the end.
#[derive(Debug, Default)]
pub(crate) struct ClientFailures {
    failures: Vec<(String, AppError)>,
}

impl ClientFailures {
    /// Records a client error. Errors that make the remaining clients pointless
    /// (bad credentials, bad configuration) are handed back to abort the module,
    /// carrying the failures recorded before them.
    pub(crate) fn record(&mut self, client: &str, err: AppError) -> Result<(), AppError> {
        if err.is_fatal_for_module() {
            if self.failures.is_empty() {
                return Err(err);
            }
            return Err(err.with_context(&format!(
                "module aborted at {client}, earlier failures: {}",
                self.describe()
            )));
        }
        tracing::warn!(client, error.type = err.kind(), error = %err, "client failed");
        self.failures.push((client.to_string(), err));
        Ok(())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Ok(summary)` when nothing failed, otherwise an error built with `wrap`
    /// listing every failed client.
    pub(crate) fn finish(
        self,
        total: usize,
        summary: String,
        wrap: fn(String) -> AppError,
    ) -> Result<String, AppError> {
        if self.failures.is_empty() {
            return Ok(summary);
        }
        Err(wrap(format!(
            "{} of {total} clients failed ({summary}): {}",
            self.failures.len(),
            self.describe()
        )))
    }

    fn describe(&self) -> String {
        self.failures
            .iter()
            .map(|(client, err)| format!("{client}: {err}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failures_passes_summary() {
        let failures = ClientFailures::default();
        assert_eq!(
            failures.finish(3, "3 fetched".to_string(), AppError::Fetch).unwrap(),
            "3 fetched"
        );
    }

    #[test]
    fn test_failures_listed() {
        let mut failures = ClientFailures::default();
        failures
            .record("Acme", AppError::Fetch("HTTP 500".to_string()))
            .unwrap();
        let err = failures
            .finish(2, "1 fetched".to_string(), AppError::Fetch)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Fetch error: 1 of 2 clients failed (1 fetched): Acme: Fetch error: HTTP 500"
        );
    }

    #[test]
    fn test_authentication_aborts() {
        let mut failures = ClientFailures::default();
        let err = failures
            .record("Acme", AppError::Authentication("expired".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), "authentication");
        assert!(failures.is_empty());
    }

    #[test]
    fn test_abort_keeps_earlier_failures() {
        let mut failures = ClientFailures::default();
        failures
            .record("Acme", AppError::Fetch("HTTP 500".to_string()))
            .unwrap();
        let err = failures
            .record("Globex", AppError::Authentication("token revoked".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), "authentication");
        assert_eq!(
            err.to_string(),
            "Authentication error: token revoked; module aborted at Globex, earlier failures: Acme: Fetch error: HTTP 500"
        );
    }

    #[test]
    fn test_permission_denied_is_per_client() {
        let mut failures = ClientFailures::default();
        failures
            .record("Acme", AppError::PermissionDenied("403 Forbidden".to_string()))
            .unwrap();
        assert!(!failures.is_empty());
    }
}
