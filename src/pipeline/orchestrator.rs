use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use opentelemetry::trace::TraceContextExt;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use super::state::RunState;
use super::steps::{RunPhase, StepDefinition, validate_steps};
use crate::error::{AppError, AppResult};
use crate::telemetry::metrics::{PIPELINE_MODULE_DURATION, PIPELINE_MODULE_FAILURES};

/// What a module sees while it runs.
pub struct ModuleContext<'a> {
    pub run_id: Uuid,
    pub state: &'a mut RunState,
    /// Results recorded before this invocation, in execution order.
    pub results: &'a [StepResult],
}

/// One named unit of pipeline work. `Ok` carries a short detail line for the
/// run report.
#[async_trait::async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failure,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub module: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedInvocation {
    pub step: String,
    pub phase: RunPhase,
    pub module: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Step names to run; empty means every step.
    pub steps: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub trace_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub plan: Vec<PlannedInvocation>,
    pub results: Vec<StepResult>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.status == StepStatus::Failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.results
            .iter()
            .filter(|r| r.status == StepStatus::Failure)
    }

    /// Writes `pipeline_report_<timestamp>.json` into `dir`.
    pub async fn write_json(&self, dir: &Path) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!(
            "pipeline_report_{}.json",
            self.started_at.format("%Y%m%d_%H%M%S")
        ));
        tokio::fs::write(&path, serde_json::to_vec_pretty(self)?).await?;
        Ok(path)
    }
}

/// Runs steps in order. Every module of a step is attempted; module errors
/// become failed results and never stop the run.
pub struct Orchestrator {
    steps: Vec<StepDefinition>,
}

impl Orchestrator {
    pub fn new(steps: Vec<StepDefinition>) -> AppResult<Self> {
        validate_steps(&steps)?;
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Steps named in `names`, in table order. Empty selects all.
    pub fn select(&self, names: &[String]) -> AppResult<Vec<&StepDefinition>> {
        if let Some(unknown) = names
            .iter()
            .find(|name| !self.steps.iter().any(|s| &s.name == *name))
        {
            let known: Vec<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();
            return Err(AppError::Config(format!(
                "unknown step '{unknown}' (known steps: {})",
                known.join(", ")
            )));
        }
        Ok(self
            .steps
            .iter()
            .filter(|s| names.is_empty() || names.contains(&s.name))
            .collect())
    }

    pub fn plan(&self, names: &[String]) -> AppResult<Vec<PlannedInvocation>> {
        Ok(self
            .select(names)?
            .into_iter()
            .flat_map(|step| {
                step.modules.iter().map(|module| PlannedInvocation {
                    step: step.name.clone(),
                    phase: step.phase,
                    module: module.name().to_string(),
                })
            })
            .collect())
    }

    #[tracing::instrument(
        name = "pipeline run",
        skip(self, state, options),
        fields(
            run.id,
            run.dry_run = options.dry_run,
            run.steps = options.steps.len(),
            run.failures,
        )
    )]
    pub async fn run(&self, state: &mut RunState, options: &RunOptions) -> AppResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let span = tracing::Span::current();
        span.record("run.id", run_id.to_string());
        let trace_id = span.context().span().span_context().trace_id().to_string();

        let selected = self.select(&options.steps)?;
        let plan = self.plan(&options.steps)?;
        let mut results = Vec::new();

        if options.dry_run {
            for invocation in &plan {
                tracing::info!(
                    step = %invocation.step,
                    phase = invocation.phase.as_str(),
                    module = %invocation.module,
                    "dry run: would invoke module"
                );
            }
        } else {
            for step in selected {
                tracing::info!(step = %step.name, phase = step.phase.as_str(), "step started");
                for module in &step.modules {
                    let result = self
                        .invoke(run_id, &step.name, module.as_ref(), state, &results)
                        .await;
                    results.push(result);
                }
            }
        }

        let report = RunReport {
            run_id,
            trace_id,
            started_at,
            finished_at: Utc::now(),
            dry_run: options.dry_run,
            plan,
            results,
        };
        span.record("run.failures", report.failures().count());
        Ok(report)
    }

    async fn invoke(
        &self,
        run_id: Uuid,
        step: &str,
        module: &dyn Module,
        state: &mut RunState,
        results: &[StepResult],
    ) -> StepResult {
        let span = tracing::info_span!(
            "pipeline module",
            pipeline.step = step,
            pipeline.module = module.name(),
            pipeline.status = tracing::field::Empty,
        );
        let start = Instant::now();
        let outcome = async {
            let mut ctx = ModuleContext {
                run_id,
                state,
                results,
            };
            module.run(&mut ctx).await
        }
        .instrument(span.clone())
        .await;
        let elapsed = start.elapsed();

        let attrs = [
            KeyValue::new("pipeline.step", step.to_string()),
            KeyValue::new("pipeline.module", module.name().to_string()),
        ];
        PIPELINE_MODULE_DURATION.record(elapsed.as_secs_f64(), &attrs);

        let (status, detail) = match outcome {
            Ok(detail) => {
                tracing::info!(parent: &span, step, module = module.name(), %detail, "module succeeded");
                (StepStatus::Success, (!detail.is_empty()).then_some(detail))
            }
            Err(e) => {
                tracing::error!(
                    parent: &span,
                    step,
                    module = module.name(),
                    error.type = e.kind(),
                    error = %e,
                    "module failed"
                );
                PIPELINE_MODULE_FAILURES.add(
                    1,
                    &[
                        attrs[0].clone(),
                        attrs[1].clone(),
                        KeyValue::new("error.type", e.kind()),
                    ],
                );
                (StepStatus::Failure, Some(e.to_string()))
            }
        };
        span.record("pipeline.status", status.as_str());

        StepResult {
            step: step.to_string(),
            module: module.name().to_string(),
            status,
            detail,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;

    use super::*;
    use crate::processing::ReportWindows;

    struct Probe {
        name: String,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Module for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ctx.state.workspace_mut(&self.name);
            if self.fail {
                Err(AppError::Fetch(format!("{} exploded", self.name)))
            } else {
                Ok(format!("{} saw {} results", self.name, ctx.results.len()))
            }
        }
    }

    fn stub_module(name: &str, fail: bool, calls: &Arc<AtomicUsize>) -> Arc<dyn Module> {
        Arc::new(Probe {
            name: name.to_string(),
            fail,
            calls: calls.clone(),
        })
    }

    fn step(name: &str, phase: RunPhase, modules: Vec<Arc<dyn Module>>) -> StepDefinition {
        StepDefinition {
            name: name.to_string(),
            phase,
            modules,
        }
    }

    fn state() -> RunState {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        RunState::new(date, ReportWindows::compute(date, 30, 30, true).unwrap())
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_step() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = Orchestrator::new(vec![
            step(
                "processing",
                RunPhase::Processing,
                vec![
                    stub_module("first", false, &calls),
                    stub_module("second", true, &calls),
                    stub_module("third", false, &calls),
                ],
            ),
            step("status", RunPhase::Reporting, vec![stub_module("status", false, &calls)]),
        ])
        .unwrap();

        let mut state = state();
        let report = orchestrator.run(&mut state, &RunOptions::default()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let statuses: Vec<_> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                StepStatus::Success,
                StepStatus::Failure,
                StepStatus::Success,
                StepStatus::Success
            ]
        );
        assert_eq!(
            report.results[1].detail.as_deref(),
            Some("Fetch error: second exploded")
        );
        assert_eq!(report.results[3].detail.as_deref(), Some("status saw 3 results"));
        assert!(report.has_failures());
        assert_eq!(state.clients.len(), 4);
    }

    #[tokio::test]
    async fn test_dry_run_invokes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = Orchestrator::new(vec![
            step(
                "collect",
                RunPhase::Collecting,
                vec![stub_module("a", false, &calls), stub_module("b", false, &calls)],
            ),
            step(
                "process",
                RunPhase::Processing,
                vec![stub_module("c", false, &calls), stub_module("d", true, &calls)],
            ),
        ])
        .unwrap();

        let options = RunOptions {
            steps: Vec::new(),
            dry_run: true,
        };
        let report = orchestrator.run(&mut state(), &options).await.unwrap();
        assert_eq!(report.plan.len(), 4);
        assert!(report.results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(report.dry_run);
    }

    #[tokio::test]
    async fn test_subset_preserves_table_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = Orchestrator::new(vec![
            step("one", RunPhase::Collecting, vec![stub_module("a", false, &calls)]),
            step("two", RunPhase::Processing, vec![stub_module("b", false, &calls)]),
            step("three", RunPhase::Rendering, vec![stub_module("c", false, &calls)]),
        ])
        .unwrap();

        let options = RunOptions {
            steps: vec!["three".to_string(), "one".to_string()],
            dry_run: false,
        };
        let report = orchestrator.run(&mut state(), &options).await.unwrap();
        let modules: Vec<_> = report.results.iter().map(|r| r.module.as_str()).collect();
        assert_eq!(modules, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_unknown_step_is_config_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator =
            Orchestrator::new(vec![step("one", RunPhase::Idle, vec![stub_module("a", false, &calls)])])
                .unwrap();
        let options = RunOptions {
            steps: vec!["nope".to_string()],
            dry_run: false,
        };
        let err = orchestrator.run(&mut state(), &options).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backward_phases_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = Orchestrator::new(vec![
            step("late", RunPhase::Delivering, vec![stub_module("a", false, &calls)]),
            step("early", RunPhase::Collecting, vec![stub_module("b", false, &calls)]),
        ]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_report_written_as_json() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator =
            Orchestrator::new(vec![step("one", RunPhase::Idle, vec![stub_module("a", false, &calls)])])
                .unwrap();
        let report = orchestrator
            .run(&mut state(), &RunOptions::default())
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = report.write_json(dir.path()).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("pipeline_report_"));
        let parsed: RunReport =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.results, report.results);
    }
}
