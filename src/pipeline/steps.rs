use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::orchestrator::Module;
use crate::error::{AppError, AppResult};

/// Run lifecycle. Steps are ordered by phase and a step table may not go back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Collecting,
    Processing,
    Summarizing,
    Rendering,
    Publishing,
    Delivering,
    Reporting,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Collecting => "collecting",
            RunPhase::Processing => "processing",
            RunPhase::Summarizing => "summarizing",
            RunPhase::Rendering => "rendering",
            RunPhase::Publishing => "publishing",
            RunPhase::Delivering => "delivering",
            RunPhase::Reporting => "reporting",
        }
    }
}

/// A step as written in `pipeline.yaml`: module names, not instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    pub phase: RunPhase,
    pub modules: Vec<String>,
}

impl StepSpec {
    fn new(name: &str, phase: RunPhase, modules: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            phase,
            modules: modules.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub steps: Vec<StepSpec>,
}

impl Default for PipelineDefinition {
    fn default() -> Self {
        Self {
            steps: vec![
                StepSpec::new("cleanup", RunPhase::Idle, &["cleanup"]),
                StepSpec::new(
                    "data_collection",
                    RunPhase::Collecting,
                    &["fetch_gsc_data", "fetch_ga4_data"],
                ),
                StepSpec::new(
                    "data_processing",
                    RunPhase::Processing,
                    &[
                        "calculate_growth_metrics",
                        "identify_top_performers",
                        "calculate_yoy_comparison",
                    ],
                ),
                StepSpec::new("analysis", RunPhase::Summarizing, &["summary_writer"]),
                StepSpec::new(
                    "report_generation",
                    RunPhase::Rendering,
                    &["generate_graphs", "build_html_reports"],
                ),
                StepSpec::new("publishing", RunPhase::Publishing, &["upload_assets"]),
                StepSpec::new("notifications", RunPhase::Delivering, &["create_email_drafts"]),
                StepSpec::new("status", RunPhase::Reporting, &["send_status_email"]),
            ],
        }
    }
}

impl PipelineDefinition {
    /// Reads the step table from `path`, falling back to the built-in table
    /// when the file does not exist.
    pub fn load(path: &Path) -> AppResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no pipeline file, using built-in steps");
                Ok(Self::default())
            }
            Err(e) => Err(AppError::Config(format!(
                "cannot read pipeline file {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        let definition: Self = serde_yaml::from_str(raw)
            .map_err(|e| AppError::Config(format!("invalid pipeline file: {e}")))?;
        if definition.steps.is_empty() {
            return Err(AppError::Config("pipeline defines no steps".to_string()));
        }
        Ok(definition)
    }

    /// Resolves module names against the registry.
    pub fn build(&self, registry: &ModuleRegistry) -> AppResult<Vec<StepDefinition>> {
        self.steps
            .iter()
            .map(|spec| {
                let modules = spec
                    .modules
                    .iter()
                    .map(|name| {
                        registry.get(name).ok_or_else(|| {
                            AppError::Config(format!(
                                "step '{}' references unknown module '{name}'",
                                spec.name
                            ))
                        })
                    })
                    .collect::<AppResult<Vec<_>>>()?;
                Ok(StepDefinition {
                    name: spec.name.clone(),
                    phase: spec.phase,
                    modules,
                })
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct StepDefinition {
    pub name: String,
    pub phase: RunPhase,
    pub modules: Vec<Arc<dyn Module>>,
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field(
                "modules",
                &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Rejects duplicate step names, empty steps and phases that go backwards.
pub fn validate_steps(steps: &[StepDefinition]) -> AppResult<()> {
    if steps.is_empty() {
        return Err(AppError::Config("pipeline defines no steps".to_string()));
    }
    let mut seen = HashSet::new();
    let mut last_phase = RunPhase::Idle;
    for step in steps {
        if !seen.insert(step.name.as_str()) {
            return Err(AppError::Config(format!("duplicate step name '{}'", step.name)));
        }
        if step.modules.is_empty() {
            return Err(AppError::Config(format!("step '{}' has no modules", step.name)));
        }
        if step.phase < last_phase {
            return Err(AppError::Config(format!(
                "step '{}' ({}) comes after a {} step",
                step.name,
                step.phase.as_str(),
                last_phase.as_str()
            )));
        }
        last_phase = step.phase;
    }
    Ok(())
}

/// Module instances by name.
#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}
