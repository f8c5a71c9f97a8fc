pub mod modules;
pub mod orchestrator;
pub mod state;
pub mod steps;

pub use modules::{Collaborators, registry};
pub use orchestrator::{
    Module, ModuleContext, Orchestrator, PlannedInvocation, RunOptions, RunReport, StepResult,
    StepStatus,
};
pub use state::{ClientWorkspace, RunState};
pub use steps::{ModuleRegistry, PipelineDefinition, RunPhase, StepDefinition};
