//! Graph construction, planning, and level-by-level execution.

pub mod dependency;
pub mod orchestrator;
pub mod plan;

pub use dependency::{DependencyGraph, DependencyGraphBuilder};
pub use orchestrator::{ModuleOutcome, ModuleStatus, Orchestrator, RunProgress, RunResult};
pub use plan::{assign_levels, closure, ExecutionPlan, Planner, RunRequest};
