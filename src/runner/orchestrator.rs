//! Level-by-level execution of a plan against a pipeline system.
//!
//! Modules within a level run concurrently on scoped threads, one worker per
//! module unless `max_parallel` caps the worker count. Levels run strictly in order. Once a level records a failure,
//! every module in later levels is reported as skipped and never triggered;
//! siblings already running in the failing level are allowed to finish.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::modules::Module;
use crate::pipeline::{PipelineStatus, PipelineSystem, RunHandle};

use super::plan::ExecutionPlan;

/// Final state of one planned module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleStatus {
    Succeeded,
    Failed { error: String },
    /// Not triggered because an earlier level failed.
    SkippedUpstreamFailure,
}

impl ModuleStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// What happened to one module during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleOutcome {
    pub module: String,
    #[serde(flatten)]
    pub status: ModuleStatus,
    /// Present once the module's run was started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<RunHandle>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl ModuleOutcome {
    fn failed(module: &str, error: impl Into<String>, handle: Option<RunHandle>, duration: Duration) -> Self {
        Self {
            module: module.to_string(),
            status: ModuleStatus::Failed {
                error: error.into(),
            },
            handle,
            duration,
        }
    }

    fn skipped(module: &str) -> Self {
        Self {
            module: module.to_string(),
            status: ModuleStatus::SkippedUpstreamFailure,
            handle: None,
            duration: Duration::ZERO,
        }
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Aggregated outcome of executing a plan.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Ref every pipeline was triggered against.
    pub git_ref: String,
    /// One entry per planned module, in plan order.
    pub modules: Vec<ModuleOutcome>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    success: bool,
}

impl RunResult {
    /// Whether every planned module succeeded. An empty run succeeds.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Modules that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.modules
            .iter()
            .filter(|o| matches!(o.status, ModuleStatus::Failed { .. }))
    }

    /// Modules skipped because of an upstream failure.
    pub fn skipped(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.modules
            .iter()
            .filter(|o| o.status == ModuleStatus::SkippedUpstreamFailure)
    }

    /// Outcome for a single module.
    pub fn outcome(&self, module: &str) -> Option<&ModuleOutcome> {
        self.modules.iter().find(|o| o.module == module)
    }
}

/// Progress callback events.
///
/// Delivered on the thread that called [`Orchestrator::execute`].
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// A level is about to be dispatched.
    LevelStarting {
        index: usize,
        total: usize,
        modules: &'a [String],
    },
    /// A module's run was started.
    ModuleTriggered {
        module: &'a str,
        handle: &'a RunHandle,
    },
    /// A module reached a terminal state.
    ModuleFinished { outcome: &'a ModuleOutcome },
    /// A module was skipped due to an upstream failure.
    ModuleSkipped { module: &'a str },
    /// Every module of a level finished.
    LevelFinished { index: usize },
}

enum WorkerEvent {
    Triggered { module: String, handle: RunHandle },
    Finished(ModuleOutcome),
}

/// Drives an [`ExecutionPlan`] through a [`PipelineSystem`].
pub struct Orchestrator<'a> {
    pipeline: &'a dyn PipelineSystem,
    modules: HashMap<&'a str, &'a Module>,
    max_parallel: usize,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over the registered `modules`.
    pub fn new(pipeline: &'a dyn PipelineSystem, modules: &'a [Module]) -> Self {
        Self {
            pipeline,
            modules: modules.iter().map(|m| (m.moniker.as_str(), m)).collect(),
            max_parallel: 0,
        }
    }

    /// Limit simultaneous workers within a level. `0` means unbounded.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    /// Run `plan` against `git_ref`, reporting progress to `on_progress`.
    ///
    /// Never fails as a whole: trigger and watch errors are recorded on the
    /// affected module and stop later levels from starting.
    pub fn execute(
        &self,
        plan: &ExecutionPlan,
        git_ref: &str,
        on_progress: &mut dyn FnMut(RunProgress<'_>),
    ) -> RunResult {
        let started = Instant::now();
        let total = plan.levels().len();
        let mut outcomes = Vec::with_capacity(plan.len());
        let mut failed = false;

        for (index, level) in plan.levels().iter().enumerate() {
            if failed {
                for module in level {
                    debug!(module = %module, "Skipping after upstream failure");
                    on_progress(RunProgress::ModuleSkipped { module });
                    outcomes.push(ModuleOutcome::skipped(module));
                }
                continue;
            }

            info!(level = index, modules = level.len(), "Starting level");
            on_progress(RunProgress::LevelStarting {
                index,
                total,
                modules: level,
            });

            let results = self.run_level(level, git_ref, on_progress);
            failed = results.iter().any(|o| !o.status.is_success());
            outcomes.extend(results);

            on_progress(RunProgress::LevelFinished { index });
            if failed {
                warn!(level = index, "Level failed; later levels will not start");
            }
        }

        let success = outcomes.iter().all(|o| o.status.is_success());
        RunResult {
            git_ref: git_ref.to_string(),
            modules: outcomes,
            duration: started.elapsed(),
            success,
        }
    }

    /// Run every module of `level`, at most `max_parallel` at a time.
    ///
    /// Workers pull the next module from a shared cursor, so a slow module
    /// only ever holds its own slot. Outcomes come back in level order.
    fn run_level(
        &self,
        level: &[String],
        git_ref: &str,
        on_progress: &mut dyn FnMut(RunProgress<'_>),
    ) -> Vec<ModuleOutcome> {
        let workers = match self.max_parallel {
            0 => level.len(),
            n => n.min(level.len()),
        };
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();

        let finished: Vec<(usize, ModuleOutcome)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let tx = tx.clone();
                    let next = &next;
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let slot = next.fetch_add(1, Ordering::SeqCst);
                            let Some(moniker) = level.get(slot) else {
                                break;
                            };
                            let outcome = self.run_guarded(moniker, git_ref, &tx);
                            let _ = tx.send(WorkerEvent::Finished(outcome.clone()));
                            done.push((slot, outcome));
                        }
                        done
                    })
                })
                .collect();
            drop(tx);

            for event in rx {
                match event {
                    WorkerEvent::Triggered { module, handle } => {
                        on_progress(RunProgress::ModuleTriggered {
                            module: &module,
                            handle: &handle,
                        })
                    }
                    WorkerEvent::Finished(outcome) => {
                        on_progress(RunProgress::ModuleFinished { outcome: &outcome })
                    }
                }
            }

            handles
                .into_iter()
                .filter_map(|worker| worker.join().ok())
                .flatten()
                .collect()
        });

        let mut slots: Vec<Option<ModuleOutcome>> = vec![None; level.len()];
        for (slot, outcome) in finished {
            slots[slot] = Some(outcome);
        }
        slots
            .into_iter()
            .zip(level)
            .map(|(outcome, moniker)| {
                outcome.unwrap_or_else(|| {
                    ModuleOutcome::failed(moniker, "worker panicked", None, Duration::ZERO)
                })
            })
            .collect()
    }

    /// Run one module, turning a panic in the pipeline system into a failure.
    fn run_guarded(
        &self,
        moniker: &str,
        git_ref: &str,
        events: &Sender<WorkerEvent>,
    ) -> ModuleOutcome {
        let Some(module) = self.modules.get(moniker).copied() else {
            return ModuleOutcome::failed(moniker, "module is not registered", None, Duration::ZERO);
        };
        panic::catch_unwind(AssertUnwindSafe(|| run_module(self.pipeline, module, git_ref, events)))
            .unwrap_or_else(|_| {
                warn!(module = %moniker, "Pipeline worker panicked");
                ModuleOutcome::failed(moniker, "worker panicked", None, Duration::ZERO)
            })
    }
}

/// Trigger and watch one module. Errors become a failed outcome.
fn run_module(
    pipeline: &dyn PipelineSystem,
    module: &Module,
    git_ref: &str,
    events: &Sender<WorkerEvent>,
) -> ModuleOutcome {
    let started = Instant::now();

    let handle = match pipeline.trigger(module, git_ref) {
        Ok(handle) => handle,
        Err(e) => {
            warn!(module = %module.moniker, "Trigger failed: {}", e);
            return ModuleOutcome::failed(&module.moniker, e.to_string(), None, started.elapsed());
        }
    };

    info!(module = %module.moniker, run_id = handle.id, "Pipeline triggered");
    let _ = events.send(WorkerEvent::Triggered {
        module: module.moniker.clone(),
        handle: handle.clone(),
    });

    let status = match pipeline.watch(module, &handle) {
        Ok(PipelineStatus::Succeeded) => ModuleStatus::Succeeded,
        Ok(PipelineStatus::Failed { cause }) => ModuleStatus::Failed { error: cause },
        Err(e) => ModuleStatus::Failed {
            error: e.to_string(),
        },
    };

    match &status {
        ModuleStatus::Succeeded => {
            info!(module = %module.moniker, run_id = handle.id, "Pipeline succeeded")
        }
        ModuleStatus::Failed { error } => {
            warn!(module = %module.moniker, run_id = handle.id, "Pipeline failed: {}", error)
        }
        ModuleStatus::SkippedUpstreamFailure => {}
    }

    ModuleOutcome {
        module: module.moniker.clone(),
        status,
        handle: Some(handle),
        duration: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{MockOutcome, MockPipeline};
    use crate::runner::dependency::DependencyGraph;
    use crate::runner::plan::{Planner, RunRequest};

    /// A and B are roots, C needs A, D needs B and C.
    fn abcd() -> Vec<Module> {
        vec![
            Module::new("A", Vec::<String>::new()),
            Module::new("B", Vec::<String>::new()),
            Module::new("C", ["A"]),
            Module::new("D", ["B", "C"]),
        ]
    }

    fn plan(modules: &[Module], request: RunRequest) -> ExecutionPlan {
        let graph = DependencyGraph::from_modules(modules).unwrap();
        Planner::new(&graph).plan(&request).unwrap()
    }

    fn position(triggered: &[String], module: &str) -> usize {
        triggered.iter().position(|m| m == module).unwrap()
    }

    #[test]
    fn runs_every_level_in_order() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::All);
        let pipeline = MockPipeline::new();

        let result = Orchestrator::new(&pipeline, &modules).execute(&plan, "main", &mut |_| {});

        assert!(result.success());
        assert_eq!(result.modules.len(), 4);
        let triggered = pipeline.triggered();
        assert_eq!(triggered.len(), 4);
        assert!(position(&triggered, "C") > position(&triggered, "A"));
        assert!(position(&triggered, "C") > position(&triggered, "B"));
        assert_eq!(position(&triggered, "D"), 3);
        assert!(result.modules.iter().all(|o| o.handle.is_some()));
    }

    #[test]
    fn failure_skips_later_levels() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::All);
        let pipeline = MockPipeline::new()
            .with_outcome("A", MockOutcome::Fail("run 1 concluded failure".to_string()));

        let result = Orchestrator::new(&pipeline, &modules).execute(&plan, "main", &mut |_| {});

        assert!(!result.success());
        let mut triggered = pipeline.triggered();
        triggered.sort();
        assert_eq!(triggered, vec!["A", "B"]);
        assert_eq!(
            result.outcome("A").unwrap().status,
            ModuleStatus::Failed {
                error: "run 1 concluded failure".to_string()
            }
        );
        assert_eq!(result.outcome("B").unwrap().status, ModuleStatus::Succeeded);
        let skipped: Vec<_> = result.skipped().map(|o| o.module.as_str()).collect();
        assert_eq!(skipped, vec!["C", "D"]);
        assert_eq!(result.failures().count(), 1);
    }

    #[test]
    fn siblings_finish_when_one_fails() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::All);
        let pipeline = MockPipeline::new()
            .with_outcome("A", MockOutcome::Fail("boom".to_string()))
            .with_delay("B", Duration::from_millis(50));

        let result = Orchestrator::new(&pipeline, &modules).execute(&plan, "main", &mut |_| {});

        let b = result.outcome("B").unwrap();
        assert_eq!(b.status, ModuleStatus::Succeeded);
        assert!(b.duration >= Duration::from_millis(50));
    }

    #[test]
    fn trigger_error_is_recorded_not_raised() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::All);
        let pipeline = MockPipeline::new()
            .with_outcome("C", MockOutcome::TriggerError("HTTP 404".to_string()));

        let result = Orchestrator::new(&pipeline, &modules).execute(&plan, "main", &mut |_| {});

        let c = result.outcome("C").unwrap();
        assert!(c.handle.is_none());
        match &c.status {
            ModuleStatus::Failed { error } => assert!(error.contains("HTTP 404")),
            other => panic!("unexpected status: {other:?}"),
        }
        assert_eq!(
            result.outcome("D").unwrap().status,
            ModuleStatus::SkippedUpstreamFailure
        );
        assert!(!pipeline.triggered().contains(&"D".to_string()));
    }

    #[test]
    fn watch_error_fails_module() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::Explicit(vec!["A".to_string()]));
        let pipeline = MockPipeline::new()
            .with_outcome("A", MockOutcome::WatchError("connection reset".to_string()));

        let result = Orchestrator::new(&pipeline, &modules).execute(&plan, "main", &mut |_| {});

        assert!(!result.success());
        assert!(result.outcome("A").unwrap().handle.is_some());
    }

    #[test]
    fn single_module_runs_alone() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::Explicit(vec!["B".to_string()]));
        let pipeline = MockPipeline::new();

        let result = Orchestrator::new(&pipeline, &modules).execute(&plan, "feature/x", &mut |_| {});

        assert!(result.success());
        assert_eq!(pipeline.triggered(), vec!["B"]);
        assert_eq!(result.git_ref, "feature/x");
    }

    #[test]
    fn empty_plan_succeeds_without_triggering() {
        let modules = abcd();
        let pipeline = MockPipeline::new();

        let result = Orchestrator::new(&pipeline, &modules).execute(
            &ExecutionPlan::default(),
            "main",
            &mut |_| {},
        );

        assert!(result.success());
        assert!(result.modules.is_empty());
        assert!(pipeline.calls().is_empty());
    }

    #[test]
    fn level_members_run_concurrently() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::All);
        let pipeline = MockPipeline::new()
            .with_delay("A", Duration::from_millis(100))
            .with_delay("B", Duration::from_millis(100));

        Orchestrator::new(&pipeline, &modules).execute(&plan, "main", &mut |_| {});

        assert_eq!(pipeline.peak_concurrency(), 2);
    }

    #[test]
    fn max_parallel_bounds_workers() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::All);
        let pipeline = MockPipeline::new()
            .with_delay("A", Duration::from_millis(20))
            .with_delay("B", Duration::from_millis(20));

        let result = Orchestrator::new(&pipeline, &modules)
            .with_max_parallel(1)
            .execute(&plan, "main", &mut |_| {});

        assert!(result.success());
        assert_eq!(pipeline.peak_concurrency(), 1);
    }

    /// Records trigger and completion order; `slow` takes a while to finish.
    struct Timeline {
        slow: &'static str,
        events: std::sync::Mutex<Vec<String>>,
    }

    impl PipelineSystem for Timeline {
        fn trigger(&self, module: &Module, _git_ref: &str) -> crate::error::Result<RunHandle> {
            self.events.lock().unwrap().push(format!("trigger {}", module.moniker));
            Ok(RunHandle::new(1))
        }

        fn watch(&self, module: &Module, _handle: &RunHandle) -> crate::error::Result<PipelineStatus> {
            if module.moniker == self.slow {
                thread::sleep(Duration::from_millis(300));
            }
            self.events.lock().unwrap().push(format!("done {}", module.moniker));
            Ok(PipelineStatus::Succeeded)
        }
    }

    #[test]
    fn freed_slot_picks_up_next_module() {
        let modules = vec![
            Module::new("a", Vec::<String>::new()),
            Module::new("b", Vec::<String>::new()),
            Module::new("c", Vec::<String>::new()),
        ];
        let plan = plan(&modules, RunRequest::All);
        let pipeline = Timeline {
            slow: "a",
            events: std::sync::Mutex::new(Vec::new()),
        };

        let result = Orchestrator::new(&pipeline, &modules)
            .with_max_parallel(2)
            .execute(&plan, "main", &mut |_| {});

        assert!(result.success());
        let events = pipeline.events.lock().unwrap();
        let at = |e: &str| events.iter().position(|x| x == e).unwrap();
        assert!(at("trigger c") < at("done a"));
        let order: Vec<_> = result.modules.iter().map(|o| o.module.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    struct Panicking;

    impl PipelineSystem for Panicking {
        fn trigger(&self, module: &Module, _git_ref: &str) -> crate::error::Result<RunHandle> {
            if module.moniker == "A" {
                panic!("boom");
            }
            Ok(RunHandle::new(1))
        }

        fn watch(&self, _module: &Module, _handle: &RunHandle) -> crate::error::Result<PipelineStatus> {
            Ok(PipelineStatus::Succeeded)
        }
    }

    #[test]
    fn panicking_pipeline_fails_only_that_module() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::All);

        let result = Orchestrator::new(&Panicking, &modules)
            .with_max_parallel(1)
            .execute(&plan, "main", &mut |_| {});

        assert!(!result.success());
        assert!(matches!(
            result.outcome("A").map(|o| &o.status),
            Some(ModuleStatus::Failed { error }) if error == "worker panicked"
        ));
        assert_eq!(result.outcome("B").map(|o| &o.status), Some(&ModuleStatus::Succeeded));
        assert_eq!(
            result.outcome("D").map(|o| &o.status),
            Some(&ModuleStatus::SkippedUpstreamFailure)
        );
    }

    #[test]
    fn progress_events_follow_levels() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::All);
        let pipeline = MockPipeline::new().with_outcome("C", MockOutcome::Fail("red".to_string()));
        let mut events = Vec::new();

        Orchestrator::new(&pipeline, &modules).execute(&plan, "main", &mut |event| {
            events.push(match event {
                RunProgress::LevelStarting { index, total, .. } => format!("level {index}/{total}"),
                RunProgress::ModuleTriggered { module, .. } => format!("triggered {module}"),
                RunProgress::ModuleFinished { outcome } => format!("finished {}", outcome.module),
                RunProgress::ModuleSkipped { module } => format!("skipped {module}"),
                RunProgress::LevelFinished { index } => format!("done {index}"),
            });
        });

        assert_eq!(events.first().unwrap(), "level 0/3");
        assert_eq!(
            &events[events.len() - 5..],
            [
                "level 1/3",
                "triggered C",
                "finished C",
                "done 1",
                "skipped D"
            ]
        );
        assert_eq!(events.iter().filter(|e| e.starts_with("finished")).count(), 3);
    }

    #[test]
    fn result_serializes_statuses() {
        let modules = abcd();
        let plan = plan(&modules, RunRequest::All);
        let pipeline = MockPipeline::new().with_outcome("A", MockOutcome::Fail("red".to_string()));

        let result = Orchestrator::new(&pipeline, &modules).execute(&plan, "main", &mut |_| {});
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["git_ref"], "main");
        let a = &json["modules"][0];
        assert_eq!(a["module"], "A");
        assert_eq!(a["status"], "failed");
        assert_eq!(a["error"], "red");
        assert_eq!(json["modules"][3]["status"], "skipped_upstream_failure");
    }
}
