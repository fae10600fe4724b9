//! In-memory pipeline system with scripted outcomes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::error::{CascadeError, Result};
use crate::modules::Module;

use super::{PipelineStatus, PipelineSystem, RunHandle};

/// What a scripted module does when triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// The run succeeds.
    Succeed,
    /// The run completes with the given failure cause.
    Fail(String),
    /// Triggering fails with the given cause.
    TriggerError(String),
    /// Watching fails with the given cause.
    WatchError(String),
}

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Trigger { module: String, git_ref: String },
    Watch { module: String, run_id: u64 },
}

/// A [`PipelineSystem`] that never leaves the process.
///
/// Modules without a scripted outcome succeed. Every call is recorded in
/// order, and the peak number of runs in flight is tracked.
#[derive(Debug, Default)]
pub struct MockPipeline {
    outcomes: HashMap<String, MockOutcome>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<MockCall>>,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `module`'s outcome.
    pub fn with_outcome(mut self, module: impl Into<String>, outcome: MockOutcome) -> Self {
        self.outcomes.insert(module.into(), outcome);
        self
    }

    /// Make `module`'s run take `delay` before reporting.
    pub fn with_delay(mut self, module: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(module.into(), delay);
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().clone()
    }

    /// Modules triggered so far, in order.
    pub fn triggered(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::Trigger { module, .. } => Some(module.clone()),
                MockCall::Watch { .. } => None,
            })
            .collect()
    }

    /// Highest number of runs watched at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn outcome(&self, module: &str) -> MockOutcome {
        self.outcomes
            .get(module)
            .cloned()
            .unwrap_or(MockOutcome::Succeed)
    }
}

impl PipelineSystem for MockPipeline {
    fn trigger(&self, module: &Module, git_ref: &str) -> Result<RunHandle> {
        self.lock().push(MockCall::Trigger {
            module: module.moniker.clone(),
            git_ref: git_ref.to_string(),
        });

        if let MockOutcome::TriggerError(cause) = self.outcome(&module.moniker) {
            return Err(CascadeError::TriggerFailed {
                module: module.moniker.clone(),
                cause,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RunHandle::new(id))
    }

    fn watch(&self, module: &Module, handle: &RunHandle) -> Result<PipelineStatus> {
        self.lock().push(MockCall::Watch {
            module: module.moniker.clone(),
            run_id: handle.id,
        });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&module.moniker) {
            thread::sleep(*delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.outcome(&module.moniker) {
            MockOutcome::Succeed | MockOutcome::TriggerError(_) => Ok(PipelineStatus::Succeeded),
            MockOutcome::Fail(cause) => Ok(PipelineStatus::Failed { cause }),
            MockOutcome::WatchError(cause) => Err(CascadeError::WatchFailed {
                module: module.moniker.clone(),
                cause,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscripted_modules_succeed() {
        let mock = MockPipeline::new();
        let module = Module::new("core", Vec::<String>::new());

        let handle = mock.trigger(&module, "main").unwrap();
        assert_eq!(handle.id, 1);
        assert_eq!(mock.watch(&module, &handle).unwrap(), PipelineStatus::Succeeded);
        assert_eq!(
            mock.calls(),
            vec![
                MockCall::Trigger {
                    module: "core".to_string(),
                    git_ref: "main".to_string()
                },
                MockCall::Watch {
                    module: "core".to_string(),
                    run_id: 1
                },
            ]
        );
    }

    #[test]
    fn scripted_failures_surface() {
        let mock = MockPipeline::new()
            .with_outcome("api", MockOutcome::Fail("tests failed".to_string()))
            .with_outcome("web", MockOutcome::TriggerError("403".to_string()));
        let api = Module::new("api", Vec::<String>::new());
        let web = Module::new("web", Vec::<String>::new());

        let handle = mock.trigger(&api, "main").unwrap();
        assert_eq!(
            mock.watch(&api, &handle).unwrap(),
            PipelineStatus::Failed {
                cause: "tests failed".to_string()
            }
        );
        assert!(matches!(
            mock.trigger(&web, "main"),
            Err(CascadeError::TriggerFailed { .. })
        ));
        assert_eq!(mock.triggered(), vec!["api", "web"]);
    }

    #[test]
    fn handles_are_unique() {
        let mock = MockPipeline::new();
        let module = Module::new("core", Vec::<String>::new());
        let a = mock.trigger(&module, "main").unwrap();
        let b = mock.trigger(&module, "main").unwrap();
        assert_ne!(a.id, b.id);
    }
}
