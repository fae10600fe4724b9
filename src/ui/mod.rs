//! User-facing output.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for interactive terminal usage
//! - [`NonInteractiveUI`] for CI/headless environments
//! - [`MockUI`] for capturing output in tests
//! - [`RunReporter`] for turning orchestrator progress into output
//!
//! # Example
//!
//! ```
//! use cascade::ui::{create_ui, OutputMode};
//!
//! // Use non-interactive mode for testability
//! let mut ui = create_ui(false, OutputMode::Quiet);
//! ui.show_header("platform");
//! ui.success("Pipelines complete!");
//! ```

pub mod icons;
pub mod mock;
pub mod non_interactive;
pub mod output;
pub mod progress;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use icons::StatusKind;
pub use mock::{MockSpinner, MockUI};
pub use non_interactive::NonInteractiveUI;
pub use output::OutputMode;
pub use progress::{format_duration, RunReporter};
pub use spinner::ProgressSpinner;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, CascadeTheme};

use std::time::Duration;

use crate::runner::{ModuleStatus, RunResult};

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message. Always shown, on stderr.
    fn error(&mut self, msg: &str);

    /// Display a skipped item.
    fn skipped(&mut self, msg: &str);

    /// Write machine-readable output (JSON) to stdout, regardless of mode.
    fn data(&mut self, text: &str);

    /// Start a spinner for an operation.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show a contextual hint.
    fn show_hint(&mut self, hint: &str);

    /// Show the end-of-run summary table.
    fn show_run_summary(&mut self, summary: &RunSummary);

    /// Check if running in interactive mode.
    fn is_interactive(&self) -> bool;
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Mark the operation as successful.
    fn finish_success(&mut self, msg: &str);

    /// Mark the operation as failed.
    fn finish_error(&mut self, msg: &str);

    /// Remove the spinner without leaving a line behind.
    fn finish_clear(&mut self);
}

/// One line of the run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub module: String,
    pub status: StatusKind,
    pub duration: Option<Duration>,
    pub detail: Option<String>,
}

/// Display-ready digest of a [`RunResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub rows: Vec<SummaryRow>,
    pub total_duration: Duration,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success: bool,
}

impl From<&RunResult> for RunSummary {
    fn from(result: &RunResult) -> Self {
        let rows: Vec<SummaryRow> = result
            .modules
            .iter()
            .map(|outcome| {
                let (status, duration, detail) = match &outcome.status {
                    ModuleStatus::Succeeded => (StatusKind::Success, Some(outcome.duration), None),
                    ModuleStatus::Failed { .. } => (
                        StatusKind::Failed,
                        Some(outcome.duration),
                        outcome.handle.as_ref().and_then(|h| h.url.clone()),
                    ),
                    ModuleStatus::SkippedUpstreamFailure => {
                        (StatusKind::Blocked, None, Some("upstream failed".to_string()))
                    }
                };
                SummaryRow {
                    module: outcome.module.clone(),
                    status,
                    duration,
                    detail,
                }
            })
            .collect();

        let count = |kind: StatusKind| rows.iter().filter(|r| r.status == kind).count();
        Self {
            succeeded: count(StatusKind::Success),
            failed: count(StatusKind::Failed),
            skipped: count(StatusKind::Blocked),
            total_duration: result.duration,
            success: result.success(),
            rows,
        }
    }
}
