//! Non-interactive UI for CI/headless environments.

use super::progress::format_duration;
use super::{OutputMode, RunSummary, SpinnerHandle, UserInterface};

/// UI implementation for non-interactive mode.
///
/// Plain text, no spinners, no colors. Spinner starts are printed once as a
/// line so log-based environments still see each level begin.
pub struct NonInteractiveUI {
    mode: OutputMode,
}

impl NonInteractiveUI {
    /// Create a new non-interactive UI.
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("  [ok] {}", msg);
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("[warn] {}", msg);
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[FAIL] {}", msg);
    }

    fn skipped(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("  [blocked] {}", msg);
        }
    }

    fn data(&mut self, text: &str) {
        println!("{}", text);
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            println!("{} ...", message);
        }
        Box::new(NoopSpinner)
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("\n{}\n", title);
        }
    }

    fn show_hint(&mut self, hint: &str) {
        if self.mode.shows_status() {
            println!("  hint: {}", hint);
        }
    }

    fn show_run_summary(&mut self, summary: &RunSummary) {
        if !self.mode.shows_status() {
            return;
        }

        println!();
        println!("  ┌─ Summary ──────────────────────────");
        for row in &summary.rows {
            let duration = row.duration.map(format_duration).unwrap_or_default();
            let detail = row.detail.as_deref().unwrap_or("");
            println!(
                "  │ {:<9} {:<20} {} {}",
                row.status.bracketed(),
                row.module,
                duration,
                detail
            );
        }
        println!("  ├────────────────────────────────────");
        println!(
            "  │ Total: {} · {} ok · {} failed · {} skipped",
            format_duration(summary.total_duration),
            summary.succeeded,
            summary.failed,
            summary.skipped,
        );
        println!("  └────────────────────────────────────");
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Spinner that does nothing (for non-interactive mode).
struct NoopSpinner;

impl SpinnerHandle for NoopSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        println!("  [ok] {}", msg);
    }

    fn finish_error(&mut self, msg: &str) {
        eprintln!("[FAIL] {}", msg);
    }

    fn finish_clear(&mut self) {}
}
