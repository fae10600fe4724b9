//! Live run progress display.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::runner::{ModuleOutcome, ModuleStatus, RunProgress};

use super::{should_use_colors, CascadeTheme, SpinnerHandle, UserInterface};

/// Renders orchestrator progress events through a [`UserInterface`].
///
/// Each level gets one spinner listing the modules still running. When the
/// level finishes the spinner is cleared and one line per module is printed,
/// so concurrent completions never interleave on screen.
pub struct RunReporter<'u> {
    ui: &'u mut dyn UserInterface,
    theme: CascadeTheme,
    spinner: Option<Box<dyn SpinnerHandle>>,
    label: String,
    running: BTreeSet<String>,
    finished: Vec<ModuleOutcome>,
}

impl<'u> RunReporter<'u> {
    /// Create a reporter writing to `ui`.
    pub fn new(ui: &'u mut dyn UserInterface) -> Self {
        let theme = if should_use_colors() {
            CascadeTheme::new()
        } else {
            CascadeTheme::plain()
        };
        Self {
            ui,
            theme,
            spinner: None,
            label: String::new(),
            running: BTreeSet::new(),
            finished: Vec::new(),
        }
    }

    /// Feed one progress event.
    pub fn handle(&mut self, event: RunProgress<'_>) {
        match event {
            RunProgress::LevelStarting {
                index,
                total,
                modules,
            } => {
                self.label = self.theme.format_level(index, total, modules);
                self.running = modules.iter().cloned().collect();
                self.finished.clear();
                self.spinner = Some(self.ui.start_spinner(&self.label));
            }
            RunProgress::ModuleTriggered { module, handle } => {
                if self.ui.output_mode().shows_detail() {
                    if let Some(url) = &handle.url {
                        self.ui.message(&format!("  {} started: {}", module, url));
                    }
                }
                self.refresh();
            }
            RunProgress::ModuleFinished { outcome } => {
                self.running.remove(&outcome.module);
                self.finished.push(outcome.clone());
                self.refresh();
            }
            RunProgress::ModuleSkipped { module } => {
                self.ui
                    .skipped(&format!("{} skipped: an upstream level failed", module));
            }
            RunProgress::LevelFinished { .. } => {
                if let Some(mut spinner) = self.spinner.take() {
                    spinner.finish_clear();
                }
                let label = std::mem::take(&mut self.label);
                self.ui.message(&label);
                for outcome in std::mem::take(&mut self.finished) {
                    self.report(&outcome);
                }
            }
        }
    }

    fn refresh(&mut self) {
        if let Some(spinner) = self.spinner.as_mut() {
            let waiting: Vec<_> = self.running.iter().map(String::as_str).collect();
            spinner.set_message(&format!(
                "{} {}",
                self.label,
                self.theme
                    .dim
                    .apply_to(format!("(waiting on {})", waiting.join(", ")))
            ));
        }
    }

    fn report(&mut self, outcome: &ModuleOutcome) {
        let run = outcome
            .handle
            .as_ref()
            .map(|h| format!("run {}, ", h.id))
            .unwrap_or_default();
        match &outcome.status {
            ModuleStatus::Succeeded => self.ui.success(&format!(
                "{} ({}{})",
                outcome.module,
                run,
                format_duration(outcome.duration)
            )),
            ModuleStatus::Failed { error } => {
                self.ui.error(&format!("{}: {}", outcome.module, error))
            }
            ModuleStatus::SkippedUpstreamFailure => self.ui.skipped(&outcome.module),
        }
    }
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}
