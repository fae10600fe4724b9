//! Shared display helpers for plans and run results.
//!
//! Used by `plan`, `run --dry-run`, and the end of `run`.

use crate::runner::{ExecutionPlan, RunResult};
use crate::ui::{should_use_colors, CascadeTheme, UserInterface};

fn theme() -> CascadeTheme {
    if should_use_colors() {
        CascadeTheme::new()
    } else {
        CascadeTheme::plain()
    }
}

/// Print a plan level by level, marking requested modules.
pub fn show_plan(ui: &mut dyn UserInterface, plan: &ExecutionPlan) {
    if plan.is_empty() {
        ui.message("Nothing to run.");
        return;
    }

    let theme = theme();
    let levels = plan.levels();
    let module_label = if plan.len() == 1 { "module" } else { "modules" };
    ui.message(&format!(
        "{} {} in {} level{}",
        plan.len(),
        module_label,
        levels.len(),
        if levels.len() == 1 { "" } else { "s" }
    ));

    for (index, level) in levels.iter().enumerate() {
        ui.message(&format!(
            "  {}",
            theme.level.apply_to(format!("Level {}/{}", index + 1, levels.len()))
        ));
        for module in level {
            let marker = if plan.targets().contains(module) {
                String::new()
            } else {
                format!(" {}", theme.dim.apply_to("(dependency)"))
            };
            ui.message(&format!("    {}{}", module, marker));
        }
    }
}

/// Report every failed module on stderr, then a one-line verdict.
pub fn report_failures(ui: &mut dyn UserInterface, result: &RunResult) {
    let failed: Vec<&str> = result.failures().map(|o| o.module.as_str()).collect();
    if failed.is_empty() {
        return;
    }

    for outcome in result.failures() {
        if let crate::runner::ModuleStatus::Failed { error } = &outcome.status {
            match outcome.handle.as_ref().and_then(|h| h.url.as_deref()) {
                Some(url) => ui.error(&format!("{}: {} ({})", outcome.module, error, url)),
                None => ui.error(&format!("{}: {}", outcome.module, error)),
            }
        }
    }

    let skipped = result.skipped().count();
    ui.error(&format!(
        "Run failed: {} failed, {} skipped",
        failed.join(", "),
        skipped
    ));
}
