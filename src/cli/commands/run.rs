//! Run command implementation.
//!
//! The `cascade run` command plans the requested modules and drives their
//! pipelines level by level.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::args::RunArgs;
use crate::error::{CascadeError, Result};
use crate::runner::Orchestrator;
use crate::ui::{RunReporter, RunSummary, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::display::{report_failures, show_plan};
use super::project::{Project, NO_CONFIG_MESSAGE};

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
        }
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let project = match Project::load(&self.project_root, self.config.as_deref()) {
            Ok(p) => p,
            Err(CascadeError::ConfigNotFound { .. }) => {
                ui.error(NO_CONFIG_MESSAGE);
                return Ok(CommandResult::failure(2));
            }
            Err(e) => return Err(e),
        };

        let git_ref = project.resolve_ref(&self.args.select)?;
        let plan = project.plan(&self.args.select, &git_ref)?;

        if self.args.dry_run {
            if self.args.json {
                ui.data(&serde_json::to_string_pretty(&plan).map_err(anyhow::Error::from)?);
            } else {
                ui.show_header(&format!("Dry run on {}", git_ref));
                show_plan(ui, &plan);
            }
            return Ok(CommandResult::success());
        }

        if plan.is_empty() {
            if self.args.json {
                let empty = serde_json::json!({
                    "git_ref": git_ref,
                    "modules": [],
                    "duration_ms": 0,
                    "success": true,
                });
                ui.data(&serde_json::to_string_pretty(&empty).map_err(anyhow::Error::from)?);
            } else {
                ui.message("Nothing to run.");
            }
            return Ok(CommandResult::success());
        }

        let pipeline = project.github()?;
        if !project.has_token() {
            ui.warning(
                "No GitHub token found; requests are unauthenticated and dispatch will likely be rejected",
            );
        }

        if !self.args.json {
            ui.show_header(&format!(
                "Running {} module{} on {} ({})",
                plan.len(),
                if plan.len() == 1 { "" } else { "s" },
                git_ref,
                pipeline.repository()
            ));
        }
        info!(git_ref = %git_ref, modules = plan.len(), "Starting run");

        let orchestrator = Orchestrator::new(&pipeline, project.modules())
            .with_max_parallel(project.config().settings.max_parallel);

        let result = if self.args.json {
            orchestrator.execute(&plan, &git_ref, &mut |_| {})
        } else {
            let mut reporter = RunReporter::new(&mut *ui);
            orchestrator.execute(&plan, &git_ref, &mut |event| reporter.handle(event))
        };

        if self.args.json {
            ui.data(&serde_json::to_string_pretty(&result).map_err(anyhow::Error::from)?);
        } else {
            ui.show_run_summary(&RunSummary::from(&result));
        }

        if result.success() {
            if !self.args.json {
                ui.success("All pipelines succeeded");
            }
            Ok(CommandResult::success())
        } else {
            report_failures(ui, &result);
            Ok(CommandResult::failure(1))
        }
    }
}
