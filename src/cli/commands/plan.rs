//! Plan command implementation.
//!
//! `cascade plan` shows the levels a run would execute without triggering
//! anything.

use std::path::{Path, PathBuf};

use crate::cli::args::PlanArgs;
use crate::error::{CascadeError, Result};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::display::show_plan;
use super::project::{Project, NO_CONFIG_MESSAGE};

/// Placeholder ref for plans that never look at git.
const UNUSED_REF: &str = "HEAD";

/// The plan command implementation.
pub struct PlanCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: PlanArgs,
}

impl PlanCommand {
    /// Create a new plan command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: PlanArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
        }
    }
}

impl Command for PlanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let project = match Project::load(&self.project_root, self.config.as_deref()) {
            Ok(p) => p,
            Err(CascadeError::ConfigNotFound { .. }) => {
                ui.error(NO_CONFIG_MESSAGE);
                return Ok(CommandResult::failure(2));
            }
            Err(e) => return Err(e),
        };

        let git_ref = if self.args.select.needs_ref() {
            project.resolve_ref(&self.args.select)?
        } else {
            self.args
                .select
                .git_ref
                .clone()
                .unwrap_or_else(|| UNUSED_REF.to_string())
        };
        let plan = project.plan(&self.args.select, &git_ref)?;

        if self.args.json {
            ui.data(&serde_json::to_string_pretty(&plan).map_err(anyhow::Error::from)?);
        } else {
            show_plan(ui, &plan);
        }

        Ok(CommandResult::success())
    }
}
