//! List command implementation.
//!
//! The `cascade list` command lists registered modules and their dependencies.

use std::path::{Path, PathBuf};

use crate::cli::args::ListArgs;
use crate::error::{CascadeError, Result};
use crate::ui::{should_use_colors, CascadeTheme, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::project::{Project, NO_CONFIG_MESSAGE};

/// The list command implementation.
pub struct ListCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: ListArgs,
}

impl ListCommand {
    /// Create a new list command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: ListArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
        }
    }
}

impl Command for ListCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let project = match Project::load(&self.project_root, self.config.as_deref()) {
            Ok(p) => p,
            Err(CascadeError::ConfigNotFound { .. }) => {
                ui.error(NO_CONFIG_MESSAGE);
                return Ok(CommandResult::failure(2));
            }
            Err(e) => return Err(e),
        };

        if self.args.json {
            ui.data(&serde_json::to_string_pretty(project.modules()).map_err(anyhow::Error::from)?);
            return Ok(CommandResult::success());
        }

        let theme = if should_use_colors() {
            CascadeTheme::new()
        } else {
            CascadeTheme::plain()
        };

        ui.message(&format!("  {}", theme.header.apply_to("Modules:")));
        for module in project.modules() {
            ui.message(&format!(
                "    {} {}",
                theme.highlight.apply_to(&module.moniker),
                theme.dim.apply_to(format!("({})", module.workflow))
            ));

            if !module.depends_on.is_empty() {
                let deps: Vec<&str> = module.depends_on.iter().map(String::as_str).collect();
                ui.message(&format!(
                    "      {} {}",
                    theme.dim.apply_to("└── depends on:"),
                    theme.dim.apply_to(deps.join(", "))
                ));
            }
        }

        Ok(CommandResult::success())
    }
}
