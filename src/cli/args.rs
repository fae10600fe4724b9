//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::runner::RunRequest;

/// Cascade - Dependency-ordered CI pipeline orchestration.
#[derive(Debug, Parser)]
#[command(name = "cascade")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides default .cascade/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Trigger module pipelines in dependency order (default if no command specified)
    Run(RunArgs),

    /// Show the execution plan without triggering anything
    Plan(PlanArgs),

    /// List modules and their dependencies
    List(ListArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Which modules a run or plan covers.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SelectArgs {
    /// Modules to run, with their dependencies (default: all modules)
    #[arg(value_name = "MODULE", conflicts_with = "changed_only")]
    pub modules: Vec<String>,

    /// Only modules changed between the base ref and --ref
    #[arg(long)]
    pub changed_only: bool,

    /// Git ref to run pipelines against (default: current branch)
    #[arg(long = "ref", value_name = "REF")]
    pub git_ref: Option<String>,
}

impl SelectArgs {
    /// Whether a git ref is needed to plan this selection.
    pub fn needs_ref(&self) -> bool {
        self.changed_only
    }

    /// Convert the selection into a run request against `git_ref`.
    pub fn request(&self, git_ref: &str) -> RunRequest {
        if self.changed_only {
            RunRequest::Changed {
                git_ref: git_ref.to_string(),
            }
        } else if self.modules.is_empty() {
            RunRequest::All
        } else {
            RunRequest::Explicit(self.modules.clone())
        }
    }
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Print the plan without triggering pipelines
    #[arg(long)]
    pub dry_run: bool,

    /// Output the run result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `list` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
