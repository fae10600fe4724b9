//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Commands that need the module
//! graph share [`Project`] for config loading and planning.

pub mod completions;
pub mod dispatcher;
pub mod display;
pub mod list;
pub mod plan;
pub mod project;
pub mod run;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
pub use project::Project;
