//! Cascade - dependency-ordered CI pipeline orchestration.
//!
//! Cascade reads a set of modules and their dependencies, works out which
//! modules a run needs, and triggers their CI pipelines level by level:
//! concurrently within a level, one level after another, stopping at the
//! first level that fails.
//!
//! # Modules
//!
//! - [`changes`] - Mapping changed files to modules
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`modules`] - Module definitions and registries
//! - [`pipeline`] - Triggering and watching CI pipelines
//! - [`runner`] - Dependency graph, planning, and orchestration
//! - [`shell`] - External commands and git
//! - [`ui`] - Spinners, summaries, and terminal output
//!
//! # Example
//!
//! ```
//! use cascade::modules::{Module, ModuleRegistry, StaticRegistry};
//! use cascade::runner::{DependencyGraph, Planner, RunRequest};
//!
//! let registry = StaticRegistry::new(vec![
//!     Module::new("core", Vec::<String>::new()),
//!     Module::new("api", ["core"]),
//!     Module::new("web", ["core"]),
//! ]);
//! let graph = DependencyGraph::from_modules(&registry.list_modules().unwrap()).unwrap();
//!
//! let plan = Planner::new(&graph)
//!     .plan(&RunRequest::Explicit(vec!["api".to_string()]))
//!     .unwrap();
//! assert_eq!(plan.levels(), &[vec!["core".to_string()], vec!["api".to_string()]]);
//! ```

pub mod changes;
pub mod cli;
pub mod config;
pub mod error;
pub mod modules;
pub mod pipeline;
pub mod runner;
pub mod shell;
pub mod ui;

pub use error::{CascadeError, Result};
