//! Configuration loading, parsing, and validation for Cascade.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Deep merging in [`merger`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use cascade::config::{load_merged_config, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let dir = temp.path().join(".cascade");
//! fs::create_dir_all(&dir).unwrap();
//! fs::write(dir.join("config.yml"), "modules:\n  core: {}\n").unwrap();
//!
//! let config = load_merged_config(temp.path()).unwrap();
//! validate(&config).unwrap();
//! assert!(config.modules.contains_key("core"));
//! ```
//!
//! # Configuration File Locations
//!
//! 1. Project config (`.cascade/config.yml`)
//! 2. Local overrides (`.cascade/config.local.yml`)

pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

pub use schema::{CascadeConfig, GitHubConfig, ModuleConfig, RetryConfig, Settings};

pub use loader::{
    find_project_root, load_config, load_config_file, load_config_value, load_merged_config,
    parse_config, ConfigPaths, CONFIG_DIR,
};

pub use merger::{deep_merge, merge_configs};

pub use validator::{validate, validate_config, ValidationError};
