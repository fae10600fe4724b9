//! External command execution, git helpers, and host detection.

pub mod command;
pub mod git;
pub mod platform;

pub use command::{execute, execute_check, CommandResult};
pub use git::{changed_files, current_branch, parse_repository_slug, remote_url};
pub use platform::is_ci;
