//! External command execution.

use crate::error::{CascadeError, Result};
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::debug;

/// Result of executing an external command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

impl CommandResult {
    /// Trimmed stdout.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Trimmed stderr, falling back to the exit code when empty.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit code {:?}", self.exit_code)
        } else {
            stderr.to_string()
        }
    }
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// A non-zero exit is reported through [`CommandResult::success`]; only a
/// failure to spawn is an error.
pub fn execute(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    debug!("Running {} {}", program, args.join(" "));

    let output = cmd.output().map_err(CascadeError::Io)?;

    Ok(CommandResult {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration: start.elapsed(),
        success: output.status.success(),
    })
}

/// Run a command and return whether it exited successfully.
pub fn execute_check(program: &str, args: &[&str], cwd: Option<&Path>) -> bool {
    execute(program, args, cwd)
        .map(|r| r.success)
        .unwrap_or(false)
}
