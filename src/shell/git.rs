//! Git queries: current branch, remote repository, changed files.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{CascadeError, Result};

use super::command::execute;

/// Matches GitHub remotes in HTTPS, SCP-like SSH, and `ssh://` form.
static GITHUB_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://(?:[^@/]+@)?github\.com/|git@github\.com:|ssh://git@github\.com/)([^/\s]+)/([^/\s]+?)(?:\.git)?/?$",
    )
    .expect("GITHUB_REMOTE must compile")
});

fn git(repo: &Path, args: &[&str]) -> Result<String> {
    let result = execute("git", args, Some(repo)).map_err(|e| CascadeError::Git {
        message: format!("could not run git: {}", e),
    })?;

    if !result.success {
        return Err(CascadeError::Git {
            message: format!("git {} failed: {}", args.join(" "), result.failure_reason()),
        });
    }

    Ok(result.stdout_trimmed().to_string())
}

/// Name of the checked-out branch.
///
/// # Errors
///
/// Fails on a detached HEAD, since there is no branch name to dispatch against.
pub fn current_branch(repo: &Path) -> Result<String> {
    let branch = git(repo, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    if branch == "HEAD" {
        return Err(CascadeError::Git {
            message: "HEAD is detached; pass --ref to choose a ref".to_string(),
        });
    }
    Ok(branch)
}

/// URL of the named remote.
pub fn remote_url(repo: &Path, remote: &str) -> Result<String> {
    git(repo, &["remote", "get-url", remote])
}

/// Files changed between `base` and `head` (three-dot, merge-base relative).
pub fn changed_files(repo: &Path, base: &str, head: &str) -> Result<Vec<String>> {
    let range = format!("{}...{}", base, head);
    let output = git(repo, &["diff", "--name-only", &range])?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Extract `owner/repo` from a GitHub remote URL.
pub fn parse_repository_slug(url: &str) -> Option<String> {
    let caps = GITHUB_REMOTE.captures(url.trim())?;
    Some(format!("{}/{}", &caps[1], &caps[2]))
}
