//! GitHub Actions as a pipeline system.
//!
//! A module's pipeline is a `workflow_dispatch` workflow. Triggering posts a
//! dispatch, then looks the new run up in the workflow's run list, since the
//! dispatch endpoint does not return a run id. Watching polls the run until
//! its status is `completed`.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::GitHubConfig;
use crate::error::{CascadeError, Result};
use crate::modules::Module;

use super::retry::{resolve_handle, HandleResolution, RetryPolicy};
use super::{PipelineStatus, PipelineSystem, RunHandle};

const API_VERSION: &str = "2022-11-28";

/// Consecutive failed status polls tolerated before a watch gives up.
const MAX_WATCH_ERRORS: u32 = 3;

/// First non-empty token among the named environment variables.
pub fn token_from_env(names: &[String]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Triggers and watches `workflow_dispatch` runs through the GitHub REST API.
pub struct GitHubActions {
    client: Client,
    api_url: String,
    repository: String,
    token: Option<String>,
    retry: RetryPolicy,
    poll_interval: Duration,
    watch_timeout: Option<Duration>,
    clock_skew: chrono::Duration,
    /// Run ids already handed out, so no two modules watch the same run.
    claimed: Mutex<HashSet<u64>>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunList {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
}

impl WorkflowRun {
    fn handle(&self) -> RunHandle {
        let handle = RunHandle::new(self.id);
        match &self.html_url {
            Some(url) => handle.with_url(url),
            None => handle,
        }
    }
}

impl GitHubActions {
    /// Create a client for `repository` (`owner/name`) using `config`'s timings.
    pub fn new(
        repository: impl Into<String>,
        config: &GitHubConfig,
        token: Option<String>,
    ) -> Result<Self> {
        let clock_skew = chrono::Duration::try_seconds(config.clock_skew_secs).ok_or_else(|| {
            CascadeError::ConfigValidationError {
                message: format!(
                    "github.clock_skew_secs is out of range: {}",
                    config.clock_skew_secs
                ),
            }
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repository: repository.into(),
            token,
            retry: RetryPolicy::from(&config.trigger_retry),
            poll_interval: config.poll_interval(),
            watch_timeout: config.watch_timeout(),
            clock_skew,
            claimed: Mutex::new(HashSet::new()),
        })
    }

    /// Override the handle lookup policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the delay between status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Repository this client dispatches to.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn workflow_url(&self, module: &Module, suffix: &str) -> String {
        format!(
            "{}/repos/{}/actions/workflows/{}/{}",
            self.api_url, self.repository, module.workflow, suffix
        )
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "cascade")
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn dispatch(&self, module: &Module, git_ref: &str) -> anyhow::Result<()> {
        let url = self.workflow_url(module, "dispatches");
        let response = self
            .request(self.client.post(&url))
            .json(&serde_json::json!({ "ref": git_ref }))
            .send()
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("HTTP {} dispatching {}: {}", status, module.workflow, body.trim()));
        }
        Ok(())
    }

    /// Newest unclaimed dispatch run of the module's workflow on `git_ref`
    /// created at or after `since`. A returned run is claimed.
    fn find_run(
        &self,
        module: &Module,
        git_ref: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<RunHandle>> {
        let url = Url::parse_with_params(
            &self.workflow_url(module, "runs"),
            &[
                ("event", "workflow_dispatch"),
                ("branch", git_ref),
                ("per_page", "20"),
            ],
        )
        .context("Invalid workflow runs URL")?;

        let response = self
            .request(self.client.get(url.clone()))
            .send()
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP {} listing runs of {}", status, module.workflow));
        }

        let list: WorkflowRunList = response
            .json()
            .context("Failed to parse workflow runs response")?;

        let earliest = since - self.clock_skew;
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        let run = list
            .workflow_runs
            .iter()
            .filter(|run| run.created_at >= earliest && !claimed.contains(&run.id))
            .max_by_key(|run| (run.created_at, run.id));

        Ok(run.map(|run| {
            claimed.insert(run.id);
            run.handle()
        }))
    }

    fn fetch_run(&self, id: u64) -> anyhow::Result<WorkflowRun> {
        let url = format!("{}/repos/{}/actions/runs/{}", self.api_url, self.repository, id);
        let response = self
            .request(self.client.get(&url))
            .send()
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP {} fetching run {}", status, id));
        }

        response.json().context("Failed to parse workflow run response")
    }
}

impl PipelineSystem for GitHubActions {
    fn trigger(&self, module: &Module, git_ref: &str) -> Result<RunHandle> {
        let trigger_failed = |cause: String| CascadeError::TriggerFailed {
            module: module.moniker.clone(),
            cause,
        };

        let since = Utc::now();
        self.dispatch(module, git_ref)
            .map_err(|e| trigger_failed(format!("{:#}", e)))?;
        debug!(module = %module.moniker, workflow = %module.workflow, git_ref, "Dispatched workflow");

        let resolution = resolve_handle(&self.retry, |attempt| {
            debug!(module = %module.moniker, attempt, "Looking up dispatched run");
            self.find_run(module, git_ref, since)
                .map_err(|e| trigger_failed(format!("{:#}", e)))
        })?;

        match resolution {
            HandleResolution::Visible(handle) => Ok(handle),
            HandleResolution::TimedOut { attempts } => Err(trigger_failed(format!(
                "run of {} not visible after {} lookups",
                module.workflow, attempts
            ))),
            HandleResolution::Requested { .. } => Err(trigger_failed(
                "run lookup ended before resolving".to_string(),
            )),
        }
    }

    fn watch(&self, module: &Module, handle: &RunHandle) -> Result<PipelineStatus> {
        let started = Instant::now();
        let mut errors = 0;

        loop {
            match self.fetch_run(handle.id) {
                Ok(run) => {
                    errors = 0;
                    if run.status.as_deref() == Some("completed") {
                        return Ok(match run.conclusion.as_deref() {
                            Some("success") => PipelineStatus::Succeeded,
                            Some(conclusion) => PipelineStatus::Failed {
                                cause: format!("run {} concluded {}", handle.id, conclusion),
                            },
                            None => PipelineStatus::Failed {
                                cause: format!("run {} completed without a conclusion", handle.id),
                            },
                        });
                    }
                    debug!(
                        module = %module.moniker,
                        run_id = handle.id,
                        status = run.status.as_deref().unwrap_or("unknown"),
                        "Run still in progress"
                    );
                }
                Err(e) => {
                    errors += 1;
                    warn!(module = %module.moniker, run_id = handle.id, "Status poll failed: {:#}", e);
                    if errors >= MAX_WATCH_ERRORS {
                        return Err(CascadeError::WatchFailed {
                            module: module.moniker.clone(),
                            cause: format!("{:#}", e),
                        });
                    }
                }
            }

            if let Some(limit) = self.watch_timeout {
                if started.elapsed() >= limit {
                    return Ok(PipelineStatus::Failed {
                        cause: format!(
                            "run {} did not complete within {}s",
                            handle.id,
                            limit.as_secs()
                        ),
                    });
                }
            }

            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn module() -> Module {
        Module::new("core", Vec::<String>::new())
    }

    fn client(server: &MockServer) -> GitHubActions {
        let config = GitHubConfig {
            api_url: server.base_url(),
            ..GitHubConfig::default()
        };
        GitHubActions::new("acme/platform", &config, Some("secret".to_string()))
            .unwrap()
            .with_retry(RetryPolicy::immediate(3))
            .with_poll_interval(Duration::ZERO)
    }

    #[test]
    fn token_from_env_skips_unset_and_blank() {
        std::env::set_var("CASCADE_TEST_TOKEN_BLANK", "  ");
        std::env::set_var("CASCADE_TEST_TOKEN_SET", "abc");
        let names = vec![
            "CASCADE_TEST_TOKEN_UNSET".to_string(),
            "CASCADE_TEST_TOKEN_BLANK".to_string(),
            "CASCADE_TEST_TOKEN_SET".to_string(),
        ];
        assert_eq!(token_from_env(&names), Some("abc".to_string()));
    }

    #[test]
    fn trigger_dispatches_and_resolves_newest_run() {
        let server = MockServer::start();
        let dispatch = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/platform/actions/workflows/core.yml/dispatches")
                .header("authorization", "Bearer secret")
                .json_body(json!({ "ref": "main" }));
            then.status(204);
        });
        let now = Utc::now();
        let runs = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/platform/actions/workflows/core.yml/runs")
                .query_param("event", "workflow_dispatch")
                .query_param("branch", "main");
            then.status(200).json_body(json!({
                "workflow_runs": [
                    { "id": 1, "created_at": (now - chrono::Duration::hours(1)).to_rfc3339() },
                    { "id": 7, "created_at": now.to_rfc3339(),
                      "html_url": "https://github.com/acme/platform/actions/runs/7" }
                ]
            }));
        });

        let handle = client(&server).trigger(&module(), "main").unwrap();

        dispatch.assert();
        runs.assert();
        assert_eq!(handle.id, 7);
        assert_eq!(
            handle.url.as_deref(),
            Some("https://github.com/acme/platform/actions/runs/7")
        );
    }

    #[test]
    fn trigger_gives_up_when_run_never_appears() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/platform/actions/workflows/core.yml/dispatches");
            then.status(204);
        });
        let runs = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/platform/actions/workflows/core.yml/runs");
            then.status(200).json_body(json!({ "workflow_runs": [] }));
        });

        let err = client(&server).trigger(&module(), "main").unwrap_err();

        runs.assert_calls(3);
        match err {
            CascadeError::TriggerFailed { module, cause } => {
                assert_eq!(module, "core");
                assert!(cause.contains("not visible after 3 lookups"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn modules_sharing_a_workflow_get_distinct_runs() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/platform/actions/workflows/ci.yml/dispatches");
            then.status(204);
        });
        let now = Utc::now();
        server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/platform/actions/workflows/ci.yml/runs");
            then.status(200).json_body(json!({
                "workflow_runs": [
                    { "id": 100, "created_at": now.to_rfc3339() },
                    { "id": 101, "created_at": now.to_rfc3339() }
                ]
            }));
        });
        for (id, conclusion) in [(100, "failure"), (101, "success")] {
            server.mock(|when, then| {
                when.method(GET)
                    .path(format!("/repos/acme/platform/actions/runs/{}", id));
                then.status(200).json_body(json!({
                    "id": id,
                    "created_at": now.to_rfc3339(),
                    "status": "completed",
                    "conclusion": conclusion
                }));
            });
        }
        let a = Module::new("a", Vec::<String>::new()).with_workflow("ci.yml");
        let b = Module::new("b", Vec::<String>::new()).with_workflow("ci.yml");
        let github = client(&server);

        let handle_a = github.trigger(&a, "main").unwrap();
        let handle_b = github.trigger(&b, "main").unwrap();

        assert_ne!(handle_a.id, handle_b.id);
        let statuses = [
            github.watch(&a, &handle_a).unwrap(),
            github.watch(&b, &handle_b).unwrap(),
        ];
        assert_eq!(
            statuses
                .iter()
                .filter(|s| matches!(s, PipelineStatus::Failed { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn claimed_run_is_not_resolved_twice() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/platform/actions/workflows/core.yml/dispatches");
            then.status(204);
        });
        let runs = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/platform/actions/workflows/core.yml/runs");
            then.status(200).json_body(json!({
                "workflow_runs": [{ "id": 7, "created_at": Utc::now().to_rfc3339() }]
            }));
        });
        let github = client(&server);

        assert_eq!(github.trigger(&module(), "main").unwrap().id, 7);
        let err = github.trigger(&module(), "main").unwrap_err();

        assert!(matches!(err, CascadeError::TriggerFailed { .. }));
        runs.assert_calls(4);
    }

    #[test]
    fn out_of_range_clock_skew_is_a_config_error() {
        let config = GitHubConfig {
            clock_skew_secs: i64::MAX,
            ..GitHubConfig::default()
        };

        let err = GitHubActions::new("acme/platform", &config, None).err().unwrap();
        assert!(matches!(err, CascadeError::ConfigValidationError { .. }));
    }

    #[test]
    fn rejected_dispatch_is_a_trigger_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/platform/actions/workflows/core.yml/dispatches");
            then.status(422).body("Workflow does not have 'workflow_dispatch' trigger");
        });

        let err = client(&server).trigger(&module(), "main").unwrap_err();
        assert!(matches!(err, CascadeError::TriggerFailed { .. }));
        assert!(err.to_string().contains("422"));
    }

    #[test]
    fn watch_reports_success() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/platform/actions/runs/7");
            then.status(200).json_body(json!({
                "id": 7,
                "created_at": Utc::now().to_rfc3339(),
                "status": "completed",
                "conclusion": "success"
            }));
        });

        let status = client(&server)
            .watch(&module(), &RunHandle::new(7))
            .unwrap();
        assert_eq!(status, PipelineStatus::Succeeded);
    }

    #[test]
    fn watch_reports_failed_conclusion() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/platform/actions/runs/7");
            then.status(200).json_body(json!({
                "id": 7,
                "created_at": Utc::now().to_rfc3339(),
                "status": "completed",
                "conclusion": "failure"
            }));
        });

        let status = client(&server)
            .watch(&module(), &RunHandle::new(7))
            .unwrap();
        assert_eq!(
            status,
            PipelineStatus::Failed {
                cause: "run 7 concluded failure".to_string()
            }
        );
    }

    #[test]
    fn watch_times_out_as_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/platform/actions/runs/7");
            then.status(200).json_body(json!({
                "id": 7,
                "created_at": Utc::now().to_rfc3339(),
                "status": "in_progress"
            }));
        });
        let config = GitHubConfig {
            api_url: server.base_url(),
            watch_timeout_secs: Some(0),
            ..GitHubConfig::default()
        };
        let github = GitHubActions::new("acme/platform", &config, None)
            .unwrap()
            .with_poll_interval(Duration::ZERO);

        let status = github.watch(&module(), &RunHandle::new(7)).unwrap();
        assert!(matches!(status, PipelineStatus::Failed { cause } if cause.contains("did not complete")));
    }

    #[test]
    fn watch_fails_after_repeated_poll_errors() {
        let server = MockServer::start();
        let run = server.mock(|when, then| {
            when.method(GET).path("/repos/acme/platform/actions/runs/7");
            then.status(502);
        });

        let err = client(&server)
            .watch(&module(), &RunHandle::new(7))
            .unwrap_err();

        run.assert_calls(MAX_WATCH_ERRORS as usize);
        assert!(matches!(err, CascadeError::WatchFailed { .. }));
    }
}
