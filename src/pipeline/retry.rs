//! Bounded lookup of a freshly dispatched run.
//!
//! A CI system usually accepts a dispatch before the new run is listed. The
//! lookup is retried with exponential backoff up to a hard attempt ceiling:
//!
//! ```text
//! Requested{0} --lookup--> Visible(handle)
//!      |                        ^
//!      +--miss--> Requested{n} -+--miss at ceiling--> TimedOut{n}
//! ```

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::config::RetryConfig;
use crate::error::Result;

use super::RunHandle;

/// Backoff schedule and ceiling for handle lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total lookups before giving up.
    pub max_attempts: u32,
    /// Delay after the first miss.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor applied after each miss.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Retry without sleeping between lookups.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay to wait after the `attempt`-th miss (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

/// Where a handle lookup stands.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleResolution {
    /// The run has been requested; `attempt` lookups have missed so far.
    Requested { attempt: u32 },
    /// The run was found.
    Visible(RunHandle),
    /// The attempt ceiling was reached without finding the run.
    TimedOut { attempts: u32 },
}

impl HandleResolution {
    /// State right after the dispatch is accepted.
    pub fn start() -> Self {
        Self::Requested { attempt: 0 }
    }

    /// Fold the outcome of one lookup into the state.
    pub fn advance(self, found: Option<RunHandle>, policy: &RetryPolicy) -> Self {
        match self {
            Self::Requested { attempt } => {
                let attempt = attempt + 1;
                match found {
                    Some(handle) => Self::Visible(handle),
                    None if attempt >= policy.max_attempts => Self::TimedOut { attempts: attempt },
                    None => Self::Requested { attempt },
                }
            }
            done => done,
        }
    }

    /// Whether no further lookups will happen.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Requested { .. })
    }
}

/// Run `lookup` until it finds a handle or the policy's ceiling is reached.
///
/// `lookup` receives the 1-based attempt number. Errors from `lookup` end the
/// resolution immediately.
pub fn resolve_handle<F>(policy: &RetryPolicy, mut lookup: F) -> Result<HandleResolution>
where
    F: FnMut(u32) -> Result<Option<RunHandle>>,
{
    let mut state = HandleResolution::start();

    while let HandleResolution::Requested { attempt } = state {
        if attempt > 0 {
            let delay = policy.delay_after(attempt);
            debug!(attempt, ?delay, "Run not visible yet, retrying");
            thread::sleep(delay);
        }
        let found = lookup(attempt + 1)?;
        state = state.advance(found, policy);
    }

    Ok(state)
}
