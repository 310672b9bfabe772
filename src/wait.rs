//! Waiting for builds and deployments to finish
//!
//! A build or deployment moves through a small set of phases. `poll_phase`
//! fetches the current phase until it is terminal or the timeout is
//! crossed, and reports one of three outcomes:
//!
//! - `WaitOutcome::Complete` when the resource reached its success phase
//! - `WaitOutcome::Failed` when it reached a failure phase
//! - `WaitOutcome::TimedOut` when it was still in progress at the deadline
//!
//! A phase string nobody knows about is a `WaitError`, not an outcome.
//!
//! # Example
//!
//! ```ignore
//! let outcome = ctx.is_build_complete("frontend-1", Duration::from_secs(600)).await?;
//! if !outcome.is_complete() {
//!     ctx.fail(format!("build frontend-1 did not complete: {outcome}"));
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Error raised when a resource reports a status nobody maps
#[derive(Debug, Clone)]
pub struct WaitError {
    /// Resource reference (e.g., "build/frontend-1")
    pub resource: String,
    /// The status value as reported by the cluster
    pub last_state: String,
    /// How long we had been waiting
    pub elapsed: Duration,
    /// The timeout that was configured
    pub timeout: Duration,
}

impl WaitError {
    /// Create a new WaitError
    pub fn new(resource: impl Into<String>, timeout: Duration, elapsed: Duration) -> Self {
        Self {
            resource: resource.into(),
            last_state: "unknown".to_string(),
            elapsed,
            timeout,
        }
    }

    /// Set the observed state
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.last_state = state.into();
        self
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Unrecognized status for {}", self.resource)?;
        writeln!(f, "├─ Status: {}", self.last_state)?;
        writeln!(f, "├─ Elapsed: {:?}", self.elapsed)?;
        write!(f, "└─ Timeout: {:?}", self.timeout)
    }
}

impl std::error::Error for WaitError {}

/// Where a resource stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    InProgress,
    Succeeded,
    Failed,
}

/// A lifecycle phase parsed from a status field
pub trait LifecyclePhase: FromStr + Copy + fmt::Debug {
    /// Phase assumed when the status field is absent
    const INITIAL: Self;

    fn progress(self) -> Progress;
}

/// Phase of an OpenShift build (`status.phase`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
}

impl FromStr for BuildPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "Pending" => Ok(Self::Pending),
            "Running" => Ok(Self::Running),
            "Complete" => Ok(Self::Complete),
            "Failed" => Ok(Self::Failed),
            "Error" => Ok(Self::Error),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(other.to_string()),
        }
    }
}

impl LifecyclePhase for BuildPhase {
    const INITIAL: Self = Self::New;

    fn progress(self) -> Progress {
        match self {
            Self::New | Self::Pending | Self::Running => Progress::InProgress,
            Self::Complete => Progress::Succeeded,
            Self::Failed | Self::Error | Self::Cancelled => Progress::Failed,
        }
    }
}

/// Phase of a deployment, as annotated on its replication controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentPhase {
    New,
    Pending,
    Running,
    Complete,
    Failed,
}

impl FromStr for DeploymentPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "Pending" => Ok(Self::Pending),
            "Running" => Ok(Self::Running),
            "Complete" => Ok(Self::Complete),
            "Failed" => Ok(Self::Failed),
            other => Err(other.to_string()),
        }
    }
}

impl LifecyclePhase for DeploymentPhase {
    const INITIAL: Self = Self::New;

    fn progress(self) -> Progress {
        match self {
            Self::New | Self::Pending | Self::Running => Progress::InProgress,
            Self::Complete => Progress::Succeeded,
            Self::Failed => Progress::Failed,
        }
    }
}

/// Result of waiting for a terminal phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Reached the success phase
    Complete,
    /// Reached a failure phase
    Failed { state: String },
    /// Still in progress when the timeout was crossed
    TimedOut { last_state: String, elapsed: Duration },
}

impl WaitOutcome {
    /// True only for `Complete`
    pub fn is_complete(&self) -> bool {
        matches!(self, WaitOutcome::Complete)
    }
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitOutcome::Complete => write!(f, "complete"),
            WaitOutcome::Failed { state } => write!(f, "ended in phase {state}"),
            WaitOutcome::TimedOut {
                last_state,
                elapsed,
            } => write!(f, "still {last_state} after {elapsed:?}"),
        }
    }
}

/// Poll a phase until it is terminal or `timeout` has elapsed
///
/// `fetch` returns the raw phase string, `None` when the resource has no
/// status yet. Errors from `fetch` abort the wait and propagate unchanged.
pub async fn poll_phase<P, F, Fut, E>(
    resource: &str,
    timeout: Duration,
    interval: Duration,
    mut fetch: F,
) -> Result<WaitOutcome, E>
where
    P: LifecyclePhase,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<String>, E>>,
    E: From<WaitError>,
{
    let start = Instant::now();

    debug!(resource = %resource, timeout = ?timeout, "Waiting for terminal phase");

    loop {
        let raw = fetch().await?;
        let phase = match raw.as_deref() {
            None => P::INITIAL,
            Some(value) => value.parse::<P>().map_err(|_| {
                WaitError::new(resource, timeout, start.elapsed()).with_state(value)
            })?,
        };

        match phase.progress() {
            Progress::Succeeded => {
                debug!(resource = %resource, elapsed = ?start.elapsed(), "Reached success phase");
                return Ok(WaitOutcome::Complete);
            }
            Progress::Failed => {
                return Ok(WaitOutcome::Failed {
                    state: format!("{phase:?}"),
                });
            }
            Progress::InProgress => {}
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(WaitOutcome::TimedOut {
                last_state: format!("{phase:?}"),
                elapsed,
            });
        }

        debug!(
            resource = %resource,
            phase = ?phase,
            elapsed = ?elapsed,
            "Still in progress, waiting..."
        );
        tokio::time::sleep(interval).await;
    }
}
