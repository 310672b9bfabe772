//! Retry a check until it holds
//!
//! Used by steps phrased "... within N seconds". The probe returns
//! `Ok(())` once the condition holds, or `Err(reason)` describing what it
//! saw instead; the last reason ends up in the failure message.
//!
//! # Example
//!
//! ```ignore
//! use gherkube::eventually::eventually;
//!
//! eventually(|| async {
//!     let running = ctx.running_pods("app=web").await.map_err(|e| e.to_string())?.len();
//!     if running == 2 { Ok(()) } else { Err(format!("{running} running")) }
//! })
//! .timeout(Duration::from_secs(120))
//! .await_condition()
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Error returned when the condition never held
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("condition not met after {attempts} attempts over {elapsed:?}: {last_reason}")]
    NotMet {
        attempts: u32,
        elapsed: Duration,
        last_reason: String,
    },
}

/// Builder for eventually checks
pub struct Eventually<F, Fut>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    probe: F,
    timeout: Duration,
    interval: Duration,
}

/// Create a check that retries `probe` until it returns `Ok`
///
/// Default timeout: 60 seconds. Default interval: 2 seconds.
pub fn eventually<F, Fut>(probe: F) -> Eventually<F, Fut>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    Eventually {
        probe,
        timeout: Duration::from_secs(60),
        interval: Duration::from_secs(2),
    }
}

impl<F, Fut> Eventually<F, Fut>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    /// Set the timeout duration
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the probe until it succeeds or the timeout is crossed
    pub async fn await_condition(mut self) -> Result<(), ConditionError> {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let last_reason = match (self.probe)().await {
                Ok(()) => return Ok(()),
                Err(reason) => reason,
            };

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(ConditionError::NotMet {
                    attempts,
                    elapsed,
                    last_reason,
                });
            }

            sleep(self.interval).await;
        }
    }
}
