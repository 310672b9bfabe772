use super::Context;
use crate::config::Backoff;
use std::future::Future;
use tracing::{debug, warn};

/// Retry a single remote call with exponential backoff
///
/// Only errors for which `is_retryable` returns true are retried; any other
/// error returns at once. Delays start at `policy.initial` and double up to
/// `policy.max`. After `policy.max_attempts` the last error propagates.
///
/// # Example
///
/// ```ignore
/// let build = with_backoff(&settings.backoff, is_transient, || api.get("app-1")).await?;
/// ```
pub async fn with_backoff<T, E, F, Fut, P>(
    policy: &Backoff,
    is_retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial;
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Retry succeeded");
                }
                return Ok(value);
            }
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) if attempt >= max_attempts => {
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Retry exhausted all attempts"
                );
                return Err(e);
            }
            Err(e) => {
                debug!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    backoff = ?backoff,
                    error = %e,
                    "Retry attempt failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, policy.max);
                attempt += 1;
            }
        }
    }
}

/// Whether a kube error is worth another attempt
///
/// Server-side errors (5xx), throttling (429) and connection-level failures
/// are transient. Every other API error is final.
pub fn is_transient(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(response) => response.code >= 500 || response.code == 429,
        kube::Error::HyperError(_) | kube::Error::Service(_) => true,
        _ => false,
    }
}

impl Context {
    /// Run one cluster call under the configured backoff policy
    pub(crate) async fn retrying<T, F, Fut>(&self, op: F) -> Result<T, kube::Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, kube::Error>>,
    {
        with_backoff(&self.settings().backoff, is_transient, op).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("HTTP {code}"),
            reason: "Test".to_string(),
            code,
        })
    }

    #[test]
    fn test_is_transient() {
        assert!(is_transient(&api_error(500)));
        assert!(is_transient(&api_error(503)));
        assert!(is_transient(&api_error(429)));
        assert!(!is_transient(&api_error(404)));
        assert!(!is_transient(&api_error(403)));
        assert!(!is_transient(&api_error(409)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_backoff_recovers() {
        let mut calls = 0;
        let result: Result<&str, kube::Error> =
            with_backoff(&Backoff::default(), is_transient, || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Err(api_error(503))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_backoff_final_error_returns_at_once() {
        let mut calls = 0;
        let result: Result<(), kube::Error> =
            with_backoff(&Backoff::default(), is_transient, || {
                calls += 1;
                async { Err(api_error(404)) }
            })
            .await;

        assert!(matches!(result, Err(kube::Error::Api(ref r)) if r.code == 404));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_backoff_exhausts_attempts() {
        let policy = Backoff::default()
            .max_attempts(4)
            .initial(Duration::from_millis(100))
            .max(Duration::from_millis(250));
        let start = Instant::now();
        let mut calls = 0;

        let result: Result<(), kube::Error> = with_backoff(&policy, is_transient, || {
            calls += 1;
            async { Err(api_error(500)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 4);
        // 100ms + 200ms + 250ms (capped)
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(550));
        assert!(elapsed < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_backoff_with_custom_predicate() {
        let mut calls = 0;
        let result: Result<u32, String> = with_backoff(
            &Backoff::default(),
            |e: &String| e.contains("reset"),
            || {
                calls += 1;
                let n = calls;
                async move {
                    match n {
                        1 => Err("connection reset".to_string()),
                        _ => Ok(n),
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cluster_reads_retry_server_errors() {
        use crate::context::testing::{mocked_context, path, serve, Reply};
        use crate::context::Gvr;

        let (ctx, handle) = mocked_context();
        let url = path("/apis/build.openshift.io/v1", "builds", "frontend-1");
        let build = serde_json::json!({
            "apiVersion": "build.openshift.io/v1",
            "kind": "Build",
            "metadata": { "name": "frontend-1" },
        });
        let server = serve(
            handle,
            vec![
                Reply::error(&url, 503),
                Reply::error(&url, 429),
                Reply::json(&url, build),
            ],
        );

        let obj = ctx.get_dynamic(&Gvr::build(), "frontend-1").await.unwrap();
        assert_eq!(obj.metadata.name.as_deref(), Some("frontend-1"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_cluster_reads_do_not_retry_forbidden() {
        use crate::context::testing::{mocked_context, path, serve, Reply};
        use crate::context::Gvr;

        let (ctx, handle) = mocked_context();
        let url = path("/apis/build.openshift.io/v1", "builds", "frontend-1");
        let server = serve(handle, vec![Reply::error(&url, 403)]);

        let err = ctx.get_dynamic(&Gvr::build(), "frontend-1").await.unwrap_err();
        assert!(err.to_string().contains("permission denied"), "{err}");
        server.await.unwrap();
    }
}
