use super::{improve_error_message, Context, ContextError};
use k8s_openapi::api::core::v1::Pod;
use kube::api::LogParams;
use tracing::debug;

impl Context {
    /// Get logs from a pod in the working namespace
    pub async fn logs(&self, pod_name: &str) -> Result<String, ContextError> {
        let (clients, namespace) = self.scope()?;
        let pods = clients.namespaced::<Pod>(&namespace);
        let params = LogParams::default();

        self.retrying(|| pods.logs(pod_name, &params))
            .await
            .map_err(|e| ContextError::LogsError(improve_error_message(&e, "Pod", pod_name)))
    }

    /// Get the log of a build
    ///
    /// Builds have no typed client, so the `log` sub-resource is fetched
    /// with a raw request.
    pub async fn build_logs(&self, build: &str) -> Result<String, ContextError> {
        let (clients, namespace) = self.scope()?;
        let path = format!("/apis/build.openshift.io/v1/namespaces/{namespace}/builds/{build}/log");

        let request = http::Request::get(&path)
            .body(Vec::new())
            .map_err(|e| ContextError::LogsError(format!("invalid log request: {e}")))?;

        debug!(build = %build, "Fetching build log");

        clients
            .client()
            .request_text(request)
            .await
            .map_err(|e| ContextError::LogsError(improve_error_message(&e, "Build", build)))
    }

    /// Pods matching a label selector that are in phase `Running`
    pub async fn running_pods(&self, selector: &str) -> Result<Vec<Pod>, ContextError> {
        let pods = self.list_labeled::<Pod>(selector).await?;
        Ok(pods.into_iter().filter(is_running).collect())
    }

    /// Phase of a pod, `Unknown` when the status is not set
    pub async fn pod_phase(&self, name: &str) -> Result<String, ContextError> {
        let pod = self.get::<Pod>(name).await?;
        Ok(pod
            .status
            .and_then(|s| s.phase)
            .unwrap_or_else(|| "Unknown".to_string()))
    }
}

pub(crate) fn is_running(pod: &Pod) -> bool {
    pod.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{mocked_context, path, serve, Reply};
    use k8s_openapi::api::core::v1::PodStatus;

    fn pod(phase: Option<&str>) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: phase.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_running() {
        assert!(is_running(&pod(Some("Running"))));
        assert!(!is_running(&pod(Some("Pending"))));
        assert!(!is_running(&pod(None)));
        assert!(!is_running(&Pod::default()));
    }

    #[tokio::test]
    async fn test_pod_logs_retry_server_errors() {
        let (ctx, handle) = mocked_context();
        let url = path("/api/v1", "pods", "db-1") + "/log";
        let server = serve(
            handle,
            vec![Reply::error(&url, 500), Reply::text(&url, "database system is ready\n")],
        );

        let logs = ctx.logs("db-1").await.unwrap();
        assert!(logs.contains("ready"));
        server.await.unwrap();
    }
}
