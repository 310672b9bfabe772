use super::types::Gvr;
use super::{improve_error_message, Context, ContextError};
use crate::wait::{poll_phase, DeploymentPhase, WaitOutcome};
use k8s_openapi::api::core::v1::ReplicationController;
use kube::api::{DynamicObject, PostParams};
use serde_json::json;
use std::time::Duration;
use tracing::info;

/// Annotation holding the rollout phase on a deployment's replication controller
pub const DEPLOYMENT_PHASE_ANNOTATION: &str = "openshift.io/deployment.phase";

/// Replica counts of a deployment config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replicas {
    /// `spec.replicas`
    pub desired: i64,
    /// `status.availableReplicas`
    pub available: i64,
}

impl Context {
    /// Rollout phase of the latest deployment of a deployment config
    ///
    /// `None` while the config has no latest version or its replication
    /// controller does not exist yet.
    pub async fn deployment_phase(&self, name: &str) -> Result<Option<String>, ContextError> {
        let dc = self.get_dynamic(&Gvr::deployment_config(), name).await?;
        let Some(rc_name) = latest_deployment_name(name, &dc.data) else {
            return Ok(None);
        };

        let rc = self.get_opt::<ReplicationController>(&rc_name).await?;
        Ok(rc.and_then(|rc| {
            rc.metadata
                .annotations
                .and_then(|mut annotations| annotations.remove(DEPLOYMENT_PHASE_ANNOTATION))
        }))
    }

    /// Poll a deployment config until its latest rollout is terminal
    pub async fn is_deployment_complete(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, ContextError> {
        let resource = format!("deploymentconfig/{name}");
        let outcome = poll_phase::<DeploymentPhase, _, _, ContextError>(
            &resource,
            timeout,
            self.settings().poll_interval,
            || self.deployment_phase(name),
        )
        .await?;

        info!(deployment_config = %name, outcome = %outcome, "Deployment wait finished");
        Ok(outcome)
    }

    /// Request a new rollout of a deployment config
    pub async fn trigger_deployment(&self, name: &str) -> Result<(), ContextError> {
        let api = self.dynamic_api(&Gvr::deployment_config())?;
        let request = json!({
            "kind": "DeploymentRequest",
            "apiVersion": "apps.openshift.io/v1",
            "name": name,
            "latest": true,
            "force": true,
        });
        let body = serde_json::to_vec(&request)
            .map_err(|e| ContextError::UpdateError(format!("deployment request: {e}")))?;

        let _: DynamicObject = api
            .create_subresource("instantiate", name, &PostParams::default(), body)
            .await
            .map_err(|e| {
                ContextError::UpdateError(improve_error_message(&e, "DeploymentConfig", name))
            })?;

        info!(deployment_config = %name, "Triggered deployment");
        Ok(())
    }

    /// Set `spec.replicas` of a deployment config
    pub async fn scale_deployment_config(
        &self,
        name: &str,
        replicas: i64,
    ) -> Result<(), ContextError> {
        self.patch_dynamic(
            &Gvr::deployment_config(),
            name,
            &json!({ "spec": { "replicas": replicas } }),
        )
        .await?;

        info!(deployment_config = %name, replicas = replicas, "Scaled deployment config");
        Ok(())
    }

    /// Desired and available replicas of a deployment config
    pub async fn deployment_config_replicas(&self, name: &str) -> Result<Replicas, ContextError> {
        let dc = self.get_dynamic(&Gvr::deployment_config(), name).await?;
        Ok(Replicas {
            desired: dc.data["spec"]["replicas"].as_i64().unwrap_or(0),
            available: dc.data["status"]["availableReplicas"]
                .as_i64()
                .unwrap_or(0),
        })
    }
}

/// `<dc>-<status.latestVersion>`, `None` before the first rollout
fn latest_deployment_name(name: &str, data: &serde_json::Value) -> Option<String> {
    data["status"]["latestVersion"]
        .as_i64()
        .filter(|version| *version > 0)
        .map(|version| format!("{name}-{version}"))
}
