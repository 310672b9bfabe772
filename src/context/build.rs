use super::types::Gvr;
use super::{improve_error_message, Context, ContextError};
use crate::wait::{poll_phase, BuildPhase, WaitOutcome};
use kube::api::{DynamicObject, PostParams};
use kube::ResourceExt;
use serde_json::json;
use std::time::Duration;
use tracing::info;

/// Label OpenShift puts on every build started from a build config
const BUILD_CONFIG_LABEL: &str = "openshift.io/build-config.name";

impl Context {
    /// Current `status.phase` of a build, `None` before it is set
    pub async fn build_phase(&self, name: &str) -> Result<Option<String>, ContextError> {
        let build = self.get_dynamic(&Gvr::build(), name).await?;
        Ok(build.data["status"]["phase"].as_str().map(str::to_string))
    }

    /// Poll a build until it reaches a terminal phase or `timeout` passes
    ///
    /// A failed, errored or cancelled build is `WaitOutcome::Failed`, not an
    /// error. Errors mean the build could not be read, or reported a phase
    /// this harness does not know.
    pub async fn is_build_complete(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, ContextError> {
        let resource = format!("build/{name}");
        let outcome = poll_phase::<BuildPhase, _, _, ContextError>(
            &resource,
            timeout,
            self.settings().poll_interval,
            || self.build_phase(name),
        )
        .await?;

        info!(build = %name, outcome = %outcome, "Build wait finished");
        Ok(outcome)
    }

    /// Start a new build of a build config, returning the build name
    pub async fn start_build(&mut self, build_config: &str) -> Result<String, ContextError> {
        let api = self.dynamic_api(&Gvr::build_config())?;
        let request = json!({
            "kind": "BuildRequest",
            "apiVersion": "build.openshift.io/v1",
            "metadata": { "name": build_config },
        });
        let body = serde_json::to_vec(&request)
            .map_err(|e| ContextError::CreateError(format!("build request: {e}")))?;

        let build: DynamicObject = api
            .create_subresource("instantiate", build_config, &PostParams::default(), body)
            .await
            .map_err(|e| {
                ContextError::CreateError(improve_error_message(&e, "BuildConfig", build_config))
            })?;

        let name = build.name_any();
        info!(build_config = %build_config, build = %name, "Started build");

        self.set_last_build(name.clone());
        Ok(name)
    }

    /// Builds started from a build config
    pub async fn builds_of(&self, build_config: &str) -> Result<Vec<DynamicObject>, ContextError> {
        let selector = format!("{BUILD_CONFIG_LABEL}={build_config}");
        self.list_dynamic(&Gvr::build(), Some(&selector)).await
    }

    /// Name of the most recent build of a build config
    pub async fn latest_build_of(&self, build_config: &str) -> Result<String, ContextError> {
        let bc = self.get_dynamic(&Gvr::build_config(), build_config).await?;
        latest_build_name(build_config, &bc.data).ok_or_else(|| {
            ContextError::GetError(format!(
                "BuildConfig '{build_config}' has not started any build"
            ))
        })
    }
}

/// `<bc>-<status.lastVersion>`, `None` while no build was started
fn latest_build_name(build_config: &str, data: &serde_json::Value) -> Option<String> {
    data["status"]["lastVersion"]
        .as_i64()
        .filter(|version| *version > 0)
        .map(|version| format!("{build_config}-{version}"))
}
