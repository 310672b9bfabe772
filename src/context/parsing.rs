use super::types::{Gvr, ResourceRef};
use super::ContextError;
use std::time::Duration;

/// Resolve a kind or kubectl-style alias to its resource type
fn resolve_kind(kind: &str) -> Option<Gvr> {
    let gvr = match kind.to_lowercase().as_str() {
        "pod" | "pods" | "po" => Gvr::core("pods", "Pod"),
        "service" | "services" | "svc" => Gvr::core("services", "Service"),
        "secret" | "secrets" => Gvr::core("secrets", "Secret"),
        "endpoints" | "ep" => Gvr::core("endpoints", "Endpoints"),
        "serviceaccount" | "serviceaccounts" | "sa" => {
            Gvr::core("serviceaccounts", "ServiceAccount")
        }
        "resourcequota" | "resourcequotas" | "quota" => {
            Gvr::core("resourcequotas", "ResourceQuota")
        }
        "replicationcontroller" | "replicationcontrollers" | "rc" => {
            Gvr::core("replicationcontrollers", "ReplicationController")
        }
        "configmap" | "configmaps" | "cm" => Gvr::core("configmaps", "ConfigMap"),
        "rolebinding" | "rolebindings" => Gvr::new(
            "rbac.authorization.k8s.io",
            "v1",
            "rolebindings",
            "RoleBinding",
        ),
        "build" | "builds" => Gvr::build(),
        "buildconfig" | "buildconfigs" | "bc" => Gvr::build_config(),
        "deploymentconfig" | "deploymentconfigs" | "dc" => Gvr::deployment_config(),
        "route" | "routes" => Gvr::route(),
        "imagestream" | "imagestreams" | "is" => Gvr::image_stream(),
        "template" | "templates" => Gvr::template(),
        "project" | "projects" => Gvr::project(),
        "user" | "users" => Gvr::user(),
        _ => return None,
    };
    Some(gvr)
}

/// Parse a resource reference like "dc/frontend" into a `ResourceRef`
///
/// Supports full kind names, plurals and kubectl-style aliases
/// (`bc`, `dc`, `is`, `svc`, `ep`, `sa`, `quota`, `rc`, `cm`, `po`).
///
/// # Errors
///
/// Returns `ContextError::InvalidResourceRef` if the reference format is invalid
/// or the kind is unknown.
pub fn parse_resource_ref(reference: &str) -> Result<ResourceRef, ContextError> {
    let (kind, name) = reference.split_once('/').ok_or_else(|| {
        ContextError::InvalidResourceRef(format!("expected 'kind/name', got '{reference}'"))
    })?;

    if name.is_empty() || name.contains('/') {
        return Err(ContextError::InvalidResourceRef(format!(
            "invalid resource name in '{reference}'"
        )));
    }

    let gvr = resolve_kind(kind).ok_or_else(|| {
        ContextError::InvalidResourceRef(format!("unknown resource kind '{kind}' in '{reference}'"))
    })?;

    Ok(ResourceRef {
        gvr,
        name: name.to_string(),
    })
}

/// Split an `apiVersion` into group and version
///
/// - `"v1"` → `("", "v1")`
/// - `"route.openshift.io/v1"` → `("route.openshift.io", "v1")`
#[must_use]
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Turn a step's amount and unit ("30", "seconds") into a duration
pub(crate) fn parse_duration(amount: u64, unit: &str) -> Result<Duration, String> {
    let factor: u64 = match unit.trim_end_matches('s') {
        "second" | "sec" => 1,
        "minute" | "min" => 60,
        "hour" => 3600,
        other => return Err(format!("unknown time unit '{other}'")),
    };
    amount
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("{amount} {unit} is too long"))
}
