//! Shared state for one test run
//!
//! A `Context` is handed to every step. It holds the authenticated session
//! (set by a login step), the working namespace (set by a project step),
//! the open tunnels, and the failures recorded by the step being run.
//!
//! # Errors
//!
//! All fallible methods in this module return `ContextError`:
//! - not logged in / no namespace selected
//! - resource CRUD errors, already rewritten into readable messages
//! - unrecognized resource status while waiting
//! - tunnel and HTTP check errors

mod build;
mod crud;
mod deployment;
mod dynamic;
mod forwarding;
mod logs;
pub(crate) mod parsing;
mod project;
mod rbac;
pub(crate) mod retry;
mod secrets;
mod session;
mod template;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
mod web;

pub use deployment::{Replicas, DEPLOYMENT_PHASE_ANNOTATION};
pub use parsing::{parse_resource_ref, split_api_version};
pub use retry::{is_transient, with_backoff};
pub use session::{Clients, Session};
pub use template::SHARED_TEMPLATE_NAMESPACE;
pub use types::{Gvr, ResourceRef};
pub use web::HttpResponse;

use crate::config::Settings;
use crate::tunnel::Tunnel;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Shared, sequentially used state of a test run
pub struct Context {
    settings: Settings,
    session: Option<Session>,
    namespace: Option<String>,
    tunnels: HashMap<String, Tunnel>,
    failures: Vec<String>,
    last_build: Option<String>,
    base_dir: Option<PathBuf>,
    http: reqwest::Client,
}

/// Errors from Context operations
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Not logged in: run a login step first")]
    NotLoggedIn,

    #[error("No namespace defined: select a project first")]
    NoNamespace,

    #[error("Login failed: {0}")]
    LoginError(String),

    #[error("Failed to create Kubernetes client: {0}")]
    ClientError(String),

    #[error("Failed to get resource: {0}")]
    GetError(String),

    #[error("Failed to list resources: {0}")]
    ListError(String),

    #[error("Failed to create resource: {0}")]
    CreateError(String),

    #[error("Failed to update resource: {0}")]
    UpdateError(String),

    #[error("Failed to delete resource: {0}")]
    DeleteError(String),

    #[error("Failed to get logs: {0}")]
    LogsError(String),

    #[error("{0}")]
    Wait(#[from] crate::wait::WaitError),

    #[error("Invalid resource reference: {0}")]
    InvalidResourceRef(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("A tunnel named '{0}' is already open")]
    TunnelExists(String),

    #[error("No tunnel named '{0}'")]
    NoSuchTunnel(String),

    #[error(transparent)]
    Tunnel(#[from] crate::tunnel::TunnelError),

    #[error("HTTP check failed: {0}")]
    HttpError(String),
}

/// Improve a kube error message with human-readable context
///
/// Parses common Kubernetes error patterns and returns a more
/// understandable message. Includes resource name/kind context.
pub(crate) fn improve_error_message(
    err: &kube::Error,
    resource_kind: &str,
    resource_name: &str,
) -> String {
    if let kube::Error::Api(response) = err {
        match response.code {
            404 => return format!("{resource_kind} '{resource_name}' not found"),
            409 => return format!("{resource_kind} '{resource_name}' already exists"),
            401 => return format!("{resource_kind} '{resource_name}': unauthorized (log in again)"),
            403 => {
                return format!("{resource_kind} '{resource_name}': permission denied (check RBAC)")
            }
            _ => {}
        }
    }

    let raw = err.to_string();

    if raw.contains("connection refused") || raw.contains("ECONNREFUSED") {
        return format!("{resource_kind} '{resource_name}': cannot connect to the cluster API");
    }

    if raw.contains("timeout") || raw.contains("deadline exceeded") {
        return format!("{resource_kind} '{resource_name}': operation timed out");
    }

    format!("{resource_kind} '{resource_name}': {raw}")
}

/// True when the error is an API 404
pub(crate) fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("logged_in", &self.session.is_some())
            .field("namespace", &self.namespace)
            .field("tunnels", &self.tunnels.keys().collect::<Vec<_>>())
            .field("failures", &self.failures.len())
            .finish()
    }
}

impl Context {
    /// Create a context with no session and no namespace
    pub fn new(settings: Settings) -> Result<Self, ContextError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.insecure_skip_tls_verify)
            .timeout(settings.http_timeout)
            .build()
            .map_err(|e| ContextError::ClientError(e.to_string()))?;

        Ok(Self {
            settings,
            session: None,
            namespace: None,
            tunnels: HashMap::new(),
            failures: Vec::new(),
            last_build: None,
            base_dir: None,
            http,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The authenticated session, the "client factory" of every step
    pub fn factory(&self) -> Result<&Session, ContextError> {
        self.session.as_ref().ok_or(ContextError::NotLoggedIn)
    }

    pub fn session(&self) -> Result<&Session, ContextError> {
        self.factory()
    }

    /// Install a session, replacing any previous one
    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Forget the session
    pub fn logout(&mut self) {
        self.session = None;
    }

    /// Typed and dynamic API handles of the current session
    pub fn clients(&self) -> Result<Clients, ContextError> {
        Ok(self.factory()?.clients())
    }

    /// The working namespace
    pub fn namespace(&self) -> Result<&str, ContextError> {
        self.namespace.as_deref().ok_or(ContextError::NoNamespace)
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = Some(namespace.into());
    }

    /// Clients and namespace together, for namespaced calls
    pub(crate) fn scope(&self) -> Result<(Clients, String), ContextError> {
        let clients = self.clients()?;
        let namespace = self.namespace()?.to_string();
        Ok((clients, namespace))
    }

    /// Name of the build started last by a step
    pub fn last_build(&self) -> Option<&str> {
        self.last_build.as_deref()
    }

    pub(crate) fn set_last_build(&mut self, name: impl Into<String>) {
        self.last_build = Some(name.into());
    }

    /// Directory that relative file paths in steps are resolved against
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = Some(dir.into());
    }

    /// Resolve a path from a step against the base directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Record a failure for the current step without stopping it
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(failure = %message, "Step check failed");
        self.failures.push(message);
    }

    /// Record `message` as a failure unless `condition` holds
    pub fn check(&mut self, condition: bool, message: impl Into<String>) -> bool {
        if !condition {
            self.fail(message);
        }
        condition
    }

    /// Record a failure unless `actual == expected`
    pub fn check_eq<T>(&mut self, what: &str, expected: T, actual: T) -> bool
    where
        T: PartialEq + fmt::Debug,
    {
        if expected == actual {
            return true;
        }
        self.fail(format!("{what}: expected {expected:?}, got {actual:?}"));
        false
    }

    /// Failures recorded since the last `take_failures`
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Hand over and clear the recorded failures
    pub fn take_failures(&mut self) -> Vec<String> {
        std::mem::take(&mut self.failures)
    }

    /// Drop state that belongs to a single scenario
    ///
    /// The session, namespace and tunnels carry over.
    pub fn begin_scenario(&mut self) {
        self.failures.clear();
        self.last_build = None;
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context::new(Settings::default()).unwrap()
    }

    #[test]
    fn test_new_context_is_empty() {
        let ctx = context();
        assert!(matches!(ctx.factory(), Err(ContextError::NotLoggedIn)));
        assert!(matches!(ctx.namespace(), Err(ContextError::NoNamespace)));
        assert!(matches!(ctx.clients(), Err(ContextError::NotLoggedIn)));
        assert!(ctx.tunnel_names().is_empty());
        assert!(ctx.failures().is_empty());
        assert_eq!(ctx.last_build(), None);
    }

    #[test]
    fn test_accessors_are_idempotent() {
        let mut ctx = context();
        for _ in 0..3 {
            assert!(matches!(ctx.namespace(), Err(ContextError::NoNamespace)));
            assert!(matches!(ctx.factory(), Err(ContextError::NotLoggedIn)));
        }

        ctx.set_namespace("demo");
        for _ in 0..3 {
            assert_eq!(ctx.namespace().unwrap(), "demo");
        }
    }

    #[test]
    fn test_begin_scenario_keeps_namespace() {
        let mut ctx = context();
        ctx.set_namespace("demo");
        ctx.set_last_build("frontend-1");
        ctx.fail("leftover");

        ctx.begin_scenario();

        assert!(ctx.failures().is_empty());
        assert_eq!(ctx.last_build(), None);
        assert_eq!(ctx.namespace().unwrap(), "demo");
        assert!(matches!(ctx.session(), Err(ContextError::NotLoggedIn)));
    }

    #[test]
    fn test_scope_needs_login_before_namespace() {
        let mut ctx = context();
        ctx.set_namespace("demo");
        assert!(matches!(ctx.scope(), Err(ContextError::NotLoggedIn)));
    }

    #[test]
    fn test_fail_does_not_short_circuit() {
        let mut ctx = context();
        ctx.fail("first");
        assert!(!ctx.check(false, "second"));
        assert!(ctx.check(true, "never recorded"));
        assert!(!ctx.check_eq("replicas", 3, 1));
        assert!(ctx.check_eq("host", "a", "a"));

        let failures = ctx.take_failures();
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0], "first");
        assert_eq!(failures[1], "second");
        assert_eq!(failures[2], "replicas: expected 3, got 1");
        assert!(ctx.failures().is_empty());
    }

    #[test]
    fn test_resolve_path() {
        let mut ctx = context();
        assert_eq!(ctx.resolve_path("app.yaml"), PathBuf::from("app.yaml"));

        ctx.set_base_dir("/features/build");
        assert_eq!(
            ctx.resolve_path("app.yaml"),
            PathBuf::from("/features/build/app.yaml")
        );
        assert_eq!(ctx.resolve_path("/tmp/app.yaml"), PathBuf::from("/tmp/app.yaml"));
    }

    #[test]
    fn test_error_messages() {
        assert!(ContextError::NotLoggedIn.to_string().contains("Not logged in"));
        assert!(ContextError::NoNamespace
            .to_string()
            .contains("No namespace defined"));
        assert!(ContextError::TunnelExists("t1".to_string())
            .to_string()
            .contains("t1"));
    }

    #[test]
    fn test_improve_error_message() {
        let not_found = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "builds.build.openshift.io \"app-1\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        assert_eq!(
            improve_error_message(&not_found, "Build", "app-1"),
            "Build 'app-1' not found"
        );
        assert!(is_not_found(&not_found));

        let forbidden = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        });
        assert!(improve_error_message(&forbidden, "Route", "web").contains("permission denied"));
        assert!(!is_not_found(&forbidden));
    }
}
