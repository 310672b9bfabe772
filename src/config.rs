//! Configuration types for gherkube
//!
//! `Settings` tunes polling, tunnels and HTTP checks. `LoginConfig` carries
//! the cluster address and credentials, usually read from the
//! `OPENSHIFT_*` environment variables.
//!
//! # Example
//!
//! ```
//! use gherkube::config::{Backoff, Settings};
//! use std::time::Duration;
//!
//! let settings = Settings::default()
//!     .poll_interval(Duration::from_secs(2))
//!     .backoff(Backoff::default().max_attempts(3));
//! assert_eq!(settings.backoff.max_attempts, 3);
//! ```

use secrecy::SecretString;
use std::time::Duration;

pub const ENV_HOST: &str = "OPENSHIFT_HOST";
pub const ENV_USER: &str = "OPENSHIFT_USER";
pub const ENV_PASSWD: &str = "OPENSHIFT_PASSWD";
pub const ENV_TOKEN: &str = "OPENSHIFT_TOKEN";
pub const ENV_INSECURE: &str = "OPENSHIFT_INSECURE_SKIP_TLS_VERIFY";
pub const ENV_POLL_INTERVAL: &str = "GHERKUBE_POLL_INTERVAL_SECS";

/// Errors from reading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("either {token} or {user}/{passwd} must be set", token = ENV_TOKEN, user = ENV_USER, passwd = ENV_PASSWD)]
    MissingCredentials,

    #[error("invalid value '{value}' for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Exponential backoff policy for single remote calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts, including the first one
    pub max_attempts: usize,
    /// Delay after the first failed attempt
    pub initial: Duration,
    /// Upper bound for a single delay
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial: Duration::from_millis(100),
            max: Duration::from_secs(5),
        }
    }
}

impl Backoff {
    /// Set the number of attempts (at least 1)
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the first delay
    pub fn initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    /// Set the delay cap
    pub fn max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }
}

/// Runtime settings shared by every step
#[derive(Debug, Clone)]
pub struct Settings {
    /// Interval between two polls of a build or deployment
    pub poll_interval: Duration,

    /// Pause after a tunnel is started, before the step continues
    pub tunnel_settle: Duration,

    /// Timeout of HTTP checks and OAuth requests
    pub http_timeout: Duration,

    /// Retry policy for reads against the cluster
    pub backoff: Backoff,

    /// Accept self-signed API and route certificates
    pub insecure_skip_tls_verify: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            tunnel_settle: Duration::from_secs(1),
            http_timeout: Duration::from_secs(10),
            backoff: Backoff::default(),
            insecure_skip_tls_verify: false,
        }
    }
}

impl Settings {
    /// Read overrides from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(value) = lookup(ENV_INSECURE) {
            settings.insecure_skip_tls_verify = parse_bool(ENV_INSECURE, &value)?;
        }

        if let Some(value) = lookup(ENV_POLL_INTERVAL) {
            let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_POLL_INTERVAL,
                value: value.clone(),
            })?;
            settings.poll_interval = Duration::from_secs(secs);
        }

        Ok(settings)
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the tunnel settle delay
    pub fn tunnel_settle(mut self, settle: Duration) -> Self {
        self.tunnel_settle = settle;
        self
    }

    /// Set the HTTP timeout
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the backoff policy
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Skip TLS verification
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure_skip_tls_verify = insecure;
        self
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}

/// How to authenticate against the cluster
///
/// Secrets are wrapped so that `Debug` output never shows them.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Bearer token
    Token(SecretString),
    /// User and password, exchanged for a token when the server supports it
    Basic { user: String, password: SecretString },
}

/// Cluster address and credentials
#[derive(Debug, Clone)]
pub struct LoginConfig {
    /// API server URL, e.g. `https://api.cluster:6443`
    pub host: String,
    pub credentials: Credentials,
}

impl LoginConfig {
    /// Log in with a bearer token
    pub fn token(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            credentials: Credentials::Token(SecretString::from(token.into())),
        }
    }

    /// Log in with user and password
    pub fn basic(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            credentials: Credentials::Basic {
                user: user.into(),
                password: SecretString::from(password.into()),
            },
        }
    }

    /// Read `OPENSHIFT_HOST` and either `OPENSHIFT_TOKEN` or
    /// `OPENSHIFT_USER`/`OPENSHIFT_PASSWD`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with a custom lookup
    ///
    /// A non-empty token takes precedence over user and password.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let host = non_empty(ENV_HOST).ok_or(ConfigError::MissingVar(ENV_HOST))?;

        if let Some(token) = non_empty(ENV_TOKEN) {
            return Ok(Self::token(host, token));
        }

        match (non_empty(ENV_USER), lookup(ENV_PASSWD)) {
            (Some(user), Some(password)) => Ok(Self::basic(host, user, password)),
            _ => Err(ConfigError::MissingCredentials),
        }
    }

    /// User name, when known up front
    pub fn user(&self) -> Option<&str> {
        match &self.credentials {
            Credentials::Basic { user, .. } => Some(user),
            Credentials::Token(_) => None,
        }
    }
}
