//! Token requests against the OpenShift OAuth server
//!
//! OpenShift does not take a password on the API itself. A user/password
//! pair is exchanged for a bearer token through the
//! `openshift-challenging-client`, the same flow `oc login` uses.

use reqwest::header::LOCATION;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const METADATA_PATH: &str = "/.well-known/oauth-authorization-server";
const CHALLENGING_CLIENT: &str = "openshift-challenging-client";

/// Errors from the OAuth exchange
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("server at {0} does not expose OAuth metadata")]
    NotSupported(String),

    #[error("OAuth request failed: {0}")]
    RequestError(String),

    #[error("OAuth server rejected the credentials (HTTP {0})")]
    Rejected(u16),

    #[error("OAuth response carried no access token: {0}")]
    NoToken(String),
}

#[derive(Debug, Deserialize)]
struct Metadata {
    authorization_endpoint: String,
}

/// Exchange user and password for a bearer token
///
/// Returns `OAuthError::NotSupported` when the server has no OAuth metadata,
/// which is the case on plain Kubernetes clusters.
pub async fn request_token(
    host: &str,
    user: &str,
    password: &str,
    insecure: bool,
    timeout: Duration,
) -> Result<String, OAuthError> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(insecure)
        .timeout(timeout)
        .build()
        .map_err(|e| OAuthError::RequestError(e.to_string()))?;

    let metadata_url = format!("{}{}", host.trim_end_matches('/'), METADATA_PATH);
    let response = client
        .get(&metadata_url)
        .send()
        .await
        .map_err(|e| OAuthError::RequestError(e.to_string()))?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(OAuthError::NotSupported(host.to_string()));
    }

    let metadata: Metadata = response
        .error_for_status()
        .map_err(|e| OAuthError::RequestError(e.to_string()))?
        .json()
        .await
        .map_err(|e| OAuthError::RequestError(format!("invalid OAuth metadata: {e}")))?;

    debug!(
        endpoint = %metadata.authorization_endpoint,
        user = %user,
        "Requesting OAuth token"
    );

    let response = client
        .get(&metadata.authorization_endpoint)
        .query(&[("response_type", "token"), ("client_id", CHALLENGING_CLIENT)])
        .basic_auth(user, Some(password))
        .header("X-CSRF-Token", "1")
        .send()
        .await
        .map_err(|e| OAuthError::RequestError(e.to_string()))?;

    let status = response.status();
    if !status.is_redirection() {
        return Err(OAuthError::Rejected(status.as_u16()));
    }

    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| OAuthError::NoToken("redirect without Location header".to_string()))?;

    token_from_location(location)
}

/// Pull `access_token` out of the fragment of a redirect location
pub fn token_from_location(location: &str) -> Result<String, OAuthError> {
    let parsed =
        url::Url::parse(location).map_err(|e| OAuthError::NoToken(format!("{location}: {e}")))?;

    let fragment = parsed
        .fragment()
        .ok_or_else(|| OAuthError::NoToken("redirect location has no fragment".to_string()))?;

    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| OAuthError::NoToken("fragment has no access_token".to_string()))
}
