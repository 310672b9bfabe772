use super::types::Gvr;
use super::{Context, ContextError};
use tracing::debug;

/// Status code and body of an HTTP check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl Context {
    /// GET a URL with the context's HTTP client
    pub async fn http_get(&self, url: &str) -> Result<HttpResponse, ContextError> {
        let response = self
            .http()
            .get(url)
            .send()
            .await
            .map_err(|e| ContextError::HttpError(format!("GET {url}: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ContextError::HttpError(format!("GET {url}: reading body: {e}")))?;

        debug!(url = %url, status = status, bytes = body.len(), "HTTP check");
        Ok(HttpResponse { status, body })
    }

    /// External URL of `path` on a route
    pub async fn route_url(&self, route: &str, path: &str) -> Result<String, ContextError> {
        let route_obj = self.get_dynamic(&Gvr::route(), route).await?;
        route_url(route, &route_obj.data, path)
    }
}

/// `http(s)://<spec.host><path>`, https when the route terminates TLS
fn route_url(name: &str, data: &serde_json::Value, path: &str) -> Result<String, ContextError> {
    let host = data["spec"]["host"]
        .as_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ContextError::GetError(format!("Route '{name}' has no host")))?;

    let scheme = if data["spec"]["tls"].is_object() {
        "https"
    } else {
        "http"
    };

    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    Ok(format!("{scheme}://{host}{path}"))
}
