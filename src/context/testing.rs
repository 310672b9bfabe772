//! Canned API server for unit tests
//!
//! The client talks to a `tower_test` mock service. `serve` answers the
//! requests in order and checks each path.

use super::{Context, Session};
use crate::config::{Backoff, Settings};
use http::{Request, Response};
use kube::client::Body;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::task::JoinHandle;

pub(crate) type ApiHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

/// Namespace the mocked context works in
pub(crate) const NAMESPACE: &str = "demo";

/// One expected request and the reply it gets
pub(crate) struct Reply {
    method: http::Method,
    path: String,
    status: u16,
    body: Vec<u8>,
}

impl Reply {
    pub(crate) fn json(path: &str, body: Value) -> Self {
        Self {
            method: http::Method::GET,
            path: path.to_string(),
            status: 200,
            body: body.to_string().into_bytes(),
        }
    }

    pub(crate) fn text(path: &str, body: &str) -> Self {
        Self {
            method: http::Method::GET,
            path: path.to_string(),
            status: 200,
            body: body.as_bytes().to_vec(),
        }
    }

    /// A `Status` error reply with the given HTTP code
    pub(crate) fn error(path: &str, code: u16) -> Self {
        let status = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": format!("HTTP {code}"),
            "reason": if code == 404 { "NotFound" } else { "Failure" },
            "code": code,
        });
        Self {
            status: code,
            ..Self::json(path, status)
        }
    }

    pub(crate) fn method(mut self, method: http::Method) -> Self {
        self.method = method;
        self
    }
}

/// A logged-in context on namespace `demo`, backed by a mock API server
///
/// Polls and retries are shortened to milliseconds.
pub(crate) fn mocked_context() -> (Context, ApiHandle) {
    let (service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    let settings = Settings::default()
        .poll_interval(Duration::from_millis(10))
        .backoff(Backoff::default().initial(Duration::from_millis(1)));

    let mut ctx = Context::new(settings).unwrap();
    let client = kube::Client::new(service, NAMESPACE);
    ctx.set_session(Session::new(client, "https://api.mock:6443", Some("dev".to_string())));
    ctx.set_namespace(NAMESPACE);
    (ctx, handle)
}

/// Answer requests in order
///
/// Await the returned handle at the end of a test so that a wrong path or
/// a missing request fails it.
pub(crate) fn serve(mut handle: ApiHandle, replies: Vec<Reply>) -> JoinHandle<()> {
    tokio::spawn(async move {
        for reply in replies {
            let (request, send) = handle
                .next_request()
                .await
                .expect("client stopped before all replies were sent");
            assert_eq!(request.method(), reply.method);
            assert_eq!(request.uri().path(), reply.path);

            let response = Response::builder()
                .status(reply.status)
                .header("content-type", "application/json")
                .body(Body::from(reply.body))
                .unwrap();
            send.send_response(response);
        }
    })
}

/// Path of a namespaced resource in the mocked namespace
pub(crate) fn path(prefix: &str, resource: &str, name: &str) -> String {
    format!("{prefix}/namespaces/{NAMESPACE}/{resource}/{name}")
}
