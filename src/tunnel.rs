//! Local TCP tunnels to pod ports
//!
//! A `Tunnel` listens on `127.0.0.1` and hands every accepted connection to
//! an `Upstream`, which carries the bytes to the far side. `PodUpstream`
//! opens a Kubernetes port-forward to one pod port per connection.
//!
//! Forwarding errors never reach the caller of `open`; they are queued on a
//! bounded channel and handed back by `drain_errors` or `close`.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::Api;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Forwarding errors kept per tunnel before new ones are dropped
const ERROR_BUFFER: usize = 32;

/// Error type for tunnel operations
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("Failed to bind local port: {0}")]
    BindError(String),

    #[error("Failed to reach upstream: {0}")]
    UpstreamError(String),
}

/// The far side of a tunnel
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    /// Carry one accepted local connection until either side closes
    async fn forward(&self, local: TcpStream) -> Result<(), TunnelError>;

    /// Short description for logs, e.g. `pod/web-1:8080`
    fn describe(&self) -> String;
}

/// Port-forward to a pod through the Kubernetes API
pub struct PodUpstream {
    pods: Api<Pod>,
    pod_name: String,
    port: u16,
}

impl PodUpstream {
    pub fn new(pods: Api<Pod>, pod_name: impl Into<String>, port: u16) -> Self {
        Self {
            pods,
            pod_name: pod_name.into(),
            port,
        }
    }
}

#[async_trait]
impl Upstream for PodUpstream {
    async fn forward(&self, mut local: TcpStream) -> Result<(), TunnelError> {
        let mut pf = self
            .pods
            .portforward(&self.pod_name, &[self.port])
            .await
            .map_err(|e| {
                TunnelError::UpstreamError(format!("port-forward to {}: {e}", self.describe()))
            })?;

        let mut upstream = pf.take_stream(self.port).ok_or_else(|| {
            TunnelError::UpstreamError(format!("no stream for {}", self.describe()))
        })?;

        tokio::io::copy_bidirectional(&mut local, &mut upstream)
            .await
            .map_err(|e| TunnelError::UpstreamError(format!("{}: {e}", self.describe())))?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("pod/{}:{}", self.pod_name, self.port)
    }
}

/// An open tunnel
///
/// Dropping a tunnel without `close` also stops forwarding, since the stop
/// signal fires when its sender goes away.
pub struct Tunnel {
    name: String,
    target: String,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    errors: mpsc::Receiver<String>,
}

impl std::fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tunnel")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl Tunnel {
    /// Bind a local port (0 or `None` lets the OS choose) and start forwarding
    pub async fn open<U: Upstream>(
        name: &str,
        upstream: U,
        local_port: Option<u16>,
    ) -> Result<Self, TunnelError> {
        let listener = TcpListener::bind(("127.0.0.1", local_port.unwrap_or(0)))
            .await
            .map_err(|e| TunnelError::BindError(e.to_string()))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| TunnelError::BindError(e.to_string()))?;

        let target = upstream.describe();
        debug!(
            tunnel = %name,
            local_addr = %local_addr,
            target = %target,
            "Tunnel bound to local address"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (errors_tx, errors_rx) = mpsc::channel::<String>(ERROR_BUFFER);

        let task = tokio::spawn(forward_loop(
            name.to_string(),
            listener,
            Arc::new(upstream),
            shutdown_rx,
            errors_tx,
        ));

        Ok(Self {
            name: name.to_string(),
            target,
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task,
            errors: errors_rx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the tunnel forwards to
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Get the local address of the tunnel
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get a URL for the given path through the tunnel
    ///
    /// Paths are normalized to include a leading `/`.
    pub fn url(&self, path: &str) -> String {
        let normalized_path = if path.is_empty() {
            "/".to_string()
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        format!("http://{}{}", self.local_addr, normalized_path)
    }

    /// Take the forwarding errors queued so far
    pub fn drain_errors(&mut self) -> Vec<String> {
        let mut drained = Vec::new();
        while let Ok(err) = self.errors.try_recv() {
            drained.push(err);
        }
        drained
    }

    /// Stop forwarding and wait for the background task to finish
    ///
    /// Returns the forwarding errors that were never drained.
    pub async fn close(mut self) -> Vec<String> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let mut errors = Vec::new();
        if let Err(e) = (&mut self.task).await {
            errors.push(format!("forwarding task ended abnormally: {e}"));
        }

        let mut remaining = self.drain_errors();
        remaining.append(&mut errors);

        debug!(tunnel = %self.name, errors = remaining.len(), "Tunnel closed");
        remaining
    }
}

async fn forward_loop<U: Upstream>(
    name: String,
    listener: TcpListener,
    upstream: Arc<U>,
    mut shutdown_rx: oneshot::Receiver<()>,
    errors: mpsc::Sender<String>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((local_stream, peer)) => {
                        debug!(tunnel = %name, peer = %peer, "Accepted tunnel connection");
                        let upstream = upstream.clone();
                        let errors = errors.clone();
                        let name = name.clone();

                        connections.spawn(async move {
                            if let Err(e) = upstream.forward(local_stream).await {
                                warn!(tunnel = %name, error = %e, "Tunnel connection failed");
                                report(&errors, e.to_string());
                            }
                        });
                    }
                    Err(e) => {
                        warn!(tunnel = %name, error = %e, "Failed to accept connection");
                        report(&errors, format!("accept failed: {e}"));
                    }
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = &mut shutdown_rx => {
                debug!(tunnel = %name, "Tunnel shutdown requested");
                break;
            }
        }
    }

    connections.shutdown().await;
}

fn report(errors: &mpsc::Sender<String>, message: String) {
    if errors.try_send(message).is_err() {
        debug!("Tunnel error buffer full, dropping error");
    }
}
