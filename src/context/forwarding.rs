use super::{Context, ContextError};
use crate::tunnel::{PodUpstream, Tunnel, Upstream};
use k8s_openapi::api::core::v1::Pod;
use std::net::SocketAddr;
use tracing::{info, warn};

impl Context {
    /// Open a named tunnel from a local port to a pod port
    ///
    /// `local_port` of `None` lets the OS pick a free port. Waits
    /// `settings.tunnel_settle` before returning so the first request does
    /// not race the listener.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let addr = ctx.open_tunnel("web", "frontend-1-abcde", 8080, None).await?;
    /// let status = ctx.http_get(&ctx.tunnel_url("web", "/health")?).await?.status;
    /// ctx.close_tunnel("web").await;
    /// ```
    pub async fn open_tunnel(
        &mut self,
        name: &str,
        pod: &str,
        target_port: u16,
        local_port: Option<u16>,
    ) -> Result<SocketAddr, ContextError> {
        let (clients, namespace) = self.scope()?;
        let upstream = PodUpstream::new(clients.namespaced::<Pod>(&namespace), pod, target_port);
        self.open_tunnel_with(name, upstream, local_port).await
    }

    /// Open a named tunnel to any upstream
    pub async fn open_tunnel_with<U: Upstream>(
        &mut self,
        name: &str,
        upstream: U,
        local_port: Option<u16>,
    ) -> Result<SocketAddr, ContextError> {
        if self.tunnels.contains_key(name) {
            return Err(ContextError::TunnelExists(name.to_string()));
        }

        let tunnel = Tunnel::open(name, upstream, local_port).await?;
        let addr = tunnel.local_addr();

        tokio::time::sleep(self.settings().tunnel_settle).await;

        info!(tunnel = %name, local_addr = %addr, target = %tunnel.target(), "Tunnel opened");
        self.tunnels.insert(name.to_string(), tunnel);
        Ok(addr)
    }

    /// Look up an open tunnel
    pub fn tunnel(&self, name: &str) -> Result<&Tunnel, ContextError> {
        self.tunnels
            .get(name)
            .ok_or_else(|| ContextError::NoSuchTunnel(name.to_string()))
    }

    /// URL of `path` through a named tunnel
    pub fn tunnel_url(&self, name: &str, path: &str) -> Result<String, ContextError> {
        Ok(self.tunnel(name)?.url(path))
    }

    /// Names of the open tunnels, sorted
    pub fn tunnel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tunnels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Close a tunnel and wait for its forwarding task to stop
    ///
    /// Unknown names are ignored. Returns the forwarding errors that
    /// happened while the tunnel was open; each is also logged.
    pub async fn close_tunnel(&mut self, name: &str) -> Vec<String> {
        let Some(tunnel) = self.tunnels.remove(name) else {
            return Vec::new();
        };

        let errors = tunnel.close().await;
        for error in &errors {
            warn!(tunnel = %name, error = %error, "Tunnel forwarding error");
        }

        info!(tunnel = %name, "Tunnel closed");
        errors
    }

    /// Close every open tunnel
    pub async fn close_all_tunnels(&mut self) {
        for name in self.tunnel_names() {
            self.close_tunnel(&name).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::tunnel::TunnelError;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::net::TcpStream;

    struct Sink;

    #[async_trait]
    impl Upstream for Sink {
        async fn forward(&self, _local: TcpStream) -> Result<(), TunnelError> {
            Ok(())
        }

        fn describe(&self) -> String {
            "sink".to_string()
        }
    }

    fn context() -> Context {
        Context::new(Settings::default().tunnel_settle(Duration::ZERO)).unwrap()
    }

    #[tokio::test]
    async fn test_open_then_close_removes_tunnel() {
        let mut ctx = context();
        let addr = ctx.open_tunnel_with("t1", Sink, None).await.unwrap();
        assert_eq!(ctx.tunnel_names(), vec!["t1"]);
        assert_eq!(ctx.tunnel("t1").unwrap().local_addr(), addr);

        let errors = ctx.close_tunnel("t1").await;
        assert!(errors.is_empty());
        assert!(ctx.tunnel_names().is_empty());
        assert!(matches!(ctx.tunnel("t1"), Err(ContextError::NoSuchTunnel(_))));
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let mut ctx = context();
        ctx.open_tunnel_with("t1", Sink, None).await.unwrap();

        let err = ctx.open_tunnel_with("t1", Sink, None).await.unwrap_err();
        assert!(matches!(err, ContextError::TunnelExists(ref n) if n == "t1"));
        assert_eq!(ctx.tunnel_names().len(), 1);

        ctx.close_all_tunnels().await;
    }

    #[tokio::test]
    async fn test_close_unknown_tunnel_is_noop() {
        let mut ctx = context();
        assert!(ctx.close_tunnel("missing").await.is_empty());
    }

    #[tokio::test]
    async fn test_close_all_tunnels() {
        let mut ctx = context();
        ctx.open_tunnel_with("a", Sink, None).await.unwrap();
        ctx.open_tunnel_with("b", Sink, None).await.unwrap();

        ctx.close_all_tunnels().await;
        assert!(ctx.tunnel_names().is_empty());
    }

    #[tokio::test]
    async fn test_pod_tunnel_requires_login() {
        let mut ctx = context();
        ctx.set_namespace("demo");
        let err = ctx.open_tunnel("t1", "pod-a", 8080, None).await.unwrap_err();
        assert!(matches!(err, ContextError::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_tunnel_url() {
        let mut ctx = context();
        let addr = ctx.open_tunnel_with("web", Sink, None).await.unwrap();
        assert_eq!(
            ctx.tunnel_url("web", "health").unwrap(),
            format!("http://{addr}/health")
        );
        ctx.close_all_tunnels().await;
    }
}
