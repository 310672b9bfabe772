use super::types::Gvr;
use super::{is_not_found, Context, ContextError};
use crate::config::{Credentials, LoginConfig};
use crate::oauth::{self, OAuthError};
use kube::api::{Api, DynamicObject};
use kube::core::{ClusterResourceScope, NamespaceResourceScope};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

/// An authenticated connection to the cluster
#[derive(Clone)]
pub struct Session {
    client: kube::Client,
    host: String,
    user: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("user", &self.user)
            .finish()
    }
}

impl Session {
    /// Wrap an existing client, e.g. one built from a kubeconfig
    pub fn new(client: kube::Client, host: impl Into<String>, user: Option<String>) -> Self {
        Self {
            client,
            host: host.into(),
            user,
        }
    }

    pub fn client(&self) -> &kube::Client {
        &self.client
    }

    /// API server URL
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Name of the logged-in user, when the server told us
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn clients(&self) -> Clients {
        Clients {
            client: self.client.clone(),
        }
    }
}

/// Hands out typed and dynamic API handles for one client
#[derive(Clone)]
pub struct Clients {
    client: kube::Client,
}

impl Clients {
    pub fn client(&self) -> &kube::Client {
        &self.client
    }

    /// Typed handle for a namespaced kind
    pub fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Typed handle for a cluster-scoped kind
    pub fn cluster<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = ClusterResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::all(self.client.clone())
    }

    /// Dynamic handle; `namespace` is ignored for cluster-scoped resources
    pub fn dynamic(&self, gvr: &Gvr, namespace: &str) -> Api<DynamicObject> {
        let ar = gvr.to_api_resource();
        if gvr.namespaced {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        }
    }
}

impl Context {
    /// Log in and make the session current
    ///
    /// User and password are exchanged for a token through the OpenShift
    /// OAuth server. Servers without OAuth fall back to HTTP basic auth.
    /// The credentials are verified before the session is installed.
    pub async fn login(&mut self, login: &LoginConfig) -> Result<&Session, ContextError> {
        let uri: http::Uri = login
            .host
            .parse()
            .map_err(|e| ContextError::LoginError(format!("invalid host '{}': {e}", login.host)))?;

        let mut config = kube::Config::new(uri);
        config.accept_invalid_certs = self.settings().insecure_skip_tls_verify;

        match &login.credentials {
            Credentials::Token(token) => {
                config.auth_info.token = Some(token.clone());
            }
            Credentials::Basic { user, password } => {
                match oauth::request_token(
                    &login.host,
                    user,
                    password.expose_secret(),
                    self.settings().insecure_skip_tls_verify,
                    self.settings().http_timeout,
                )
                .await
                {
                    Ok(token) => {
                        config.auth_info.token = Some(SecretString::from(token));
                    }
                    Err(OAuthError::NotSupported(_)) => {
                        debug!(host = %login.host, "No OAuth server, using basic auth");
                        config.auth_info.username = Some(user.clone());
                        config.auth_info.password = Some(password.clone());
                    }
                    Err(e) => return Err(ContextError::LoginError(e.to_string())),
                }
            }
        }

        let client = kube::Client::try_from(config)
            .map_err(|e| ContextError::ClientError(e.to_string()))?;

        let user = whoami(&client)
            .await?
            .or_else(|| login.user().map(str::to_string));

        info!(host = %login.host, user = ?user, "Logged in");

        self.set_session(Session::new(client, login.host.clone(), user));
        self.factory()
    }
}

/// Ask the server who we are
///
/// `Ok(None)` on clusters without the OpenShift user API.
async fn whoami(client: &kube::Client) -> Result<Option<String>, ContextError> {
    let users: Api<DynamicObject> = Api::all_with(client.clone(), &Gvr::user().to_api_resource());

    match users.get("~").await {
        Ok(me) => Ok(me.metadata.name),
        Err(e) if is_not_found(&e) => {
            client
                .apiserver_version()
                .await
                .map_err(|e| ContextError::LoginError(e.to_string()))?;
            Ok(None)
        }
        Err(kube::Error::Api(response)) if response.code == 401 => Err(
            ContextError::LoginError("the server rejected the credentials".to_string()),
        ),
        Err(e) => Err(ContextError::LoginError(e.to_string())),
    }
}
