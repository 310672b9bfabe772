use super::types::Gvr;
use super::{improve_error_message, Context, ContextError};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use kube::api::{ObjectMeta, PostParams};
use tracing::info;

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

/// Role binding granting a cluster role to a user in one namespace
pub(crate) fn user_role_binding(role: &str, user: &str, namespace: &str) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(format!("{role}-{user}")),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: role.to_string(),
        },
        subjects: Some(vec![Subject {
            api_group: Some(RBAC_GROUP.to_string()),
            kind: "User".to_string(),
            name: user.to_string(),
            namespace: None,
        }]),
    }
}

/// Whether a binding gives `role` to `user`
pub(crate) fn binds_user(binding: &RoleBinding, user: &str, role: &str) -> bool {
    binding.role_ref.name == role
        && binding
            .subjects
            .iter()
            .flatten()
            .any(|subject| subject.kind == "User" && subject.name == user)
}

/// Whether a binding gives the cluster role `role` to `user`
pub(crate) fn grants_cluster_role(binding: &RoleBinding, user: &str, role: &str) -> bool {
    binding.role_ref.kind == "ClusterRole" && binds_user(binding, user, role)
}

impl Context {
    /// Grant a cluster role to a user in the working namespace
    ///
    /// An existing binding with the same name counts as granted only when it
    /// binds the same cluster role to the same user.
    pub async fn grant_role(&self, role: &str, user: &str) -> Result<(), ContextError> {
        let (clients, namespace) = self.scope()?;
        let bindings = clients.namespaced::<RoleBinding>(&namespace);
        let binding = user_role_binding(role, user, &namespace);
        let name = format!("{role}-{user}");

        match bindings.create(&PostParams::default(), &binding).await {
            Ok(_) => {}
            Err(kube::Error::Api(ref ae)) if ae.code == 409 => {
                let existing = self.get::<RoleBinding>(&name).await?;
                if !grants_cluster_role(&existing, user, role) {
                    return Err(ContextError::CreateError(format!(
                        "RoleBinding '{name}' already exists and does not grant \
                         ClusterRole '{role}' to user '{user}'"
                    )));
                }
            }
            Err(e) => {
                return Err(ContextError::CreateError(improve_error_message(
                    &e,
                    "RoleBinding",
                    &name,
                )))
            }
        }

        info!(namespace = %namespace, role = %role, user = %user, "Granted role");
        Ok(())
    }

    /// Whether any role binding in the working namespace gives `role` to `user`
    pub async fn user_has_role(&self, user: &str, role: &str) -> Result<bool, ContextError> {
        let bindings = self.list::<RoleBinding>().await?;
        Ok(bindings.iter().any(|b| binds_user(b, user, role)))
    }

    /// Whether an OpenShift user exists
    pub async fn user_exists(&self, name: &str) -> Result<bool, ContextError> {
        self.dynamic_exists(&Gvr::user(), name).await
    }
}
