use super::types::Gvr;
use super::{improve_error_message, is_not_found, Context, ContextError};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::core::ObjectMeta;
use kube::ResourceExt;
use serde_json::json;
use tracing::{debug, info};

impl Context {
    /// Whether a project exists, by listing projects and scanning by name
    ///
    /// Falls back to namespaces on clusters without the project API.
    pub async fn project_exists(&self, name: &str) -> Result<bool, ContextError> {
        let clients = self.clients()?;
        let projects = clients.dynamic(&Gvr::project(), "");
        let params = ListParams::default();

        match self.retrying(|| projects.list(&params)).await {
            Ok(list) => Ok(list.items.iter().any(|p| p.name_any() == name)),
            Err(e) if is_not_found(&e) => {
                let namespaces: Api<Namespace> = clients.cluster();
                let list = self
                    .retrying(|| namespaces.list(&params))
                    .await
                    .map_err(|e| {
                        ContextError::ListError(format!("failed to list namespaces: {e}"))
                    })?;
                Ok(list.items.iter().any(|ns| ns.name_any() == name))
            }
            Err(e) => Err(ContextError::ListError(format!(
                "failed to list projects: {e}"
            ))),
        }
    }

    /// Request a new project
    ///
    /// Uses a `ProjectRequest` so that regular users can create projects.
    /// Creates a plain namespace on clusters without the project API.
    pub async fn create_project(&self, name: &str) -> Result<(), ContextError> {
        let clients = self.clients()?;
        let requests = clients.dynamic(&Gvr::project_request(), "");

        let request: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "project.openshift.io/v1",
            "kind": "ProjectRequest",
            "metadata": { "name": name },
        }))
        .map_err(|e| ContextError::CreateError(format!("project request: {e}")))?;

        match requests.create(&PostParams::default(), &request).await {
            Ok(_) => {}
            Err(e) if is_not_found(&e) => {
                debug!(project = %name, "No project API, creating namespace");
                let namespaces: Api<Namespace> = clients.cluster();
                let namespace = Namespace {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                namespaces
                    .create(&PostParams::default(), &namespace)
                    .await
                    .map_err(|e| {
                        ContextError::CreateError(improve_error_message(&e, "Namespace", name))
                    })?;
            }
            Err(e) => {
                return Err(ContextError::CreateError(improve_error_message(
                    &e, "Project", name,
                )))
            }
        }

        info!(project = %name, "Created project");
        Ok(())
    }

    /// Delete a project (or namespace)
    pub async fn delete_project(&self, name: &str) -> Result<(), ContextError> {
        let clients = self.clients()?;
        let projects = clients.dynamic(&Gvr::project(), "");

        match projects.delete(name, &DeleteParams::default()).await {
            Ok(_) => {}
            Err(e) if is_not_found(&e) => {
                let namespaces: Api<Namespace> = clients.cluster();
                namespaces
                    .delete(name, &DeleteParams::default())
                    .await
                    .map_err(|e| {
                        ContextError::DeleteError(improve_error_message(&e, "Namespace", name))
                    })?;
            }
            Err(e) => {
                return Err(ContextError::DeleteError(improve_error_message(
                    &e, "Project", name,
                )))
            }
        }

        info!(project = %name, "Deleted project");
        Ok(())
    }

    /// Make an existing project the working namespace
    pub async fn use_project(&mut self, name: &str) -> Result<(), ContextError> {
        if !self.project_exists(name).await? {
            return Err(ContextError::GetError(format!("Project '{name}' not found")));
        }
        self.set_namespace(name);
        info!(project = %name, "Using project");
        Ok(())
    }

    /// Use a project, creating it first when it does not exist
    pub async fn ensure_project(&mut self, name: &str) -> Result<(), ContextError> {
        if !self.project_exists(name).await? {
            self.create_project(name).await?;
        }
        self.set_namespace(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{mocked_context, serve, Reply};

    fn list(kind: &str, api_version: &str, names: &[&str]) -> serde_json::Value {
        let items: Vec<_> = names
            .iter()
            .map(|name| json!({ "metadata": { "name": name } }))
            .collect();
        json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": {},
            "items": items,
        })
    }

    #[tokio::test]
    async fn test_project_exists_lists_projects() {
        let (ctx, handle) = mocked_context();
        let projects = list("ProjectList", "project.openshift.io/v1", &["demo", "other"]);
        let server = serve(
            handle,
            vec![
                Reply::json("/apis/project.openshift.io/v1/projects", projects.clone()),
                Reply::json("/apis/project.openshift.io/v1/projects", projects),
            ],
        );

        assert!(ctx.project_exists("demo").await.unwrap());
        assert!(!ctx.project_exists("missing").await.unwrap());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_project_exists_falls_back_to_namespaces() {
        let (ctx, handle) = mocked_context();
        let server = serve(
            handle,
            vec![
                Reply::error("/apis/project.openshift.io/v1/projects", 404),
                Reply::error("/api/v1/namespaces", 503),
                Reply::json("/api/v1/namespaces", list("NamespaceList", "v1", &["demo"])),
            ],
        );

        assert!(ctx.project_exists("demo").await.unwrap());
        server.await.unwrap();
    }
}
