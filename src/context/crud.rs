use super::{improve_error_message, is_not_found, Context, ContextError};
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::info;

impl Context {
    /// Get a resource from the working namespace
    pub async fn get<K>(&self, name: &str) -> Result<K, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let (clients, namespace) = self.scope()?;
        let api = clients.namespaced::<K>(&namespace);
        let kind = K::kind(&Default::default()).to_string();

        self.retrying(|| api.get(name))
            .await
            .map_err(|e| ContextError::GetError(improve_error_message(&e, &kind, name)))
    }

    /// Get a resource, `None` when it does not exist
    pub async fn get_opt<K>(&self, name: &str) -> Result<Option<K>, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let (clients, namespace) = self.scope()?;
        let api = clients.namespaced::<K>(&namespace);
        let kind = K::kind(&Default::default()).to_string();

        match self.retrying(|| api.get(name)).await {
            Ok(resource) => Ok(Some(resource)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(ContextError::GetError(improve_error_message(
                &e, &kind, name,
            ))),
        }
    }

    /// List resources of a given type in the working namespace
    pub async fn list<K>(&self) -> Result<Vec<K>, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        self.list_params::<K>(&ListParams::default()).await
    }

    /// List resources matching a label selector such as `app=web`
    pub async fn list_labeled<K>(&self, selector: &str) -> Result<Vec<K>, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        self.list_params::<K>(&ListParams::default().labels(selector))
            .await
    }

    async fn list_params<K>(&self, params: &ListParams) -> Result<Vec<K>, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let (clients, namespace) = self.scope()?;
        let api = clients.namespaced::<K>(&namespace);
        let kind = K::kind(&Default::default()).to_string();

        let list = self
            .retrying(|| api.list(params))
            .await
            .map_err(|e| ContextError::ListError(format!("failed to list {kind}: {e}")))?;

        Ok(list.items)
    }

    /// Whether a resource with this name exists, by listing and scanning
    pub async fn exists<K>(&self, name: &str) -> Result<bool, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let items = self.list::<K>().await?;
        Ok(items.iter().any(|item| item.name_any() == name))
    }

    /// Create a resource in the working namespace
    pub async fn create<K>(&self, resource: &K) -> Result<K, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + serde::Serialize
            + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let (clients, namespace) = self.scope()?;
        let api = clients.namespaced::<K>(&namespace);
        let kind = K::kind(&Default::default()).to_string();
        let name = resource.name_any();

        let created = api
            .create(&PostParams::default(), resource)
            .await
            .map_err(|e| ContextError::CreateError(improve_error_message(&e, &kind, &name)))?;

        info!(namespace = %namespace, kind = %kind, name = %name, "Created resource");

        Ok(created)
    }

    /// Delete a resource from the working namespace
    pub async fn delete<K>(&self, name: &str) -> Result<(), ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let (clients, namespace) = self.scope()?;
        let api = clients.namespaced::<K>(&namespace);
        let kind = K::kind(&Default::default()).to_string();

        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| ContextError::DeleteError(improve_error_message(&e, &kind, name)))?;

        info!(namespace = %namespace, kind = %kind, name = %name, "Deleted resource");

        Ok(())
    }
}
