use super::parsing::split_api_version;
use super::types::Gvr;
use super::{improve_error_message, is_not_found, Context, ContextError};
use kube::api::{
    Api, DeleteParams, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams, PostParams,
};
use kube::discovery::{self, Scope};
use kube::ResourceExt;
use serde::Deserialize;
use tracing::{debug, info};

impl Context {
    /// Get an unstructured resource using the dynamic client
    ///
    /// # Example
    ///
    /// ```ignore
    /// let route = ctx.get_dynamic(&Gvr::route(), "frontend").await?;
    /// let host = route.data["spec"]["host"].as_str();
    /// ```
    pub async fn get_dynamic(&self, gvr: &Gvr, name: &str) -> Result<DynamicObject, ContextError> {
        let api = self.dynamic_api(gvr)?;

        self.retrying(|| api.get(name))
            .await
            .map_err(|e| ContextError::GetError(improve_error_message(&e, &gvr.kind, name)))
    }

    /// Same as `get_dynamic`, `None` when the resource does not exist
    pub async fn get_dynamic_opt(
        &self,
        gvr: &Gvr,
        name: &str,
    ) -> Result<Option<DynamicObject>, ContextError> {
        let api = self.dynamic_api(gvr)?;

        match self.retrying(|| api.get(name)).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(ContextError::GetError(improve_error_message(
                &e, &gvr.kind, name,
            ))),
        }
    }

    /// List unstructured resources, optionally by label selector
    pub async fn list_dynamic(
        &self,
        gvr: &Gvr,
        selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ContextError> {
        let api = self.dynamic_api(gvr)?;
        let params = match selector {
            Some(selector) => ListParams::default().labels(selector),
            None => ListParams::default(),
        };

        let list = self
            .retrying(|| api.list(&params))
            .await
            .map_err(|e| ContextError::ListError(format!("failed to list {}: {e}", gvr.resource)))?;

        Ok(list.items)
    }

    /// Whether a resource with this name exists, by listing and scanning
    pub async fn dynamic_exists(&self, gvr: &Gvr, name: &str) -> Result<bool, ContextError> {
        let items = self.list_dynamic(gvr, None).await?;
        Ok(items.iter().any(|obj| obj.name_any() == name))
    }

    /// Create an unstructured resource, replacing one with the same name
    pub async fn create_dynamic(
        &self,
        gvr: &Gvr,
        obj: DynamicObject,
    ) -> Result<DynamicObject, ContextError> {
        let api = self.dynamic_api(gvr)?;
        create_or_replace(&api, &gvr.kind, obj).await
    }

    /// Merge-patch an unstructured resource
    pub async fn patch_dynamic(
        &self,
        gvr: &Gvr,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<DynamicObject, ContextError> {
        let api = self.dynamic_api(gvr)?;

        let patched = api
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| ContextError::UpdateError(improve_error_message(&e, &gvr.kind, name)))?;

        debug!(kind = %gvr.kind, name = %name, "Patched resource");
        Ok(patched)
    }

    /// Delete an unstructured resource
    pub async fn delete_dynamic(&self, gvr: &Gvr, name: &str) -> Result<(), ContextError> {
        let api = self.dynamic_api(gvr)?;

        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| ContextError::DeleteError(improve_error_message(&e, &gvr.kind, name)))?;

        info!(kind = %gvr.kind, name = %name, "Deleted resource");
        Ok(())
    }

    /// Create any object, resolving its kind through API discovery
    ///
    /// Namespaced objects land in the working namespace. An existing object
    /// with the same name is replaced. Returns `Kind/name`.
    pub async fn create_object(&self, value: serde_json::Value) -> Result<String, ContextError> {
        let (clients, namespace) = self.scope()?;

        let mut obj: DynamicObject = serde_json::from_value(value)
            .map_err(|e| ContextError::InvalidManifest(format!("invalid object: {e}")))?;

        let types = obj.types.clone().ok_or_else(|| {
            ContextError::InvalidManifest("object has no apiVersion/kind".to_string())
        })?;
        let (group, version) = split_api_version(&types.api_version);
        let gvk = GroupVersionKind::gvk(group, version, &types.kind);

        let (ar, caps) = discovery::pinned_kind(clients.client(), &gvk)
            .await
            .map_err(|e| {
                ContextError::InvalidManifest(format!(
                    "unknown kind {}/{}: {e}",
                    types.api_version, types.kind
                ))
            })?;

        let api: Api<DynamicObject> = if matches!(caps.scope, Scope::Namespaced) {
            obj.metadata.namespace = Some(namespace.clone());
            Api::namespaced_with(clients.client().clone(), &namespace, &ar)
        } else {
            Api::all_with(clients.client().clone(), &ar)
        };

        let created = create_or_replace(&api, &types.kind, obj).await?;
        Ok(format!("{}/{}", types.kind, created.name_any()))
    }

    /// Create every object of a YAML stream
    ///
    /// Documents are separated by `---`; `kind: List` documents are
    /// expanded into their items. Returns `Kind/name` of each object.
    pub async fn apply_manifests(&self, yaml: &str) -> Result<Vec<String>, ContextError> {
        let objects = parse_manifests(yaml)?;
        let mut created = Vec::with_capacity(objects.len());

        for value in objects {
            created.push(self.create_object(value).await?);
        }

        info!(count = created.len(), "Created objects from manifests");
        Ok(created)
    }

    pub(crate) fn dynamic_api(&self, gvr: &Gvr) -> Result<Api<DynamicObject>, ContextError> {
        let clients = self.clients()?;
        if gvr.namespaced {
            Ok(clients.dynamic(gvr, self.namespace()?))
        } else {
            Ok(clients.dynamic(gvr, ""))
        }
    }
}

async fn create_or_replace(
    api: &Api<DynamicObject>,
    kind: &str,
    mut obj: DynamicObject,
) -> Result<DynamicObject, ContextError> {
    let name = obj
        .metadata
        .name
        .clone()
        .ok_or_else(|| ContextError::InvalidManifest(format!("{kind} has no metadata.name")))?;

    match api.create(&PostParams::default(), &obj).await {
        Ok(created) => {
            info!(kind = %kind, name = %name, "Created resource");
            Ok(created)
        }
        Err(kube::Error::Api(ref ae)) if ae.code == 409 => {
            let existing = api
                .get(&name)
                .await
                .map_err(|e| ContextError::GetError(improve_error_message(&e, kind, &name)))?;
            obj.metadata.resource_version = existing.metadata.resource_version;

            let replaced = api
                .replace(&name, &PostParams::default(), &obj)
                .await
                .map_err(|e| ContextError::UpdateError(improve_error_message(&e, kind, &name)))?;
            info!(kind = %kind, name = %name, "Replaced resource");
            Ok(replaced)
        }
        Err(e) => Err(ContextError::CreateError(improve_error_message(
            &e, kind, &name,
        ))),
    }
}

/// Split a YAML stream into objects, expanding `kind: List`
pub(crate) fn parse_manifests(yaml: &str) -> Result<Vec<serde_json::Value>, ContextError> {
    let mut objects = Vec::new();

    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = serde_json::Value::deserialize(document)
            .map_err(|e| ContextError::InvalidManifest(e.to_string()))?;

        match value {
            serde_json::Value::Null => {}
            serde_json::Value::Object(ref map)
                if map.get("kind").and_then(|k| k.as_str()) == Some("List") =>
            {
                if let Some(items) = map.get("items").and_then(|i| i.as_array()) {
                    objects.extend(items.iter().cloned());
                }
            }
            serde_json::Value::Object(_) => objects.push(value),
            other => {
                return Err(ContextError::InvalidManifest(format!(
                    "expected a mapping, got {other}"
                )))
            }
        }
    }

    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifests_multi_document() {
        let yaml = r#"
apiVersion: v1
kind: Service
metadata:
  name: web
---
apiVersion: route.openshift.io/v1
kind: Route
metadata:
  name: web
---
"#;
        let objects = parse_manifests(yaml).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0]["kind"], "Service");
        assert_eq!(objects[1]["apiVersion"], "route.openshift.io/v1");
    }

    #[test]
    fn test_parse_manifests_expands_lists() {
        let yaml = r#"
apiVersion: v1
kind: List
items:
  - apiVersion: v1
    kind: Secret
    metadata:
      name: a
  - apiVersion: v1
    kind: Secret
    metadata:
      name: b
"#;
        let objects = parse_manifests(yaml).unwrap();
        let names: Vec<_> = objects
            .iter()
            .map(|o| o["metadata"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_manifests_rejects_scalars() {
        assert!(matches!(
            parse_manifests("just a string"),
            Err(ContextError::InvalidManifest(_))
        ));
        assert!(parse_manifests("key: [unclosed").is_err());
    }
}
