use super::types::Gvr;
use super::{improve_error_message, Context, ContextError};
use kube::api::{DynamicObject, PostParams};
use tracing::{debug, info};

/// Namespace holding the templates shared by the whole cluster
pub const SHARED_TEMPLATE_NAMESPACE: &str = "openshift";

impl Context {
    /// Find a template in the working project, then in `openshift`
    pub async fn find_template(&self, name: &str) -> Result<Option<DynamicObject>, ContextError> {
        if let Some(template) = self.get_dynamic_opt(&Gvr::template(), name).await? {
            return Ok(Some(template));
        }

        let clients = self.clients()?;
        let shared = clients.dynamic(&Gvr::template(), SHARED_TEMPLATE_NAMESPACE);
        match self.retrying(|| shared.get(name)).await {
            Ok(template) => Ok(Some(template)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(ContextError::GetError(improve_error_message(
                &e, "Template", name,
            ))),
        }
    }

    /// Render a template with parameter overrides
    ///
    /// Returns the rendered objects, not yet created.
    pub async fn process_template(
        &self,
        name: &str,
        parameters: &[(String, String)],
    ) -> Result<Vec<serde_json::Value>, ContextError> {
        let mut template = self
            .find_template(name)
            .await?
            .ok_or_else(|| ContextError::GetError(format!("Template '{name}' not found")))?;

        set_parameters(&mut template.data, parameters)?;
        template.metadata.namespace = None;
        template.metadata.resource_version = None;
        template.metadata.uid = None;

        let processor = self.dynamic_api(&Gvr::processed_template())?;
        let processed = processor
            .create(&PostParams::default(), &template)
            .await
            .map_err(|e| ContextError::CreateError(improve_error_message(&e, "Template", name)))?;

        let objects = processed.data["objects"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        debug!(template = %name, objects = objects.len(), "Processed template");
        Ok(objects)
    }

    /// Process a template and create every object it renders
    ///
    /// Returns `Kind/name` of each created object.
    pub async fn new_app_from_template(
        &self,
        name: &str,
        parameters: &[(String, String)],
    ) -> Result<Vec<String>, ContextError> {
        let objects = self.process_template(name, parameters).await?;

        let mut created = Vec::with_capacity(objects.len());
        for object in objects {
            created.push(self.create_object(object).await?);
        }

        info!(template = %name, objects = ?created, "Created application from template");
        Ok(created)
    }
}

/// Set `value` of each named template parameter
fn set_parameters(
    template: &mut serde_json::Value,
    parameters: &[(String, String)],
) -> Result<(), ContextError> {
    if parameters.is_empty() {
        return Ok(());
    }

    let declared = template["parameters"].as_array_mut().ok_or_else(|| {
        ContextError::InvalidManifest("template declares no parameters".to_string())
    })?;

    for (name, value) in parameters {
        let parameter = declared
            .iter_mut()
            .find(|p| p["name"].as_str() == Some(name.as_str()))
            .ok_or_else(|| {
                ContextError::InvalidManifest(format!("template has no parameter '{name}'"))
            })?;
        parameter["value"] = serde_json::Value::String(value.clone());
        if let Some(fields) = parameter.as_object_mut() {
            fields.remove("generate");
        }
    }

    Ok(())
}
