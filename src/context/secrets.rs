use super::{Context, ContextError};
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;
use tracing::debug;

impl Context {
    /// Create an opaque secret from plain-text key/value pairs
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut data = BTreeMap::new();
    /// data.insert("username".to_string(), "admin".to_string());
    /// ctx.create_secret("db-credentials", data).await?;
    /// ```
    pub async fn create_secret(
        &self,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> Result<Secret, ContextError> {
        let secret = Secret {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            string_data: Some(data),
            ..Default::default()
        };

        debug!(secret = %name, "Creating secret");
        self.create(&secret).await
    }

    /// Keys of a secret, sorted
    pub async fn secret_keys(&self, name: &str) -> Result<Vec<String>, ContextError> {
        let secret = self.get::<Secret>(name).await?;
        Ok(secret_keys(&secret))
    }
}

fn secret_keys(secret: &Secret) -> Vec<String> {
    let mut keys: Vec<String> = secret
        .data
        .iter()
        .flat_map(|data| data.keys().cloned())
        .chain(
            secret
                .string_data
                .iter()
                .flat_map(|data| data.keys().cloned()),
        )
        .collect();
    keys.sort();
    keys.dedup();
    keys
}
