use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::ResourceQuota;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .then(r#"the project should have a quota "([^"]*)""#, has_quota)
        .then(
            r#"the quota "([^"]*)" should limit "([^"]*)" to "([^"]*)""#,
            quota_limit,
        );
}

fn has_quota(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.exists::<ResourceQuota>(name).await?;
        super::check_exists(ctx, "ResourceQuota", name, exists);
        Ok(())
    }
    .boxed()
}

fn quota_limit(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let resource = args.str(2)?;
        let quota = ctx.get::<ResourceQuota>(name).await?;
        let limit = hard_limit(&quota, resource);
        ctx.check_eq(
            &format!("limit of '{resource}' in quota '{name}'"),
            Some(args.str(3)?),
            limit.as_deref(),
        );
        Ok(())
    }
    .boxed()
}

fn hard_limit(quota: &ResourceQuota, resource: &str) -> Option<String> {
    quota
        .spec
        .as_ref()?
        .hard
        .as_ref()?
        .get(resource)
        .map(|quantity| quantity.0.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ResourceQuotaSpec;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::BTreeMap;

    #[test]
    fn test_hard_limit() {
        let mut hard = BTreeMap::new();
        hard.insert("pods".to_string(), Quantity("10".to_string()));
        let quota = ResourceQuota {
            spec: Some(ResourceQuotaSpec {
                hard: Some(hard),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(hard_limit(&quota, "pods").as_deref(), Some("10"));
        assert_eq!(hard_limit(&quota, "services"), None);
        assert_eq!(hard_limit(&ResourceQuota::default(), "pods"), None);
    }
}
