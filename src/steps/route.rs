use crate::context::{Context, ContextError, Gvr};
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use kube::api::DynamicObject;
use serde_json::json;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .given(r#"I have a route "([^"]*)""#, have_route)
        .when(
            r#"I create a route "([^"]*)" for service "([^"]*)""#,
            create_route,
        )
        .then(
            r#"the route "([^"]*)" should have host "([^"]*)""#,
            route_host,
        )
        .then(
            r#"the route "([^"]*)" should point to service "([^"]*)""#,
            route_service,
        );
}

fn have_route(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.dynamic_exists(&Gvr::route(), name).await?;
        super::check_exists(ctx, "Route", name, exists);
        Ok(())
    }
    .boxed()
}

fn create_route(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let route = route_for_service(args.str(1)?, args.str(2)?)?;
        ctx.create_dynamic(&Gvr::route(), route).await?;
        Ok(())
    }
    .boxed()
}

fn route_host(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let route = ctx.get_dynamic(&Gvr::route(), name).await?;
        let host = route.data["spec"]["host"].as_str().unwrap_or_default();
        ctx.check_eq(&format!("host of route '{name}'"), args.str(2)?, host);
        Ok(())
    }
    .boxed()
}

fn route_service(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let route = ctx.get_dynamic(&Gvr::route(), name).await?;
        let target = route.data["spec"]["to"]["name"].as_str().unwrap_or_default();
        ctx.check_eq(&format!("service of route '{name}'"), args.str(2)?, target);
        Ok(())
    }
    .boxed()
}

fn route_for_service(name: &str, service: &str) -> Result<DynamicObject, ContextError> {
    serde_json::from_value(json!({
        "apiVersion": "route.openshift.io/v1",
        "kind": "Route",
        "metadata": { "name": name },
        "spec": { "to": { "kind": "Service", "name": service } },
    }))
    .map_err(|e| ContextError::InvalidManifest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_for_service() {
        let route = route_for_service("web", "frontend").unwrap();
        assert_eq!(route.metadata.name.as_deref(), Some("web"));
        assert_eq!(route.data["spec"]["to"]["name"], "frontend");
        assert_eq!(route.types.unwrap().kind, "Route");
    }
}
