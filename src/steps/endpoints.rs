use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Endpoints;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry.then(
        r#"the service "([^"]*)" should have (\d+) endpoints?"#,
        endpoint_count,
    );
}

fn endpoint_count(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let expected: usize = args.parse(2)?;
        let endpoints = ctx.get_opt::<Endpoints>(name).await?;
        let ready = endpoints.as_ref().map(ready_addresses).unwrap_or(0);
        ctx.check_eq(&format!("endpoints of service '{name}'"), expected, ready);
        Ok(())
    }
    .boxed()
}

/// Ready addresses across all subsets
fn ready_addresses(endpoints: &Endpoints) -> usize {
    endpoints
        .subsets
        .iter()
        .flatten()
        .map(|subset| subset.addresses.as_ref().map_or(0, Vec::len))
        .sum()
}
