use crate::context::{parse_resource_ref, Context};
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .then(r#"the resource "([^"]*)" should exist"#, resource_exists)
        .then(r#"the resource "([^"]*)" should not exist"#, resource_absent)
        .when(r#"I delete the resource "([^"]*)""#, delete_resource);
}

/// References look like `dc/frontend` or `deploymentconfig/frontend`
fn resource_exists(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let reference = parse_resource_ref(args.str(1)?)?;
        let exists = ctx.dynamic_exists(&reference.gvr, &reference.name).await?;
        ctx.check(exists, format!("{reference} does not exist"));
        Ok(())
    }
    .boxed()
}

fn resource_absent(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let reference = parse_resource_ref(args.str(1)?)?;
        let exists = ctx.dynamic_exists(&reference.gvr, &reference.name).await?;
        ctx.check(!exists, format!("{reference} still exists"));
        Ok(())
    }
    .boxed()
}

fn delete_resource(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let reference = parse_resource_ref(args.str(1)?)?;
        ctx.delete_dynamic(&reference.gvr, &reference.name).await?;
        Ok(())
    }
    .boxed()
}
