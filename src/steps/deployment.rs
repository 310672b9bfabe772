use crate::context::{Context, Gvr};
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .given(r#"I have a deploymentconfig "([^"]*)""#, have_deployment_config)
        .when(
            r#"I trigger a new deployment of deploymentconfig "([^"]*)""#,
            trigger_deployment,
        )
        .then(
            r#"the deploymentconfig "([^"]*)" should be deployed within (\d+) (seconds?|minutes?)"#,
            deployed_within,
        )
        .when(
            r#"I scale the deploymentconfig "([^"]*)" to (\d+) replicas?"#,
            scale,
        )
        .then(
            r#"the deploymentconfig "([^"]*)" should have (\d+) replicas?"#,
            has_replicas,
        );
}

fn have_deployment_config(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.dynamic_exists(&Gvr::deployment_config(), name).await?;
        super::check_exists(ctx, "DeploymentConfig", name, exists);
        Ok(())
    }
    .boxed()
}

fn trigger_deployment(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.trigger_deployment(args.str(1)?).await?;
        Ok(())
    }
    .boxed()
}

fn deployed_within(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let timeout = args.duration(2, 3)?;
        let outcome = ctx.is_deployment_complete(name, timeout).await?;
        super::check_outcome(ctx, &format!("deploymentconfig '{name}'"), &outcome);
        Ok(())
    }
    .boxed()
}

fn scale(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.scale_deployment_config(args.str(1)?, args.parse(2)?).await?;
        Ok(())
    }
    .boxed()
}

fn has_replicas(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let expected: i64 = args.parse(2)?;
        let replicas = ctx.deployment_config_replicas(name).await?;
        ctx.check_eq(
            &format!("desired replicas of '{name}'"),
            expected,
            replicas.desired,
        );
        ctx.check_eq(
            &format!("available replicas of '{name}'"),
            expected,
            replicas.available,
        );
        Ok(())
    }
    .boxed()
}
