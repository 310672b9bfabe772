use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::ServiceAccount;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .then(r#"there should be a user "([^"]*)""#, user_exists)
        .then(
            r#"there should be a service account "([^"]*)""#,
            service_account_exists,
        );
}

fn user_exists(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.user_exists(name).await?;
        super::check_exists(ctx, "User", name, exists);
        Ok(())
    }
    .boxed()
}

fn service_account_exists(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.exists::<ServiceAccount>(name).await?;
        super::check_exists(ctx, "ServiceAccount", name, exists);
        Ok(())
    }
    .boxed()
}
