use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Secret;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .given(r#"I have a secret "([^"]*)""#, have_secret)
        .when(r#"I create a secret "([^"]*)" with:"#, create_secret)
        .then(
            r#"the secret "([^"]*)" should contain key "([^"]*)""#,
            secret_has_key,
        );
}

fn have_secret(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.exists::<Secret>(name).await?;
        super::check_exists(ctx, "Secret", name, exists);
        Ok(())
    }
    .boxed()
}

/// Table columns: key | value
fn create_secret(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let data = args.table_pairs()?.into_iter().collect();
        ctx.create_secret(args.str(1)?, data).await?;
        Ok(())
    }
    .boxed()
}

fn secret_has_key(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let key = args.str(2)?;
        let keys = ctx.secret_keys(name).await?;
        ctx.check(
            keys.iter().any(|k| k == key),
            format!("secret '{name}' has keys {keys:?}, not '{key}'"),
        );
        Ok(())
    }
    .boxed()
}
