use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .given(r#"I have a template "([^"]*)""#, have_template)
        .when(
            r#"I create a new application based on the template "([^"]*)""#,
            new_app,
        )
        .when(
            r#"I create a new application based on the template "([^"]*)" with parameters:"#,
            new_app_with_parameters,
        );
}

fn have_template(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let found = ctx.find_template(name).await?.is_some();
        ctx.check(
            found,
            format!("template '{name}' found neither in the project nor in 'openshift'"),
        );
        Ok(())
    }
    .boxed()
}

fn new_app(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.new_app_from_template(args.str(1)?, &[]).await?;
        Ok(())
    }
    .boxed()
}

/// Table columns: name | value
fn new_app_with_parameters(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let parameters = args.table_pairs()?;
        ctx.new_app_from_template(args.str(1)?, &parameters).await?;
        Ok(())
    }
    .boxed()
}
