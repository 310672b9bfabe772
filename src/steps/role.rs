use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .when(
            r#"I grant the role "([^"]*)" to user "([^"]*)""#,
            grant_role,
        )
        .then(
            r#"the user "([^"]*)" should have the role "([^"]*)" in the project"#,
            has_role,
        );
}

fn grant_role(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.grant_role(args.str(1)?, args.str(2)?).await?;
        Ok(())
    }
    .boxed()
}

fn has_role(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let user = args.str(1)?;
        let role = args.str(2)?;
        let granted = ctx.user_has_role(user, role).await?;
        ctx.check(
            granted,
            format!("user '{user}' has no role '{role}' in the project"),
        );
        Ok(())
    }
    .boxed()
}
