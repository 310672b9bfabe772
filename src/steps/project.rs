use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .given(r#"I have a project "([^"]*)""#, have_project)
        .when(r#"I create a project "([^"]*)""#, create_project)
        .given(r#"I use the project "([^"]*)""#, use_project)
        .when(r#"I delete the project "([^"]*)""#, delete_project)
        .then(r#"there should be a project "([^"]*)""#, project_exists);
}

fn have_project(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.ensure_project(args.str(1)?).await?;
        Ok(())
    }
    .boxed()
}

fn create_project(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        ctx.create_project(name).await?;
        ctx.set_namespace(name);
        Ok(())
    }
    .boxed()
}

fn use_project(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.use_project(args.str(1)?).await?;
        Ok(())
    }
    .boxed()
}

fn delete_project(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.delete_project(args.str(1)?).await?;
        Ok(())
    }
    .boxed()
}

fn project_exists(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.project_exists(name).await?;
        super::check_exists(ctx, "Project", name, exists);
        Ok(())
    }
    .boxed()
}
