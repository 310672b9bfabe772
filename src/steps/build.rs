use crate::context::{Context, Gvr};
use crate::registry::{StepArgs, StepError, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use tracing::warn;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .given(r#"I have a buildconfig "([^"]*)""#, have_build_config)
        .when(r#"I start a build of buildconfig "([^"]*)""#, start_build)
        .then(
            r#"the build "([^"]*)" should be complete within (\d+) (seconds?|minutes?)"#,
            named_build_complete,
        )
        .then(
            r"the build should be complete within (\d+) (seconds?|minutes?)",
            last_build_complete,
        )
        .then(
            r#"the latest build of buildconfig "([^"]*)" should be complete within (\d+) (seconds?|minutes?)"#,
            latest_build_complete,
        )
        .then(
            r#"there should be (\d+) builds? of buildconfig "([^"]*)""#,
            count_builds,
        );
}

fn have_build_config(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.dynamic_exists(&Gvr::build_config(), name).await?;
        super::check_exists(ctx, "BuildConfig", name, exists);
        Ok(())
    }
    .boxed()
}

fn start_build(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.start_build(args.str(1)?).await?;
        Ok(())
    }
    .boxed()
}

fn named_build_complete(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let timeout = args.duration(2, 3)?;
        expect_build_complete(ctx, args.str(1)?, timeout).await
    }
    .boxed()
}

fn last_build_complete(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let timeout = args.duration(1, 2)?;
        let name = ctx
            .last_build()
            .map(str::to_string)
            .ok_or_else(|| StepError::Failed("no build was started in this scenario".to_string()))?;
        expect_build_complete(ctx, &name, timeout).await
    }
    .boxed()
}

fn latest_build_complete(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let timeout = args.duration(2, 3)?;
        let name = ctx.latest_build_of(args.str(1)?).await?;
        expect_build_complete(ctx, &name, timeout).await
    }
    .boxed()
}

fn count_builds(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let expected: usize = args.parse(1)?;
        let build_config = args.str(2)?;
        let builds = ctx.builds_of(build_config).await?;
        ctx.check_eq(
            &format!("builds of buildconfig '{build_config}'"),
            expected,
            builds.len(),
        );
        Ok(())
    }
    .boxed()
}

/// Wait for a build and attach its log to the failure when it did not complete
async fn expect_build_complete(ctx: &mut Context, name: &str, timeout: Duration) -> StepResult {
    let outcome = ctx.is_build_complete(name, timeout).await?;
    if outcome.is_complete() {
        return Ok(());
    }

    let log = match ctx.build_logs(name).await {
        Ok(log) => log,
        Err(e) => {
            warn!(build = %name, error = %e, "Could not fetch build log");
            format!("<build log unavailable: {e}>")
        }
    };
    ctx.fail(format!("build '{name}' {outcome}\n--- build log ---\n{log}"));
    Ok(())
}
