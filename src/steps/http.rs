use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .when(
            r#"I open a tunnel "([^"]*)" to pod "([^"]*)" on port (\d+)"#,
            open_tunnel,
        )
        .when(
            r#"I open a tunnel "([^"]*)" to pod "([^"]*)" on port (\d+) from local port (\d+)"#,
            open_tunnel_on_local_port,
        )
        .when(r#"I close the tunnel "([^"]*)""#, close_tunnel)
        .then(
            r#"an HTTP GET on tunnel "([^"]*)" at path "([^"]*)" should return status (\d+)"#,
            tunnel_status,
        )
        .then(
            r#"an HTTP GET on tunnel "([^"]*)" at path "([^"]*)" should contain "([^"]*)""#,
            tunnel_body_contains,
        )
        .then(
            r#"the route "([^"]*)" should respond with status (\d+)"#,
            route_status,
        )
        .then(
            r#"an HTTP GET on "([^"]*)" should return status (\d+)"#,
            url_status,
        );
}

fn open_tunnel(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.open_tunnel(args.str(1)?, args.str(2)?, args.parse(3)?, None)
            .await?;
        Ok(())
    }
    .boxed()
}

fn open_tunnel_on_local_port(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let local_port = args.parse(4)?;
        ctx.open_tunnel(args.str(1)?, args.str(2)?, args.parse(3)?, Some(local_port))
            .await?;
        Ok(())
    }
    .boxed()
}

fn close_tunnel(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let errors = ctx.close_tunnel(name).await;
        ctx.check(
            errors.is_empty(),
            format!("tunnel '{name}' had forwarding errors: {}", errors.join("; ")),
        );
        Ok(())
    }
    .boxed()
}

fn tunnel_status(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let url = ctx.tunnel_url(args.str(1)?, args.str(2)?)?;
        expect_status(ctx, &url, args.parse(3)?).await
    }
    .boxed()
}

fn tunnel_body_contains(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let url = ctx.tunnel_url(args.str(1)?, args.str(2)?)?;
        let needle = args.str(3)?;
        let response = ctx.http_get(&url).await?;
        ctx.check(
            response.body.contains(needle),
            format!("body of GET {url} does not contain '{needle}'"),
        );
        Ok(())
    }
    .boxed()
}

fn route_status(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let url = ctx.route_url(args.str(1)?, "/").await?;
        expect_status(ctx, &url, args.parse(2)?).await
    }
    .boxed()
}

fn url_status(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let url = args.str(1)?.to_string();
        expect_status(ctx, &url, args.parse(2)?).await
    }
    .boxed()
}

async fn expect_status(ctx: &mut Context, url: &str, expected: u16) -> StepResult {
    let response = ctx.http_get(url).await?;
    ctx.check_eq(&format!("status of GET {url}"), expected, response.status);
    Ok(())
}
