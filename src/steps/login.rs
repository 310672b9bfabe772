use crate::config::LoginConfig;
use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .given(
            r#"I login on "([^"]*)" with user "([^"]*)" and password "([^"]*)""#,
            login_with_password,
        )
        .given(r#"I login on "([^"]*)" with token "([^"]*)""#, login_with_token)
        .given("I am logged in from environment variables", login_from_env_step)
        .when("I log out", logout)
        .before_tag("loggedInFromEnvVars", login_from_env);
}

fn login_with_password(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let login = LoginConfig::basic(args.str(1)?, args.str(2)?, args.str(3)?);
        ctx.login(&login).await?;
        Ok(())
    }
    .boxed()
}

fn login_with_token(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let login = LoginConfig::token(args.str(1)?, args.str(2)?);
        ctx.login(&login).await?;
        Ok(())
    }
    .boxed()
}

/// Close the tunnels opened under the session, then drop it
fn logout(ctx: &mut Context, _args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.close_all_tunnels().await;
        ctx.logout();
        Ok(())
    }
    .boxed()
}

fn login_from_env_step(ctx: &mut Context, _args: StepArgs) -> BoxFuture<'_, StepResult> {
    login_from_env(ctx)
}

/// Log in with `OPENSHIFT_HOST` and the token or user/password variables
fn login_from_env(ctx: &mut Context) -> BoxFuture<'_, StepResult> {
    async move {
        let login = LoginConfig::from_env()?;
        ctx.login(&login).await?;
        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::mocked_context;
    use crate::context::ContextError;

    #[tokio::test]
    async fn test_log_out_forgets_session() {
        let (mut ctx, _handle) = mocked_context();
        assert!(ctx.session().is_ok());

        logout(&mut ctx, StepArgs::default()).await.unwrap();

        assert!(matches!(ctx.session(), Err(ContextError::NotLoggedIn)));
        assert!(matches!(ctx.clients(), Err(ContextError::NotLoggedIn)));
        assert_eq!(ctx.namespace().unwrap(), "demo");
    }
}
