use crate::context::Context;
use crate::eventually::eventually;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .then(r#"the pod "([^"]*)" should be running"#, pod_running)
        .then(
            r#"there should be (\d+) running pods? with label "([^"]*)""#,
            running_pods,
        )
        .then(
            r#"there should be (\d+) running pods? with label "([^"]*)" within (\d+) (seconds?|minutes?)"#,
            running_pods_within,
        )
        .then(
            r#"the logs of pod "([^"]*)" should contain "([^"]*)""#,
            logs_contain,
        );
}

fn pod_running(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let phase = ctx.pod_phase(name).await?;
        ctx.check_eq(&format!("phase of pod '{name}'"), "Running", phase.as_str());
        Ok(())
    }
    .boxed()
}

fn running_pods(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let expected: usize = args.parse(1)?;
        let selector = args.str(2)?;
        let running = ctx.running_pods(selector).await?;
        ctx.check_eq(
            &format!("running pods with label '{selector}'"),
            expected,
            running.len(),
        );
        Ok(())
    }
    .boxed()
}

fn running_pods_within(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let expected: usize = args.parse(1)?;
        let selector = args.str(2)?;
        let timeout = args.duration(3, 4)?;
        let interval = ctx.settings().poll_interval;

        let reader: &Context = ctx;
        let result = eventually(|| async move {
            let running = reader
                .running_pods(selector)
                .await
                .map_err(|e| e.to_string())?;
            if running.len() == expected {
                Ok(())
            } else {
                Err(format!("{} running", running.len()))
            }
        })
        .timeout(timeout)
        .interval(interval)
        .await_condition()
        .await;

        if let Err(e) = result {
            ctx.fail(format!(
                "expected {expected} running pods with label '{selector}': {e}"
            ));
        }
        Ok(())
    }
    .boxed()
}

fn logs_contain(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let pod = args.str(1)?;
        let needle = args.str(2)?;
        let logs = ctx.logs(pod).await?;
        ctx.check(
            logs.contains(needle),
            format!("logs of pod '{pod}' do not contain '{needle}'"),
        );
        Ok(())
    }
    .boxed()
}
