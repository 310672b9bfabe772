use crate::context::Context;
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Service;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .given(r#"I have a service "([^"]*)""#, have_service)
        .then(
            r#"the service "([^"]*)" should expose port (\d+)"#,
            exposes_port,
        );
}

fn have_service(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.exists::<Service>(name).await?;
        super::check_exists(ctx, "Service", name, exists);
        Ok(())
    }
    .boxed()
}

fn exposes_port(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let port: i32 = args.parse(2)?;
        let service = ctx.get::<Service>(name).await?;

        let ports = service_ports(&service);
        ctx.check(
            ports.contains(&port),
            format!("service '{name}' exposes ports {ports:?}, not {port}"),
        );
        Ok(())
    }
    .boxed()
}

fn service_ports(service: &Service) -> Vec<i32> {
    service
        .spec
        .iter()
        .flat_map(|spec| spec.ports.iter().flatten())
        .map(|p| p.port)
        .collect()
}
