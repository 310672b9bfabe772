use crate::context::Context;
use crate::registry::{StepArgs, StepError, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::info;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .when(r#"I apply the file "([^"]*)""#, apply_file)
        .when("I apply the following resources:", apply_docstring);
}

/// Relative paths resolve against the feature file's directory
fn apply_file(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let path = ctx.resolve_path(args.str(1)?);
        let yaml = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StepError::Failed(format!("reading {}: {e}", path.display())))?;

        let created = ctx.apply_manifests(&yaml).await?;
        info!(file = %path.display(), resources = ?created, "Applied manifest file");
        Ok(())
    }
    .boxed()
}

fn apply_docstring(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        ctx.apply_manifests(args.docstring()?).await?;
        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::ContextError;

    #[tokio::test]
    async fn test_apply_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Context::new(Settings::default()).unwrap();
        ctx.set_base_dir(dir.path());

        let args = StepArgs::new(vec![Some("missing.yaml".to_string())], None, None);
        let err = apply_file(&mut ctx, args).await.unwrap_err();
        assert!(matches!(err, StepError::Failed(ref m) if m.contains("missing.yaml")));
    }

    #[tokio::test]
    async fn test_apply_file_requires_login() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cm.yaml"),
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n",
        )
        .unwrap();
        let mut ctx = Context::new(Settings::default()).unwrap();
        ctx.set_base_dir(dir.path());

        let args = StepArgs::new(vec![Some("cm.yaml".to_string())], None, None);
        let err = apply_file(&mut ctx, args).await.unwrap_err();
        assert!(matches!(
            err,
            StepError::Context(ContextError::NotLoggedIn)
        ));
    }

    #[tokio::test]
    async fn test_apply_docstring_requires_docstring() {
        let mut ctx = Context::new(Settings::default()).unwrap();
        let err = apply_docstring(&mut ctx, StepArgs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Argument(_)));
    }
}
