use crate::context::{Context, Gvr};
use crate::registry::{StepArgs, StepRegistry, StepResult};
use futures::future::BoxFuture;
use futures::FutureExt;

pub(crate) fn register(registry: &mut StepRegistry) {
    registry
        .given(r#"I have an imagestream "([^"]*)""#, have_image_stream)
        .then(
            r#"the imagestream "([^"]*)" should have tag "([^"]*)""#,
            has_tag,
        );
}

fn have_image_stream(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let exists = ctx.dynamic_exists(&Gvr::image_stream(), name).await?;
        super::check_exists(ctx, "ImageStream", name, exists);
        Ok(())
    }
    .boxed()
}

fn has_tag(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
    async move {
        let name = args.str(1)?;
        let tag = args.str(2)?;
        let stream = ctx.get_dynamic(&Gvr::image_stream(), name).await?;
        let tags = image_stream_tags(&stream.data);
        ctx.check(
            tags.iter().any(|t| t == tag),
            format!("imagestream '{name}' has tags {tags:?}, not '{tag}'"),
        );
        Ok(())
    }
    .boxed()
}

/// Tags pushed or imported (`status.tags`) and declared (`spec.tags`)
fn image_stream_tags(data: &serde_json::Value) -> Vec<String> {
    let status = data["status"]["tags"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|t| t["tag"].as_str());
    let spec = data["spec"]["tags"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|t| t["name"].as_str());

    let mut tags: Vec<String> = status.chain(spec).map(str::to_string).collect();
    tags.sort();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_stream_tags() {
        let data = json!({
            "spec": { "tags": [{ "name": "stable" }, { "name": "latest" }] },
            "status": { "tags": [{ "tag": "latest", "items": [] }] },
        });
        assert_eq!(image_stream_tags(&data), vec!["latest", "stable"]);
        assert!(image_stream_tags(&json!({})).is_empty());
    }
}
