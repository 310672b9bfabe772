//! Feature discovery and sequential scenario execution
//!
//! Feature files are parsed with `gherkin`. Every scenario runs its
//! background steps then its own steps against the shared `Context`,
//! looking each step up in the `StepRegistry`.
//!
//! # Example
//!
//! ```ignore
//! let runner = Runner::new(steps::registry())?;
//! let mut ctx = Context::new(Settings::from_env()?)?;
//! let results = runner.run_path(&mut ctx, Path::new("features")).await?;
//! println!("{}", RunSummary::from_results(&results));
//! ```

use crate::context::Context;
use crate::registry::{Lookup, RegistryError, StepArgs, StepError, StepKind, StepRegistry};
use gherkin::{Feature, GherkinEnv, ParseFileError, Scenario, Step};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Scenarios with this tag are reported as skipped without running
pub const SKIP_TAG: &str = "skip";

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid step registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("feature path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to search {}: {message}", .path.display())]
    Discover { path: PathBuf, message: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("hook for @{tag} failed in scenario '{scenario}': {source}")]
    Hook {
        tag: String,
        scenario: String,
        source: StepError,
    },
}

/// Outcome of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Passed => write!(f, "passed"),
            Status::Failed => write!(f, "failed"),
            Status::Skipped => write!(f, "skipped"),
        }
    }
}

/// One scenario's result
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerResult {
    pub feature: String,
    pub scenario: String,
    pub status: Status,
    pub errors: Vec<String>,
    pub duration: Duration,
}

/// Passed / failed / skipped counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn from_results(results: &[RunnerResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status {
                Status::Passed => summary.passed += 1,
                Status::Failed => summary.failed += 1,
                Status::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scenarios ({} passed, {} failed, {} skipped)",
            self.total(),
            self.passed,
            self.failed,
            self.skipped
        )
    }
}

enum StepOutcome {
    Passed,
    Failed(Vec<String>),
    Undefined,
}

/// Runs feature files against a validated registry
#[derive(Debug)]
pub struct Runner {
    registry: StepRegistry,
}

impl Runner {
    /// # Errors
    ///
    /// Returns `RunError::Registry` when a pattern is invalid or duplicated.
    pub fn new(registry: StepRegistry) -> Result<Self, RunError> {
        registry.validate()?;
        Ok(Self { registry })
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Feature files under `path`, sorted
    ///
    /// A file is returned as is; a directory yields every `*.feature`
    /// below it.
    pub fn discover(path: &Path) -> Result<Vec<PathBuf>, RunError> {
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        if !path.is_dir() {
            return Err(RunError::NotFound(path.to_path_buf()));
        }

        let pattern = format!(
            "{}/**/*.feature",
            glob::Pattern::escape(&path.to_string_lossy())
        );
        let entries = glob::glob(&pattern).map_err(|e| RunError::Discover {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut files = entries
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RunError::Discover {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        files.sort();
        Ok(files)
    }

    pub fn parse_feature(path: &Path) -> Result<Feature, RunError> {
        Feature::parse_path(path, GherkinEnv::default()).map_err(|e| {
            let message = e.to_string();
            match e {
                ParseFileError::Reading { path, source } => RunError::Read { path, source },
                ParseFileError::Parsing { path, .. } => RunError::Parse { path, message },
            }
        })
    }

    /// Run every feature file found under `path`
    pub async fn run_path(
        &self,
        ctx: &mut Context,
        path: &Path,
    ) -> Result<Vec<RunnerResult>, RunError> {
        let files = Self::discover(path)?;
        info!(path = %path.display(), features = files.len(), "Running features");

        let mut results = Vec::new();
        for file in files {
            let feature = Self::parse_feature(&file)?;
            if let Some(dir) = file.parent() {
                ctx.set_base_dir(dir);
            }
            results.extend(self.run_feature(ctx, &feature).await?);
        }
        Ok(results)
    }

    /// Run the scenarios of a parsed feature, rule scenarios last
    pub async fn run_feature(
        &self,
        ctx: &mut Context,
        feature: &Feature,
    ) -> Result<Vec<RunnerResult>, RunError> {
        info!(feature = %feature.name, "Feature");

        let feature_background = background_steps(feature.background.as_ref());
        let mut results = Vec::new();

        for scenario in &feature.scenarios {
            let result = self
                .run_scenario(ctx, feature, &[], &feature_background, scenario)
                .await?;
            results.push(result);
        }

        for rule in &feature.rules {
            let mut background = feature_background.clone();
            background.extend(background_steps(rule.background.as_ref()));

            for scenario in &rule.scenarios {
                let result = self
                    .run_scenario(ctx, feature, &rule.tags, &background, scenario)
                    .await?;
                results.push(result);
            }
        }

        Ok(results)
    }

    async fn run_scenario(
        &self,
        ctx: &mut Context,
        feature: &Feature,
        rule_tags: &[String],
        background: &[&Step],
        scenario: &Scenario,
    ) -> Result<RunnerResult, RunError> {
        let started = Instant::now();
        let mut result = RunnerResult {
            feature: feature.name.clone(),
            scenario: scenario.name.clone(),
            status: Status::Passed,
            errors: Vec::new(),
            duration: Duration::ZERO,
        };

        let tags = scenario_tags(feature, rule_tags, scenario);

        if tags.iter().any(|t| t == SKIP_TAG) {
            info!(scenario = %scenario.name, "Scenario skipped by tag");
            result.status = Status::Skipped;
            return Ok(result);
        }
        if !scenario.examples.is_empty() {
            warn!(scenario = %scenario.name, "Scenario outlines are not supported");
            result.status = Status::Skipped;
            result
                .errors
                .push("scenario outlines are not supported".to_string());
            return Ok(result);
        }

        info!(scenario = %scenario.name, "Scenario");
        ctx.begin_scenario();

        for tag in &tags {
            for hook in self.registry.hooks_for(tag) {
                debug!(tag = %tag, "Running tag hook");
                hook(ctx).await.map_err(|source| RunError::Hook {
                    tag: tag.clone(),
                    scenario: scenario.name.clone(),
                    source,
                })?;
            }
        }

        for step in background.iter().copied().chain(scenario.steps.iter()) {
            match self.run_step(ctx, step).await {
                StepOutcome::Passed => {}
                StepOutcome::Failed(errors) => {
                    result.status = Status::Failed;
                    result.errors = errors;
                    break;
                }
                StepOutcome::Undefined => {
                    result.status = Status::Skipped;
                    result
                        .errors
                        .push(format!("undefined step: {} {}", step.keyword.trim(), step.value));
                    break;
                }
            }
        }

        result.duration = started.elapsed();
        info!(
            scenario = %scenario.name,
            status = %result.status,
            duration_ms = result.duration.as_millis() as u64,
            "Scenario finished"
        );
        Ok(result)
    }

    async fn run_step(&self, ctx: &mut Context, step: &Step) -> StepOutcome {
        let kind = StepKind::from(step.ty);
        let text = format!("{kind} {}", step.value);

        let (definition, captures) = match self.registry.find(kind, &step.value) {
            Lookup::Found {
                definition,
                captures,
            } => (definition, captures),
            Lookup::Undefined => {
                warn!(step = %text, "Undefined step");
                return StepOutcome::Undefined;
            }
            Lookup::Ambiguous(patterns) => {
                warn!(step = %text, patterns = ?patterns, "Ambiguous step");
                return StepOutcome::Failed(vec![format!(
                    "{text}: ambiguous, matches {}",
                    patterns.join(" | ")
                )]);
            }
        };

        let args = StepArgs::new(
            captures,
            step.docstring.clone(),
            step.table.as_ref().map(|t| t.rows.clone()),
        );

        let handler = definition.handler();
        let outcome = handler(ctx, args).await;

        let mut errors: Vec<String> = ctx
            .take_failures()
            .into_iter()
            .map(|failure| format!("{text}: {failure}"))
            .collect();
        if let Err(e) = outcome {
            errors.push(format!("{text}: {e}"));
        }

        if errors.is_empty() {
            info!(step = %text, "Step passed");
            StepOutcome::Passed
        } else {
            warn!(step = %text, errors = ?errors, "Step failed");
            StepOutcome::Failed(errors)
        }
    }
}

fn background_steps(background: Option<&gherkin::Background>) -> Vec<&Step> {
    background.map(|b| b.steps.iter().collect()).unwrap_or_default()
}

/// Feature, rule and scenario tags, without `@`, first occurrence kept
fn scenario_tags(feature: &Feature, rule_tags: &[String], scenario: &Scenario) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in feature.tags.iter().chain(rule_tags).chain(&scenario.tags) {
        let tag = tag.trim_start_matches('@').to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::registry::StepResult;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    fn pass(_ctx: &mut Context, _args: StepArgs) -> BoxFuture<'_, StepResult> {
        async { Ok(()) }.boxed()
    }

    fn soft_fail(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
        async move {
            ctx.fail(format!("{} went wrong", args.str(1)?));
            Ok(())
        }
        .boxed()
    }

    fn hard_fail(_ctx: &mut Context, _args: StepArgs) -> BoxFuture<'_, StepResult> {
        async { Err(StepError::Failed("exploded".to_string())) }.boxed()
    }

    fn use_namespace(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
        async move {
            ctx.set_namespace(args.str(1)?);
            Ok(())
        }
        .boxed()
    }

    fn refuse(_ctx: &mut Context) -> BoxFuture<'_, StepResult> {
        async { Err(StepError::Failed("no credentials".to_string())) }.boxed()
    }

    fn runner() -> Runner {
        let mut registry = StepRegistry::new();
        registry
            .given("all is well", pass)
            .given(r#"I use namespace "([^"]*)""#, use_namespace)
            .when(r#""([^"]*)" fails softly"#, soft_fail)
            .when("it explodes", hard_fail)
            .then("something (.*)", pass)
            .then("something odd", pass)
            .before_tag("locked", refuse);
        Runner::new(registry).unwrap()
    }

    fn context() -> Context {
        Context::new(Settings::default()).unwrap()
    }

    async fn run(source: &str) -> Result<Vec<RunnerResult>, RunError> {
        let feature = Feature::parse(source, GherkinEnv::default()).unwrap();
        runner().run_feature(&mut context(), &feature).await
    }

    #[tokio::test]
    async fn test_passing_scenario() {
        let results = run(
            "Feature: Demo\n\n  Scenario: ok\n    Given all is well\n    Then something fine\n",
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].feature, "Demo");
        assert_eq!(results[0].scenario, "ok");
        assert_eq!(results[0].status, Status::Passed);
        assert!(results[0].errors.is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_stops_scenario() {
        let results = run(
            "Feature: Demo\n\n  Scenario: bad\n    When \"disk\" fails softly\n    And it explodes\n",
        )
        .await
        .unwrap();

        assert_eq!(results[0].status, Status::Failed);
        assert_eq!(results[0].errors.len(), 1);
        assert!(results[0].errors[0].contains("disk went wrong"));
    }

    #[tokio::test]
    async fn test_handler_error_fails_scenario() {
        let results = run("Feature: Demo\n\n  Scenario: boom\n    When it explodes\n")
            .await
            .unwrap();
        assert_eq!(results[0].status, Status::Failed);
        assert!(results[0].errors[0].contains("exploded"));
    }

    #[tokio::test]
    async fn test_undefined_step_skips() {
        let results = run(
            "Feature: Demo\n\n  Scenario: unknown\n    Given nobody wrote this step\n    Then something fine\n",
        )
        .await
        .unwrap();
        assert_eq!(results[0].status, Status::Skipped);
        assert!(results[0].errors[0].contains("nobody wrote this step"));
    }

    #[tokio::test]
    async fn test_ambiguous_step_fails() {
        let results = run("Feature: Demo\n\n  Scenario: odd\n    Then something odd\n")
            .await
            .unwrap();
        assert_eq!(results[0].status, Status::Failed);
        assert!(results[0].errors[0].contains("ambiguous"));
    }

    #[tokio::test]
    async fn test_skip_tag_and_outline() {
        let results = run(concat!(
            "Feature: Demo\n\n",
            "  @skip\n  Scenario: later\n    When it explodes\n\n",
            "  Scenario Outline: table\n    Given all is well\n\n",
            "    Examples:\n      | x |\n      | 1 |\n",
        ))
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == Status::Skipped));
    }

    #[tokio::test]
    async fn test_background_runs_before_each_scenario() {
        let feature = Feature::parse(
            concat!(
                "Feature: Demo\n\n",
                "  Background:\n    Given I use namespace \"bg\"\n\n",
                "  Scenario: one\n    Then something fine\n",
            ),
            GherkinEnv::default(),
        )
        .unwrap();

        let mut ctx = context();
        let results = runner().run_feature(&mut ctx, &feature).await.unwrap();
        assert_eq!(results[0].status, Status::Passed);
        assert_eq!(ctx.namespace().unwrap(), "bg");
    }

    #[tokio::test]
    async fn test_hook_failure_is_fatal() {
        let err = run("Feature: Demo\n\n  @locked\n  Scenario: guarded\n    Given all is well\n")
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Hook { ref tag, .. } if tag == "locked"));
    }

    #[tokio::test]
    async fn test_rule_scenarios_run_after_top_level() {
        let results = run(concat!(
            "Feature: Demo\n\n",
            "  Scenario: top\n    Given all is well\n\n",
            "  Rule: grouped\n\n",
            "    Scenario: inner\n      Given all is well\n",
        ))
        .await
        .unwrap();

        let names: Vec<&str> = results.iter().map(|r| r.scenario.as_str()).collect();
        assert_eq!(names, vec!["top", "inner"]);
    }

    #[test]
    fn test_invalid_registry_is_rejected() {
        let mut registry = StepRegistry::new();
        registry.given("twice", pass).given("twice", pass);
        assert!(matches!(
            Runner::new(registry),
            Err(RunError::Registry(RegistryError::DuplicatePattern(_)))
        ));
    }

    #[test]
    fn test_discover_sorts_features() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.feature"), "Feature: B\n").unwrap();
        std::fs::write(dir.path().join("nested/a.feature"), "Feature: A\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = Runner::discover(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("b.feature"), dir.path().join("nested/a.feature")]
        );

        let single = Runner::discover(&dir.path().join("b.feature")).unwrap();
        assert_eq!(single.len(), 1);

        assert!(matches!(
            Runner::discover(&dir.path().join("missing")),
            Err(RunError::NotFound(_))
        ));
    }

    #[test]
    fn test_summary() {
        let result = |status| RunnerResult {
            feature: "F".to_string(),
            scenario: "S".to_string(),
            status,
            errors: Vec::new(),
            duration: Duration::ZERO,
        };
        let summary = RunSummary::from_results(&[
            result(Status::Passed),
            result(Status::Failed),
            result(Status::Skipped),
            result(Status::Passed),
        ]);
        assert_eq!(summary.total(), 4);
        assert!(summary.has_failures());
        assert_eq!(
            summary.to_string(),
            "4 scenarios (2 passed, 1 failed, 1 skipped)"
        );
    }
}
