//! Step registry: Gherkin phrases bound to handlers
//!
//! A `StepRegistry` is an explicit table of `{pattern, handler}` entries
//! grouped by step kind. Domain modules add their steps through
//! `register(&mut StepRegistry)`; nothing is registered implicitly.
//!
//! # Example
//!
//! ```ignore
//! use futures::FutureExt;
//!
//! fn use_project(ctx: &mut Context, args: StepArgs) -> BoxFuture<'_, StepResult> {
//!     async move {
//!         ctx.use_project(args.str(1)?).await?;
//!         Ok(())
//!     }
//!     .boxed()
//! }
//!
//! let mut registry = StepRegistry::new();
//! registry.given(r#"I use the project "([^"]*)""#, use_project);
//! registry.validate()?;
//! ```

use crate::context::{Context, ContextError};
use futures::future::BoxFuture;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a step handler
pub type StepResult = Result<(), StepError>;

/// A step handler
pub type Handler =
    dyn for<'a> Fn(&'a mut Context, StepArgs) -> BoxFuture<'a, StepResult> + Send + Sync;

/// A before-scenario hook bound to a tag
pub type Hook = dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, StepResult> + Send + Sync;

/// Gherkin step keyword after `And`/`But` are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Given,
    When,
    Then,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Given => write!(f, "Given"),
            StepKind::When => write!(f, "When"),
            StepKind::Then => write!(f, "Then"),
        }
    }
}

impl From<gherkin::StepType> for StepKind {
    fn from(ty: gherkin::StepType) -> Self {
        match ty {
            gherkin::StepType::Given => StepKind::Given,
            gherkin::StepType::When => StepKind::When,
            gherkin::StepType::Then => StepKind::Then,
        }
    }
}

/// Errors a step can end with
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("invalid step argument: {0}")]
    Argument(String),

    #[error("{0}")]
    Failed(String),
}

/// Errors found by `StepRegistry::validate`
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("step pattern registered twice: {0}")]
    DuplicatePattern(String),

    #[error("invalid step pattern '{pattern}': {error}")]
    InvalidPattern { pattern: String, error: String },
}

/// Arguments handed to a step handler
#[derive(Debug, Clone, Default)]
pub struct StepArgs {
    captures: Vec<Option<String>>,
    docstring: Option<String>,
    table: Option<Vec<Vec<String>>>,
}

impl StepArgs {
    pub fn new(
        captures: Vec<Option<String>>,
        docstring: Option<String>,
        table: Option<Vec<Vec<String>>>,
    ) -> Self {
        Self {
            captures,
            docstring,
            table,
        }
    }

    /// Capture group `index` (1-based, as in the pattern)
    pub fn str(&self, index: usize) -> Result<&str, StepError> {
        index
            .checked_sub(1)
            .and_then(|i| self.captures.get(i))
            .and_then(|c| c.as_deref())
            .ok_or_else(|| StepError::Argument(format!("capture group {index} did not match")))
    }

    /// Whether optional capture group `index` matched
    pub fn has(&self, index: usize) -> bool {
        self.str(index).is_ok()
    }

    /// Capture group `index` parsed into `T`
    pub fn parse<T>(&self, index: usize) -> Result<T, StepError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.str(index)?;
        raw.parse::<T>()
            .map_err(|e| StepError::Argument(format!("'{raw}': {e}")))
    }

    /// Duration from an amount group and a unit group ("30", "seconds")
    pub fn duration(&self, amount: usize, unit: usize) -> Result<Duration, StepError> {
        let value: u64 = self.parse(amount)?;
        let unit = self.str(unit)?;
        crate::context::parsing::parse_duration(value, unit).map_err(StepError::Argument)
    }

    /// The doc string attached to the step
    pub fn docstring(&self) -> Result<&str, StepError> {
        self.docstring
            .as_deref()
            .ok_or_else(|| StepError::Argument("step needs a doc string".to_string()))
    }

    /// The data table attached to the step, header row included
    pub fn table(&self) -> Result<&[Vec<String>], StepError> {
        self.table
            .as_deref()
            .ok_or_else(|| StepError::Argument("step needs a data table".to_string()))
    }

    /// Rows of a two-column table after its header row
    pub fn table_pairs(&self) -> Result<Vec<(String, String)>, StepError> {
        self.table()?
            .iter()
            .skip(1)
            .map(|row| match row.as_slice() {
                [key, value] => Ok((key.clone(), value.clone())),
                _ => Err(StepError::Argument(format!(
                    "expected two columns, got {}",
                    row.len()
                ))),
            })
            .collect()
    }
}

/// One registered step
pub struct StepDefinition {
    kind: StepKind,
    source: String,
    regex: Option<Regex>,
    handler: Arc<Handler>,
}

impl StepDefinition {
    pub fn kind(&self) -> StepKind {
        self.kind
    }

    /// The pattern as registered
    pub fn pattern(&self) -> &str {
        &self.source
    }

    pub fn handler(&self) -> Arc<Handler> {
        self.handler.clone()
    }

    fn captures(&self, text: &str) -> Option<Vec<Option<String>>> {
        let caps = self.regex.as_ref()?.captures(text)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect(),
        )
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("kind", &self.kind)
            .field("pattern", &self.source)
            .finish()
    }
}

/// Result of looking a step up
pub enum Lookup<'r> {
    Found {
        definition: &'r StepDefinition,
        captures: Vec<Option<String>>,
    },
    Undefined,
    /// Patterns of every matching definition
    Ambiguous(Vec<String>),
}

/// Explicit table of step definitions and tag hooks
#[derive(Default)]
pub struct StepRegistry {
    steps: Vec<StepDefinition>,
    hooks: Vec<(String, Arc<Hook>)>,
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.steps.len())
            .field("hooks", &self.hooks.iter().map(|(t, _)| t).collect::<Vec<_>>())
            .finish()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn given<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, StepArgs) -> BoxFuture<'a, StepResult>
            + Send
            + Sync
            + 'static,
    {
        self.add(StepKind::Given, pattern, handler)
    }

    pub fn when<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, StepArgs) -> BoxFuture<'a, StepResult>
            + Send
            + Sync
            + 'static,
    {
        self.add(StepKind::When, pattern, handler)
    }

    pub fn then<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, StepArgs) -> BoxFuture<'a, StepResult>
            + Send
            + Sync
            + 'static,
    {
        self.add(StepKind::Then, pattern, handler)
    }

    /// Register a step; the pattern is anchored at both ends
    ///
    /// An invalid pattern never matches and is reported by `validate`.
    pub fn add<F>(&mut self, kind: StepKind, pattern: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, StepArgs) -> BoxFuture<'a, StepResult>
            + Send
            + Sync
            + 'static,
    {
        let regex = Regex::new(&anchored(pattern)).ok();
        self.steps.push(StepDefinition {
            kind,
            source: pattern.to_string(),
            regex,
            handler: Arc::new(handler),
        });
        self
    }

    /// Run `hook` before every scenario carrying `@tag`
    pub fn before_tag<F>(&mut self, tag: &str, hook: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
    {
        self.hooks
            .push((tag.trim_start_matches('@').to_string(), Arc::new(hook)));
        self
    }

    /// Hooks registered for a tag (with or without the `@`)
    pub fn hooks_for(&self, tag: &str) -> Vec<Arc<Hook>> {
        let tag = tag.trim_start_matches('@');
        self.hooks
            .iter()
            .filter(|(t, _)| t == tag)
            .map(|(_, h)| h.clone())
            .collect()
    }

    /// Check every pattern compiles and none is registered twice
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();

        for step in &self.steps {
            if let Err(e) = Regex::new(&anchored(&step.source)) {
                return Err(RegistryError::InvalidPattern {
                    pattern: step.source.clone(),
                    error: e.to_string(),
                });
            }
            if !seen.insert(step.source.as_str()) {
                return Err(RegistryError::DuplicatePattern(step.source.clone()));
            }
        }

        Ok(())
    }

    /// Find the definition for a step
    ///
    /// Definitions of the step's own kind are searched first. When none of
    /// them matches, the other kinds are searched, so a phrase registered
    /// as `Given` also works after `When`.
    pub fn find(&self, kind: StepKind, text: &str) -> Lookup<'_> {
        let own = self.matching(text, |k| k == kind);
        if !own.is_empty() {
            return Self::resolve(own);
        }
        Self::resolve(self.matching(text, |k| k != kind))
    }

    fn matching(
        &self,
        text: &str,
        accept: impl Fn(StepKind) -> bool,
    ) -> Vec<(&StepDefinition, Vec<Option<String>>)> {
        self.steps
            .iter()
            .filter(|step| accept(step.kind))
            .filter_map(|step| step.captures(text).map(|caps| (step, caps)))
            .collect()
    }

    fn resolve(mut found: Vec<(&StepDefinition, Vec<Option<String>>)>) -> Lookup<'_> {
        match found.len() {
            0 => Lookup::Undefined,
            1 => {
                let (definition, captures) = found.remove(0);
                Lookup::Found {
                    definition,
                    captures,
                }
            }
            _ => Lookup::Ambiguous(found.iter().map(|(d, _)| d.source.clone()).collect()),
        }
    }

    /// Every registered definition, in registration order
    pub fn definitions(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn anchored(pattern: &str) -> String {
    format!("^(?:{})$", pattern.trim_start_matches('^').trim_end_matches('$'))
}
