//! gherkube - behaviour-driven end-to-end tests for Kubernetes and OpenShift
//!
//! Feature files written in Gherkin drive a running cluster through its
//! REST API. Each step is matched against an explicit [`StepRegistry`] and
//! run against a shared [`Context`] that holds the session, the working
//! project and any open tunnels.
//!
//! # Example (Rust)
//!
//! ```no_run
//! use gherkube::{steps, Context, Report, Runner, RunSummary, Settings};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = Runner::new(steps::registry())?;
//!     let mut ctx = Context::new(Settings::from_env()?)?;
//!
//!     let results = runner.run_path(&mut ctx, Path::new("features")).await?;
//!     ctx.close_all_tunnels().await;
//!
//!     println!("{}", RunSummary::from_results(&results));
//!     Report::from_results(&results).write_file(Path::new("junit.xml"))?;
//!     Ok(())
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Run every feature below ./features, writing a JUnit report
//! OPENSHIFT_HOST=https://api.example.com:6443 OPENSHIFT_TOKEN=... \
//!     gherkube --junit report.xml features
//! ```

pub mod config;
pub mod context;
pub mod eventually;
pub mod junit;
pub mod oauth;
pub mod registry;
pub mod runner;
pub mod steps;
pub mod telemetry;
pub mod tunnel;
pub mod wait;

// Re-export commonly used types
pub use config::{Backoff, ConfigError, LoginConfig, Settings};
pub use context::{Context, ContextError, Gvr, ResourceRef};
pub use eventually::{eventually, ConditionError};
pub use junit::{Report, ReportError};
pub use registry::{Lookup, StepArgs, StepError, StepKind, StepRegistry, StepResult};
pub use runner::{RunError, RunSummary, Runner, RunnerResult, Status};
pub use tunnel::{Tunnel, TunnelError};
pub use wait::{WaitError, WaitOutcome};
