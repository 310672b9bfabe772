use clap::{CommandFactory, Parser};
use gherkube::telemetry::init_logging;
use gherkube::{steps, Context, Report, RunSummary, Runner, RunnerResult, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Run Gherkin features against a Kubernetes or OpenShift cluster
#[derive(Parser, Debug)]
#[command(name = "gherkube", version, about)]
struct Cli {
    /// Write a JUnit XML report to this file
    #[arg(long, value_name = "FILE")]
    junit: Option<PathBuf>,

    /// Exit with status 1 when a scenario failed
    #[arg(long)]
    strict: bool,

    /// Directories (or single files) holding `.feature` files
    #[arg(value_name = "DIR")]
    dirs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.dirs.is_empty() {
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::FAILURE;
    }

    init_logging("info");

    match run(&cli).await {
        Ok(summary) => {
            println!("{summary}");
            if cli.strict && summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let runner = Runner::new(steps::registry())?;
    let mut ctx = Context::new(Settings::from_env()?)?;

    let mut results: Vec<RunnerResult> = Vec::new();
    let mut outcome = Ok(());
    for dir in &cli.dirs {
        info!(dir = %dir.display(), "Running features");
        match runner.run_path(&mut ctx, dir).await {
            Ok(found) => results.extend(found),
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    ctx.close_all_tunnels().await;

    if let Some(path) = &cli.junit {
        Report::from_results(&results).write_file(path)?;
        info!(file = %path.display(), "JUnit report written");
    }

    outcome?;
    Ok(RunSummary::from_results(&results))
}
