//! One-shot command-line runner for the Kiln pipeline
//!
//! Runs a single prompt through the full pipeline and prints the report:
//! install outcomes, execution output, and published artifact links. Useful
//! for trying prompts against a configuration without standing up the
//! server.

use anyhow::Result;
use clap::Parser;
use kiln_core::pipeline::{ExecutionOutcome, InstallStatus, PipelineReport};
use kiln_core::publish::PublishStatus;
use kiln_core::{ConfigLoader, Pipeline};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Kiln - run one prompt through the code-execution pipeline")]
struct Cli {
    /// The user prompt to run.
    prompt: String,

    #[clap(long, short, default_value = "kiln.yaml", help = "Path to the YAML configuration file")]
    config: String,

    #[clap(long, short, default_value = "warn")]
    log_level: String,

    /// Print the full report as JSON instead of the human-readable summary.
    #[clap(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let config = ConfigLoader::from_file(&cli.config).await?;
    let pipeline = Pipeline::from_config(&config)?;

    let report = pipeline.run(&cli.prompt).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &PipelineReport) {
    for outcome in &report.installs {
        let label = match &outcome.status {
            InstallStatus::SkippedPreinstalled { package } => {
                format!("skipped (preinstalled: {})", package)
            }
            InstallStatus::Rejected { reason } => format!("rejected ({})", reason),
            InstallStatus::Completed { exit_code: Some(0) } => "ok".to_string(),
            InstallStatus::Completed { exit_code } => format!("exit {:?}", exit_code),
            InstallStatus::Failed { error } => format!("failed ({})", error),
        };
        println!("install: {} -> {}", outcome.command, label);
    }

    match &report.execution {
        ExecutionOutcome::NotRun => println!("no code to execute"),
        ExecutionOutcome::Refused { message } => println!("refused: {}", message),
        ExecutionOutcome::Completed { exit_code, output } => {
            println!("execution (exit {:?}):", exit_code);
            print!("{}", output);
        }
        ExecutionOutcome::TimedOut {
            timeout_secs,
            output,
        } => {
            println!("execution timed out after {}s:", timeout_secs);
            print!("{}", output);
        }
        ExecutionOutcome::Failed { error } => println!("execution failed: {}", error),
    }

    for outcome in &report.artifacts {
        match &outcome.status {
            PublishStatus::Uploaded { artifact } => println!("artifact: {}", artifact.public_url),
            PublishStatus::Failed { error } => {
                println!("artifact failed: {} ({})", outcome.file.display(), error)
            }
        }
    }
}
