use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, error};

use crate::config::Config;
use crate::engine::{TaskList, TaskRunner};
use crate::error::RunnerError;
use crate::utils::ShellProcessor;

#[derive(Parser)]
#[command(name = "csvrunner")]
#[command(about = "Run a command over every row of a CSV file with a bounded worker pool")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true)]
    pub verbose: bool,

    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every row of the input file
    Run {
        #[arg(short, long, help = "Input CSV file, one task per row")]
        input: PathBuf,

        #[arg(short, long, help = "Output CSV file, results are appended")]
        output: PathBuf,

        #[arg(long, help = "Shell command run per row; fields are passed as $1, $2, ...")]
        command: String,

        #[arg(short, long, help = "Maximum concurrent workers")]
        workers: Option<usize>,

        #[arg(long, help = "Batch timeout in milliseconds (0 disables it)")]
        timeout_ms: Option<u64>,

        #[arg(long, help = "Write a JSON run report to this path")]
        report: Option<PathBuf>,
    },

    /// Count the tasks in an input file
    Count {
        #[arg(short, long, help = "Input CSV file")]
        input: PathBuf,
    },

    /// Initialize the configuration
    Init {
        #[arg(short, long, help = "Force overwrite existing configuration")]
        force: bool,
    },
}

pub async fn execute_command(command: &Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run { input, output, command, workers, timeout_ms, report } => {
            handle_run_command(input, output, command, *workers, *timeout_ms, report.as_deref(), config).await
        },
        Commands::Count { input } => {
            handle_count_command(input)
        },
        Commands::Init { force } => {
            handle_init_command(*force)
        },
    }
}

async fn handle_run_command(
    input: &Path,
    output: &Path,
    command: &str,
    workers: Option<usize>,
    timeout_ms: Option<u64>,
    report_path: Option<&Path>,
    config: &Config,
) -> Result<()> {
    let mut runner_config = config.runner.clone();
    if let Some(workers) = workers {
        runner_config.max_workers = workers;
    }
    if let Some(timeout_ms) = timeout_ms {
        runner_config.batch_timeout_ms = timeout_ms;
    }

    let processor = ShellProcessor::with_program(config.shell.program.clone(), command);
    let runner = TaskRunner::new(input, output, processor, runner_config)?;

    let outcome = runner.run().await;

    let report = match &outcome {
        Ok(report) => Some(report),
        Err(e) => e.report(),
    };
    if let (Some(report), Some(path)) = (report, report_path) {
        report.save(path)
            .with_context(|| format!("Failed to save run report to {}", path.display()))?;
        info!("Run report written to {}", path.display());
    }

    match outcome {
        Ok(report) => {
            println!("Processed {} tasks into {}", report.succeeded, output.display());
            Ok(())
        },
        Err(RunnerError::ItemsFailed { failed, total, report }) => {
            for failure in &report.failures {
                error!("Row {} [{}] failed during {}: {}", failure.index + 1, failure.item.join(","), failure.phase, failure.error);
            }
            Err(anyhow::anyhow!("{} of {} tasks failed", failed, total))
        },
        Err(e) => Err(anyhow::anyhow!("Run failed during {}: {}", e.phase(), e)),
    }
}

fn handle_count_command(input: &Path) -> Result<()> {
    let tasks = TaskList::load(input)?;
    println!("{}", tasks.len());
    Ok(())
}

fn handle_init_command(force: bool) -> Result<()> {
    let config_path = Config::init(force)?;
    println!("Configuration initialized at {}", config_path.display());
    Ok(())
}
