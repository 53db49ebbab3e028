//! Argument parsing and command dispatch.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use stowage_config::{JobSpec, load_output_config};
use stowage_output::{OutputContext, OutputJob};
use stowage_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, Metrics, init_logging};
use tracing::info;

use crate::output::{JobPlan, print_json};
use crate::runtime::{Feed, execute};

/// Parses CLI arguments, executes the requested command, and reports failures on
/// stderr. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        ..LoggingConfig::default()
    };
    if let Err(err) = init_logging(&logging) {
        let err = CliError::failure(err);
        eprintln!("error: {}", err.display_message());
        return err.exit_code();
    }

    let metrics = match Metrics::new() {
        Ok(metrics) => metrics,
        Err(err) => {
            let err = CliError::failure(err);
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let result = dispatch(cli.command, &metrics).await;

    if cli.metrics {
        match metrics.render() {
            Ok(text) => eprint!("{text}"),
            Err(err) => eprintln!("error: failed to render metrics: {err}"),
        }
    }

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(command: Command, metrics: &Metrics) -> CliResult<()> {
    match command {
        Command::Run(args) => {
            let job = prepare_job(&args.job.config, metrics)?;
            let feed = Feed {
                tasks: usize::from(args.tasks),
                max_file_bytes: args.max_file_bytes,
                inputs: args.inputs,
            };
            let report = execute(job, feed).await.map_err(CliError::Failure)?;
            info!(files = report.files.len(), "job finished");
            print_json(&report)
        }
        Command::Resume(args) => {
            OutputJob::resume(&load_spec(&args.config)?).map_err(CliError::failure)?;
            Ok(())
        }
        Command::Plan(args) => print_json(&JobPlan::from_spec(&load_spec(&args.config)?)),
    }
}

fn load_spec(path: &Path) -> CliResult<JobSpec> {
    let config = load_output_config(path).map_err(CliError::invalid)?;
    JobSpec::resolve(config).map_err(CliError::invalid)
}

fn prepare_job(path: &Path, metrics: &Metrics) -> CliResult<OutputJob> {
    let spec = load_spec(path)?;
    let context = OutputContext::connect(&spec, metrics.clone()).map_err(CliError::failure)?;
    Ok(OutputJob::new(spec, context))
}

#[derive(Parser, Debug)]
#[command(
    name = "stowage",
    version,
    about = "Write sequenced output files under a conflict-resolution mode"
)]
struct Cli {
    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "STOWAGE_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
    /// Log output format (`pretty` or `json`).
    #[arg(long, global = true, env = "STOWAGE_LOG_FORMAT", value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
    /// Print prometheus metrics to stderr when the command finishes.
    #[arg(long, global = true)]
    metrics: bool,
    #[command(subcommand)]
    command: Command,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a job, writing each input file through the task writers.
    Run(RunArgs),
    /// Resume an interrupted job (always fails: resuming is not supported).
    Resume(JobArgs),
    /// Print the resolved job without touching the filesystem.
    Plan(JobArgs),
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Path to the JSON job document.
    #[arg(long, short = 'c')]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    job: JobArgs,
    /// Number of parallel tasks; inputs are assigned round-robin.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    tasks: u16,
    /// Start a new file before a chunk would push the current one past this size.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_file_bytes: Option<u64>,
    /// Input files; each one starts a new output file.
    inputs: Vec<PathBuf>,
}

#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    fn invalid(error: impl Into<anyhow::Error>) -> Self {
        Self::Validation(format!("{:#}", error.into()))
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}
