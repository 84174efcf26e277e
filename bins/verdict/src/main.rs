mod compiler;
mod config;
mod driver;
mod engine;
mod evaluator;
mod executor;
mod locator;
mod staging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{ConfigOverrides, RunnerConfig};
use std::process::ExitCode;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error};
use verdict_common::report::{self, ErrorReport, RunReport};

#[derive(Debug, Parser)]
#[command(name = "verdict")]
#[command(about = "Verdict - Compile a Rust source and run its #[test] entry point", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile the source and run its first #[test] function
    Run {
        /// Name of the test class; used as file stem and crate name
        class_name: String,

        /// Complete Rust source, or `-` to read it from stdin
        source_code: String,
    },

    /// Report whether the Rust compiler is available
    Check,
}

fn init_tracing(json: bool) {
    // stdout carries the report, so logs go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// What the process prints on stdout and exits with
#[derive(Debug)]
struct Outcome {
    document: String,
    exit_code: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let outcome = dispatch(cli, tokio::io::stdin()).await;
    if !outcome.document.is_empty() {
        println!("{}", outcome.document);
    }
    ExitCode::from(outcome.exit_code)
}

/// Run the selected command and map it onto a JSON document and exit code.
/// `stdin` backs the `-` source argument.
async fn dispatch<R>(cli: Cli, stdin: R) -> Outcome
where
    R: AsyncRead + Unpin,
{
    let result = match cli.command {
        Commands::Run {
            class_name,
            source_code,
        } => run_command(&cli.overrides, &class_name, source_code, stdin).await,
        Commands::Check => check_command(&cli.overrides).await,
    };

    match result {
        Ok(document) => Outcome {
            document,
            exit_code: 0,
        },
        Err(e) => {
            error!(error = %e, "Run aborted");
            let error_report = ErrorReport::new(e.to_string(), format!("{:?}", e));
            let document = report::render(&error_report).unwrap_or_else(|render_err| {
                error!(error = %render_err, "Failed to render error report");
                String::new()
            });
            Outcome {
                document,
                exit_code: 1,
            }
        }
    }
}

async fn run_command<R>(
    overrides: &ConfigOverrides,
    class_name: &str,
    source_code: String,
    mut stdin: R,
) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let config = RunnerConfig::resolve(overrides)?;
    debug!(config = ?config, "Configuration resolved");

    let source_code = if source_code == "-" {
        let mut buffer = String::new();
        stdin
            .read_to_string(&mut buffer)
            .await
            .context("Failed to read source code from stdin")?;
        buffer
    } else {
        source_code
    };

    let result = executor::run(class_name, &source_code, &config).await?;
    report::render(&RunReport::from(&result)).context("Failed to serialize run result")
}

async fn check_command(overrides: &ConfigOverrides) -> Result<String> {
    let config = RunnerConfig::resolve(overrides)?;
    let status = compiler::check_toolchain(&config).await;
    report::render(&status).context("Failed to serialize toolchain status")
}
