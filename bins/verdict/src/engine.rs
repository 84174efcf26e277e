/// Execution Engine - Runs the Compiled Entry Point
///
/// **Core Responsibility:**
/// Launch the driver binary, capture stdout/stderr into buffers, and time it.
///
/// **Boundary:**
/// - Engine knows HOW to execute (child process, pipes, timeout)
/// - Engine does NOT decide pass/fail; `evaluator` classifies the raw output
///
/// The child runs with `RUST_BACKTRACE=1` so a panicking entry point leaves
/// a stack trace on stderr. If a timeout is configured and expires, the
/// child is killed (`kill_on_drop`) and whatever it produced is discarded.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Raw output of a single entry point execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub execution_time: Duration,
    /// Display form of the exit status, e.g. `exit status: 101`
    pub exit_status: String,
    pub runtime_error: bool,
    pub timed_out: bool,
}

pub async fn execute(binary: &Path, workdir: &Path, timeout_ms: Option<u64>) -> Result<ExecutionOutput> {
    let mut cmd = Command::new(binary);
    cmd.current_dir(workdir)
        .env("RUST_BACKTRACE", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .with_context(|| format!("Failed to launch {}", binary.display()))?;

    debug!(binary = %binary.display(), pid = ?child.id(), "Entry point started");

    let start_time = Instant::now();
    let completion = child.wait_with_output();

    let output = match timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), completion).await {
            Ok(result) => result,
            Err(_) => {
                // Dropping the future drops the child, which kills it
                warn!(timeout_ms = ms, "Entry point timed out");
                return Ok(ExecutionOutput {
                    execution_time: Duration::from_millis(ms),
                    exit_status: "killed after timeout".to_string(),
                    runtime_error: false,
                    timed_out: true,
                    ..Default::default()
                });
            }
        },
        None => completion.await,
    }
    .context("Failed to collect entry point output")?;

    let execution_time = start_time.elapsed();

    Ok(ExecutionOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        execution_time,
        exit_status: output.status.to_string(),
        runtime_error: !output.status.success(),
        timed_out: false,
    })
}
