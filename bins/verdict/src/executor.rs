/// Run Executor - High-Level Orchestration
///
/// **Pipeline:**
/// 1. Create the staging directory
/// 2. Write the submitted source
/// 3. Compile it with rustc (test mode)
/// 4. Locate the `#[test]` entry point, build the driver, execute it
/// 5. Clean up the staging directory
///
/// Anything that goes wrong inside steps 2-4 is recorded on the
/// `TestRunResult`. Only failures that make the run itself meaningless
/// (invalid class name, oversized source, staging I/O) are returned as
/// errors. Cleanup runs on every outcome.

use crate::compiler::Compiler;
use crate::config::RunnerConfig;
use crate::staging::StagingArea;
use crate::{driver, engine, evaluator, locator};
use anyhow::{bail, Result};
use tracing::{debug, info, instrument, warn};
use verdict_common::types::{TestRunResult, TestStatus};

/// Safety limit to keep pathological inputs away from the compiler
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB

/// Class names double as file stems and crate names
pub fn validate_class_name(class_name: &str) -> Result<()> {
    let mut chars = class_name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || class_name == "_" {
        bail!(
            "Invalid class name '{}': expected an identifier such as UsersApiTest",
            class_name.escape_debug()
        );
    }
    Ok(())
}

/// rustc accepted the source but syn could not parse it (syntax newer than
/// syn). Recorded as a compilation failure, labelled so it is not mistaken
/// for compiler output.
fn entry_lookup_failed(result: &mut TestRunResult, err: &anyhow::Error) {
    result.compilation_failed(format!(
        "Entry point lookup failed: rustc accepted the source, but it could not be \
         parsed to find the #[test] function: {:#}",
        err
    ));
}

#[instrument(
    skip(source_code, config),
    fields(run_id = %uuid::Uuid::new_v4(), source_size = source_code.len())
)]
pub async fn run(class_name: &str, source_code: &str, config: &RunnerConfig) -> Result<TestRunResult> {
    validate_class_name(class_name)?;
    if source_code.len() > MAX_SOURCE_CODE_BYTES {
        bail!(
            "Source code exceeds maximum size of {} bytes",
            MAX_SOURCE_CODE_BYTES
        );
    }

    info!("Starting run");
    let mut result = TestRunResult::new(class_name);

    // Step 1: Create staging directory
    let staging = StagingArea::create(&config.temp_root)?;

    // Steps 2-4: Stage, compile, execute
    let outcome = run_staged(&staging, source_code, config, &mut result).await;

    // Step 5: Cleanup, regardless of how far the pipeline got
    staging.cleanup(config.keep_artifacts);

    outcome?;

    info!(
        status = %result.status,
        execution_ms = result.execution_time.as_millis(),
        "Run completed"
    );
    Ok(result)
}

async fn run_staged(
    staging: &StagingArea,
    source_code: &str,
    config: &RunnerConfig,
    result: &mut TestRunResult,
) -> Result<()> {
    let class_name = result.class_name.clone();

    // Step 2: Write source code to file
    let source_path = staging.write_source(&class_name, source_code)?;
    result.source_file = source_path.display().to_string();
    debug!(source_file = %result.source_file, "Source staged");

    // Step 3: Compile
    let compiler = Compiler::new(config);
    match compiler.check_source(staging, &class_name).await {
        Ok(output) if output.success => {
            result.compilation_succeeded();
            if !output.diagnostics.is_empty() {
                debug!(diagnostics = %output.diagnostics, "Compiled with warnings");
            }
        }
        Ok(output) => {
            warn!("Compilation failed");
            result.compilation_failed(output.diagnostics);
            return Ok(());
        }
        Err(e) => {
            warn!(error = %e, "Compiler unavailable");
            result.compilation_failed(format!(
                "Rust compiler not available. Make sure rustc is installed and on PATH: {:#}",
                e
            ));
            return Ok(());
        }
    }

    // Step 4a: Locate entry point
    let file = match locator::parse_source(source_code) {
        Ok(file) => file,
        Err(e) => {
            warn!(error = %e, "Entry point lookup could not parse accepted source");
            entry_lookup_failed(result, &e);
            return Ok(());
        }
    };

    let Some(entry) = locator::locate_entry_point(&file) else {
        info!("No entry point found");
        result.status = TestStatus::TestMethodNotFound;
        result.execution_errors = format!("No #[test] function found in {}", class_name);
        return Ok(());
    };
    debug!(entry_point = %entry.qualified_name(), "Entry point located");

    // Step 4b: Build driver
    let driver_source = match driver::instrument(source_code, &file, &entry) {
        Ok(source) => source,
        Err(e) => {
            result.compilation_failed(format!("{:#}", e));
            return Ok(());
        }
    };
    staging.write_driver(&class_name, &driver_source)?;

    match compiler.build_driver(staging, &class_name).await {
        Ok(output) if output.success => {}
        Ok(output) => {
            warn!("Driver build failed");
            result.compilation_failed(output.diagnostics);
            return Ok(());
        }
        Err(e) => {
            result.compilation_failed(format!("{:#}", e));
            return Ok(());
        }
    }

    // Step 4c: Execute
    let binary = staging.artifact_path(&class_name);
    match engine::execute(&binary, staging.root(), config.timeout_ms).await {
        Ok(output) => evaluator::evaluate(result, output),
        Err(e) => {
            warn!(error = %e, "Entry point could not be executed");
            result.status = TestStatus::Failed;
            result.execution_errors = format!("{:#}", e);
        }
    }

    debug_assert!(result.is_terminal());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_class_names() {
        for name in ["UsersApiTest", "api_test", "_Private", "T1"] {
            assert!(validate_class_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_class_names() {
        for name in ["", "_", "1Test", "../etc/passwd", "Users-Api", "Users Api", "Ünïcode"] {
            assert!(validate_class_name(name).is_err(), "{} should be invalid", name);
        }
    }

    #[test]
    fn test_entry_lookup_failure_is_labelled() {
        let mut result = TestRunResult::new("Newer");
        result.compilation_succeeded();
        let err = locator::parse_source("fn broken( {").err().unwrap();

        entry_lookup_failed(&mut result, &err);

        assert_eq!(result.status, TestStatus::CompilationFailed);
        assert!(result
            .compilation_errors
            .starts_with("Entry point lookup failed: rustc accepted the source"));
        assert!(result.compilation_errors.contains("Failed to parse source"));
    }

    #[tokio::test]
    async fn test_invalid_class_name_is_top_level_error() {
        let root = tempfile::tempdir().unwrap();
        let config = RunnerConfig {
            temp_root: root.path().to_path_buf(),
            ..Default::default()
        };

        let err = run("../escape", "#[test] fn t() {}", &config).await.unwrap_err();
        assert!(err.to_string().contains("Invalid class name"));
        // nothing was staged
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_source_is_top_level_error() {
        let root = tempfile::tempdir().unwrap();
        let config = RunnerConfig {
            temp_root: root.path().to_path_buf(),
            ..Default::default()
        };
        let source = "/".repeat(MAX_SOURCE_CODE_BYTES + 1);

        let err = run("Huge", &source, &config).await.unwrap_err();
        assert!(err.to_string().contains("maximum size"));
    }
}
