/// Compiler - rustc Invocation
///
/// Two compilations happen per run:
/// 1. `check_source`: the staged source as submitted, in test mode, metadata
///    only. Its diagnostics are what the caller sees on failure.
/// 2. `build_driver`: the instrumented driver, into a runnable binary. Lints
///    are capped (the user already saw them) and the driver path is remapped
///    onto the source path.
///
/// rustc always runs from the staging root with relative paths, so
/// diagnostics read `src/<ClassName>.rs:3:5` instead of a temp path.

use crate::config::RunnerConfig;
use crate::staging::{StagingArea, DRIVER_DIR, SOURCE_DIR};
use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use verdict_common::types::ToolchainStatus;

/// Outcome of one rustc invocation
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub success: bool,
    /// Everything rustc wrote to stderr (errors and warnings)
    pub diagnostics: String,
}

/// Crate name for a class: `UsersApiTest` -> `users_api_test`.
/// Keeps rustc's snake-case crate name warning out of the diagnostics.
pub fn crate_name(class_name: &str) -> String {
    let mut name = String::with_capacity(class_name.len() + 4);
    let mut prev: Option<char> = None;
    for c in class_name.chars() {
        if c.is_ascii_uppercase() {
            if matches!(prev, Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit()) {
                name.push('_');
            }
            name.push(c.to_ascii_lowercase());
        } else if c == '_' {
            if !name.ends_with('_') {
                name.push('_');
            }
        } else {
            name.push(c);
        }
        prev = Some(c);
    }
    name
}

pub struct Compiler<'a> {
    config: &'a RunnerConfig,
}

impl<'a> Compiler<'a> {
    pub fn new(config: &'a RunnerConfig) -> Self {
        Self { config }
    }

    fn base_command(&self, staging: &StagingArea, class_name: &str) -> Command {
        let mut cmd = Command::new(&self.config.rustc);
        cmd.current_dir(staging.root())
            .arg("--edition")
            .arg(&self.config.edition)
            .arg("--color")
            .arg("never")
            .arg("--crate-name")
            .arg(crate_name(class_name));

        for path in &self.config.library_paths {
            cmd.arg("-L").arg(path);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Type-check the submitted source the way `cargo test` would see it
    pub async fn check_source(&self, staging: &StagingArea, class_name: &str) -> Result<CompileOutput> {
        let mut cmd = self.base_command(staging, class_name);
        cmd.arg("--test")
            .arg("--emit=metadata")
            .arg("--out-dir")
            .arg(staging.output_dir())
            .arg(StagingArea::source_file(class_name));

        self.invoke(cmd, "check").await
    }

    /// Build the instrumented driver into `staging.artifact_path(class_name)`
    pub async fn build_driver(&self, staging: &StagingArea, class_name: &str) -> Result<CompileOutput> {
        let mut cmd = self.base_command(staging, class_name);
        cmd.arg("--crate-type")
            .arg("bin")
            .arg("--cfg")
            .arg("test")
            // lints were already reported by check_source
            .arg("--cap-lints")
            .arg("allow")
            // panic locations and file!() name the submitted file
            .arg("--remap-path-prefix")
            .arg(format!("{}={}", DRIVER_DIR, SOURCE_DIR))
            .arg("-C")
            .arg("debuginfo=1")
            .arg("-o")
            .arg(staging.artifact_path(class_name))
            .arg(StagingArea::driver_file(class_name));

        self.invoke(cmd, "build").await
    }

    async fn invoke(&self, mut cmd: Command, phase: &str) -> Result<CompileOutput> {
        debug!(phase = phase, command = ?cmd.as_std(), "Invoking rustc");

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to launch {}", self.config.rustc.display()))?;

        let diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(
            phase = phase,
            status = %output.status,
            diagnostics_bytes = diagnostics.len(),
            "rustc finished"
        );

        Ok(CompileOutput {
            success: output.status.success(),
            diagnostics,
        })
    }
}

/// Check that the configured compiler can be launched
pub async fn check_toolchain(config: &RunnerConfig) -> ToolchainStatus {
    let output = Command::new(&config.rustc)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("").trim().to_string();
            ToolchainStatus::available(version)
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            ToolchainStatus::unavailable(format!(
                "{} --version exited with {}: {}",
                config.rustc.display(),
                output.status,
                stderr.trim()
            ))
        }
        Err(e) => ToolchainStatus::unavailable(format!(
            "Rust compiler not found at '{}': {}",
            config.rustc.display(),
            e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_crate_name_is_snake_case() {
        assert_eq!(crate_name("UsersApiTest"), "users_api_test");
        assert_eq!(crate_name("already_snake"), "already_snake");
        assert_eq!(crate_name("Api2Test"), "api2_test");
        assert_eq!(crate_name("HTTPCheck"), "httpcheck");
        assert_eq!(crate_name("_Private__Thing"), "_private_thing");
    }

    #[tokio::test]
    async fn test_camel_case_class_passes_deny_warnings() {
        let config = RunnerConfig::default();
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(root.path()).unwrap();
        staging
            .write_source("StrictApiTest", "#![deny(warnings)]\n#[test]\nfn ok() {}\n")
            .unwrap();

        let output = Compiler::new(&config)
            .check_source(&staging, "StrictApiTest")
            .await
            .unwrap();
        assert!(output.success, "{}", output.diagnostics);
    }

    #[tokio::test]
    async fn test_check_toolchain_missing_binary() {
        let config = RunnerConfig {
            rustc: PathBuf::from("/nonexistent/verdict/rustc"),
            ..Default::default()
        };
        let status = check_toolchain(&config).await;
        assert!(!status.available);
        assert!(status.version.is_none());
        assert!(status.error.unwrap().contains("/nonexistent/verdict/rustc"));
    }

    #[tokio::test]
    async fn test_check_toolchain_reports_version() {
        let status = check_toolchain(&RunnerConfig::default()).await;
        assert!(status.available, "rustc should be on PATH: {:?}", status.error);
        assert!(status.version.unwrap().starts_with("rustc "));
    }

    #[tokio::test]
    async fn test_missing_compiler_is_an_error() {
        let config = RunnerConfig {
            rustc: PathBuf::from("/nonexistent/verdict/rustc"),
            ..Default::default()
        };
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(root.path()).unwrap();
        staging.write_source("Demo", "fn main() {}").unwrap();

        let err = Compiler::new(&config)
            .check_source(&staging, "Demo")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to launch"));
    }

    #[tokio::test]
    async fn test_check_source_reports_diagnostics() {
        let config = RunnerConfig::default();
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(root.path()).unwrap();
        staging
            .write_source("Broken", "fn helper() -> u32 { \"text\" }\n")
            .unwrap();

        let output = Compiler::new(&config)
            .check_source(&staging, "Broken")
            .await
            .unwrap();
        assert!(!output.success);
        assert!(output.diagnostics.contains("mismatched types"));
        assert!(output.diagnostics.contains("src/Broken.rs"));
    }
}
