// Runner configuration for Verdict
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SUPPORTED_EDITIONS: &[&str] = &["2015", "2018", "2021", "2024"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerConfig {
    /// Compiler executable
    pub rustc: PathBuf,
    pub edition: String,
    /// Parent directory of the per-run staging directories
    pub temp_root: PathBuf,
    /// Extra `-L` search paths handed to rustc
    pub library_paths: Vec<PathBuf>,
    /// Wall-clock limit for the entry point; unlimited when absent
    pub timeout_ms: Option<u64>,
    pub keep_artifacts: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            rustc: PathBuf::from("rustc"),
            edition: "2021".to_string(),
            temp_root: std::env::temp_dir(),
            library_paths: Vec::new(),
            timeout_ms: None,
            keep_artifacts: false,
        }
    }
}

/// Command-line overrides, applied on top of the config file
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to rustc
    #[arg(long, global = true)]
    pub rustc: Option<PathBuf>,

    /// Rust edition for the submitted source (2015, 2018, 2021, 2024)
    #[arg(long, global = true)]
    pub edition: Option<String>,

    /// Directory under which staging directories are created
    #[arg(long, global = true)]
    pub temp_root: Option<PathBuf>,

    /// Additional library search path (repeatable)
    #[arg(short = 'L', long = "library-path", global = true)]
    pub library_paths: Vec<PathBuf>,

    /// Kill the entry point after this many milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Leave the staging directory in place after the run
    #[arg(long, global = true)]
    pub keep_artifacts: bool,
}

impl RunnerConfig {
    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: RunnerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Build the effective configuration: file (if any), then CLI overrides
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match &overrides.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(rustc) = &overrides.rustc {
            self.rustc = rustc.clone();
        }
        if let Some(edition) = &overrides.edition {
            self.edition = edition.clone();
        }
        if let Some(temp_root) = &overrides.temp_root {
            self.temp_root = temp_root.clone();
        }
        self.library_paths
            .extend(overrides.library_paths.iter().cloned());
        if overrides.timeout_ms.is_some() {
            self.timeout_ms = overrides.timeout_ms;
        }
        self.keep_artifacts |= overrides.keep_artifacts;
    }

    fn validate(&self) -> Result<()> {
        if !SUPPORTED_EDITIONS.contains(&self.edition.as_str()) {
            bail!(
                "Unsupported edition '{}' (expected one of {:?})",
                self.edition,
                SUPPORTED_EDITIONS
            );
        }
        if self.timeout_ms == Some(0) {
            bail!("timeoutMs must be greater than zero");
        }
        if self.rustc.as_os_str().is_empty() {
            bail!("rustc path cannot be empty");
        }
        Ok(())
    }
}
