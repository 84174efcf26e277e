/// Staging Area - Per-Run Scratch Directory
///
/// Every run gets its own directory under the configured temp root:
///
/// ```text
/// <temp_root>/verdict-XXXXXX/
///     src/<ClassName>.rs      staged source, as submitted
///     driver/<ClassName>.rs   instrumented copy with a generated main
///     out/                    compiler artifacts
/// ```
///
/// Directory names are randomized, so concurrent runs never share paths.
/// The directory is removed by `cleanup()`; if the pipeline unwinds before
/// reaching it, the inner `TempDir` removes it on drop.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

pub const SOURCE_DIR: &str = "src";
pub const DRIVER_DIR: &str = "driver";
pub const OUTPUT_DIR: &str = "out";

pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory (with its subdirectories) under `temp_root`
    pub fn create(temp_root: &Path) -> Result<Self> {
        fs::create_dir_all(temp_root)
            .with_context(|| format!("Failed to create temp root {}", temp_root.display()))?;

        let dir = tempfile::Builder::new()
            .prefix("verdict-")
            .tempdir_in(temp_root)
            .context("Failed to create staging directory")?;

        for sub in [SOURCE_DIR, DRIVER_DIR, OUTPUT_DIR] {
            fs::create_dir_all(dir.path().join(sub))
                .with_context(|| format!("Failed to create staging subdirectory '{}'", sub))?;
        }

        debug!(path = %dir.path().display(), "Staging directory created");
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join(OUTPUT_DIR)
    }

    /// Source path relative to the staging root
    pub fn source_file(class_name: &str) -> PathBuf {
        Path::new(SOURCE_DIR).join(format!("{}.rs", class_name))
    }

    /// Driver path relative to the staging root
    pub fn driver_file(class_name: &str) -> PathBuf {
        Path::new(DRIVER_DIR).join(format!("{}.rs", class_name))
    }

    /// Compiled driver binary (absolute)
    pub fn artifact_path(&self, class_name: &str) -> PathBuf {
        let mut path = self.output_dir().join(class_name);
        if !std::env::consts::EXE_EXTENSION.is_empty() {
            path.set_extension(std::env::consts::EXE_EXTENSION);
        }
        path
    }

    /// Write the submitted source; returns its absolute path
    pub fn write_source(&self, class_name: &str, source_code: &str) -> Result<PathBuf> {
        self.write(&Self::source_file(class_name), source_code)
    }

    pub fn write_driver(&self, class_name: &str, driver_source: &str) -> Result<PathBuf> {
        self.write(&Self::driver_file(class_name), driver_source)
    }

    fn write(&self, relative: &Path, contents: &str) -> Result<PathBuf> {
        let path = self.root().join(relative);
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Remove the staging directory, best effort.
    ///
    /// Individual deletion failures are logged and skipped so that one stuck
    /// file does not keep the rest of the tree around. Returns the number of
    /// entries that could not be removed.
    pub fn cleanup(self, keep_artifacts: bool) -> usize {
        let path = self.dir.keep();

        if keep_artifacts {
            info!(path = %path.display(), "Keeping staging directory");
            return 0;
        }

        let failures = remove_tree(&path);
        if failures > 0 {
            warn!(
                path = %path.display(),
                failures = failures,
                "Could not fully clean up staging directory"
            );
        } else {
            debug!(path = %path.display(), "Staging directory removed");
        }
        failures
    }
}

/// Depth-first delete: children first, then the directory itself
fn remove_tree(path: &Path) -> usize {
    let mut failures = 0;

    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return 0,
    };

    if metadata.is_dir() {
        match fs::read_dir(path) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    failures += remove_tree(&entry.path());
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to list directory");
                failures += 1;
            }
        }
        if let Err(e) = fs::remove_dir(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove directory");
            failures += 1;
        }
    } else if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove file");
        failures += 1;
    }

    failures
}
