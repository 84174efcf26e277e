use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Compilation status recorded once the compiler accepts the source.
pub const COMPILATION_SUCCESS: &str = "SUCCESS";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    #[default]
    Unknown,
    Passed,
    Failed,
    CompilationFailed,
    TestMethodNotFound,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Unknown => "UNKNOWN",
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
            TestStatus::CompilationFailed => "COMPILATION_FAILED",
            TestStatus::TestMethodNotFound => "TEST_METHOD_NOT_FOUND",
        };
        write!(f, "{}", s)
    }
}

/// Result of a single run, filled in step by step as the pipeline advances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestRunResult {
    pub class_name: String,
    pub source_file: String,
    pub status: TestStatus,
    pub compilation_status: String,
    pub compilation_errors: String,
    pub execution_errors: String,
    pub output: String,
    pub execution_time: Duration,
}

impl TestRunResult {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn compilation_failed(&mut self, diagnostics: impl Into<String>) {
        self.status = TestStatus::CompilationFailed;
        self.compilation_status.clear();
        self.compilation_errors = diagnostics.into();
    }

    pub fn compilation_succeeded(&mut self) {
        self.compilation_status = COMPILATION_SUCCESS.to_string();
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TestStatus::Unknown
    }
}

/// Availability of the host compiler, as reported by `verdict check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolchainStatus {
    pub fn available(version: impl Into<String>) -> Self {
        Self {
            available: true,
            version: Some(version.into()),
            error: None,
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            version: None,
            error: Some(error.into()),
        }
    }
}
