/// JSON report shapes written to stdout.
///
/// A completed run produces a `RunReport`; a failure outside the pipeline
/// (bad arguments, I/O errors while staging) produces an `ErrorReport`.
/// Consumers tell them apart by the `success` field.
use crate::types::{TestRunResult, TestStatus};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport<'a> {
    pub success: bool,
    pub class_name: &'a str,
    pub status: TestStatus,
    pub compilation_status: &'a str,
    pub compilation_errors: &'a str,
    /// Milliseconds
    pub execution_time: u64,
    pub output: &'a str,
    pub execution_errors: &'a str,
}

impl<'a> From<&'a TestRunResult> for RunReport<'a> {
    fn from(result: &'a TestRunResult) -> Self {
        Self {
            success: true,
            class_name: &result.class_name,
            status: result.status,
            compilation_status: &result.compilation_status,
            compilation_errors: &result.compilation_errors,
            execution_time: result.execution_time.as_millis() as u64,
            output: &result.output,
            execution_errors: &result.execution_errors,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub success: bool,
    pub error: String,
    pub stack_trace: String,
}

impl ErrorReport {
    pub fn new(error: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

/// Render any report as pretty-printed JSON.
pub fn render<T: Serialize>(report: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn make_result() -> TestRunResult {
        TestRunResult {
            class_name: "UsersApiTest".to_string(),
            source_file: "/tmp/verdict-x/src/UsersApiTest.rs".to_string(),
            status: TestStatus::Passed,
            compilation_status: "SUCCESS".to_string(),
            compilation_errors: String::new(),
            execution_errors: String::new(),
            output: "status 200\n".to_string(),
            execution_time: Duration::from_micros(12_750),
        }
    }

    #[test]
    fn test_run_report_fields() {
        let result = make_result();
        let json = render(&RunReport::from(&result)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["className"], "UsersApiTest");
        assert_eq!(value["status"], "PASSED");
        assert_eq!(value["compilationStatus"], "SUCCESS");
        assert_eq!(value["compilationErrors"], "");
        assert_eq!(value["executionTime"], 12);
        assert_eq!(value["output"], "status 200\n");
        assert_eq!(value["executionErrors"], "");
        // staging path is internal
        assert!(value.get("sourceFile").is_none());
    }

    #[test]
    fn test_run_report_field_order() {
        let result = make_result();
        let json = render(&RunReport::from(&result)).unwrap();
        let keys: Vec<usize> = [
            "\"success\"",
            "\"className\"",
            "\"status\"",
            "\"compilationStatus\"",
            "\"compilationErrors\"",
            "\"executionTime\"",
            "\"output\"",
            "\"executionErrors\"",
        ]
        .iter()
        .map(|k| json.find(k).unwrap())
        .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_error_report_shape() {
        let report = ErrorReport::new("invalid class name", "invalid class name\n\nCaused by: ...");
        let value: serde_json::Value = serde_json::from_str(&render(&report).unwrap()).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "invalid class name");
        assert!(value["stackTrace"].as_str().unwrap().contains("Caused by"));
        assert!(value.get("status").is_none());
    }

    #[test]
    fn test_control_characters_escaped() {
        let mut result = make_result();
        result.output = "tab\there\r\nbell\u{7}nul\u{0}quote\"backslash\\".to_string();
        let json = render(&RunReport::from(&result)).unwrap();
        assert!(!json.contains('\u{7}'));
        assert!(!json.contains('\u{0}'));
        assert!(json.contains("\\u0007"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["output"], result.output.as_str());
    }

    proptest! {
        #[test]
        fn prop_report_is_valid_json(
            class_name in "\\PC*",
            output in any::<String>(),
            errors in any::<String>(),
        ) {
            let mut result = make_result();
            result.class_name = class_name.clone();
            result.output = output.clone();
            result.execution_errors = errors.clone();

            let json = render(&RunReport::from(&result)).unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(value["className"].as_str().unwrap(), class_name.as_str());
            prop_assert_eq!(value["output"].as_str().unwrap(), output.as_str());
            prop_assert_eq!(value["executionErrors"].as_str().unwrap(), errors.as_str());
        }
    }
}
