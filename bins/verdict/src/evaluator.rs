/// Outcome Evaluator
///
/// Pure mapping from raw execution output to the run's final status.
/// Knows nothing about processes or compilers.
///
/// **Rules (in priority order):**
/// - timed out → FAILED, execution errors name the limit
/// - non-zero exit → FAILED, execution errors carry stderr (panic message and
///   backtrace), or the exit status when stderr is empty
/// - otherwise → PASSED
///
/// Captured stdout becomes the run output in every case.

use crate::engine::ExecutionOutput;
use verdict_common::types::{TestRunResult, TestStatus};

pub fn evaluate(result: &mut TestRunResult, output: ExecutionOutput) {
    result.execution_time = output.execution_time;
    result.output = output.stdout;

    if output.timed_out {
        result.status = TestStatus::Failed;
        let mut errors = format!(
            "Execution timed out after {}ms",
            output.execution_time.as_millis()
        );
        if !output.stderr.is_empty() {
            errors.push('\n');
            errors.push_str(&output.stderr);
        }
        result.execution_errors = errors;
    } else if output.runtime_error {
        result.status = TestStatus::Failed;
        result.execution_errors = if output.stderr.trim().is_empty() {
            format!("Entry point failed with {}", output.exit_status)
        } else {
            output.stderr
        };
    } else {
        result.status = TestStatus::Passed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_output(stdout: &str, stderr: &str, ms: u64) -> ExecutionOutput {
        ExecutionOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            execution_time: Duration::from_millis(ms),
            exit_status: "exit status: 0".to_string(),
            runtime_error: false,
            timed_out: false,
        }
    }

    #[test]
    fn test_clean_exit_passes() {
        let mut result = TestRunResult::new("Demo");
        evaluate(&mut result, make_output("hello\n", "", 7));

        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.output, "hello\n");
        assert_eq!(result.execution_time, Duration::from_millis(7));
        assert!(result.execution_errors.is_empty());
    }

    #[test]
    fn test_stderr_alone_does_not_fail() {
        let mut result = TestRunResult::new("Demo");
        evaluate(&mut result, make_output("", "warning: slow endpoint\n", 3));
        assert_eq!(result.status, TestStatus::Passed);
        assert!(result.execution_errors.is_empty());
    }

    #[test]
    fn test_panic_fails_with_trace() {
        let mut output = make_output(
            "before panic\n",
            "thread 'main' panicked at src/Demo.rs:4:5:\nexpected 200\nstack backtrace:\n   0: rust_begin_unwind\n",
            2,
        );
        output.runtime_error = true;
        output.exit_status = "exit status: 101".to_string();

        let mut result = TestRunResult::new("Demo");
        evaluate(&mut result, output);

        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.output, "before panic\n");
        assert!(result.execution_errors.contains("panicked at"));
        assert!(result.execution_errors.contains("stack backtrace"));
    }

    #[test]
    fn test_silent_failure_reports_exit_status() {
        let mut output = make_output("", "", 1);
        output.runtime_error = true;
        output.exit_status = "exit status: 3".to_string();

        let mut result = TestRunResult::new("Demo");
        evaluate(&mut result, output);

        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.execution_errors, "Entry point failed with exit status: 3");
    }

    #[test]
    fn test_timeout_takes_priority() {
        let mut output = make_output("", "", 500);
        output.timed_out = true;
        output.runtime_error = true;

        let mut result = TestRunResult::new("Demo");
        evaluate(&mut result, output);

        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.execution_errors, "Execution timed out after 500ms");
        assert_eq!(result.execution_time, Duration::from_millis(500));
    }
}
