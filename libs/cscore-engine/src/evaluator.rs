/// Test Evaluator - Backend-Agnostic Grading and Scoring
///
/// **Core Responsibility:**
/// Turn raw execution output into graded outcomes, and graded outcomes into a
/// weighted score.
///
/// **Critical Properties:**
/// - Knows nothing about Docker or the remote judge protocol
/// - Pure functions: (raw runs, test cases) -> outcomes -> score
///
/// **Scoring Rules:**
/// - max_score = sum of all test case weights
/// - total_score = sum of weights of passed test cases
/// - score = total_score / max_score * 100, or 0 when max_score is 0
///
/// **Comparison Rules:**
/// - Only an Accepted run can pass
/// - Spaces, `\n` and `\r` are trimmed at both ends, nothing else
/// - Tabs and interior whitespace are significant, comparison is case sensitive

use cscore_common::types::{ExecutionResult, ExecutionStatus, TestCase, TestCaseOutcome};
use tracing::debug;

use crate::backend::RawRun;
use crate::fault::Fault;
use crate::verdict::Verdict;

/// Totals produced by the scorer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

fn is_boundary_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\r')
}

pub fn normalize_output(output: &str) -> &str {
    output.trim_matches(is_boundary_whitespace)
}

/// Build the error message for a run, `None` when the run passed
pub(crate) fn error_message(raw: &RawRun, passed: bool) -> Option<String> {
    let base = match raw.verdict {
        Verdict::Accepted if passed => return None,
        Verdict::Accepted => "Output mismatch".to_string(),
        Verdict::CompilationError => format!("{}: {}", raw.verdict, raw.compile_output),
        other => other.to_string(),
    };

    let stderr = raw.stderr.trim_end();
    if stderr.trim().is_empty() {
        Some(base)
    } else {
        Some(format!("{}: {}", base, stderr))
    }
}

/// Grade one raw run against its test case
pub fn evaluate_run(test_case: &TestCase, raw: &RawRun) -> TestCaseOutcome {
    let actual = normalize_output(&raw.stdout);
    let passed =
        raw.verdict == Verdict::Accepted && actual == normalize_output(&test_case.expected_output);

    TestCaseOutcome {
        test_case_id: test_case.id,
        passed,
        actual_output: actual.to_string(),
        expected_output: test_case.expected_output.clone(),
        error_message: error_message(raw, passed),
        execution_time_ms: raw.execution_time_ms,
        weight: test_case.weight,
        hidden: test_case.hidden,
    }
}

/// Failed outcome for a test case whose run never produced a verdict
pub fn fault_outcome(test_case: &TestCase, fault: &Fault) -> TestCaseOutcome {
    TestCaseOutcome {
        test_case_id: test_case.id,
        passed: false,
        actual_output: String::new(),
        expected_output: test_case.expected_output.clone(),
        error_message: Some(fault.to_string()),
        execution_time_ms: 0,
        weight: test_case.weight,
        hidden: test_case.hidden,
    }
}

/// First test case whose weight would push the score outside 0-100
pub fn invalid_weight(test_cases: &[TestCase]) -> Option<&TestCase> {
    test_cases
        .iter()
        .find(|tc| !tc.weight.is_finite() || tc.weight < 0.0)
}

/// Weighted score over a set of outcomes. Order independent.
pub fn score(outcomes: &[TestCaseOutcome]) -> Score {
    let max_score: f64 = outcomes.iter().map(|o| o.weight).sum();
    let total_score: f64 = outcomes.iter().filter(|o| o.passed).map(|o| o.weight).sum();
    let percentage = if max_score > 0.0 {
        total_score / max_score * 100.0
    } else {
        0.0
    };

    Score {
        total_score,
        max_score,
        percentage,
    }
}

/// Aggregate graded outcomes into a completed result, preserving their order
pub fn aggregate(outcomes: Vec<TestCaseOutcome>) -> ExecutionResult {
    let totals = score(&outcomes);

    debug!(
        tests = outcomes.len(),
        passed = outcomes.iter().filter(|o| o.passed).count(),
        total_score = totals.total_score,
        max_score = totals.max_score,
        score = totals.percentage,
        "Evaluation complete"
    );

    ExecutionResult {
        test_results: outcomes,
        score: totals.percentage,
        total_score: totals.total_score,
        max_score: totals.max_score,
        status: ExecutionStatus::Completed,
        stderr: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::RuntimeErrorKind;

    /// Helper to create a test case
    fn make_test_case(id: i64, expected_output: &str, weight: f64) -> TestCase {
        TestCase {
            id,
            input: "input".to_string(),
            expected_output: expected_output.to_string(),
            weight,
            hidden: false,
        }
    }

    fn make_run(verdict: Verdict, stdout: &str) -> RawRun {
        RawRun {
            verdict,
            stdout: stdout.to_string(),
            stderr: String::new(),
            compile_output: String::new(),
            execution_time_ms: 12,
        }
    }

    fn make_outcome(id: i64, passed: bool, weight: f64) -> TestCaseOutcome {
        TestCaseOutcome {
            test_case_id: id,
            passed,
            actual_output: String::new(),
            expected_output: String::new(),
            error_message: None,
            execution_time_ms: 0,
            weight,
            hidden: false,
        }
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("hello"), "hello");
        assert_eq!(normalize_output("  hello  "), "hello");
        assert_eq!(normalize_output("hello\r\n"), "hello");
        assert_eq!(normalize_output("\nhello world\n"), "hello world");
        assert_eq!(normalize_output("hello\t"), "hello\t");
        assert_eq!(normalize_output("   "), "");
    }

    #[test]
    fn test_boundary_trimming_rules() {
        let tc = make_test_case(1, "5", 1.0);
        assert!(evaluate_run(&tc, &make_run(Verdict::Accepted, "5\n")).passed);
        assert!(evaluate_run(&tc, &make_run(Verdict::Accepted, "5 ")).passed);
        assert!(!evaluate_run(&tc, &make_run(Verdict::Accepted, "5\t")).passed);
    }

    #[test]
    fn test_interior_whitespace_is_significant() {
        let tc = make_test_case(1, "1 2", 1.0);
        assert!(!evaluate_run(&tc, &make_run(Verdict::Accepted, "1  2")).passed);
        let tc = make_test_case(2, "line1\nline2", 1.0);
        assert!(evaluate_run(&tc, &make_run(Verdict::Accepted, "line1\nline2\n")).passed);
    }

    #[test]
    fn test_accepted_match_has_no_error() {
        let tc = make_test_case(3, "120", 10.0);
        let outcome = evaluate_run(&tc, &make_run(Verdict::Accepted, "120\n"));

        assert!(outcome.passed);
        assert_eq!(outcome.error_message, None);
        assert_eq!(outcome.actual_output, "120");
        assert_eq!(outcome.test_case_id, 3);
        assert_eq!(outcome.execution_time_ms, 12);
    }

    #[test]
    fn test_accepted_mismatch() {
        let tc = make_test_case(1, "Hello", 1.0);
        let outcome = evaluate_run(&tc, &make_run(Verdict::Accepted, "hello"));

        assert!(!outcome.passed);
        assert_eq!(outcome.error_message.as_deref(), Some("Output mismatch"));
    }

    #[test]
    fn test_non_accepted_never_passes() {
        let tc = make_test_case(1, "42", 1.0);
        let outcome = evaluate_run(&tc, &make_run(Verdict::WrongAnswer, "42"));

        assert!(!outcome.passed);
        assert_eq!(outcome.error_message.as_deref(), Some("Wrong Answer"));
    }

    #[test]
    fn test_compilation_error_carries_compile_output() {
        let tc = make_test_case(1, "42", 1.0);
        let mut run = make_run(Verdict::CompilationError, "");
        run.compile_output = "syntax error line 4".to_string();

        let message = evaluate_run(&tc, &run).error_message.unwrap();
        assert!(message.contains("Compilation Error"));
        assert!(message.contains("syntax error line 4"));
    }

    #[test]
    fn test_stderr_is_appended() {
        let tc = make_test_case(1, "42", 1.0);
        let mut run = make_run(Verdict::RuntimeError(RuntimeErrorKind::Nzec), "");
        run.stderr = "IndexError: list index out of range\n".to_string();

        let outcome = evaluate_run(&tc, &run);
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("Runtime Error (NZEC): IndexError: list index out of range")
        );
    }

    #[test]
    fn test_blank_stderr_is_ignored() {
        let tc = make_test_case(1, "42", 1.0);
        let mut run = make_run(Verdict::TimeLimitExceeded, "");
        run.stderr = "  \n".to_string();

        let outcome = evaluate_run(&tc, &run);
        assert_eq!(outcome.error_message.as_deref(), Some("Time Limit Exceeded"));
    }

    #[test]
    fn test_fault_outcome() {
        let tc = TestCase {
            hidden: true,
            ..make_test_case(9, "x", 4.0)
        };
        let outcome = fault_outcome(&tc, &Fault::PollTimeout { attempts: 10 });

        assert!(!outcome.passed);
        assert!(outcome.hidden);
        assert_eq!(outcome.weight, 4.0);
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("no terminal status after 10 polls")
        );
    }

    #[test]
    fn test_partial_score() {
        let outcomes = vec![
            make_outcome(1, true, 20.0),
            make_outcome(2, false, 30.0),
        ];
        let totals = score(&outcomes);

        assert_eq!(totals.total_score, 20.0);
        assert_eq!(totals.max_score, 50.0);
        assert!((totals.percentage - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_fractional_weights() {
        let outcomes = vec![
            make_outcome(1, true, 0.1),
            make_outcome(2, true, 0.2),
            make_outcome(3, false, 0.3),
        ];
        let totals = score(&outcomes);
        assert!((totals.percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_scores_zero() {
        let outcomes = vec![make_outcome(1, true, 0.0)];
        let totals = score(&outcomes);

        assert_eq!(totals.max_score, 0.0);
        assert_eq!(totals.percentage, 0.0);
        assert_eq!(score(&[]).percentage, 0.0);
    }

    #[test]
    fn test_score_is_order_independent() {
        let forward = vec![
            make_outcome(1, true, 3.0),
            make_outcome(2, false, 7.0),
            make_outcome(3, true, 5.0),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = score(&forward);
        let b = score(&reversed);
        assert!((a.percentage - b.percentage).abs() < 1e-9);
        assert_eq!(a.max_score, b.max_score);
    }

    #[test]
    fn test_aggregate_preserves_order() {
        let outcomes = vec![
            make_outcome(3, false, 1.0),
            make_outcome(1, true, 1.0),
            make_outcome(2, true, 2.0),
        ];
        let result = aggregate(outcomes);

        let ids: Vec<i64> = result.test_results.iter().map(|o| o.test_case_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.total_score, 3.0);
        assert_eq!(result.max_score, 4.0);
        assert!((result.score - 75.0).abs() < 1e-9);
        assert_eq!(result.stderr, None);
    }

    #[test]
    fn test_invalid_weights() {
        let valid = vec![make_test_case(1, "a", 2.0), make_test_case(2, "b", 0.0)];
        assert!(invalid_weight(&valid).is_none());

        let negative = vec![make_test_case(1, "a", 2.0), make_test_case(2, "b", -1.0)];
        assert_eq!(invalid_weight(&negative).map(|tc| tc.id), Some(2));

        let nan = vec![make_test_case(7, "a", f64::NAN)];
        assert_eq!(invalid_weight(&nan).map(|tc| tc.id), Some(7));
    }
}
