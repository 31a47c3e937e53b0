// Grading coordinator: one orchestrator call per submission, then decide its status
use chrono::Utc;
use cscore_common::types::{ExecutionResult, GradingJob, GradingRecord, SubmissionStatus};
use cscore_engine::ExecutionOrchestrator;
use tracing::{debug, info, warn};

/// A result the engine could not judge marks the submission FAILED
pub fn submission_status(result: &ExecutionResult) -> SubmissionStatus {
    if result.is_error() {
        SubmissionStatus::Failed
    } else {
        SubmissionStatus::Graded
    }
}

pub async fn grade_job(orchestrator: &ExecutionOrchestrator, job: &GradingJob) -> GradingRecord {
    let result = orchestrator
        .grade_submission(&job.source_code, job.language, &job.test_cases)
        .await;
    let submission_status = submission_status(&result);

    match submission_status {
        SubmissionStatus::Graded => info!(
            job_id = %job.id,
            score = result.score,
            passed = result.test_results.iter().filter(|o| o.passed).count(),
            total = result.test_results.len(),
            "Submission graded"
        ),
        SubmissionStatus::Failed => warn!(
            job_id = %job.id,
            stderr = result.stderr.as_deref().unwrap_or(""),
            "Submission could not be graded"
        ),
    }

    for (idx, outcome) in result.test_results.iter().enumerate() {
        debug!(
            job_id = %job.id,
            test_num = idx + 1,
            test_id = outcome.test_case_id,
            passed = outcome.passed,
            hidden = outcome.hidden,
            execution_ms = outcome.execution_time_ms,
            "Test result"
        );
    }

    GradingRecord {
        job_id: job.id,
        submission_status,
        result,
        graded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cscore_common::config::{ExecutionStrategyConfig, Strategy};
    use cscore_common::types::{Language, TestCase};
    use cscore_engine::{BackendKind, ExecutionBackend, Fault, RawRun};
    use std::sync::Arc;
    use uuid::Uuid;

    struct StubBackend {
        kind: BackendKind,
        result: Result<RawRun, Fault>,
    }

    #[async_trait]
    impl ExecutionBackend for StubBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn is_available(&self) -> bool {
            false
        }

        async fn run(&self, _code: &str, _language: Language, _stdin: &str) -> Result<RawRun, Fault> {
            self.result.clone()
        }
    }

    fn local_only(result: Result<RawRun, Fault>) -> ExecutionOrchestrator {
        ExecutionOrchestrator::new(
            ExecutionStrategyConfig {
                strategy: Strategy::Local,
                remote_enabled: false,
            },
            Arc::new(StubBackend {
                kind: BackendKind::Remote,
                result: Err(Fault::Transport("unused".into())),
            }),
            Arc::new(StubBackend {
                kind: BackendKind::Local,
                result,
            }),
        )
    }

    fn job() -> GradingJob {
        GradingJob {
            id: Uuid::new_v4(),
            language: Language::Python,
            source_code: "print(input())".to_string(),
            test_cases: vec![TestCase {
                id: 1,
                input: "3".to_string(),
                expected_output: "3".to_string(),
                weight: 1.0,
                hidden: true,
            }],
        }
    }

    #[test]
    fn test_submission_status_mapping() {
        assert_eq!(
            submission_status(&ExecutionResult::error("judge down")),
            SubmissionStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_graded_record() {
        let orchestrator = local_only(Ok(RawRun::accepted("3\n")));
        let job = job();

        let record = grade_job(&orchestrator, &job).await;

        assert_eq!(record.job_id, job.id);
        assert_eq!(record.submission_status, SubmissionStatus::Graded);
        assert_eq!(record.result.score, 100.0);
        assert!(record.result.test_results[0].hidden);
    }

    #[tokio::test]
    async fn test_failed_record() {
        let orchestrator = local_only(Err(Fault::Sandbox("no docker".into())));

        let record = grade_job(&orchestrator, &job()).await;

        assert_eq!(record.submission_status, SubmissionStatus::Failed);
        assert!(record.result.test_results.is_empty());
    }
}
