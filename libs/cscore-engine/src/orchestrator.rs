/// Execution Orchestrator - Strategy Selection and Fallback
///
/// **Responsibility:**
/// Pick a backend for every call, run the request through it, apply the
/// fallback policy and hand graded outcomes to the evaluator.
///
/// **Strategy resolution** (recomputed on every call, never cached):
/// - LOCAL -> local
/// - REMOTE -> remote if enabled and reachable, else local
/// - HYBRID -> remote with local fallback if enabled and reachable, else local
///
/// **Fallback policy:**
/// - REMOTE falls back to local only when the remote raises a transport fault
/// - HYBRID also falls back when the remote result has status `error`
/// - Graded failures (wrong answer, compile error, ...) never fall back
/// - Exactly one backend produces the returned result

use anyhow::Context;
use cscore_common::config::{ExecutionStrategyConfig, RemoteJudgeConfig, Strategy};
use cscore_common::types::{ExecutionResult, Language, TestCase};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::backend::{BackendKind, ExecutionBackend, RawRun};
use crate::docker::{DockerEngine, DEFAULT_TIMEOUT};
use crate::evaluator;
use crate::fault::Fault;
use crate::judge0::RemoteJudgeClient;
use crate::language_config::LanguageConfigManager;
use crate::verdict::Verdict;

/// Pure strategy table. `remote_ready` = enabled and available.
pub fn resolve_strategy(configured: Strategy, remote_ready: bool) -> Strategy {
    match (configured, remote_ready) {
        (Strategy::Local, _) => Strategy::Local,
        (Strategy::Remote, true) => Strategy::Remote,
        (Strategy::Hybrid, true) => Strategy::Hybrid,
        (Strategy::Remote | Strategy::Hybrid, false) => Strategy::Local,
    }
}

/// Result of a single ungraded run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub backend: BackendKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
}

impl RunOutcome {
    fn from_raw(backend: BackendKind, raw: RawRun) -> Self {
        let success = raw.verdict == Verdict::Accepted;
        Self {
            backend,
            success,
            verdict: Some(raw.verdict),
            error_message: evaluator::error_message(&raw, success),
            stdout: raw.stdout,
            stderr: raw.stderr,
            execution_time_ms: raw.execution_time_ms,
        }
    }

    fn from_fault(backend: BackendKind, fault: &Fault) -> Self {
        Self {
            backend,
            success: false,
            verdict: None,
            stdout: String::new(),
            stderr: String::new(),
            error_message: Some(fault.to_string()),
            execution_time_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionInfo {
    pub current_strategy: Strategy,
    pub remote_enabled: bool,
    pub remote_available: bool,
    pub configured_strategy: Strategy,
    pub supported_languages: Vec<String>,
}

/// Run every test case on one backend, in order.
///
/// A transport fault aborts the batch. Other faults become failed outcomes,
/// unless no test case could be judged at all, which is a top-level error.
async fn run_batch(
    backend: &dyn ExecutionBackend,
    code: &str,
    language: Language,
    test_cases: &[TestCase],
) -> Result<ExecutionResult, Fault> {
    let mut outcomes = Vec::with_capacity(test_cases.len());
    let mut last_fault = None;
    let mut faulted = 0usize;

    for test_case in test_cases {
        match backend.run(code, language, &test_case.input).await {
            Ok(raw) => outcomes.push(evaluator::evaluate_run(test_case, &raw)),
            Err(fault) if fault.is_transport() => return Err(fault),
            Err(fault) => {
                warn!(
                    backend = %backend.kind(),
                    test_id = test_case.id,
                    error = %fault,
                    "Test case could not be judged"
                );
                outcomes.push(evaluator::fault_outcome(test_case, &fault));
                faulted += 1;
                last_fault = Some(fault);
            }
        }
    }

    if let Some(fault) = last_fault {
        if faulted == test_cases.len() {
            return Ok(ExecutionResult::error(fault.to_string()));
        }
    }

    Ok(evaluator::aggregate(outcomes))
}

pub struct ExecutionOrchestrator {
    config: ExecutionStrategyConfig,
    remote: Arc<dyn ExecutionBackend>,
    local: Arc<dyn ExecutionBackend>,
}

impl ExecutionOrchestrator {
    pub fn new(
        config: ExecutionStrategyConfig,
        remote: Arc<dyn ExecutionBackend>,
        local: Arc<dyn ExecutionBackend>,
    ) -> Self {
        Self {
            config,
            remote,
            local,
        }
    }

    /// Wire the Judge0 client and the Docker sandbox from the environment
    pub fn from_env() -> anyhow::Result<Self> {
        let remote = RemoteJudgeClient::new(RemoteJudgeConfig::from_env())?;
        let languages =
            LanguageConfigManager::load_default().context("Failed to load language configurations")?;
        let timeout = std::env::var("LOCAL_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);
        let local = DockerEngine::new(languages, timeout)?;

        Ok(Self::new(
            ExecutionStrategyConfig::from_env(),
            Arc::new(remote),
            Arc::new(local),
        ))
    }

    pub fn config(&self) -> &ExecutionStrategyConfig {
        &self.config
    }

    async fn remote_ready(&self) -> bool {
        self.config.remote_enabled && self.remote.is_available().await
    }

    /// Resolve the strategy for this call. LOCAL never probes the remote.
    pub async fn current_strategy(&self) -> Strategy {
        if self.config.strategy == Strategy::Local {
            return Strategy::Local;
        }
        resolve_strategy(self.config.strategy, self.remote_ready().await)
    }

    pub async fn execute(&self, code: &str, language: Language) -> RunOutcome {
        self.execute_with_input(code, language, "").await
    }

    #[instrument(skip(self, code, input), fields(language = %language))]
    pub async fn execute_with_input(&self, code: &str, language: Language, input: &str) -> RunOutcome {
        let strategy = self.current_strategy().await;
        info!(strategy = %strategy, "Executing code");

        if strategy == Strategy::Local {
            return self.run_local_once(code, language, input).await;
        }

        match self.remote.run(code, language, input).await {
            Ok(raw) => RunOutcome::from_raw(BackendKind::Remote, raw),
            Err(fault) if strategy == Strategy::Hybrid || fault.is_transport() => {
                warn!(strategy = %strategy, error = %fault, "Remote execution failed, falling back to local");
                self.run_local_once(code, language, input).await
            }
            Err(fault) => RunOutcome::from_fault(BackendKind::Remote, &fault),
        }
    }

    async fn run_local_once(&self, code: &str, language: Language, input: &str) -> RunOutcome {
        match self.local.run(code, language, input).await {
            Ok(raw) => RunOutcome::from_raw(BackendKind::Local, raw),
            Err(fault) => RunOutcome::from_fault(BackendKind::Local, &fault),
        }
    }

    #[instrument(skip(self, code, test_cases), fields(language = %language, test_count = test_cases.len()))]
    pub async fn execute_with_test_cases(
        &self,
        code: &str,
        language: Language,
        test_cases: &[TestCase],
    ) -> ExecutionResult {
        if let Some(tc) = evaluator::invalid_weight(test_cases) {
            warn!(test_id = tc.id, weight = tc.weight, "Rejecting submission with invalid weight");
            return ExecutionResult::error(format!(
                "Test case {} has invalid weight {}",
                tc.id, tc.weight
            ));
        }

        let strategy = self.current_strategy().await;
        info!(strategy = %strategy, "Executing code with test cases");

        let result = match strategy {
            Strategy::Local => self.run_local_batch(code, language, test_cases).await,
            Strategy::Remote => match run_batch(self.remote.as_ref(), code, language, test_cases).await {
                Ok(result) => result,
                Err(fault) => {
                    warn!(error = %fault, "Remote execution failed, falling back to local");
                    self.run_local_batch(code, language, test_cases).await
                }
            },
            Strategy::Hybrid => match run_batch(self.remote.as_ref(), code, language, test_cases).await {
                Ok(result) if !result.is_error() => result,
                Ok(result) => {
                    warn!(
                        stderr = result.stderr.as_deref().unwrap_or(""),
                        "Remote execution unsuccessful, falling back to local"
                    );
                    self.run_local_batch(code, language, test_cases).await
                }
                Err(fault) => {
                    warn!(error = %fault, "Remote execution failed, falling back to local");
                    self.run_local_batch(code, language, test_cases).await
                }
            },
        };

        info!(
            status = ?result.status,
            score = result.score,
            total_score = result.total_score,
            max_score = result.max_score,
            "Execution completed"
        );
        result
    }

    async fn run_local_batch(
        &self,
        code: &str,
        language: Language,
        test_cases: &[TestCase],
    ) -> ExecutionResult {
        match run_batch(self.local.as_ref(), code, language, test_cases).await {
            Ok(result) => result,
            Err(fault) => ExecutionResult::error(fault.to_string()),
        }
    }

    /// Entry point for the grading coordinator
    pub async fn grade_submission(
        &self,
        code: &str,
        language: Language,
        test_cases: &[TestCase],
    ) -> ExecutionResult {
        self.execute_with_test_cases(code, language, test_cases).await
    }

    pub async fn execution_info(&self) -> ExecutionInfo {
        let remote_available = self.remote_ready().await;
        let current_strategy = resolve_strategy(self.config.strategy, remote_available);
        let supported_languages = if remote_available {
            self.remote.supported_languages().await
        } else {
            self.local.supported_languages().await
        };

        ExecutionInfo {
            current_strategy,
            remote_enabled: self.config.remote_enabled,
            remote_available,
            configured_strategy: self.config.strategy,
            supported_languages,
        }
    }
}
