// Execution contract shared by the local sandbox and the remote judge.

use async_trait::async_trait;
use cscore_common::types::Language;
use serde::Serialize;
use std::fmt;

use crate::fault::Fault;
use crate::verdict::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Remote => f.write_str("remote"),
        }
    }
}

/// Raw, classified output of one execution. Not yet compared against anything.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRun {
    pub verdict: Verdict,
    pub stdout: String,
    pub stderr: String,
    pub compile_output: String,
    pub execution_time_ms: u64,
}

impl RawRun {
    pub fn accepted(stdout: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Accepted,
            stdout: stdout.into(),
            stderr: String::new(),
            compile_output: String::new(),
            execution_time_ms: 0,
        }
    }
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Cheap liveness probe. Must not submit anything.
    async fn is_available(&self) -> bool;

    /// Run `code` once with `stdin`.
    async fn run(&self, code: &str, language: Language, stdin: &str) -> Result<RawRun, Fault>;

    async fn supported_languages(&self) -> Vec<String> {
        Language::ALL.iter().map(|l| l.to_string()).collect()
    }
}
