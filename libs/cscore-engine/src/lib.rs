// Grading execution engine: strategy selection, remote judge, Docker sandbox, scoring

pub mod backend;
pub mod docker;
pub mod evaluator;
pub mod fault;
pub mod judge0;
pub mod language_config;
pub mod orchestrator;
pub mod verdict;

pub use backend::{BackendKind, ExecutionBackend, RawRun};
pub use docker::DockerEngine;
pub use fault::Fault;
pub use judge0::RemoteJudgeClient;
pub use language_config::LanguageConfigManager;
pub use orchestrator::{resolve_strategy, ExecutionInfo, ExecutionOrchestrator, RunOutcome};
pub use verdict::{JudgeStatus, RuntimeErrorKind, Verdict};
