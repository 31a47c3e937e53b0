use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    Rust,
    Cpp,
    C,
    #[serde(alias = "js", alias = "node")]
    JavaScript,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Python,
        Language::Java,
        Language::Rust,
        Language::Cpp,
        Language::C,
        Language::JavaScript,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" | "python3" | "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "rust" | "rs" => Some(Language::Rust),
            "cpp" | "c++" => Some(Language::Cpp),
            "c" => Some(Language::C),
            "javascript" | "js" | "node" => Some(Language::JavaScript),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Rust => "rust",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::JavaScript => "javascript",
        };
        f.write_str(name)
    }
}

/// One (input, expected output, weight) triple attached to an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    #[serde(default)]
    pub input: String,
    pub expected_output: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Hidden test cases are graded normally; only their display differs.
    #[serde(default, alias = "is_hidden")]
    pub hidden: bool,
}

fn default_weight() -> f64 {
    1.0
}

/// The graded result of running one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseOutcome {
    pub test_case_id: i64,
    pub passed: bool,
    pub actual_output: String,
    pub expected_output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub weight: f64,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Error,
}

/// Aggregate result of grading one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub test_results: Vec<TestCaseOutcome>,
    /// Percentage of total weight earned, 0-100.
    pub score: f64,
    pub total_score: f64,
    pub max_score: f64,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl ExecutionResult {
    /// A request that could not be judged at all.
    pub fn error(stderr: impl Into<String>) -> Self {
        Self {
            test_results: Vec::new(),
            score: 0.0,
            total_score: 0.0,
            max_score: 0.0,
            status: ExecutionStatus::Error,
            stderr: Some(stderr.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ExecutionStatus::Error
    }
}

/// A submission queued for grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingJob {
    pub id: Uuid,
    pub language: Language,
    pub source_code: String,
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionStatus {
    Graded,
    Failed,
}

/// What the coordinator persists once a job has been graded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingRecord {
    pub job_id: Uuid,
    pub submission_status: SubmissionStatus,
    pub result: ExecutionResult,
    pub graded_at: DateTime<Utc>,
}
