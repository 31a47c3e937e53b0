/// Judge status classification
///
/// The remote judge reports an ordinal status id. `JudgeStatus::from_status_id`
/// is the only place those ids are interpreted; every other module works with
/// `Verdict`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeErrorKind {
    Sigsegv,
    Sigxfsz,
    Sigfpe,
    Sigabrt,
    Nzec,
    Other,
}

impl RuntimeErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            RuntimeErrorKind::Sigsegv => "SIGSEGV",
            RuntimeErrorKind::Sigxfsz => "SIGXFSZ",
            RuntimeErrorKind::Sigfpe => "SIGFPE",
            RuntimeErrorKind::Sigabrt => "SIGABRT",
            RuntimeErrorKind::Nzec => "NZEC",
            RuntimeErrorKind::Other => "Other",
        }
    }
}

/// Terminal classification of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeError(RuntimeErrorKind),
    InternalError,
    ExecFormatError,
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => f.write_str("Accepted"),
            Verdict::WrongAnswer => f.write_str("Wrong Answer"),
            Verdict::TimeLimitExceeded => f.write_str("Time Limit Exceeded"),
            Verdict::CompilationError => f.write_str("Compilation Error"),
            Verdict::RuntimeError(kind) => write!(f, "Runtime Error ({})", kind.label()),
            Verdict::InternalError => f.write_str("Internal Error"),
            Verdict::ExecFormatError => f.write_str("Exec Format Error"),
            Verdict::Unknown => f.write_str("Unknown Error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeStatus {
    /// In queue (1) or processing (2); keep polling
    Pending,
    Finished(Verdict),
}

impl JudgeStatus {
    pub fn from_status_id(id: i64) -> Self {
        let verdict = match id {
            1 | 2 => return JudgeStatus::Pending,
            3 => Verdict::Accepted,
            4 => Verdict::WrongAnswer,
            5 => Verdict::TimeLimitExceeded,
            6 => Verdict::CompilationError,
            7 => Verdict::RuntimeError(RuntimeErrorKind::Sigsegv),
            8 => Verdict::RuntimeError(RuntimeErrorKind::Sigxfsz),
            9 => Verdict::RuntimeError(RuntimeErrorKind::Sigfpe),
            10 => Verdict::RuntimeError(RuntimeErrorKind::Sigabrt),
            11 => Verdict::RuntimeError(RuntimeErrorKind::Nzec),
            12 => Verdict::RuntimeError(RuntimeErrorKind::Other),
            13 => Verdict::InternalError,
            14 => Verdict::ExecFormatError,
            _ => Verdict::Unknown,
        };
        JudgeStatus::Finished(verdict)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JudgeStatus::Finished(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_ids() {
        assert_eq!(JudgeStatus::from_status_id(1), JudgeStatus::Pending);
        assert_eq!(JudgeStatus::from_status_id(2), JudgeStatus::Pending);
        assert!(!JudgeStatus::from_status_id(2).is_terminal());
        assert!(JudgeStatus::from_status_id(3).is_terminal());
    }

    #[test]
    fn test_runtime_error_subkinds_are_distinct() {
        let messages: Vec<String> = (7..=12)
            .map(|id| match JudgeStatus::from_status_id(id) {
                JudgeStatus::Finished(v) => v.to_string(),
                JudgeStatus::Pending => panic!("status {} should be terminal", id),
            })
            .collect();

        assert_eq!(
            messages,
            vec![
                "Runtime Error (SIGSEGV)",
                "Runtime Error (SIGXFSZ)",
                "Runtime Error (SIGFPE)",
                "Runtime Error (SIGABRT)",
                "Runtime Error (NZEC)",
                "Runtime Error (Other)",
            ]
        );
    }

    #[test]
    fn test_unmapped_ids_are_unknown() {
        for id in [0, -1, 15, 99] {
            assert_eq!(
                JudgeStatus::from_status_id(id),
                JudgeStatus::Finished(Verdict::Unknown)
            );
        }
        assert_eq!(Verdict::Unknown.to_string(), "Unknown Error");
    }

    #[test]
    fn test_fixed_labels() {
        assert_eq!(
            JudgeStatus::from_status_id(13),
            JudgeStatus::Finished(Verdict::InternalError)
        );
        assert_eq!(
            JudgeStatus::from_status_id(14),
            JudgeStatus::Finished(Verdict::ExecFormatError)
        );
        assert_eq!(Verdict::TimeLimitExceeded.to_string(), "Time Limit Exceeded");
    }
}
