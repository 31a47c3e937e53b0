// Failures of the judging mechanism itself, as opposed to graded failures.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// The backend could not be reached or the connection broke mid-request.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to create submission: {0}")]
    SubmissionCreateFailed(String),

    #[error("no terminal status after {attempts} polls")]
    PollTimeout { attempts: u32 },

    #[error("malformed judge response: {0}")]
    MalformedResponse(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Local sandbox failed to set up or tear down a run.
    #[error("sandbox error: {0}")]
    Sandbox(String),
}

impl Fault {
    /// Transport faults abort a whole request; everything else is scoped to one run.
    pub fn is_transport(&self) -> bool {
        matches!(self, Fault::Transport(_))
    }
}

impl From<reqwest::Error> for Fault {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Fault::MalformedResponse(e.to_string())
        } else {
            Fault::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_transport() {
        assert!(Fault::Transport("connection refused".into()).is_transport());
        assert!(!Fault::PollTimeout { attempts: 10 }.is_transport());
        assert!(!Fault::SubmissionCreateFailed("HTTP 500".into()).is_transport());
        assert!(!Fault::Sandbox("docker".into()).is_transport());
    }

    #[test]
    fn test_poll_timeout_message() {
        assert_eq!(
            Fault::PollTimeout { attempts: 10 }.to_string(),
            "no terminal status after 10 polls"
        );
    }
}
