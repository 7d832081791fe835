//! Server error taxonomy
//!
//! No variant closes the connection. Client-caused errors carry the text of
//! the `error` envelope sent back to the originating client.

use match_logic::LogicError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("game message before the subject was identified")]
    ProtocolGate,

    #[error("subject id must be a positive number, got {0}")]
    InvalidSubjectId(String),

    #[error("subject {active} is in progress, refusing subject {requested}")]
    SubjectMismatch { active: u64, requested: u64 },

    #[error("unknown \"{kind}\" key \"{key}\"")]
    UnknownKey { kind: &'static str, key: String },

    #[error("subject profile is incomplete, missing {0}")]
    ProfileIncomplete(&'static str),

    #[error("subject has already played a game")]
    DuplicateMatchStart,

    #[error(transparent)]
    Logic(#[from] LogicError),

    #[error("audit log: {0}")]
    Audit(#[from] csv::Error),

    #[error("configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Message for the `error` envelope, `None` when the client gets no reply
    pub fn client_message(&self) -> Option<String> {
        match self {
            ServerError::ProtocolGate => {
                Some("Subject ID and information is not yet given.".to_string())
            }
            ServerError::InvalidSubjectId(_) => Some("Subject ID can only be numeric.".to_string()),
            ServerError::SubjectMismatch { .. } => {
                Some("Another subject is already in progress.".to_string())
            }
            ServerError::ProfileIncomplete(_) => {
                Some("Subject is not ready setting up their profile.".to_string())
            }
            ServerError::DuplicateMatchStart => {
                Some("Subject has already played a game.".to_string())
            }
            ServerError::MalformedEnvelope(_)
            | ServerError::UnknownKey { .. }
            | ServerError::Logic(_)
            | ServerError::Audit(_)
            | ServerError::Config(_)
            | ServerError::Io(_) => None,
        }
    }

    /// Programmer or data errors that need a researcher's attention
    pub fn is_severe(&self) -> bool {
        matches!(
            self,
            ServerError::UnknownKey { .. }
                | ServerError::Logic(LogicError::UnknownStrategy(_))
                | ServerError::Logic(LogicError::IncompleteRound)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_facing_messages() {
        assert!(ServerError::ProtocolGate.client_message().is_some());
        assert!(ServerError::DuplicateMatchStart.client_message().is_some());
        assert!(ServerError::MalformedEnvelope("x".into()).client_message().is_none());
        assert!(ServerError::Logic(LogicError::IncompleteRound).client_message().is_none());
    }

    #[test]
    fn test_severity() {
        let unknown = ServerError::UnknownKey { kind: "info", key: "colour".into() };
        assert!(unknown.is_severe());
        assert_eq!(unknown.to_string(), "unknown \"info\" key \"colour\"");
        assert!(ServerError::Logic(LogicError::IncompleteRound).is_severe());
        assert!(!ServerError::ProtocolGate.is_severe());
    }
}
