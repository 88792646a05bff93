use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why the deterministic placement validator rejected a conversation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    InvalidSpeakers,
    EmptyConversation,
    ConversationCountMismatch,
    EvidenceNotFound,
    EvidenceInMultipleConversations,
    EvidenceInWrongConversation,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidSpeakers => "INVALID_SPEAKERS",
            Self::EmptyConversation => "EMPTY_CONVERSATION",
            Self::ConversationCountMismatch => "CONVERSATION_COUNT_MISMATCH",
            Self::EvidenceNotFound => "EVIDENCE_NOT_FOUND",
            Self::EvidenceInMultipleConversations => "EVIDENCE_IN_MULTIPLE_CONVERSATIONS",
            Self::EvidenceInWrongConversation => "EVIDENCE_IN_WRONG_CONVERSATION",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum GenError {
    /// Transport or HTTP-level failure talking to a model endpoint.
    #[error("llm api error: {0}")]
    Api(String),

    /// Model output could not be decoded into the expected schema.
    #[error("undecodable model output: {0}")]
    Decode(String),

    /// Output decoded but violates a structural expectation
    /// (wrong message count, wrong speaker, empty scenario list).
    #[error("schema violation: {0}")]
    Schema(String),

    /// The deterministic placement validator rejected the conversations.
    #[error("placement validation failed: {}", format_categories(.0))]
    Validation(Vec<FailureCategory>),

    /// A semantic judge check rejected the evidence item.
    #[error("verification check '{check}' failed: {detail}")]
    Verification { check: String, detail: String },

    /// A retry budget ran out; carries the last underlying failure text.
    #[error("{what} exhausted after {attempts} attempts: {last}")]
    Exhausted {
        what: String,
        attempts: u32,
        last: String,
    },

    /// Circuit-breaker trip: the whole run is misconfigured, not unlucky.
    #[error("systemic failure: {0}")]
    Systemic(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl GenError {
    /// Transient failures are retried with backoff; everything else
    /// escalates to the caller (regeneration, abandonment, or abort).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Api(_) | Self::Decode(_) | Self::Schema(_))
    }

    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::Systemic(_))
    }
}

fn format_categories(cats: &[FailureCategory]) -> String {
    cats.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type GenResult<T> = Result<T, GenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_split() {
        assert!(GenError::Api("timeout".into()).is_retryable());
        assert!(GenError::Decode("not json".into()).is_retryable());
        assert!(GenError::Schema("3 messages, expected 2".into()).is_retryable());
        assert!(!GenError::Systemic("no yield".into()).is_retryable());
        assert!(!GenError::Validation(vec![FailureCategory::EvidenceNotFound]).is_retryable());
    }

    #[test]
    fn test_validation_display_lists_categories() {
        let e = GenError::Validation(vec![
            FailureCategory::EvidenceNotFound,
            FailureCategory::EvidenceInWrongConversation,
        ]);
        let msg = e.to_string();
        assert!(msg.contains("EVIDENCE_NOT_FOUND"));
        assert!(msg.contains("EVIDENCE_IN_WRONG_CONVERSATION"));
    }
}
