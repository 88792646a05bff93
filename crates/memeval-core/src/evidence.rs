//! Core data model: use cases, evidence cores, conversations,
//! accepted evidence items, and verification results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the dialogue a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for Speaker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("invalid speaker: {s}")),
        }
    }
}

/// A single dialogue turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub text: String,
}

impl Message {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Evidence type; selects the generation strategy and verification chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    /// Stable facts the user states about themselves.
    UserFacts,
    /// Facts whose value evolves across conversations; the final state answers.
    ChangingFacts,
    /// Questions whose correct answer is "I don't know" without the evidence.
    Abstention,
    /// Tastes and preferences the user expresses.
    Preference,
}

impl fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserFacts => write!(f, "user_facts"),
            Self::ChangingFacts => write!(f, "changing_facts"),
            Self::Abstention => write!(f, "abstention"),
            Self::Preference => write!(f, "preference"),
        }
    }
}

impl std::str::FromStr for EvidenceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user_facts" | "user-facts" => Ok(Self::UserFacts),
            "changing_facts" | "changing-facts" => Ok(Self::ChangingFacts),
            "abstention" => Ok(Self::Abstention),
            "preference" => Ok(Self::Preference),
            _ => Err(format!("invalid evidence category: {s}")),
        }
    }
}

/// One scenario description; seeds exactly one evidence-generation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceUseCase {
    pub id: String,
    pub category: EvidenceCategory,
    pub scenario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generating_model: Option<String>,
}

impl EvidenceUseCase {
    pub fn new(category: EvidenceCategory, scenario: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            category,
            scenario: scenario.into(),
            generating_model: None,
        }
    }
}

/// The pre-embedding (question, answer, evidence-messages) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceCore {
    pub question: String,
    pub answer: String,
    pub evidence_messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generating_model: Option<String>,
}

/// A full generated dialogue. `contains_evidence` is stamped true (with a
/// fresh id) only after the conversation set passes placement validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub contains_evidence: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generating_model: Option<String>,
}

impl Conversation {
    pub fn unstamped(messages: Vec<Message>, generating_model: Option<String>) -> Self {
        Self {
            id: String::new(),
            messages,
            contains_evidence: false,
            generating_model,
        }
    }

    /// Assign a fresh identifier and mark the conversation as an evidence
    /// carrier. Called exactly once, on acceptance.
    pub fn stamp(&mut self) {
        self.id = ulid::Ulid::new().to_string();
        self.contains_evidence = true;
    }
}

/// The accepted unit of the dataset. Immutable once persisted; conversation
/// `i` is the only carrier of evidence message `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub question: String,
    pub answer: String,
    pub evidence_messages: Vec<Message>,
    pub conversations: Vec<Conversation>,
    pub category: EvidenceCategory,
    pub scenario: String,
    #[serde(default)]
    pub person_id: String,
    pub created_at: DateTime<Utc>,
}

impl EvidenceItem {
    pub fn from_parts(
        core: EvidenceCore,
        conversations: Vec<Conversation>,
        use_case: &EvidenceUseCase,
        person_id: impl Into<String>,
    ) -> Self {
        Self {
            question: core.question,
            answer: core.answer,
            evidence_messages: core.evidence_messages,
            conversations,
            category: use_case.category,
            scenario: use_case.scenario.clone(),
            person_id: person_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a single semantic judge check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_name: String,
    pub passed: bool,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_model_answer: Option<String>,
}

/// Ordered check outcomes with short-circuit semantics: the last entry is
/// the failing check, if any; later checks were never run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompositeVerificationResult {
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl CompositeVerificationResult {
    /// An empty chain passes trivially.
    pub fn empty_pass() -> Self {
        Self {
            passed: true,
            checks: Vec::new(),
            failure_reason: None,
        }
    }
}
