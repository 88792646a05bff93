pub mod error;
pub mod evidence;
pub mod matcher;
pub mod persona;
pub mod stats;
pub mod validate;

pub use error::{FailureCategory, GenError, GenResult};
pub use evidence::{
    CheckResult, CompositeVerificationResult, Conversation, EvidenceCategory, EvidenceCore,
    EvidenceItem, EvidenceUseCase, Message, Speaker,
};
pub use matcher::{levenshtein, match_message, MatchTier, MatcherConfig};
pub use persona::Persona;
pub use stats::{CheckCounters, GenerationStats};
pub use validate::{validate_placement, ValidationReport};
