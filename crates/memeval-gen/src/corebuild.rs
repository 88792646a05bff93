//! Evidence core builder. One call, one triple; structural violations are
//! schema errors so the caller's outer loop regenerates from scratch —
//! patching a bad core tends to preserve the same latent mistake.

use crate::strategy::EvidenceTypeStrategy;
use memeval_core::{EvidenceCore, EvidenceUseCase, GenError, GenResult, Message, Persona};
use memeval_llm::wire::CoreResponse;
use memeval_llm::{decode_json, LlmClient};
use std::sync::Arc;
use tracing::debug;

pub struct EvidenceCoreBuilder {
    llm: Arc<dyn LlmClient>,
    evidence_count: usize,
}

impl EvidenceCoreBuilder {
    pub fn new(llm: Arc<dyn LlmClient>, evidence_count: usize) -> Self {
        Self {
            llm,
            evidence_count,
        }
    }

    /// Ask the model for a (question, answer, evidence-messages) triple and
    /// validate it against the configuration and the strategy's expected
    /// speaker. No partial repair on violation.
    pub fn build(
        &self,
        persona: &Persona,
        use_case: &EvidenceUseCase,
        strategy: &dyn EvidenceTypeStrategy,
    ) -> GenResult<EvidenceCore> {
        let prompt = strategy.core_prompt(persona, use_case, self.evidence_count);
        let response = self.llm.generate(&prompt)?;
        let raw: CoreResponse = decode_json(&response.content)?;

        let messages: Vec<Message> = raw
            .evidence_messages
            .into_iter()
            .map(|m| m.into_message())
            .collect::<GenResult<_>>()?;

        if messages.len() != self.evidence_count {
            return Err(GenError::Schema(format!(
                "{} evidence messages, expected {}",
                messages.len(),
                self.evidence_count
            )));
        }

        let expected = strategy.expected_speaker();
        if let Some(stray) = messages.iter().find(|m| m.speaker != expected) {
            return Err(GenError::Schema(format!(
                "evidence message spoken by '{}', expected '{expected}'",
                stray.speaker
            )));
        }

        if raw.question.trim().is_empty() || raw.answer.trim().is_empty() {
            return Err(GenError::Schema("empty question or answer".into()));
        }

        debug!(use_case = %use_case.id, question = %raw.question, "evidence core built");

        Ok(EvidenceCore {
            question: raw.question,
            answer: raw.answer,
            evidence_messages: messages,
            generating_model: Some(response.model_name),
        })
    }
}
