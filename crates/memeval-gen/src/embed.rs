//! Conversation embedder: expands an evidence core into one conversation
//! per evidence message. Runs under its own retry budget so a good core is
//! not thrown away for a placement failure.

use crate::strategy::EvidenceTypeStrategy;
use memeval_core::{Conversation, EvidenceCore, EvidenceUseCase, GenError, GenResult, Persona};
use memeval_llm::wire::ConversationBatch;
use memeval_llm::{decode_json, LlmClient};
use std::sync::Arc;
use tracing::debug;

pub struct ConversationEmbedder {
    llm: Arc<dyn LlmClient>,
}

impl ConversationEmbedder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// One generation attempt. Returns unstamped conversations; placement
    /// correctness is the validator's job, only the count is checked here.
    pub fn embed(
        &self,
        persona: &Persona,
        use_case: &EvidenceUseCase,
        core: &EvidenceCore,
        strategy: &dyn EvidenceTypeStrategy,
    ) -> GenResult<Vec<Conversation>> {
        let prompt = strategy.embed_prompt(persona, use_case, core);
        let response = self.llm.generate(&prompt)?;
        let batch: ConversationBatch = decode_json(&response.content)?;

        if batch.conversations.len() != core.evidence_messages.len() {
            return Err(GenError::Schema(format!(
                "{} conversations for {} evidence messages",
                batch.conversations.len(),
                core.evidence_messages.len()
            )));
        }

        let conversations: Vec<Conversation> = batch
            .conversations
            .into_iter()
            .map(|wire_messages| {
                let messages = wire_messages
                    .into_iter()
                    .map(|m| m.into_message())
                    .collect::<GenResult<Vec<_>>>()?;
                Ok(Conversation::unstamped(
                    messages,
                    Some(response.model_name.clone()),
                ))
            })
            .collect::<GenResult<_>>()?;

        debug!(
            use_case = %use_case.id,
            conversations = conversations.len(),
            "conversations embedded"
        );
        Ok(conversations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::UserFactsStrategy;
    use crate::testutil::{conversations_json, ScriptedLlm};
    use memeval_core::{EvidenceCategory, Message, Speaker};

    fn fixtures(texts: &[&str]) -> (Persona, EvidenceUseCase, EvidenceCore) {
        let core = EvidenceCore {
            question: "q".into(),
            answer: "a".into(),
            evidence_messages: texts
                .iter()
                .map(|t| Message::new(Speaker::User, *t))
                .collect(),
            generating_model: None,
        };
        (
            Persona::new("p01", "Maya", "analyst", ""),
            EvidenceUseCase::new(EvidenceCategory::UserFacts, "s"),
            core,
        )
    }

    #[test]
    fn test_embed_one_conversation_per_message() {
        let texts = ["fact one", "fact two"];
        let (persona, uc, core) = fixtures(&texts);
        let llm = Arc::new(ScriptedLlm::new(vec![conversations_json("user", &texts)]));
        let convs = ConversationEmbedder::new(llm)
            .embed(&persona, &uc, &core, &UserFactsStrategy)
            .unwrap();
        assert_eq!(convs.len(), 2);
        assert!(convs.iter().all(|c| !c.contains_evidence));
        assert!(convs.iter().all(|c| c.id.is_empty()));
    }

    #[test]
    fn test_count_mismatch_is_schema_error() {
        let (persona, uc, core) = fixtures(&["fact one", "fact two"]);
        let llm = Arc::new(ScriptedLlm::new(vec![conversations_json(
            "user",
            &["fact one"],
        )]));
        let err = ConversationEmbedder::new(llm)
            .embed(&persona, &uc, &core, &UserFactsStrategy)
            .unwrap_err();
        assert!(matches!(err, GenError::Schema(_)));
    }

    #[test]
    fn test_bad_speaker_in_conversation_rejected() {
        let (persona, uc, core) = fixtures(&["fact one"]);
        let content = serde_json::json!({ "conversations": [[
            { "speaker": "system", "text": "fact one" }
        ]]})
        .to_string();
        let llm = Arc::new(ScriptedLlm::new(vec![content]));
        let err = ConversationEmbedder::new(llm)
            .embed(&persona, &uc, &core, &UserFactsStrategy)
            .unwrap_err();
        assert!(matches!(err, GenError::Schema(_)));
    }
}
