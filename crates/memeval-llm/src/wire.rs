//! Schemas the generation prompts ask models to produce.

use memeval_core::{GenError, GenResult, Message, Speaker};
use serde::Deserialize;

/// A batch of scenario descriptions from the catalog prompt.
#[derive(Debug, Deserialize)]
pub struct ScenarioBatch {
    pub scenarios: Vec<String>,
}

/// Raw (question, answer, evidence) triple before structural validation.
#[derive(Debug, Deserialize)]
pub struct CoreResponse {
    pub question: String,
    pub answer: String,
    pub evidence_messages: Vec<WireMessage>,
}

/// One generated conversation per evidence message.
#[derive(Debug, Deserialize)]
pub struct ConversationBatch {
    pub conversations: Vec<Vec<WireMessage>>,
}

/// A message as models emit it; speaker is free text until checked.
#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub speaker: String,
    pub text: String,
}

impl WireMessage {
    /// Tighten the free-text speaker into the enum.
    pub fn into_message(self) -> GenResult<Message> {
        let speaker: Speaker = self
            .speaker
            .parse()
            .map_err(|e: String| GenError::Schema(e))?;
        Ok(Message::new(speaker, self.text))
    }
}

/// Judge free-text answer to a question under restricted context.
#[derive(Debug, Deserialize)]
pub struct JudgeAnswer {
    pub answer: String,
    /// Set when the judge declines to answer for lack of information.
    #[serde(default)]
    pub abstained: bool,
}

/// Judge boolean classification (equivalence, relevance).
#[derive(Debug, Deserialize)]
pub struct JudgeVerdict {
    pub verdict: bool,
    #[serde(default)]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_json;

    #[test]
    fn test_wire_message_speaker_checked() {
        let ok = WireMessage {
            speaker: "User".into(),
            text: "hi".into(),
        };
        assert_eq!(ok.into_message().unwrap().speaker, Speaker::User);

        let bad = WireMessage {
            speaker: "system".into(),
            text: "hi".into(),
        };
        assert!(matches!(bad.into_message(), Err(GenError::Schema(_))));
    }

    #[test]
    fn test_core_response_decode() {
        let content = r#"{
            "question": "What breed is the user's dog?",
            "answer": "A greyhound",
            "evidence_messages": [
                {"speaker": "user", "text": "I adopted a greyhound named Pixel"}
            ]
        }"#;
        let core: CoreResponse = decode_json(content).unwrap();
        assert_eq!(core.evidence_messages.len(), 1);
    }

    #[test]
    fn test_conversation_batch_decode() {
        let content = r#"{"conversations": [
            [{"speaker":"assistant","text":"Morning!"},{"speaker":"user","text":"hi"}],
            [{"speaker":"user","text":"hello again"}]
        ]}"#;
        let batch: ConversationBatch = decode_json(content).unwrap();
        assert_eq!(batch.conversations.len(), 2);
        assert_eq!(batch.conversations[0].len(), 2);
    }
}
