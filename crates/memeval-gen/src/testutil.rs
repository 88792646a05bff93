//! Scripted LLM clients and helpers shared by the pipeline tests.

use memeval_core::{GenError, GenResult};
use memeval_llm::{LlmClient, LlmResponse, RetryPolicy};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Replays a fixed sequence of responses; optionally repeats a final
/// response forever. Counts calls for short-circuit assertions.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    calls: AtomicU32,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Returns `response` on every call, forever.
    pub fn repeating(response: String) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for ScriptedLlm {
    fn generate(&self, _prompt: &str) -> GenResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        let content = match (next, &self.repeat) {
            (Some(r), _) => r,
            (None, Some(r)) => r.clone(),
            (None, None) => return Err(GenError::Api("script exhausted".into())),
        };
        Ok(LlmResponse {
            content,
            model_name: "scripted".into(),
            usage: None,
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// A retry policy with negligible sleeps for tests.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        log_after: 99,
    }
}

/// JSON scenario batch with `n` distinct scenarios.
pub fn scenario_json(n: usize) -> String {
    let scenarios: Vec<String> = (0..n).map(|i| format!("scenario number {i}")).collect();
    serde_json::json!({ "scenarios": scenarios }).to_string()
}

/// JSON core response with the given speaker and evidence texts.
pub fn core_json(speaker: &str, texts: &[&str]) -> String {
    let messages: Vec<serde_json::Value> = texts
        .iter()
        .map(|t| serde_json::json!({ "speaker": speaker, "text": t }))
        .collect();
    serde_json::json!({
        "question": "What did the user tell the assistant?",
        "answer": "the recorded facts",
        "evidence_messages": messages,
    })
    .to_string()
}

/// JSON conversation batch: one conversation per evidence text, each
/// carrying its evidence verbatim amid filler.
pub fn conversations_json(speaker: &str, texts: &[&str]) -> String {
    let conversations: Vec<serde_json::Value> = texts
        .iter()
        .map(|t| {
            serde_json::json!([
                { "speaker": "assistant", "text": "How has your week been going?" },
                { "speaker": speaker, "text": t },
                { "speaker": "assistant", "text": "Thanks for letting me know." },
            ])
        })
        .collect();
    serde_json::json!({ "conversations": conversations }).to_string()
}

/// Judge free-text answer payload.
pub fn judge_answer_json(answer: &str, abstained: bool) -> String {
    serde_json::json!({ "answer": answer, "abstained": abstained }).to_string()
}

/// Judge boolean verdict payload.
pub fn judge_verdict_json(verdict: bool) -> String {
    serde_json::json!({ "verdict": verdict, "reason": "scripted" }).to_string()
}
