//! Blocking LLM client boundary.
//!
//! The pipeline only ever sees `dyn LlmClient`; the production
//! implementation speaks the OpenAI-compatible chat-completions protocol
//! over plain blocking HTTP. A worker thread owns each call end-to-end —
//! suspension happens only inside the HTTP read.

use memeval_core::{GenError, GenResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model_name: String,
    pub usage: Option<TokenUsage>,
}

/// The one seam the pipeline needs from a model provider.
pub trait LlmClient: Send + Sync {
    fn generate(&self, prompt: &str) -> GenResult<LlmResponse>;

    /// Name used to stamp generated artifacts.
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat-completions client.
pub struct HttpLlmClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl HttpLlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(120))
            .build();
        Self {
            agent,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl LlmClient for HttpLlmClient {
    fn generate(&self, prompt: &str) -> GenResult<LlmResponse> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "llm request");

        let response = self
            .agent
            .post(&self.endpoint())
            .set("authorization", &format!("Bearer {}", self.api_key))
            .set("content-type", "application/json")
            .send_json(&body)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let text = resp.into_string().unwrap_or_default();
                    GenError::Api(format!(
                        "{code}: {}",
                        text.chars().take(500).collect::<String>()
                    ))
                }
                ureq::Error::Transport(t) => GenError::Api(t.to_string()),
            })?;

        let parsed: ChatResponse = response
            .into_json()
            .map_err(|e| GenError::Api(format!("malformed completion body: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenError::Api("completion returned no choices".into()))?;

        Ok(LlmResponse {
            content: choice.message.content,
            model_name: parsed.model.unwrap_or_else(|| self.model.clone()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// --- wire shapes for the completions endpoint ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
