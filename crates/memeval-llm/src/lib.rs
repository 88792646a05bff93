pub mod client;
pub mod decode;
pub mod retry;
pub mod wire;

pub use client::{HttpLlmClient, LlmClient, LlmResponse, TokenUsage};
pub use decode::decode_json;
pub use retry::{retry_with_backoff, RetryPolicy};
