//! Structured decoding of model output. Models wrap JSON in code fences,
//! add prose around it, and occasionally emit trailing commas — strip the
//! fences, try strict JSON, then fall back to lenient parsing. A decode
//! failure is a retryable generation failure, never fatal.

use memeval_core::{GenError, GenResult};
use serde::de::DeserializeOwned;

/// Decode model output as JSON of type `T`.
pub fn decode_json<T: DeserializeOwned>(content: &str) -> GenResult<T> {
    let stripped = strip_code_fences(content);
    let candidate = extract_json_span(stripped).unwrap_or(stripped);

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(strict_err) => serde_json_lenient::from_str(candidate).map_err(|_| {
            GenError::Decode(format!(
                "{strict_err} (content starts: {})",
                candidate.chars().take(120).collect::<String>()
            ))
        }),
    }
}

/// Drop a surrounding ```json ... ``` (or plain ```) fence if present.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").map_or(rest, str::trim_end).trim()
}

/// Narrow to the outermost `{...}` or `[...]` span so prose before or
/// after the payload doesn't break parsing.
fn extract_json_span(content: &str) -> Option<&str> {
    let open = content.find(['{', '['])?;
    let close_char = if content.as_bytes()[open] == b'{' {
        '}'
    } else {
        ']'
    };
    let close = content.rfind(close_char)?;
    (close > open).then(|| &content[open..=close])
}
