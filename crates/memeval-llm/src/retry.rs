//! Generic retry wrapper: a higher-order function over
//! `FnMut() -> GenResult<T>` with exponential backoff. Failure categories
//! stay in the type — non-retryable errors return immediately instead of
//! burning the budget.

use memeval_core::{GenError, GenResult};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Stay quiet for the first few attempts; transient blips are routine.
    pub log_after: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            log_after: 1,
        }
    }
}

/// Run `op` up to `policy.max_attempts` times, doubling the delay between
/// attempts up to the cap. Returns the first success, the first
/// non-retryable error, or `Exhausted` wrapping the last failure.
pub fn retry_with_backoff<T, F>(policy: &RetryPolicy, label: &str, mut op: F) -> GenResult<T>
where
    F: FnMut() -> GenResult<T>,
{
    let mut delay = policy.initial_delay;
    let mut last_err: Option<GenError> = None;

    for attempt in 1..=policy.max_attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt > policy.log_after {
                    warn!(%label, attempt, max = policy.max_attempts, error = %e, "retrying");
                }
                last_err = Some(e);
                if attempt < policy.max_attempts {
                    std::thread::sleep(delay);
                    delay = (delay * 2).min(policy.max_delay);
                }
            }
        }
    }

    Err(GenError::Exhausted {
        what: label.to_string(),
        attempts: policy.max_attempts,
        last: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".into()),
    })
}
