//! Bounded retry with exponential backoff around a single `TextGenerator` call.
//!
//! Only transient failures (timeouts, network errors, 429, 5xx) are retried.
//! Authentication and invalid-request failures return on the first attempt.

use std::time::Duration;

use tracing::warn;

use crate::config::Config;
use crate::llm_client::{GenerationError, TextGenerator};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.llm_max_retries,
            ..Self::default()
        }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        // 1s, 2s, 4s, ...
        self.base_delay.saturating_mul(1 << retry.saturating_sub(1).min(16))
    }
}

/// Calls `generator.complete` until it succeeds, fails permanently, or the
/// retry budget is spent. Returns the last error in the latter two cases.
pub async fn complete_with_retry(
    generator: &dyn TextGenerator,
    prompt: &str,
    temperature: f32,
    policy: &RetryPolicy,
) -> Result<String, GenerationError> {
    let mut attempt = 0u32;
    loop {
        match generator.complete(prompt, temperature).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    "Generation attempt {} failed ({e}), retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
