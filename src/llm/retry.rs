//! Bounded retry with jittered exponential backoff for backend calls.
//!
//! Only [`ProviderError::is_transient`] failures are retried; anything else
//! is returned on first sight.

use std::time::Duration;

use tokio_retry2::strategy::{jitter, ExponentialBackoff};
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

use crate::config::RetryConfig;
use crate::llm::{ChatRequest, LlmProvider, LlmResponse, ProviderError};

/// Delay schedule: `initial, 2×initial, 4×initial, …` capped at
/// `max_delay_secs`, jittered, at most `max_retries` entries.
pub fn backoff(policy: &RetryConfig) -> impl Iterator<Item = Duration> {
    // ExponentialBackoff yields base^n * factor; base 2 with factor initial/2
    // gives the doubling sequence starting at `initial`.
    let factor = (policy.initial_backoff_ms / 2).max(1);
    ExponentialBackoff::from_millis(2)
        .factor(factor)
        .max_delay(Duration::from_secs(policy.max_delay_secs))
        .map(jitter)
        .take(policy.max_retries)
}

/// Call `provider` once, retrying transient failures per `policy`.
pub async fn complete_with_retry(
    provider: &LlmProvider,
    request: &ChatRequest<'_>,
    policy: &RetryConfig,
) -> Result<LlmResponse, ProviderError> {
    let mut attempt = 0usize;
    Retry::spawn(backoff(policy), || {
        attempt += 1;
        let attempt = attempt;
        async move {
            match provider.complete(request).await {
                Ok(response) => Ok(response),
                Err(e) if e.is_transient() => {
                    warn!(attempt, error = %e, "transient LLM failure, will retry if budget remains");
                    Err(RetryError::Transient { err: e, retry_after: None })
                }
                Err(e) => {
                    warn!(attempt, error = %e, "permanent LLM failure, not retrying");
                    Err(RetryError::Permanent(e))
                }
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;

    fn policy(max_retries: usize) -> RetryConfig {
        RetryConfig { max_retries, initial_backoff_ms: 1, max_delay_secs: 1 }
    }

    fn req() -> ChatRequest<'static> {
        ChatRequest { system: "s", user: "u", temperature: 0.5, max_tokens: 10, json_mode: false }
    }

    #[test]
    fn backoff_is_bounded() {
        let delays: Vec<Duration> = backoff(&RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 500,
            max_delay_secs: 2,
        })
        .collect();
        assert_eq!(delays.len(), 5);
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(2)));
    }

    #[test]
    fn zero_retries_means_no_delays() {
        assert_eq!(backoff(&policy(0)).count(), 0);
    }

    #[tokio::test]
    async fn success_is_not_retried() {
        let dummy = DummyProvider::reply("ok");
        let provider = LlmProvider::Dummy(dummy.clone());
        let out = complete_with_retry(&provider, &req(), &policy(3)).await.unwrap();
        assert_eq!(out.text, "ok");
        assert_eq!(dummy.calls(), 1);
    }

    #[tokio::test]
    async fn transient_failure_uses_whole_budget() {
        let dummy = DummyProvider::failing(503);
        let provider = LlmProvider::Dummy(dummy.clone());
        let err = complete_with_retry(&provider, &req(), &policy(2)).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(dummy.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_returned_immediately() {
        let dummy = DummyProvider::failing(401);
        let provider = LlmProvider::Dummy(dummy.clone());
        let err = complete_with_retry(&provider, &req(), &policy(5)).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(dummy.calls(), 1);
    }
}
