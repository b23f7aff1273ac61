//! Dummy LLM provider. No network.
//!
//! Echoes the user instruction back prefixed with `[echo]`, or returns a
//! canned completion, or fails with a fixed HTTP status. Used for offline
//! runs and for exercising the pipeline end to end in tests. Every call is
//! counted so tests can assert that no backend call happened.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::llm::{ChatRequest, LlmResponse, ProviderError};

pub const DUMMY_MODEL: &str = "dummy";

#[derive(Debug, Clone)]
enum Behaviour {
    Echo,
    Reply(Arc<str>),
    Fail(u16),
}

#[derive(Debug, Clone)]
pub struct DummyProvider {
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
}

impl DummyProvider {
    pub fn echo() -> Self {
        Self::with(Behaviour::Echo)
    }

    /// Always answer with `text`.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::with(Behaviour::Reply(Arc::from(text.into())))
    }

    /// Always fail with HTTP `status`.
    pub fn failing(status: u16) -> Self {
        Self::with(Behaviour::Fail(status))
    }

    fn with(behaviour: Behaviour) -> Self {
        Self { behaviour, calls: Arc::new(AtomicUsize::new(0)) }
    }

    /// Number of `complete` calls so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn complete(&self, request: &ChatRequest<'_>) -> Result<LlmResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = match &self.behaviour {
            Behaviour::Echo => format!("[echo] {}", request.user),
            Behaviour::Reply(text) => text.to_string(),
            Behaviour::Fail(status) => {
                return Err(ProviderError::Status {
                    status: *status,
                    message: "dummy failure".into(),
                });
            }
        };
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyCompletion);
        }
        Ok(LlmResponse { text, usage: None })
    }
}
