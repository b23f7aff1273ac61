//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! Retrying lives in [`retry`], one level above the providers, so every
//! backend gets the same transient-failure policy.

pub mod providers;
pub mod retry;

use serde::Serialize;
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider '{0}' requires an API key (set LLM_API_KEY)")]
    MissingApiKey(String),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider request timed out: {0}")]
    Timeout(String),
    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("provider returned an empty completion")]
    EmptyCompletion,
}

impl ProviderError {
    /// Whether a retry could plausibly succeed: rate limiting, server-side
    /// errors, timeouts and transport failures.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Timeout(_) | ProviderError::Request(_) => true,
            ProviderError::UnknownProvider(_)
            | ProviderError::MissingApiKey(_)
            | ProviderError::EmptyCompletion => false,
        }
    }

    /// HTTP status reported by the backend, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ── Request / response ────────────────────────────────────────────────────────

/// One chat-completion round-trip: a system instruction, a user instruction
/// and the sampling parameters for this call.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the backend for a single JSON object.
    pub json_mode: bool,
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_input_tokens: u64,
}

/// Completion text plus optional usage.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Option<LlmUsage>,
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// Send one chat request and return the completion.
    pub async fn complete(&self, request: &ChatRequest<'_>) -> Result<LlmResponse, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(request).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(request).await,
        }
    }

    /// Model identifier reported in generation results.
    pub fn model(&self) -> &str {
        match self {
            LlmProvider::Dummy(_) => providers::dummy::DUMMY_MODEL,
            LlmProvider::OpenAiCompatible(p) => p.model(),
        }
    }

    /// Short backend name for logs and the health endpoint.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::OpenAiCompatible(_) => "openai",
        }
    }
}
