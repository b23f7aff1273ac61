//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory, called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and the API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML). Hosted backends
/// refuse to start without one; only the dummy provider runs keyless.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider::echo())),
        "openai" | "openai-compatible" | "openrouter" => {
            let api_key = api_key.ok_or_else(|| ProviderError::MissingApiKey(config.provider.clone()))?;
            let p = openai_compatible::OpenAiCompatibleProvider::new(&config.openai, api_key)?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}
