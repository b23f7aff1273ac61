//! Application-wide error types.
//!
//! [`AppError`] covers startup and server lifecycle failures. Request-level
//! failures live in [`crate::pipeline::PipelineError`] and never reach here.

use thiserror::Error;

use crate::llm::ProviderError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("llm provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("config store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("config error"));
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn logger_error_display() {
        let e = AppError::Logger("already initialized".into());
        assert!(e.to_string().contains("already initialized"));
    }

    #[test]
    fn provider_error_converts() {
        let e: AppError = ProviderError::MissingApiKey("openai".into()).into();
        assert!(e.to_string().contains("llm provider error"));
        assert!(e.to_string().contains("LLM_API_KEY"));
    }
}
