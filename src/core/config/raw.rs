//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults, so an
//! empty document deserializes into the built-in configuration.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape, the serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub server: RawServer,
    #[serde(default)]
    pub llm: RawLlm,
    #[serde(default)]
    pub store: RawStore,
    #[serde(default)]
    pub generation: RawGeneration,
}

#[derive(Deserialize)]
pub(super) struct RawServer {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self { bind: default_bind(), log_level: default_log_level() }
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
    #[serde(default)]
    pub retry: RawRetry,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            openai: RawOpenAiConfig::default(),
            retry: RawRetry::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub app_title: Option<String>,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            timeout_seconds: default_openai_timeout_seconds(),
            site_url: None,
            app_title: None,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawRetry {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for RawRetry {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawStore {
    #[serde(rename = "default", default = "default_store_backend")]
    pub backend: String,
    #[serde(default)]
    pub rest: RawRestStore,
    #[serde(default)]
    pub memory: RawMemoryStore,
}

impl Default for RawStore {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            rest: RawRestStore::default(),
            memory: RawMemoryStore::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawRestStore {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_store_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawRestStore {
    fn default() -> Self {
        Self { url: String::new(), timeout_seconds: default_store_timeout_seconds() }
    }
}

#[derive(Deserialize, Default)]
pub(super) struct RawMemoryStore {
    #[serde(default)]
    pub fixture: Option<String>,
}

// ── Generation ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawGeneration {
    #[serde(default = "default_style")]
    pub default_style: String,
    #[serde(default = "default_common_style_slug")]
    pub common_style_slug: String,
    #[serde(default = "default_concept_slug_prefix")]
    pub concept_slug_prefix: String,
    #[serde(default = "default_template_content_type")]
    pub template_content_type: String,
    #[serde(default = "default_tip_category")]
    pub tip_category: String,
    #[serde(default = "default_pool_limit")]
    pub example_pool_limit: usize,
    #[serde(default = "default_pool_limit")]
    pub tip_pool_limit: usize,
    #[serde(default = "default_examples_per_request")]
    pub examples_per_request: usize,
    #[serde(default = "default_max_pattern_count")]
    pub max_pattern_count: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_suggestion_max_tokens")]
    pub suggestion_max_tokens: u32,
    #[serde(default = "default_column_max_tokens")]
    pub column_max_tokens: u32,
}

impl Default for RawGeneration {
    fn default() -> Self {
        Self {
            default_style: default_style(),
            common_style_slug: default_common_style_slug(),
            concept_slug_prefix: default_concept_slug_prefix(),
            template_content_type: default_template_content_type(),
            tip_category: default_tip_category(),
            example_pool_limit: default_pool_limit(),
            tip_pool_limit: default_pool_limit(),
            examples_per_request: default_examples_per_request(),
            max_pattern_count: default_max_pattern_count(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            suggestion_max_tokens: default_suggestion_max_tokens(),
            column_max_tokens: default_column_max_tokens(),
        }
    }
}

// ── Defaults ────────────────────────────────────────────────────────────────

pub(super) fn default_bind() -> String { "127.0.0.1:8080".to_string() }
pub(super) fn default_log_level() -> String { "info".to_string() }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_openai_api_base_url() -> String { "https://openrouter.ai/api/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "x-ai/grok-4.1-fast".to_string() }
fn default_openai_timeout_seconds() -> u64 { 120 }
fn default_max_retries() -> usize { 2 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_delay_secs() -> u64 { 8 }
fn default_store_backend() -> String { "rest".to_string() }
fn default_store_timeout_seconds() -> u64 { 10 }
fn default_style() -> String { "pana_emotion".to_string() }
fn default_common_style_slug() -> String { "board_common".to_string() }
fn default_concept_slug_prefix() -> String { "board_concept_".to_string() }
fn default_template_content_type() -> String { "board_temp".to_string() }
fn default_tip_category() -> String { "board_writing_tip".to_string() }
fn default_pool_limit() -> usize { 10 }
fn default_examples_per_request() -> usize { 2 }
fn default_max_pattern_count() -> usize { 5 }
fn default_temperature() -> f32 { 0.9 }
fn default_max_output_tokens() -> u32 { 4000 }
fn default_suggestion_max_tokens() -> u32 { 1000 }
fn default_column_max_tokens() -> u32 { 8000 }
