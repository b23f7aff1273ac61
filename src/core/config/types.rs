//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs that the pipeline and server
//! consume. Raw TOML deserialization types live in `raw.rs`.

use std::path::PathBuf;

// ── Server ───────────────────────────────────────────────────────────────────

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the axum listener to.
    pub bind: String,
}

// ── LLM ──────────────────────────────────────────────────────────────────────

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body and reported back to callers.
    pub model: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Sent as `HTTP-Referer` (OpenRouter attribution) when set.
    pub site_url: Option<String>,
    /// Sent as `X-Title` (OpenRouter attribution) when set.
    pub app_title: Option<String>,
}

/// Backoff policy for transient backend failures (`[llm.retry]`).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: usize,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_secs: u64,
}

/// LLM backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
    pub retry: RetryConfig,
}

// ── Store ────────────────────────────────────────────────────────────────────

/// PostgREST endpoint of the configuration store (`[store.rest]`).
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Project base URL, e.g. `https://<ref>.supabase.co`. `/rest/v1` is appended.
    pub url: String,
    pub timeout_seconds: u64,
}

/// In-process fixture store (`[store.memory]`).
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Optional JSON fixture with `styles`, `examples` and `tips` arrays.
    pub fixture: Option<PathBuf>,
}

/// Configuration store selection.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `"rest"` or `"memory"`. Maps to `default` in `[store]`.
    pub backend: String,
    pub rest: RestStoreConfig,
    pub memory: MemoryStoreConfig,
}

// ── Generation ───────────────────────────────────────────────────────────────

/// Knobs of the generation pipeline (`[generation]`).
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Style slug used when a request omits `styleSlug`.
    pub default_style: String,
    /// Slug of the shared board style merged under every concept overlay.
    pub common_style_slug: String,
    /// Concept records live at `<prefix><conceptId>`.
    pub concept_slug_prefix: String,
    /// `content_type` tag of the board templates that concept overlays filter.
    pub template_content_type: String,
    /// Knowledge-chunk category holding board writing tips.
    pub tip_category: String,
    /// Rows fetched per example query before sampling.
    pub example_pool_limit: usize,
    /// Rows fetched per tip query before sampling.
    pub tip_pool_limit: usize,
    /// Examples injected into a single prompt.
    pub examples_per_request: usize,
    /// Largest `patternCount` a request may ask for.
    pub max_pattern_count: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Budget for `/api/suggestions` replies.
    pub suggestion_max_tokens: u32,
    /// Budget for `/api/column` replies.
    pub column_max_tokens: u32,
}

// ── Top level ────────────────────────────────────────────────────────────────

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` (or `OPENROUTER_API_KEY`). Never sourced from TOML.
    pub llm_api_key: Option<String>,
    pub store: StoreConfig,
    /// Store key from `SUPABASE_ANON_KEY`. Never sourced from TOML.
    pub store_api_key: Option<String>,
    pub generation: GenerationConfig,
}

/// Values read from the process environment that override or complete the
/// file-based config. Tests build this directly instead of mutating env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub bind: Option<String>,
    pub log_level: Option<String>,
    pub store_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub store_api_key: Option<String>,
}
