//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `KOTONOHA_BIND`, `KOTONOHA_LOG_LEVEL` and `SUPABASE_URL`
//! overrides. Secrets come from the environment only.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

impl EnvOverrides {
    /// Snapshot the relevant environment variables.
    pub fn from_env() -> Self {
        Self {
            bind: env::var("KOTONOHA_BIND").ok(),
            log_level: env::var("KOTONOHA_LOG_LEVEL").ok(),
            store_url: env::var("SUPABASE_URL").ok(),
            llm_api_key: env::var("LLM_API_KEY")
                .or_else(|_| env::var("OPENROUTER_API_KEY"))
                .ok(),
            store_api_key: env::var("SUPABASE_ANON_KEY").ok(),
        }
    }
}

/// Deep-merge two TOML values.
/// Tables are merged recursively; the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, the built-in
/// defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = EnvOverrides::from_env();

    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        Ok(resolve(RawConfig::default(), &overrides, Path::new(".")))
    }
}

/// Loader that accepts an explicit path and overrides.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    let config_dir = path.parent().unwrap_or(Path::new("."));
    Ok(resolve(parsed, overrides, config_dir))
}

/// Built-in configuration with the given overrides and no file.
pub fn defaults(overrides: &EnvOverrides) -> Config {
    resolve(RawConfig::default(), overrides, Path::new("."))
}

fn resolve(parsed: RawConfig, overrides: &EnvOverrides, config_dir: &Path) -> Config {
    let fixture = parsed.store.memory.fixture.map(|f| {
        let p = PathBuf::from(f);
        if p.is_absolute() { p } else { config_dir.join(p) }
    });

    let g = parsed.generation;

    Config {
        log_level: overrides
            .log_level
            .clone()
            .unwrap_or(parsed.server.log_level),
        server: ServerConfig {
            bind: overrides.bind.clone().unwrap_or(parsed.server.bind),
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                timeout_seconds: parsed.llm.openai.timeout_seconds.max(1),
                site_url: parsed.llm.openai.site_url.filter(|s| !s.is_empty()),
                app_title: parsed.llm.openai.app_title.filter(|s| !s.is_empty()),
            },
            retry: RetryConfig {
                max_retries: parsed.llm.retry.max_retries,
                initial_backoff_ms: parsed.llm.retry.initial_backoff_ms.max(1),
                max_delay_secs: parsed.llm.retry.max_delay_secs.max(1),
            },
        },
        llm_api_key: overrides.llm_api_key.clone().filter(|k| !k.is_empty()),
        store: StoreConfig {
            backend: parsed.store.backend,
            rest: RestStoreConfig {
                url: overrides.store_url.clone().unwrap_or(parsed.store.rest.url),
                timeout_seconds: parsed.store.rest.timeout_seconds.max(1),
            },
            memory: MemoryStoreConfig { fixture },
        },
        store_api_key: overrides.store_api_key.clone().filter(|k| !k.is_empty()),
        generation: GenerationConfig {
            default_style: g.default_style,
            common_style_slug: g.common_style_slug,
            concept_slug_prefix: g.concept_slug_prefix,
            template_content_type: g.template_content_type,
            tip_category: g.tip_category,
            example_pool_limit: g.example_pool_limit.max(1),
            tip_pool_limit: g.tip_pool_limit.max(1),
            examples_per_request: g.examples_per_request,
            max_pattern_count: g.max_pattern_count.max(1),
            temperature: g.temperature,
            max_output_tokens: g.max_output_tokens.max(1),
            suggestion_max_tokens: g.suggestion_max_tokens.max(1),
            column_max_tokens: g.column_max_tokens.max(1),
        },
    }
}
