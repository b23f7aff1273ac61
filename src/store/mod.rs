//! Read-only access to the configuration store.
//!
//! The store holds writing styles, reference examples and writing tips. The
//! pipeline only ever reads from it; every request fetches fresh rows.
//!
//! `ConfigStore` follows the same enum-dispatch shape as
//! [`crate::llm::LlmProvider`]: one variant per backend, no trait objects.

pub mod memory;
pub mod rest;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::config::StoreConfig;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown store backend: {0}")]
    UnknownBackend(String),
    #[error("store is not configured: {0}")]
    NotConfigured(String),
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("store response could not be decoded: {0}")]
    Decode(String),
}

// ── Records ───────────────────────────────────────────────────────────────────

/// A named base configuration. `system_prompt` is plain text or a JSON
/// document read through [`crate::pipeline::resolver::StylePayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingStyle {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub system_prompt: String,
}

/// Grounding text: a titled body tagged by content type and optionally by
/// owning style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceExample {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub style_id: Option<String>,
}

/// A short technique hint tagged by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeTip {
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub style_id: Option<String>,
}

/// Column-writer instruction keyed by method and template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub method_id: String,
    pub template_id: String,
    #[serde(default)]
    pub system_prompt: String,
}

/// Filter for [`ConfigStore::examples`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleQuery {
    pub content_type: String,
    pub style_id: Option<String>,
    pub limit: usize,
}

/// Filter for [`ConfigStore::tips`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipQuery {
    pub category: String,
    pub style_id: Option<String>,
    pub limit: usize,
}

// Row ids are integers or uuids depending on the table; keep them as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Int(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RawId::deserialize(d).map(String::from)
}

fn opt_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<RawId>::deserialize(d).map(|id| id.map(String::from))
}

// ── Store enum ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ConfigStore {
    Rest(rest::RestStore),
    Memory(memory::MemoryStore),
}

impl ConfigStore {
    /// Style record by unique slug; `Ok(None)` when no row matches.
    pub async fn style_by_slug(&self, slug: &str) -> Result<Option<WritingStyle>, StoreError> {
        match self {
            ConfigStore::Rest(s) => s.style_by_slug(slug).await,
            ConfigStore::Memory(s) => s.style_by_slug(slug),
        }
    }

    pub async fn examples(&self, query: &ExampleQuery) -> Result<Vec<ReferenceExample>, StoreError> {
        match self {
            ConfigStore::Rest(s) => s.examples(query).await,
            ConfigStore::Memory(s) => s.examples(query),
        }
    }

    pub async fn tips(&self, query: &TipQuery) -> Result<Vec<KnowledgeTip>, StoreError> {
        match self {
            ConfigStore::Rest(s) => s.tips(query).await,
            ConfigStore::Memory(s) => s.tips(query),
        }
    }

    /// Custom column instruction for `(method_id, template_id)`, if any.
    pub async fn column_config(
        &self,
        method_id: &str,
        template_id: &str,
    ) -> Result<Option<ColumnConfig>, StoreError> {
        match self {
            ConfigStore::Rest(s) => s.column_config(method_id, template_id).await,
            ConfigStore::Memory(s) => s.column_config(method_id, template_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConfigStore::Rest(_) => "rest",
            ConfigStore::Memory(_) => "memory",
        }
    }
}

/// Construct the configured store. `api_key` comes from `SUPABASE_ANON_KEY`.
pub fn build(config: &StoreConfig, api_key: Option<String>) -> Result<ConfigStore, StoreError> {
    match config.backend.as_str() {
        "rest" | "supabase" => Ok(ConfigStore::Rest(rest::RestStore::new(&config.rest, api_key)?)),
        "memory" => {
            let store = match &config.memory.fixture {
                Some(path) => memory::MemoryStore::from_json_file(path)?,
                None => memory::MemoryStore::default(),
            };
            Ok(ConfigStore::Memory(store))
        }
        other => Err(StoreError::UnknownBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_uuid_ids_both_decode() {
        let a: WritingStyle =
            serde_json::from_str(r#"{"id": 7, "slug": "pana_emotion", "system_prompt": "x"}"#).unwrap();
        assert_eq!(a.id, "7");
        let b: WritingStyle = serde_json::from_str(
            r#"{"id": "5f0c…", "slug": "board_common", "name": "共通", "system_prompt": "{}"}"#,
        )
        .unwrap();
        assert_eq!(b.id, "5f0c…");
        assert_eq!(b.name, "共通");
    }

    #[test]
    fn example_style_id_is_optional() {
        let e: ReferenceExample =
            serde_json::from_str(r#"{"title": "t", "body": "b", "content_type": "board_temp"}"#).unwrap();
        assert_eq!(e.style_id, None);
        let e: ReferenceExample =
            serde_json::from_str(r#"{"title": "t", "body": "b", "style_id": 3}"#).unwrap();
        assert_eq!(e.style_id.as_deref(), Some("3"));
        let e: ReferenceExample = serde_json::from_str(r#"{"title": "t", "style_id": null}"#).unwrap();
        assert_eq!(e.style_id, None);
    }

    #[test]
    fn tip_with_only_content_decodes() {
        let t: KnowledgeTip = serde_json::from_str(r#"{"content": "語尾を揃える"}"#).unwrap();
        assert_eq!(t.content, "語尾を揃える");
        assert!(t.category.is_empty());
    }

    #[test]
    fn unknown_backend_errors() {
        let mut cfg = crate::config::defaults(&crate::config::EnvOverrides::default()).store;
        cfg.backend = "sqlite".into();
        assert!(matches!(build(&cfg, None), Err(StoreError::UnknownBackend(_))));
    }
}
