//! Turns a style slug (and optional concept id) into an [`EffectiveConfig`].
//!
//! Two modes:
//!
//! - **Concept**: board posts that name a concept. The shared board style and
//!   the concept record are both optional; whatever is missing or malformed
//!   is logged and replaced by an empty payload, and fixed defaults fill the
//!   gaps.
//! - **Style**: everything else. The style record must exist.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::pipeline::request::ContentType;
use crate::pipeline::PipelineError;
use crate::store::{ConfigStore, WritingStyle};

pub const COPYWRITER_PREAMBLE: &str = "あなたは日本語表現に優れた心理的コピーライターです。\n掲示板投稿文を作成してください。";
pub const DEFAULT_RULES: &str = "質問形式でエンゲージ。箇点多用。";
pub const DEFAULT_TONE: &str = "共感的・丁寧";

// ── Stored payload schema ─────────────────────────────────────────────────────

/// Structured form of `WritingStyle::system_prompt`. Every field is optional;
/// fields without a slot here are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StylePayload {
    pub version: u32,
    pub base_prompt: Option<String>,
    pub rules: Option<String>,
    pub framework: BTreeMap<String, FrameworkEntry>,
    pub key_elements: KeyElements,
    pub focus: Option<String>,
    pub tone: Option<String>,
    pub example_keywords: Vec<String>,
    pub base_templates: Vec<String>,
    pub vocabulary: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameworkEntry {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KeyElements {
    pub tone: Option<String>,
    pub dilemmas: Vec<String>,
    pub techniques: Vec<String>,
}

/// How a stored `system_prompt` should be read.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleText {
    Plain(String),
    Structured(StylePayload),
}

impl StyleText {
    /// JSON-shaped text (leading `{`) is decoded; a decode failure degrades to
    /// the empty payload. Anything else is plain text.
    pub fn parse(slug: &str, raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.starts_with('{') {
            return StyleText::Plain(raw.to_string());
        }
        match serde_json::from_str::<StylePayload>(trimmed) {
            Ok(mut payload) => {
                if payload.version == 0 {
                    payload.version = 1;
                }
                StyleText::Structured(payload)
            }
            Err(e) => {
                warn!(%slug, error = %e, "style payload is not valid JSON, using empty payload");
                StyleText::Structured(StylePayload { version: 1, ..StylePayload::default() })
            }
        }
    }

    fn into_payload(self) -> StylePayload {
        match self {
            StyleText::Structured(p) => p,
            StyleText::Plain(text) => StylePayload {
                version: 1,
                base_prompt: Some(text),
                ..StylePayload::default()
            },
        }
    }
}

// ── Effective configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Concept,
    Style,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkSection {
    pub name: String,
    pub description: String,
}

/// Concept fields rendered into the prompt. Empty strings when the concept
/// record is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptOverlay {
    pub name: String,
    pub focus: String,
    pub tone: String,
    pub keywords: Vec<String>,
    pub base_templates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub mode: Mode,
    /// Id of the resolved base style. `None` in concept mode.
    pub style_id: Option<String>,
    pub system_instruction: String,
    pub rules: String,
    pub framework_sections: Vec<FrameworkSection>,
    pub tone_hints: String,
    pub dilemma_examples: Vec<String>,
    pub technique_examples: Vec<String>,
    pub vocabulary: Vec<String>,
    /// Payload fields with no dedicated slot, as `(key, text)`.
    pub style_notes: Vec<(String, String)>,
    pub concept: Option<ConceptOverlay>,
}

impl EffectiveConfig {
    /// A JSON style without `base_prompt` keeps its whole text as the
    /// instruction, so no stored field is lost.
    fn from_style(style: WritingStyle) -> Self {
        let payload = StyleText::parse(&style.slug, &style.system_prompt).into_payload();
        let (system_instruction, style_notes) = match payload.base_prompt.filter(|p| !p.trim().is_empty()) {
            Some(base) => (base, notes(payload.extra)),
            None => (style.system_prompt.trim().to_string(), Vec::new()),
        };
        Self {
            mode: Mode::Style,
            style_id: Some(style.id),
            system_instruction,
            rules: payload.rules.unwrap_or_default(),
            framework_sections: sections(payload.framework),
            tone_hints: payload.key_elements.tone.or(payload.tone).unwrap_or_default(),
            dilemma_examples: payload.key_elements.dilemmas,
            technique_examples: payload.key_elements.techniques,
            vocabulary: payload.vocabulary,
            style_notes,
            concept: None,
        }
    }

    fn from_concept(common: StylePayload, concept_name: String, concept: StylePayload) -> Self {
        let rules = common.rules.filter(|r| !r.trim().is_empty());
        let tone = common.key_elements.tone.filter(|t| !t.trim().is_empty());
        let mut vocabulary = common.vocabulary;
        vocabulary.extend(concept.vocabulary);
        Self {
            mode: Mode::Concept,
            style_id: None,
            system_instruction: COPYWRITER_PREAMBLE.to_string(),
            rules: rules.unwrap_or_else(|| DEFAULT_RULES.to_string()),
            framework_sections: sections(common.framework),
            tone_hints: tone.unwrap_or_else(|| DEFAULT_TONE.to_string()),
            dilemma_examples: common.key_elements.dilemmas,
            technique_examples: common.key_elements.techniques,
            vocabulary,
            style_notes: notes(common.extra),
            concept: Some(ConceptOverlay {
                name: concept_name,
                focus: concept.focus.unwrap_or_default(),
                tone: concept.tone.unwrap_or_default(),
                keywords: concept.example_keywords,
                base_templates: concept.base_templates,
            }),
        }
    }
}

// BTreeMap iteration is key-ordered.
fn sections(framework: BTreeMap<String, FrameworkEntry>) -> Vec<FrameworkSection> {
    framework
        .into_values()
        .map(|e| FrameworkSection { name: e.name, description: e.description })
        .collect()
}

fn notes(extra: BTreeMap<String, Value>) -> Vec<(String, String)> {
    extra
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            Value::Array(items) if items.iter().all(Value::is_string) => {
                let joined: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                (k, joined.join("、"))
            }
            other => (k, other.to_string()),
        })
        .collect()
}

// ── Resolver ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConfigResolver<'a> {
    store: &'a ConfigStore,
    settings: &'a GenerationConfig,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(store: &'a ConfigStore, settings: &'a GenerationConfig) -> Self {
        Self { store, settings }
    }

    pub async fn resolve(
        &self,
        style_slug: &str,
        content_type: ContentType,
        concept_id: Option<&str>,
    ) -> Result<EffectiveConfig, PipelineError> {
        match (content_type, concept_id) {
            (ContentType::BoardTemplate, Some(concept_id)) => Ok(self.resolve_concept(concept_id).await),
            _ => self.resolve_style(style_slug).await,
        }
    }

    async fn resolve_style(&self, slug: &str) -> Result<EffectiveConfig, PipelineError> {
        let style = self
            .store
            .style_by_slug(slug)
            .await?
            .ok_or_else(|| PipelineError::ConfigNotFound(slug.to_string()))?;
        debug!(%slug, style_id = %style.id, "resolved writing style");
        Ok(EffectiveConfig::from_style(style))
    }

    async fn resolve_concept(&self, concept_id: &str) -> EffectiveConfig {
        let common_slug = self.settings.common_style_slug.as_str();
        let concept_slug = format!("{}{concept_id}", self.settings.concept_slug_prefix);

        let (common, _) = self.optional_payload(common_slug).await;
        let (concept, concept_name) = self.optional_payload(&concept_slug).await;
        debug!(%concept_slug, "resolved concept overlay");

        EffectiveConfig::from_concept(common, concept_name, concept)
    }

    /// Payload and display name of an optional record. Missing or unreadable
    /// records yield the empty payload.
    async fn optional_payload(&self, slug: &str) -> (StylePayload, String) {
        match self.store.style_by_slug(slug).await {
            Ok(Some(style)) => {
                let payload = match StyleText::parse(slug, &style.system_prompt) {
                    StyleText::Structured(p) => p,
                    StyleText::Plain(_) => {
                        warn!(%slug, "expected a JSON payload, ignoring plain text");
                        StylePayload::default()
                    }
                };
                (payload, style.name)
            }
            Ok(None) => {
                warn!(%slug, "style record not found, using empty payload");
                (StylePayload::default(), String::new())
            }
            Err(e) => {
                warn!(%slug, error = %e, "style lookup failed, using empty payload");
                (StylePayload::default(), String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{defaults, EnvOverrides};
    use crate::store::memory::MemoryStore;

    fn style(id: &str, slug: &str, name: &str, prompt: &str) -> WritingStyle {
        WritingStyle { id: id.into(), slug: slug.into(), name: name.into(), system_prompt: prompt.into() }
    }

    fn store(styles: Vec<WritingStyle>) -> ConfigStore {
        ConfigStore::Memory(MemoryStore::new(styles, vec![], vec![]))
    }

    fn settings() -> GenerationConfig {
        defaults(&EnvOverrides::default()).generation
    }

    const COMMON: &str = r#"{
        "rules": "共通ルール",
        "framework": {
            "b_agitation": {"name": "煽り", "description": "不安を深める"},
            "a_problem": {"name": "問題", "description": "悩みを示す"}
        },
        "key_elements": {"tone": "優しく", "dilemmas": ["寂しさ"], "techniques": ["傾聴"]}
    }"#;

    #[test]
    fn plain_text_is_not_decoded() {
        assert_eq!(StyleText::parse("s", "あなたは作家です。"), StyleText::Plain("あなたは作家です。".into()));
    }

    #[test]
    fn malformed_json_degrades_to_empty_payload() {
        let StyleText::Structured(p) = StyleText::parse("s", "{\"rules\": ") else {
            panic!("expected structured");
        };
        assert_eq!(p.version, 1);
        assert_eq!(p.rules, None);
        assert!(p.framework.is_empty());
    }

    #[test]
    fn version_defaults_to_one() {
        let StyleText::Structured(p) = StyleText::parse("s", r#"{"focus": "癒し"}"#) else {
            panic!("expected structured");
        };
        assert_eq!(p.version, 1);
        assert_eq!(p.focus.as_deref(), Some("癒し"));
    }

    #[tokio::test]
    async fn style_mode_plain_prompt() {
        let store = store(vec![style("7", "pana_emotion", "PANA", "あなたは作家です。")]);
        let settings = settings();
        let cfg = ConfigResolver::new(&store, &settings)
            .resolve("pana_emotion", ContentType::DiaryLogic, None)
            .await
            .unwrap();
        assert_eq!(cfg.mode, Mode::Style);
        assert_eq!(cfg.style_id.as_deref(), Some("7"));
        assert_eq!(cfg.system_instruction, "あなたは作家です。");
        assert!(cfg.concept.is_none());
    }

    #[tokio::test]
    async fn style_mode_structured_prompt() {
        let store = store(vec![style("1", "board_x", "X", r#"{"base_prompt": "基本", "rules": "規則"}"#)]);
        let settings = settings();
        let cfg = ConfigResolver::new(&store, &settings)
            .resolve("board_x", ContentType::BoardTemplate, None)
            .await
            .unwrap();
        assert_eq!(cfg.system_instruction, "基本");
        assert_eq!(cfg.rules, "規則");
    }

    #[tokio::test]
    async fn json_style_without_base_prompt_keeps_its_text() {
        let raw = r#"{"persona": "あなたは恋愛コラムの達人です", "vocabulary": ["甘い囁き", "月明かり"], "rules": "短く"}"#;
        let store = store(vec![style("3", "romance", "恋愛", raw)]);
        let settings = settings();
        let cfg = ConfigResolver::new(&store, &settings)
            .resolve("romance", ContentType::DiaryLogic, None)
            .await
            .unwrap();
        assert_eq!(cfg.system_instruction, raw);
        assert_eq!(cfg.vocabulary, vec!["甘い囁き", "月明かり"]);
        assert_eq!(cfg.rules, "短く");
        assert!(cfg.style_notes.is_empty());
    }

    #[tokio::test]
    async fn unknown_fields_become_notes_beside_base_prompt() {
        let raw = r#"{"base_prompt": "基本", "persona": "達人", "banned": ["絵文字", "顔文字"], "max_len": 400}"#;
        let store = store(vec![style("3", "romance", "恋愛", raw)]);
        let settings = settings();
        let cfg = ConfigResolver::new(&store, &settings)
            .resolve("romance", ContentType::DiaryLogic, None)
            .await
            .unwrap();
        assert_eq!(cfg.system_instruction, "基本");
        assert_eq!(
            cfg.style_notes,
            vec![
                ("banned".to_string(), "絵文字、顔文字".to_string()),
                ("max_len".to_string(), "400".to_string()),
                ("persona".to_string(), "達人".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_style_is_not_found() {
        let store = store(vec![]);
        let settings = settings();
        let err = ConfigResolver::new(&store, &settings)
            .resolve("nope", ContentType::DiaryLogic, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigNotFound(ref s) if s == "nope"));
    }

    #[tokio::test]
    async fn concept_id_ignored_for_diary() {
        let store = store(vec![style("1", "pana_emotion", "PANA", "p")]);
        let settings = settings();
        let cfg = ConfigResolver::new(&store, &settings)
            .resolve("pana_emotion", ContentType::DiaryLogic, Some("healing"))
            .await
            .unwrap();
        assert_eq!(cfg.mode, Mode::Style);
    }

    #[tokio::test]
    async fn concept_mode_merges_common_and_concept() {
        let store = store(vec![
            style("1", "board_common", "共通", COMMON),
            style(
                "2",
                "board_concept_healing",
                "癒し",
                r#"{"focus": "安心感", "tone": "穏やか", "example_keywords": ["温泉"], "base_templates": ["癒"]}"#,
            ),
        ]);
        let settings = settings();
        let cfg = ConfigResolver::new(&store, &settings)
            .resolve("ignored", ContentType::BoardTemplate, Some("healing"))
            .await
            .unwrap();

        assert_eq!(cfg.mode, Mode::Concept);
        assert_eq!(cfg.system_instruction, COPYWRITER_PREAMBLE);
        assert_eq!(cfg.rules, "共通ルール");
        assert_eq!(cfg.tone_hints, "優しく");
        let names: Vec<&str> = cfg.framework_sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["問題", "煽り"]);
        let concept = cfg.concept.unwrap();
        assert_eq!(concept.name, "癒し");
        assert_eq!(concept.focus, "安心感");
        assert_eq!(concept.keywords, vec!["温泉"]);
        assert_eq!(concept.base_templates, vec!["癒"]);
    }

    #[tokio::test]
    async fn concept_mode_survives_missing_and_malformed_records() {
        let store = store(vec![style("1", "board_common", "共通", "{broken")]);
        let settings = settings();
        let cfg = ConfigResolver::new(&store, &settings)
            .resolve("ignored", ContentType::BoardTemplate, Some("unknown"))
            .await
            .unwrap();

        assert_eq!(cfg.rules, DEFAULT_RULES);
        assert_eq!(cfg.tone_hints, DEFAULT_TONE);
        assert!(cfg.framework_sections.is_empty());
        assert_eq!(cfg.concept, Some(ConceptOverlay::default()));
    }
}
