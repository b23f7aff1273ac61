//! Helper calls behind the keyword picker: theme and keyword-fragment
//! suggestions, and JSON-mode column drafts.
//!
//! Both ask the backend for a single JSON object. Replies that wrap the
//! object in prose are recovered by taking the outermost `{...}` span.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::llm::retry::complete_with_retry;
use crate::llm::ChatRequest;
use crate::pipeline::composer::Prompt;
use crate::pipeline::request::{non_blank, ValidationError};
use crate::pipeline::{Pipeline, PipelineError};

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("Valid JSON object regex"));

/// Writing methods offered by the picker, `(id, display name)`.
pub const METHODS: [(&str, &str); 5] = [
    ("teaser", "じらし前戯式"),
    ("emotion", "感情動かし式"),
    ("mind", "マインド操作式"),
    ("instant", "即セク式"),
    ("agitate", "感情煽り式"),
];

/// Post templates offered by the picker, `(id, display name)`.
pub const TEMPLATES: [(&str, &str); 8] = [
    ("secret", "密会体験日記"),
    ("erotic", "エロ体験日記"),
    ("solve", "問題解決型"),
    ("question", "疑問形タイトル"),
    ("seven_steps", "7ステップ"),
    ("impact", "インパクト"),
    ("healing", "癒しパートナー募集"),
    ("kink", "性癖推し"),
];

pub const SUGGESTION_SYSTEM: &str = "あなたは官能的かつ知的なライターです。
ユーザーがキーワードを選べるよう、短く刺激的なテーマと断片を提案してください。
回答は必ずJSON形式のみで出力してください。";

pub const DEFAULT_COLUMN_SYSTEM: &str = "「言の葉」AIとして、刺激的な文章を3つ生成してください。
【重要】日記モードは一編あたり必ず800文字以上のボリュームを確保してください。回答はJSONのみ。";

/// Unknown ids are shown as-is.
pub fn method_name(id: &str) -> &str {
    METHODS.iter().find(|(k, _)| *k == id).map_or(id, |&(_, name)| name)
}

pub fn template_name(id: &str) -> &str {
    TEMPLATES.iter().find(|(k, _)| *k == id).map_or(id, |&(_, name)| name)
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Body of `/api/suggestions` and `/api/column`. All fields optional so that
/// missing ones are named together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAssistRequest {
    #[serde(default)]
    pub method_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub selected_items: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub method_id: String,
    pub template_id: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRequest {
    pub method_id: String,
    pub template_id: String,
    pub mode: String,
    pub selected_items: Vec<String>,
}

impl RawAssistRequest {
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(body).map_err(|e| ValidationError::MalformedBody(e.to_string()))
    }

    pub fn into_suggestion(self) -> Result<SuggestionRequest, ValidationError> {
        let mut missing = Vec::new();
        let method_id = required(self.method_id, "methodId", &mut missing);
        let template_id = required(self.template_id, "templateId", &mut missing);
        let mode = required(self.mode, "mode", &mut missing);
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }
        Ok(SuggestionRequest { method_id, template_id, mode })
    }

    /// `selectedItems` must be present; an empty list is accepted.
    pub fn into_column(self) -> Result<ColumnRequest, ValidationError> {
        let mut missing = Vec::new();
        let method_id = required(self.method_id, "methodId", &mut missing);
        let template_id = required(self.template_id, "templateId", &mut missing);
        if self.selected_items.is_none() {
            missing.push("selectedItems");
        }
        let mode = required(self.mode, "mode", &mut missing);
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }
        let selected_items = self
            .selected_items
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.trim().replace(['\r', '\n'], " "))
            .filter(|item| !item.is_empty())
            .collect();
        Ok(ColumnRequest { method_id, template_id, mode, selected_items })
    }
}

fn required(value: Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match non_blank(value) {
        Some(v) => v,
        None => {
            missing.push(name);
            String::new()
        }
    }
}

// ── Replies ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub fragments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDraft {
    #[serde(default)]
    pub patterns: Vec<ColumnPattern>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPattern {
    #[serde(default)]
    pub approach: String,
    /// Main title first, then alternatives.
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub content: String,
}

/// Decode a JSON-mode reply. Text around the object is tolerated; anything
/// else is [`PipelineError::UnparseableReply`].
pub fn decode_reply<T: DeserializeOwned>(text: &str) -> Result<T, PipelineError> {
    let first = match serde_json::from_str(text.trim()) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    let Some(object) = JSON_OBJECT.find(text) else {
        return Err(PipelineError::UnparseableReply(first.to_string()));
    };
    debug!(error = %first, span = object.len(), "reply is not bare JSON, retrying on the object span");
    serde_json::from_str(object.as_str()).map_err(|e| PipelineError::UnparseableReply(e.to_string()))
}

// ── Prompts ───────────────────────────────────────────────────────────────────

pub fn suggestion_prompt(request: &SuggestionRequest) -> Prompt {
    let user = format!(
        "
モード: {mode}
手法: {method}
型: {template}

以下のJSON形式で提案を生成してください:
{{
  \"themes\": [\"シチュエーション案1\", \"シチュエーション案2\", \"シチュエーション案3\", \"シチュエーション案4\", \"シチュエーション案5\"],
  \"fragments\": [\"五感キーワード1\", \"感情キーワード2\", \"シチュエーション3\", \"官能的単語4\", \"形容詞5\", \"動詞6\", \"名詞7\", \"副詞8\", \"擬態語9\", \"雰囲気10\"]
}}

themes: その手法と型に最適なシチュエーション案（5つ）- 具体的で刺激的な状況設定
fragments: 五感、シチュエーション、官能的な単語（10個）- 短い単語やフレーズ
",
        mode = request.mode,
        method = method_name(&request.method_id),
        template = template_name(&request.template_id),
    );
    Prompt { system: SUGGESTION_SYSTEM.to_string(), user }
}

fn char_limit(mode: &str) -> &'static str {
    if mode == "diary" { "800〜1000文字の日本語で詳細に" } else { "300〜500文字の日本語で簡潔に" }
}

/// `system` is the stored instruction for this method and template, or
/// [`DEFAULT_COLUMN_SYSTEM`].
pub fn column_prompt(request: &ColumnRequest, system: String) -> Prompt {
    let user = format!(
        "
選択された要素: {items}
モード: {mode}, 要求文字数: {limit}

以下のJSON形式で3つのパターンを生成してください:
{{
  \"patterns\": [
    {{
      \"approach\": \"アプローチ名（例：直球型、暗示型、物語型）\",
      \"titles\": [\"メインタイトル\", \"サブタイトル案1\", \"サブタイトル案2\", \"サブタイトル案3\", \"サブタイトル案4\"],
      \"content\": \"本文（指定文字数を守ること）\"
    }}
  ]
}}
",
        items = request.selected_items.join("、"),
        mode = request.mode,
        limit = char_limit(&request.mode),
    );
    Prompt { system, user }
}

// ── Pipeline entry points ─────────────────────────────────────────────────────

impl Pipeline {
    pub async fn suggest(&self, raw: RawAssistRequest) -> Result<Suggestions, PipelineError> {
        let request = raw.into_suggestion()?;
        info!(method_id = %request.method_id, template_id = %request.template_id, mode = %request.mode, "suggestions started");

        let prompt = suggestion_prompt(&request);
        let text = self.complete_json(&prompt, self.settings.suggestion_max_tokens).await?;
        let suggestions: Suggestions = decode_reply(&text)?;
        info!(themes = suggestions.themes.len(), fragments = suggestions.fragments.len(), "suggestions finished");
        Ok(suggestions)
    }

    pub async fn column(&self, raw: RawAssistRequest) -> Result<ColumnDraft, PipelineError> {
        let request = raw.into_column()?;
        info!(
            method_id = %request.method_id,
            template_id = %request.template_id,
            mode = %request.mode,
            items = request.selected_items.len(),
            "column started"
        );

        let system = self.column_system(&request.method_id, &request.template_id).await;
        let prompt = column_prompt(&request, system);
        let text = self.complete_json(&prompt, self.settings.column_max_tokens).await?;
        let draft: ColumnDraft = decode_reply(&text)?;
        info!(patterns = draft.patterns.len(), "column finished");
        Ok(draft)
    }

    async fn column_system(&self, method_id: &str, template_id: &str) -> String {
        match self.store.column_config(method_id, template_id).await {
            Ok(Some(config)) if !config.system_prompt.trim().is_empty() => config.system_prompt,
            Ok(_) => DEFAULT_COLUMN_SYSTEM.to_string(),
            Err(e) => {
                warn!(%method_id, %template_id, error = %e, "column config lookup failed, using default instruction");
                DEFAULT_COLUMN_SYSTEM.to_string()
            }
        }
    }

    async fn complete_json(&self, prompt: &Prompt, max_tokens: u32) -> Result<String, PipelineError> {
        let chat = ChatRequest {
            system: &prompt.system,
            user: &prompt.user,
            temperature: self.settings.temperature,
            max_tokens,
            json_mode: true,
        };
        let response = complete_with_retry(&self.llm, &chat, &self.retry).await?;
        debug!(completion_len = response.text.len(), "json completion received");
        Ok(response.text)
    }
}
