//! Generation requests: wire shape, validation and the validated form.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::pipeline::composer::APPROACHES;

pub const DEFAULT_PATTERN_COUNT: usize = 3;

/// What kind of text is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    DiaryLogic,
    BoardTemplate,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::DiaryLogic => "diary_logic",
            ContentType::BoardTemplate => "board_template",
        }
    }

    /// Noun used in the user instruction.
    pub fn label(self) -> &'static str {
        match self {
            ContentType::DiaryLogic => "日記記事",
            ContentType::BoardTemplate => "掲示板投稿文",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "diary_logic" => Ok(ContentType::DiaryLogic),
            "board_template" => Ok(ContentType::BoardTemplate),
            other => Err(ValidationError::InvalidContentType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("contentType must be \"diary_logic\" or \"board_template\", got \"{0}\"")]
    InvalidContentType(String),
    #[error("patternCount must be between 1 and {max}, got {value}")]
    PatternCountOutOfRange { value: i64, max: usize },
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Request body as received. Every field is optional here so that missing
/// fields are reported together, by name, instead of by the JSON decoder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGenerationRequest {
    #[serde(default)]
    pub style_slug: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub concept_id: Option<String>,
    #[serde(default)]
    pub selected_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub user_prompt: Option<String>,
    #[serde(default)]
    pub pattern_count: Option<i64>,
}

impl RawGenerationRequest {
    /// Decode a JSON body. Type mismatches become [`ValidationError::MalformedBody`].
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(body).map_err(|e| ValidationError::MalformedBody(e.to_string()))
    }

    /// Check required fields and apply defaults. Runs before any store or
    /// backend call.
    pub fn validate(self, settings: &GenerationConfig) -> Result<GenerationRequest, ValidationError> {
        let mut missing = Vec::new();
        if self.content_type.as_deref().is_none_or(|s| s.trim().is_empty()) {
            missing.push("contentType");
        }
        if self.selected_keywords.is_none() {
            missing.push("selectedKeywords");
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let content_type: ContentType = self.content_type.as_deref().unwrap_or_default().parse()?;

        let max = settings.max_pattern_count.min(APPROACHES.len());
        let pattern_count = match self.pattern_count {
            None => DEFAULT_PATTERN_COUNT.min(max),
            Some(n) if n >= 1 && (n as u64) <= max as u64 => n as usize,
            Some(n) => return Err(ValidationError::PatternCountOutOfRange { value: n, max }),
        };

        let style_slug = non_blank(self.style_slug).unwrap_or_else(|| settings.default_style.clone());

        Ok(GenerationRequest {
            style_slug,
            content_type,
            concept_id: non_blank(self.concept_id),
            selected_keywords: self
                .selected_keywords
                .unwrap_or_default()
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            user_prompt: self.user_prompt.map(|p| p.trim().to_string()).unwrap_or_default(),
            pattern_count,
        })
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// A validated request. Keyword order is preserved; duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub style_slug: String,
    pub content_type: ContentType,
    pub concept_id: Option<String>,
    pub selected_keywords: Vec<String>,
    pub user_prompt: String,
    pub pattern_count: usize,
}

impl GenerationRequest {
    /// Concept mode applies only to board posts that name a concept.
    pub fn concept_mode(&self) -> Option<&str> {
        match self.content_type {
            ContentType::BoardTemplate => self.concept_id.as_deref(),
            ContentType::DiaryLogic => None,
        }
    }
}
