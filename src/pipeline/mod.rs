//! The generation pipeline.
//!
//! validate → resolve config → fetch pools → sample → compose → complete →
//! parse. Each request runs as one task with no state shared across
//! requests; every store read is fresh.

pub mod assist;
pub mod composer;
pub mod parser;
pub mod request;
pub mod resolver;
pub mod sampler;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, GenerationConfig, RetryConfig};
use crate::error::AppError;
use crate::llm::retry::complete_with_retry;
use crate::llm::{providers, ChatRequest, LlmProvider, LlmUsage, ProviderError};
use crate::store::{self, ConfigStore, ExampleQuery, KnowledgeTip, ReferenceExample, StoreError, TipQuery};

use composer::Prompt;
use parser::Pattern;
use request::{ContentType, GenerationRequest, RawGenerationRequest, ValidationError};
use resolver::{ConfigResolver, EffectiveConfig, Mode};
use sampler::{ExampleSampler, SampledMaterial};

/// Reported as `appliedTip` when no tip was injected.
pub const NO_TIP: &str = "なし";

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("writing style not found: {0}")]
    ConfigNotFound(String),
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    #[error(transparent)]
    Upstream(#[from] ProviderError),
    #[error("backend reply is not valid JSON: {0}")]
    UnparseableReply(String),
}

// ── Result ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Raw completion text.
    pub content: String,
    /// Trimmed fragments between delimiters.
    pub fragments: Vec<String>,
    pub patterns: Vec<Pattern>,
    pub model: String,
    /// Tip text, or [`NO_TIP`].
    pub applied_tip: String,
    pub usage: Option<LlmUsage>,
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Cheap to clone; shared through the HTTP server state.
#[derive(Debug, Clone)]
pub struct Pipeline {
    store: ConfigStore,
    llm: LlmProvider,
    settings: Arc<GenerationConfig>,
    retry: Arc<RetryConfig>,
}

impl Pipeline {
    pub fn new(store: ConfigStore, llm: LlmProvider, settings: GenerationConfig, retry: RetryConfig) -> Self {
        Self { store, llm, settings: Arc::new(settings), retry: Arc::new(retry) }
    }

    /// Build the store and provider named in `config`. A non-dummy provider
    /// without an API key fails here, at startup.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let store = store::build(&config.store, config.store_api_key.clone())?;
        let llm = providers::build(&config.llm, config.llm_api_key.clone())?;
        info!(provider = llm.name(), model = llm.model(), store = store.name(), "pipeline ready");
        Ok(Self::new(store, llm, config.generation.clone(), config.llm.retry.clone()))
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub fn provider_name(&self) -> &'static str {
        self.llm.name()
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn settings(&self) -> &GenerationConfig {
        &self.settings
    }

    /// Validate `raw` and run it. Validation failures never touch the store
    /// or the backend.
    pub async fn generate(&self, raw: RawGenerationRequest) -> Result<GenerationResult, PipelineError> {
        let request = raw.validate(&self.settings)?;
        self.generate_validated(&request).await
    }

    pub async fn generate_validated(&self, request: &GenerationRequest) -> Result<GenerationResult, PipelineError> {
        info!(
            style_slug = %request.style_slug,
            content_type = %request.content_type,
            concept_id = request.concept_id.as_deref().unwrap_or(""),
            pattern_count = request.pattern_count,
            keywords = request.selected_keywords.len(),
            "generation started"
        );

        let (_, material, prompt) = self.prepare(request).await?;
        debug!(system_len = prompt.system.len(), user_len = prompt.user.len(), "prompt composed");
        trace!(system = %prompt.system, user = %prompt.user, "prompt");

        let chat = ChatRequest {
            system: &prompt.system,
            user: &prompt.user,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_output_tokens,
            json_mode: false,
        };
        let response = complete_with_retry(&self.llm, &chat, &self.retry).await?;
        debug!(completion_len = response.text.len(), "completion received");

        let fragments = parser::split_fragments(&response.text);
        let patterns = parser::parse(&response.text, request.pattern_count);
        info!(patterns = patterns.len(), model = self.llm.model(), "generation finished");

        Ok(GenerationResult {
            content: response.text,
            fragments,
            patterns,
            model: self.llm.model().to_string(),
            applied_tip: material.tip.unwrap_or_else(|| NO_TIP.to_string()),
            usage: response.usage,
        })
    }

    /// Everything up to, but not including, the backend call.
    pub async fn prepare(
        &self,
        request: &GenerationRequest,
    ) -> Result<(EffectiveConfig, SampledMaterial, Prompt), PipelineError> {
        let config = ConfigResolver::new(&self.store, &self.settings)
            .resolve(&request.style_slug, request.content_type, request.concept_mode())
            .await?;

        let (examples, tips) = self.pools(&config, request.content_type).await;
        debug!(examples = examples.len(), tips = tips.len(), "pools fetched");

        let mut rng = StdRng::from_entropy();
        let material = ExampleSampler::new(self.settings.examples_per_request).sample(examples, &tips, &mut rng);
        let prompt = composer::compose(&config, &material, request);
        Ok((config, material, prompt))
    }

    async fn pools(
        &self,
        config: &EffectiveConfig,
        content_type: ContentType,
    ) -> (Vec<ReferenceExample>, Vec<KnowledgeTip>) {
        let s = &self.settings;
        match config.mode {
            Mode::Concept => {
                let templates = config.concept.as_ref().map(|c| c.base_templates.as_slice()).unwrap_or_default();
                let examples = self
                    .fetch_examples(ExampleQuery {
                        content_type: s.template_content_type.clone(),
                        style_id: None,
                        limit: s.example_pool_limit,
                    })
                    .await;
                let examples = sampler::filter_by_templates(examples, templates);
                let tips = self.fetch_tips(None).await;
                (examples, tips)
            }
            Mode::Style => {
                let examples = self
                    .fetch_examples(ExampleQuery {
                        content_type: content_type.as_str().to_string(),
                        style_id: config.style_id.clone(),
                        limit: s.example_pool_limit,
                    })
                    .await;
                let tips = match content_type {
                    ContentType::DiaryLogic => Vec::new(),
                    ContentType::BoardTemplate => {
                        let own = self.fetch_tips(config.style_id.clone()).await;
                        if own.is_empty() { self.fetch_tips(None).await } else { own }
                    }
                };
                (examples, tips)
            }
        }
    }

    async fn fetch_examples(&self, query: ExampleQuery) -> Vec<ReferenceExample> {
        self.store.examples(&query).await.unwrap_or_else(|e| {
            warn!(content_type = %query.content_type, error = %e, "example fetch failed, continuing without examples");
            Vec::new()
        })
    }

    async fn fetch_tips(&self, style_id: Option<String>) -> Vec<KnowledgeTip> {
        let query = TipQuery {
            category: self.settings.tip_category.clone(),
            style_id,
            limit: self.settings.tip_pool_limit,
        };
        self.store.tips(&query).await.unwrap_or_else(|e| {
            warn!(category = %query.category, error = %e, "tip fetch failed, continuing without a tip");
            Vec::new()
        })
    }
}
