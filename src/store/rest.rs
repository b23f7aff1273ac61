//! PostgREST (Supabase) backend.
//!
//! Tables read: `writing_styles`, `reference_diaries`, `knowledge_chunks`,
//! `writing_config`.
//! Filters use PostgREST's `column=eq.value` syntax; every query is bounded
//! by `limit`.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::config::RestStoreConfig;
use crate::store::{
    ColumnConfig, ExampleQuery, KnowledgeTip, ReferenceExample, StoreError, TipQuery, WritingStyle,
};

const STYLES_TABLE: &str = "writing_styles";
const EXAMPLES_TABLE: &str = "reference_diaries";
const TIPS_TABLE: &str = "knowledge_chunks";
const COLUMN_TABLE: &str = "writing_config";

#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    rest_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(config: &RestStoreConfig, api_key: Option<String>) -> Result<Self, StoreError> {
        if config.url.trim().is_empty() {
            return Err(StoreError::NotConfigured(
                "set SUPABASE_URL or [store.rest] url".into(),
            ));
        }
        let api_key = api_key
            .ok_or_else(|| StoreError::NotConfigured("SUPABASE_ANON_KEY is not set".into()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| StoreError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, rest_url: rest_url(&config.url), api_key })
    }

    pub async fn style_by_slug(&self, slug: &str) -> Result<Option<WritingStyle>, StoreError> {
        let slug_filter = eq(slug);
        let rows: Vec<WritingStyle> = self
            .select(STYLES_TABLE, &[("select", "*"), ("slug", slug_filter.as_str()), ("limit", "1")])
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn examples(&self, query: &ExampleQuery) -> Result<Vec<ReferenceExample>, StoreError> {
        let content_type = eq(&query.content_type);
        let style_id = query.style_id.as_deref().map(eq);
        let limit = query.limit.to_string();

        let mut params = vec![("select", "*"), ("content_type", content_type.as_str())];
        if let Some(style_id) = &style_id {
            params.push(("style_id", style_id.as_str()));
        }
        params.push(("limit", limit.as_str()));
        self.select(EXAMPLES_TABLE, &params).await
    }

    pub async fn tips(&self, query: &TipQuery) -> Result<Vec<KnowledgeTip>, StoreError> {
        let category = eq(&query.category);
        let style_id = query.style_id.as_deref().map(eq);
        let limit = query.limit.to_string();

        let mut params = vec![("select", "content,category,style_id"), ("category", category.as_str())];
        if let Some(style_id) = &style_id {
            params.push(("style_id", style_id.as_str()));
        }
        params.push(("limit", limit.as_str()));
        self.select(TIPS_TABLE, &params).await
    }

    pub async fn column_config(&self, method_id: &str, template_id: &str) -> Result<Option<ColumnConfig>, StoreError> {
        let method = eq(method_id);
        let template = eq(template_id);
        let rows: Vec<ColumnConfig> = self
            .select(
                COLUMN_TABLE,
                &[
                    ("select", "method_id,template_id,system_prompt"),
                    ("method_id", method.as_str()),
                    ("template_id", template.as_str()),
                    ("limit", "1"),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, params: &[(&str, &str)]) -> Result<Vec<T>, StoreError> {
        let url = format!("{}/{table}", self.rest_url);
        debug!(%table, ?params, "store select");

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                error!(%table, error = %e, "store request failed (transport)");
                StoreError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            error!(%table, %status, %message, "store returned HTTP error");
            return Err(StoreError::Status { status: status.as_u16(), message });
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::Decode(format!("{table}: {e}")))
    }
}

/// `https://x.supabase.co/` → `https://x.supabase.co/rest/v1`. URLs that
/// already point at the REST root are kept.
fn rest_url(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.ends_with("/rest/v1") {
        base.to_string()
    } else {
        format!("{base}/rest/v1")
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}
