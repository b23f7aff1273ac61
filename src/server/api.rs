//! Handlers for the generation and health routes.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::llm::{LlmUsage, ProviderError};
use crate::pipeline::parser::Pattern;
use crate::pipeline::assist::RawAssistRequest;
use crate::pipeline::request::RawGenerationRequest;
use crate::pipeline::{GenerationResult, PipelineError};

use super::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub content: String,
    pub patterns: Vec<String>,
    pub parsed_patterns: Vec<Pattern>,
    pub model: String,
    pub applied_tip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
}

impl From<GenerationResult> for GenerateResponse {
    fn from(r: GenerationResult) -> Self {
        Self {
            success: true,
            content: r.content,
            patterns: r.fragments,
            parsed_patterns: r.patterns,
            model: r.model,
            applied_tip: r.applied_tip,
            usage: r.usage,
        }
    }
}

fn json_error(status: StatusCode, msg: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": msg.to_string() }))).into_response()
}

pub fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
        PipelineError::ConfigNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::StoreUnavailable(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Upstream(ProviderError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::Upstream(_) => StatusCode::BAD_GATEWAY,
        PipelineError::UnparseableReply(_) => StatusCode::BAD_GATEWAY,
    }
}

fn failure(e: PipelineError) -> Response {
    let status = status_for(&e);
    if status.is_server_error() {
        warn!(status = status.as_u16(), error = %e, "request failed");
    } else {
        info!(status = status.as_u16(), error = %e, "request rejected");
    }
    json_error(status, e)
}

/// POST /api/generate
///
/// The body is decoded by hand so that malformed or incomplete requests get
/// a `{error}` body naming the problem instead of axum's plain-text
/// rejection.
pub async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("generate", %request_id);

    async move {
        let raw = match RawGenerationRequest::from_json(&body) {
            Ok(raw) => raw,
            Err(e) => {
                info!(error = %e, "rejected request body");
                return json_error(StatusCode::BAD_REQUEST, e);
            }
        };

        match state.pipeline.generate(raw).await {
            Ok(result) => (StatusCode::OK, Json(GenerateResponse::from(result))).into_response(),
            Err(e) => failure(e),
        }
    }
    .instrument(span)
    .await
}

/// POST /api/suggestions → `{ result: { themes, fragments } }`
pub async fn suggestions(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    async move {
        let raw = match RawAssistRequest::from_json(&body) {
            Ok(raw) => raw,
            Err(e) => return failure(e.into()),
        };
        match state.pipeline.suggest(raw).await {
            Ok(result) => (StatusCode::OK, Json(json!({ "result": result }))).into_response(),
            Err(e) => failure(e),
        }
    }
    .instrument(info_span!("suggestions", %request_id))
    .await
}

/// POST /api/column → `{ result: { patterns: [{ approach, titles, content }] } }`
pub async fn column(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    async move {
        let raw = match RawAssistRequest::from_json(&body) {
            Ok(raw) => raw,
            Err(e) => return failure(e.into()),
        };
        match state.pipeline.column(raw).await {
            Ok(result) => (StatusCode::OK, Json(json!({ "result": result }))).into_response(),
            Err(e) => failure(e),
        }
    }
    .instrument(info_span!("column", %request_id))
    .await
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Response {
    let body = json!({
        "status": "ok",
        "model": state.pipeline.model(),
        "provider": state.pipeline.provider_name(),
        "store": state.pipeline.store_name(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

pub async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}
