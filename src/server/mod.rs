//! HTTP front end.
//!
//! ```text
//! POST    /api/generate     generation request → patterns
//! POST    /                 alias of /api/generate
//! POST    /api/suggestions  themes + keyword fragments for the picker
//! POST    /api/column       JSON-mode column drafts
//! GET     /api/health       liveness + model/provider/store identification
//! OPTIONS *                 CORS preflight → 200, empty body
//! ```
//!
//! Every response carries `Access-Control-Allow-Origin: *`. `run` drives
//! axum until the [`CancellationToken`] fires, then drains in-flight
//! requests.

pub mod api;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::AppError;
use crate::pipeline::Pipeline;

pub const ALLOW_HEADERS: [HeaderName; 4] = [
    AUTHORIZATION,
    HeaderName::from_static("x-client-info"),
    HeaderName::from_static("apikey"),
    CONTENT_TYPE,
];

/// Router state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
}

pub fn build_router(pipeline: Pipeline) -> Router {
    Router::new()
        .route("/api/generate",    post(api::generate))
        .route("/",                post(api::generate))
        .route("/api/suggestions", post(api::suggestions))
        .route("/api/column",      post(api::column))
        .route("/api/health",      get(api::health))
        .fallback(api::not_found)
        .layer(cors())
        .with_state(AppState { pipeline })
}

/// Any origin. `OPTIONS` is answered by the layer with an empty 200.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(ALLOW_HEADERS)
}

pub async fn run(bind_addr: &str, pipeline: Pipeline, shutdown: CancellationToken) -> Result<(), AppError> {
    let router = build_router(pipeline);

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("http server error: {e}")))?;

    info!("http server shut down");
    Ok(())
}
