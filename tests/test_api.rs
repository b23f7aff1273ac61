//! HTTP surface tests driven through `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use kotonoha::config::{defaults, EnvOverrides, RetryConfig};
use kotonoha::llm::providers::dummy::DummyProvider;
use kotonoha::llm::LlmProvider;
use kotonoha::pipeline::Pipeline;
use kotonoha::server::{build_router, ALLOW_HEADERS};
use kotonoha::store::memory::MemoryStore;
use kotonoha::store::{ConfigStore, WritingStyle};

const COMPLETION: &str = "---パターン1---\nタイトル: 一\n\n本文一\n---パターン2---\nタイトル: 二\n\n本文二";

fn router(llm: DummyProvider) -> Router {
    let store = MemoryStore::new(
        vec![WritingStyle {
            id: "1".into(),
            slug: "pana_emotion".into(),
            name: "PANA".into(),
            system_prompt: "あなたはライターです。".into(),
        }],
        vec![],
        vec![],
    );
    let cfg = defaults(&EnvOverrides::default());
    let retry = RetryConfig { max_retries: 0, initial_backoff_ms: 1, max_delay_secs: 1 };
    build_router(Pipeline::new(ConfigStore::Memory(store), LlmProvider::Dummy(llm), cfg.generation, retry))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn preflight_is_empty_200_with_cors() {
    let response = router(DummyProvider::echo())
        .oneshot(Request::builder().method(Method::OPTIONS).uri("/api/generate").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap().to_string();
    for name in &ALLOW_HEADERS {
        assert!(allowed.split(',').any(|h| h.trim() == name.as_str()), "{name} missing from {allowed}");
    }
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("POST"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn generate_success_shape() {
    let response = router(DummyProvider::reply(COMPLETION))
        .oneshot(post("/api/generate", r#"{"contentType": "diary_logic", "selectedKeywords": [], "patternCount": 2}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["content"], COMPLETION);
    assert_eq!(body["model"], "dummy");
    assert_eq!(body["appliedTip"], "なし");
    assert_eq!(body["patterns"].as_array().unwrap().len(), 2);
    assert_eq!(body["parsedPatterns"][0]["title"], "一");
    assert_eq!(body["parsedPatterns"][1]["content"], "本文二");
    assert_eq!(body["parsedPatterns"][1]["approach"], "提案型");
}

#[tokio::test]
async fn root_path_is_an_alias() {
    let response = router(DummyProvider::reply("本文"))
        .oneshot(post("/", r#"{"contentType": "board_template", "selectedKeywords": ["雨"]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_fields_are_400_with_error_body() {
    let response = router(DummyProvider::echo()).oneshot(post("/api/generate", "{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let body = json_body(response).await;
    let msg = body["error"].as_str().unwrap();
    assert!(msg.contains("contentType") && msg.contains("selectedKeywords"));
}

#[tokio::test]
async fn malformed_json_is_400() {
    let response = router(DummyProvider::echo()).oneshot(post("/api/generate", "{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn unknown_style_is_404() {
    let response = router(DummyProvider::echo())
        .oneshot(post(
            "/api/generate",
            r#"{"styleSlug": "missing", "contentType": "diary_logic", "selectedKeywords": []}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_body(response).await["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn upstream_failure_is_502_with_status_in_message() {
    let response = router(DummyProvider::failing(401))
        .oneshot(post("/api/generate", r#"{"contentType": "diary_logic", "selectedKeywords": []}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(json_body(response).await["error"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn health_reports_backends() {
    let response = router(DummyProvider::echo())
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], "dummy");
    assert_eq!(body["provider"], "dummy");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn suggestions_wrap_recovered_json_in_result() {
    let reply = "以下が提案です。\n{\"themes\": [\"終電後の駅\"], \"fragments\": [\"雨音\", \"体温\"]}";
    let response = router(DummyProvider::reply(reply))
        .oneshot(post("/api/suggestions", r#"{"methodId": "teaser", "templateId": "secret", "mode": "diary"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let body = json_body(response).await;
    assert_eq!(body["result"]["themes"][0], "終電後の駅");
    assert_eq!(body["result"]["fragments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn suggestions_missing_fields_are_400() {
    let llm = DummyProvider::reply("{}");
    let response = router(llm.clone()).oneshot(post("/api/suggestions", r#"{"mode": "board"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let msg = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(msg.contains("methodId") && msg.contains("templateId"));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn unparseable_suggestion_reply_is_502() {
    let response = router(DummyProvider::reply("提案できません"))
        .oneshot(post("/api/suggestions", r#"{"methodId": "teaser", "templateId": "secret", "mode": "diary"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(json_body(response).await["error"].as_str().unwrap().contains("JSON"));
}

#[tokio::test]
async fn column_returns_patterns_with_titles() {
    let reply = r#"{"patterns": [{"approach": "直球型", "titles": ["本音", "案1"], "content": "本文"}]}"#;
    let response = router(DummyProvider::reply(reply))
        .oneshot(post(
            "/api/column",
            r#"{"methodId": "emotion", "templateId": "impact", "mode": "board", "selectedItems": ["雨"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["result"]["patterns"][0]["approach"], "直球型");
    assert_eq!(body["result"]["patterns"][0]["titles"][1], "案1");
}
