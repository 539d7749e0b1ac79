mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use common::{seed_repo, test_config, REPO_URL};
use repo_analyzer::context::AppContext;
use repo_analyzer::server::build_router;

async fn app() -> (TempDir, Router) {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.server.cors_origins = vec!["http://localhost:5173".to_string()];
    seed_repo(&config.cache.dir, REPO_URL);
    let ctx = AppContext::open(config).await.unwrap();
    (tmp, build_router(Arc::new(ctx)))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    read_json(app.oneshot(request).await.unwrap()).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (_tmp, app) = app().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = read_json(app.oneshot(request).await.unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let (_tmp, app) = app().await;
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn test_cors_ignores_other_origin() {
    let (_tmp, app) = app().await;
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_analyze_returns_basic_summary() {
    let (_tmp, app) = app().await;
    let (status, body) = post_json(app, "/analyze", json!({ "url": REPO_URL })).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["summary"]
        .as_str()
        .unwrap()
        .contains("Repository Overview (Basic Analysis)"));
    assert_eq!(body["stats"]["total_files"], 2);
    assert_eq!(body["files"], json!(["app.py", "web/index.js"]));
    assert!(body["readme"].as_str().unwrap().starts_with("# Demo Project"));
}

#[tokio::test]
async fn test_analyze_invalid_url() {
    let (_tmp, app) = app().await;
    let (status, body) = post_json(app, "/analyze", json!({ "url": "ftp://github.com/a/b" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(
        body["error"]["message"],
        "URL must start with http:// or https://"
    );
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (_tmp, app) = app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"url\": "))
        .unwrap();
    let (status, body) = read_json(app.oneshot(request).await.unwrap()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_missing_field_is_bad_request() {
    let (_tmp, app) = app().await;
    let (status, body) = post_json(app, "/ask", json!({ "question": "hi" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_ask_empty_question() {
    let (_tmp, app) = app().await;
    let (status, body) = post_json(
        app,
        "/ask",
        json!({ "question": "  ", "repo_url": REPO_URL }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Question must not be empty");
}

#[tokio::test]
async fn test_ask_summary_question_without_llm() {
    let (_tmp, app) = app().await;
    let (status, body) = post_json(
        app,
        "/ask",
        json!({ "question": "What is this repo about?", "repo_url": REPO_URL }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"].as_str().unwrap().contains("Basic Analysis"));
    assert_eq!(body["sources"], json!([]));
}

#[tokio::test]
async fn test_ask_without_llm_is_bad_gateway() {
    let (_tmp, app) = app().await;
    let (status, body) = post_json(
        app,
        "/ask",
        json!({ "question": "Where is the config loaded?", "repo_url": REPO_URL }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "llm_error");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no LLM provider is configured"));
}

#[tokio::test]
async fn test_explain_file() {
    let (_tmp, app) = app().await;
    let (status, body) = post_json(
        app,
        "/explain",
        json!({ "repo_url": REPO_URL, "path": "web/index.js" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let explanation = body["explanation"].as_str().unwrap();
    assert!(explanation.contains("## File Analysis: web/index.js"));
    assert!(explanation.contains("- **render** (line 4)"));
}

#[tokio::test]
async fn test_explain_missing_file() {
    let (_tmp, app) = app().await;
    let (status, body) = post_json(
        app,
        "/explain",
        json!({ "repo_url": REPO_URL, "path": "nope.py" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(body["error"]["message"], "File not found in codebase: nope.py");
}
