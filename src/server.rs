//! HTTP API for the analyzer frontend.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/analyze` | Clone, index and summarize a repository |
//! | `POST` | `/ask` | Answer a question about a repository |
//! | `POST` | `/explain` | Explain one file of a repository |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "URL must be a GitHub repository URL" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `llm_error` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! Origins come from `[server].cors_origins`; a `*` entry allows any origin.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::analyze::{self, AnalyzeResponse, AskResponse, ExplainResponse};
use crate::context::AppContext;
use crate::error::AnalyzeError;

/// Bind to `[server].bind` and serve until the process is stopped.
pub async fn run_server(ctx: AppContext) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let app = build_router(Arc::new(ctx));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "analyzer listening");
    println!("Analyzer API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// The full router with CORS applied.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = cors_layer(&ctx.config.server.cors_origins);

    Router::new()
        .route("/health", get(handle_health))
        .route("/analyze", post(handle_analyze))
        .route("/ask", post(handle_ask))
        .route("/explain", post(handle_explain))
        .layer(cors)
        .with_state(ctx)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<AnalyzeError>() {
            Some(
                AnalyzeError::InvalidUrl(_)
                | AnalyzeError::InvalidRequest(_)
                | AnalyzeError::CloneFailed(_),
            ) => bad_request(err.to_string()),
            Some(AnalyzeError::NotFound(_)) => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: err.to_string(),
            },
            Some(AnalyzeError::Llm(_)) => {
                tracing::warn!(error = %err, "LLM request failed");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "llm_error",
                    message: err.to_string(),
                }
            }
            None => {
                tracing::error!(error = ?err, "request failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: format!("{:#}", err),
                }
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /analyze ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    url: String,
}

async fn handle_analyze(
    State(ctx): State<Arc<AppContext>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(req) = body?;
    Ok(Json(analyze::analyze(&ctx, &req.url).await?))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    repo_url: String,
}

async fn handle_ask(
    State(ctx): State<Arc<AppContext>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = body?;
    Ok(Json(analyze::ask(&ctx, &req.repo_url, &req.question).await?))
}

// ============ POST /explain ============

#[derive(Deserialize)]
struct ExplainRequest {
    repo_url: String,
    path: String,
}

async fn handle_explain(
    State(ctx): State<Arc<AppContext>>,
    body: Result<Json<ExplainRequest>, JsonRejection>,
) -> Result<Json<ExplainResponse>, AppError> {
    let Json(req) = body?;
    Ok(Json(analyze::explain(&ctx, &req.repo_url, &req.path).await?))
}
