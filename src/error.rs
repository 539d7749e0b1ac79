//! Failures that callers need to tell apart.
//!
//! The pipeline returns `anyhow::Result` everywhere; these variants are
//! raised where the HTTP layer must pick a status code other than 500 and
//! are recovered there with `downcast_ref`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("{0}")]
    InvalidUrl(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Failed to clone repository: {0}")]
    CloneFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("LLM request failed: {0}")]
    Llm(String),
}
