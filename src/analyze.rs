//! The three analyzer operations behind both the CLI and the HTTP API.
//!
//! - [`analyze`]: prepare the repository and summarize it.
//! - [`ask`]: answer a question from retrieved chunks.
//! - [`explain`]: describe a single file from its extracted structure.
//!
//! Summaries are cached per (repository, model). When no LLM is configured
//! or a summary/explanation call fails, the markdown fallbacks from
//! [`crate::prompt`] are returned instead. Question answering has no such
//! fallback and reports the failure.

use anyhow::Result;
use serde::Serialize;

use crate::context::AppContext;
use crate::error::AnalyzeError;
use crate::extract::repo_stats;
use crate::index::{prepare_repository, retrieve};
use crate::models::{FileStructure, PreparedRepo, RepoStats, RetrievedChunk};
use crate::prompt;
use crate::repo;
use crate::store;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub repo_id: String,
    pub summary: String,
    pub readme: String,
    pub stats: RepoStats,
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub explanation: String,
}

pub async fn analyze(ctx: &AppContext, url: &str) -> Result<AnalyzeResponse> {
    let prepared = prepare_repository(ctx, url).await?;
    let summary = summarize(ctx, &prepared).await?;

    Ok(AnalyzeResponse {
        repo_id: prepared.repo_id,
        summary,
        stats: repo_stats(&prepared.structure),
        files: prepared.structure.keys().cloned().collect(),
        readme: prepared.readme,
    })
}

/// Cached summary for the repository, generating and caching it if absent.
///
/// A basic summary produced because the LLM call failed is returned but
/// not cached, so the next request tries the LLM again.
pub async fn summarize(ctx: &AppContext, prepared: &PreparedRepo) -> Result<String> {
    let model = ctx.summary_model();
    if let Some(summary) = store::cached_summary(&ctx.pool, &prepared.repo_id, model).await? {
        tracing::debug!(repo_id = %prepared.repo_id, model, "summary cache hit");
        return Ok(summary);
    }

    let stats = repo_stats(&prepared.structure);
    let listing = repo::top_level_listing(&prepared.path, prompt::SUMMARY_LISTING_LIMIT);
    let basic = || prompt::basic_summary(&prepared.readme, &listing, &stats, &prepared.structure);

    let (summary, cacheable) = match &ctx.chat {
        Some(chat) => {
            let request =
                prompt::summary_prompt(&prepared.readme, &listing, &stats, &prepared.structure);
            match chat.complete(&request, prompt::SUMMARY_SAMPLING).await {
                Ok(summary) => (summary, true),
                Err(e) => {
                    tracing::warn!(repo_id = %prepared.repo_id, error = %e, "summary generation failed, using basic summary");
                    (basic(), false)
                }
            }
        }
        None => (basic(), true),
    };

    if cacheable {
        store::save_summary(&ctx.pool, &prepared.repo_id, model, &summary).await?;
    }
    Ok(summary)
}

pub async fn ask(ctx: &AppContext, url: &str, question: &str) -> Result<AskResponse> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AnalyzeError::InvalidRequest("Question must not be empty".to_string()).into());
    }

    let prepared = prepare_repository(ctx, url).await?;

    if prompt::is_summary_question(question) {
        return Ok(AskResponse {
            answer: summarize(ctx, &prepared).await?,
            sources: Vec::new(),
        });
    }

    let Some(chat) = &ctx.chat else {
        return Err(AnalyzeError::Llm(
            "no LLM provider is configured; set [llm] provider to openai or ollama".to_string(),
        )
        .into());
    };

    let sources = retrieve(ctx, &prepared.repo_id, question, ctx.config.retrieval.top_k).await?;
    let request = prompt::answer_prompt(question, &sources, &prepared.structure);
    let answer = chat.complete(&request, prompt::ANSWER_SAMPLING).await?;

    Ok(AskResponse { answer, sources })
}

pub async fn explain(ctx: &AppContext, url: &str, path: &str) -> Result<ExplainResponse> {
    let prepared = prepare_repository(ctx, url).await?;
    let path = path.trim_start_matches("./");
    let Some(file) = prepared.structure.get(path) else {
        return Err(AnalyzeError::NotFound(format!("File not found in codebase: {}", path)).into());
    };

    let explanation = match &ctx.chat {
        Some(chat) => {
            let request = prompt::explain_prompt(path, file);
            match chat.complete(&request, prompt::EXPLAIN_SAMPLING).await {
                Ok(explanation) => explanation,
                Err(e) => {
                    tracing::warn!(path, error = %e, "file explanation failed, using basic analysis");
                    basic_analysis(&prepared, path, file).await
                }
            }
        }
        None => basic_analysis(&prepared, path, file).await,
    };

    Ok(ExplainResponse { explanation })
}

async fn basic_analysis(prepared: &PreparedRepo, path: &str, file: &FileStructure) -> String {
    let content = tokio::fs::read(prepared.path.join(path))
        .await
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    prompt::basic_file_analysis(path, file, content.as_deref())
}
