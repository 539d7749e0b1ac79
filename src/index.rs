//! Repository preparation and retrieval.
//!
//! Preparation flows through the following steps:
//!
//! ```text
//! validate URL → clone (or reuse cache) → scan → extract + chunk → embed → store
//! ```
//!
//! A repository already indexed with the current embedding model skips
//! straight to loading its stored structures. Embedding failure is not
//! fatal: the chunks are stored without vectors and retrieval uses the
//! keyword index instead. Later preparations only embed the chunks still
//! missing vectors; the stored chunks and cached summaries stay.

use anyhow::Result;

use crate::chunk::chunk_file;
use crate::context::AppContext;
use crate::extract::extract_structure;
use crate::models::{Chunk, PreparedRepo, RepoStructure, RetrievedChunk};
use crate::repo;
use crate::store::{self, ChunkVectors, RepoIndex};

/// Clone (if needed) and index the repository at `url`.
pub async fn prepare_repository(ctx: &AppContext, url: &str) -> Result<PreparedRepo> {
    let url = repo::validate_repo_url(url)?;
    let repo_id = repo::repo_id(&url);
    let _guard = ctx.lock_repo(&repo_id).await;

    let (path, readme) = {
        let config = ctx.config.clone();
        let url = url.clone();
        tokio::task::spawn_blocking(move || -> Result<_> {
            let path = repo::ensure_cloned(&config, &url)?;
            let readme = repo::load_readme(&path);
            Ok((path, readme))
        })
        .await??
    };

    let structure = match store::index_state(&ctx.pool, &repo_id).await? {
        Some(state) if state.embedding_model == ctx.embedding_model() => {
            tracing::debug!(repo_id, "using stored index");
            if !state.vectors_complete {
                fill_missing_vectors(ctx, &repo_id).await?;
            }
            store::load_structure(&ctx.pool, &repo_id).await?
        }
        _ => index_repository(ctx, &repo_id, &url, &path).await?,
    };

    Ok(PreparedRepo {
        repo_id,
        url,
        path,
        readme,
        structure,
    })
}

async fn index_repository(
    ctx: &AppContext,
    repo_id: &str,
    url: &str,
    path: &std::path::Path,
) -> Result<RepoStructure> {
    let (structure, chunks) = {
        let config = ctx.config.clone();
        let repo_id = repo_id.to_string();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(RepoStructure, Vec<Chunk>)> {
            let files = repo::scan_source_files(&config, &path)?;
            let mut structure = RepoStructure::new();
            let mut chunks = Vec::new();
            for file in &files {
                structure.insert(
                    file.path.clone(),
                    extract_structure(&file.extension, &file.text),
                );
                chunks.extend(chunk_file(
                    &repo_id,
                    file,
                    config.chunking.chunk_size,
                    config.chunking.overlap,
                ));
            }
            Ok((structure, chunks))
        })
        .await??
    };

    let embeddings = match &ctx.embedder {
        Some(embedder) => {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            match embedder.embed_texts(&texts).await {
                Ok(vectors) => Some(vectors),
                Err(e) => {
                    tracing::warn!(repo_id, error = %e, "embedding failed, falling back to keyword retrieval");
                    None
                }
            }
        }
        None => None,
    };

    let vectors = match (&ctx.embedder, &embeddings) {
        (Some(embedder), Some(embeddings)) => Some(ChunkVectors {
            model: embedder.model_name(),
            dims: embedder.dims(),
            embeddings,
        }),
        _ => None,
    };

    store::save_index(
        &ctx.pool,
        &RepoIndex {
            repo_id,
            url,
            embedding_model: ctx.embedding_model(),
            structure: &structure,
            chunks: &chunks,
            vectors,
        },
    )
    .await?;

    tracing::info!(
        repo_id,
        files = structure.len(),
        chunks = chunks.len(),
        embedded = embeddings.is_some(),
        "repository indexed"
    );
    Ok(structure)
}

/// Embed the chunks indexed while the embedding provider was failing.
async fn fill_missing_vectors(ctx: &AppContext, repo_id: &str) -> Result<()> {
    let Some(embedder) = &ctx.embedder else {
        return Ok(());
    };

    let missing = store::chunks_missing_vectors(&ctx.pool, repo_id, embedder.model_name()).await?;
    let (ids, texts): (Vec<String>, Vec<String>) = missing.into_iter().unzip();

    match embedder.embed_texts(&texts).await {
        Ok(embeddings) => {
            store::save_vectors(
                &ctx.pool,
                repo_id,
                &ids,
                &ChunkVectors {
                    model: embedder.model_name(),
                    dims: embedder.dims(),
                    embeddings: &embeddings,
                },
            )
            .await?;
            tracing::info!(repo_id, chunks = ids.len(), "missing vectors embedded");
        }
        Err(e) => {
            tracing::warn!(repo_id, error = %e, "embedding still failing, keeping keyword retrieval");
        }
    }
    Ok(())
}

/// Top `top_k` chunks of the repository for `question`.
///
/// Semantic when vectors exist for the configured model, keyword otherwise.
/// When neither finds anything the repository's leading chunks are used.
pub async fn retrieve(
    ctx: &AppContext,
    repo_id: &str,
    question: &str,
    top_k: i64,
) -> Result<Vec<RetrievedChunk>> {
    if let Some(embedder) = &ctx.embedder {
        let model = embedder.model_name();
        if store::has_vectors(&ctx.pool, repo_id, model).await? {
            match embedder.embed_query(question).await {
                Ok(query_vec) => {
                    let results =
                        store::semantic_search(&ctx.pool, repo_id, model, &query_vec, top_k)
                            .await?;
                    tracing::debug!(repo_id, hits = results.len(), "semantic retrieval");
                    return Ok(results);
                }
                Err(e) => {
                    tracing::warn!(repo_id, error = %e, "query embedding failed, using keyword retrieval");
                }
            }
        }
    }

    let results = store::keyword_search(&ctx.pool, repo_id, question, top_k).await?;
    tracing::debug!(repo_id, hits = results.len(), "keyword retrieval");
    if !results.is_empty() {
        return Ok(results);
    }
    store::leading_chunks(&ctx.pool, repo_id, top_k).await
}
