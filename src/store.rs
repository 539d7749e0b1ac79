//! SQLite persistence for indexed repositories.
//!
//! One row in `repositories` per indexed URL. Its chunks, FTS rows,
//! vectors and file structures are always replaced together inside a
//! single transaction, so a reader never sees a half-indexed repository.
//!
//! Being indexed and having vectors are tracked separately: a repository
//! indexed while the embedding provider was down keeps its chunks and
//! summaries, and only its missing vectors are filled in later with
//! [`save_vectors`].

use anyhow::Result;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use crate::embedding;
use crate::models::{Chunk, FileStructure, RepoStructure, RetrievedChunk};

/// Marker stored in `repositories.embedding_model` when no vectors exist.
pub const NO_EMBEDDINGS: &str = "none";

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]{2,}").unwrap());

/// Embeddings aligned index-for-index with the chunks being saved.
pub struct ChunkVectors<'a> {
    pub model: &'a str,
    pub dims: usize,
    pub embeddings: &'a [Vec<f32>],
}

/// Everything produced by one indexing pass.
pub struct RepoIndex<'a> {
    pub repo_id: &'a str,
    pub url: &'a str,
    /// Configured embedding model, [`NO_EMBEDDINGS`] when disabled.
    pub embedding_model: &'a str,
    pub structure: &'a RepoStructure,
    pub chunks: &'a [Chunk],
    pub vectors: Option<ChunkVectors<'a>>,
}

/// How a repository was last indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexState {
    pub embedding_model: String,
    /// False while some chunks still lack vectors for `embedding_model`.
    pub vectors_complete: bool,
}

pub async fn index_state(pool: &SqlitePool, repo_id: &str) -> Result<Option<IndexState>> {
    let row = sqlx::query(
        "SELECT embedding_model, vectors_complete FROM repositories WHERE id = ?",
    )
    .bind(repo_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| IndexState {
        embedding_model: row.get("embedding_model"),
        vectors_complete: row.get::<i64, _>("vectors_complete") != 0,
    }))
}

/// Replace every stored row for the repository with `index`.
///
/// Cached summaries are dropped too, since they describe the old content.
pub async fn save_index(pool: &SqlitePool, index: &RepoIndex<'_>) -> Result<()> {
    let repo_id = index.repo_id;
    let mut tx = pool.begin().await?;

    for table in [
        "chunk_vectors",
        "chunks_fts",
        "chunks",
        "file_structures",
        "summaries",
    ] {
        sqlx::query(&format!("DELETE FROM {} WHERE repo_id = ?", table))
            .bind(repo_id)
            .execute(&mut *tx)
            .await?;
    }

    let vectors_complete = index.vectors.is_some() || index.embedding_model == NO_EMBEDDINGS;

    sqlx::query(
        r#"
        INSERT INTO repositories (id, url, embedding_model, file_count, chunk_count, vectors_complete, indexed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            url = excluded.url,
            embedding_model = excluded.embedding_model,
            file_count = excluded.file_count,
            chunk_count = excluded.chunk_count,
            vectors_complete = excluded.vectors_complete,
            indexed_at = excluded.indexed_at
        "#,
    )
    .bind(repo_id)
    .bind(index.url)
    .bind(index.embedding_model)
    .bind(index.structure.len() as i64)
    .bind(index.chunks.len() as i64)
    .bind(vectors_complete)
    .bind(chrono::Utc::now().timestamp())
    .execute(&mut *tx)
    .await?;

    for (path, structure) in index.structure {
        sqlx::query(
            "INSERT INTO file_structures (repo_id, path, structure_json) VALUES (?, ?, ?)",
        )
        .bind(repo_id)
        .bind(path)
        .bind(serde_json::to_string(structure)?)
        .execute(&mut *tx)
        .await?;
    }

    for chunk in index.chunks {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, repo_id, chunk_index, path, extension, start_char, end_char, text, hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.repo_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.path)
        .bind(&chunk.extension)
        .bind(chunk.start_char)
        .bind(chunk.end_char)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO chunks_fts (chunk_id, repo_id, path, text) VALUES (?, ?, ?, ?)")
            .bind(&chunk.id)
            .bind(&chunk.repo_id)
            .bind(&chunk.path)
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(vectors) = &index.vectors {
        for (chunk, embedding) in index.chunks.iter().zip(vectors.embeddings) {
            insert_vector(&mut tx, repo_id, &chunk.id, vectors, embedding).await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

async fn insert_vector(
    tx: &mut Transaction<'_, Sqlite>,
    repo_id: &str,
    chunk_id: &str,
    vectors: &ChunkVectors<'_>,
    embedding: &[f32],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, repo_id, model, dims, embedding) VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            model = excluded.model,
            dims = excluded.dims,
            embedding = excluded.embedding
        "#,
    )
    .bind(chunk_id)
    .bind(repo_id)
    .bind(vectors.model)
    .bind(vectors.dims as i64)
    .bind(embedding::vec_to_blob(embedding))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Chunks of the repository with no vector for `model`, as `(id, text)` in file order.
pub async fn chunks_missing_vectors(
    pool: &SqlitePool,
    repo_id: &str,
    model: &str,
) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.text
        FROM chunks c
        LEFT JOIN chunk_vectors cv ON cv.chunk_id = c.id AND cv.model = ?
        WHERE c.repo_id = ? AND cv.chunk_id IS NULL
        ORDER BY c.path, c.chunk_index
        "#,
    )
    .bind(model)
    .bind(repo_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("id"), row.get("text")))
        .collect())
}

/// Store vectors for `chunk_ids` (aligned with `vectors.embeddings`) and
/// mark the repository's vectors complete. Chunks and summaries are kept.
pub async fn save_vectors(
    pool: &SqlitePool,
    repo_id: &str,
    chunk_ids: &[String],
    vectors: &ChunkVectors<'_>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for (chunk_id, embedding) in chunk_ids.iter().zip(vectors.embeddings) {
        insert_vector(&mut tx, repo_id, chunk_id, vectors, embedding).await?;
    }

    sqlx::query("UPDATE repositories SET vectors_complete = 1 WHERE id = ? AND embedding_model = ?")
        .bind(repo_id)
        .bind(vectors.model)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn load_structure(pool: &SqlitePool, repo_id: &str) -> Result<RepoStructure> {
    let rows = sqlx::query(
        "SELECT path, structure_json FROM file_structures WHERE repo_id = ? ORDER BY path",
    )
    .bind(repo_id)
    .fetch_all(pool)
    .await?;

    let mut structure = RepoStructure::new();
    for row in rows {
        let path: String = row.get("path");
        let json: String = row.get("structure_json");
        let file: FileStructure = serde_json::from_str(&json)?;
        structure.insert(path, file);
    }
    Ok(structure)
}

pub async fn has_vectors(pool: &SqlitePool, repo_id: &str, model: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM chunk_vectors WHERE repo_id = ? AND model = ?",
    )
    .bind(repo_id)
    .bind(model)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Cosine search over the repository's stored vectors for `model`.
pub async fn semantic_search(
    pool: &SqlitePool,
    repo_id: &str,
    model: &str,
    query_vec: &[f32],
    top_k: i64,
) -> Result<Vec<RetrievedChunk>> {
    let rows = sqlx::query(
        r#"
        SELECT c.path, c.extension, c.start_char, c.end_char, c.text, cv.embedding
        FROM chunk_vectors cv
        JOIN chunks c ON c.id = cv.chunk_id
        WHERE cv.repo_id = ? AND cv.model = ?
        ORDER BY c.path, c.chunk_index
        "#,
    )
    .bind(repo_id)
    .bind(model)
    .fetch_all(pool)
    .await?;

    let mut results: Vec<RetrievedChunk> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            RetrievedChunk {
                path: row.get("path"),
                extension: row.get("extension"),
                start_char: row.get("start_char"),
                end_char: row.get("end_char"),
                score: embedding::cosine_similarity(query_vec, &vec) as f64,
                text: row.get("text"),
            }
        })
        .collect();

    // Stable sort keeps chunk order among equal scores.
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(top_k.max(0) as usize);
    Ok(results)
}

/// Turn free text into an FTS5 query: every word quoted and OR-ed.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = WORD_RE
        .find_iter(text)
        .map(|m| format!("\"{}\"", m.as_str()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// BM25 keyword search over the repository's chunks.
pub async fn keyword_search(
    pool: &SqlitePool,
    repo_id: &str,
    query: &str,
    top_k: i64,
) -> Result<Vec<RetrievedChunk>> {
    let Some(match_expr) = fts_query(query) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT c.path, c.extension, c.start_char, c.end_char, c.text, f.rank AS rank
        FROM (
            SELECT chunk_id, rank FROM chunks_fts
            WHERE chunks_fts MATCH ? AND repo_id = ?
        ) f
        JOIN chunks c ON c.id = f.chunk_id
        ORDER BY f.rank, c.path, c.chunk_index
        LIMIT ?
        "#,
    )
    .bind(match_expr)
    .bind(repo_id)
    .bind(top_k)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let rank: f64 = row.get("rank");
            RetrievedChunk {
                path: row.get("path"),
                extension: row.get("extension"),
                start_char: row.get("start_char"),
                end_char: row.get("end_char"),
                // FTS5 rank is lower-is-better
                score: -rank,
                text: row.get("text"),
            }
        })
        .collect())
}

/// The repository's first chunks in file order, score 0.
pub async fn leading_chunks(
    pool: &SqlitePool,
    repo_id: &str,
    limit: i64,
) -> Result<Vec<RetrievedChunk>> {
    let rows = sqlx::query(
        r#"
        SELECT path, extension, start_char, end_char, text
        FROM chunks
        WHERE repo_id = ?
        ORDER BY path, chunk_index
        LIMIT ?
        "#,
    )
    .bind(repo_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| RetrievedChunk {
            path: row.get("path"),
            extension: row.get("extension"),
            start_char: row.get("start_char"),
            end_char: row.get("end_char"),
            score: 0.0,
            text: row.get("text"),
        })
        .collect())
}

pub async fn cached_summary(pool: &SqlitePool, repo_id: &str, model: &str) -> Result<Option<String>> {
    let summary: Option<String> =
        sqlx::query_scalar("SELECT summary FROM summaries WHERE repo_id = ? AND model = ?")
            .bind(repo_id)
            .bind(model)
            .fetch_optional(pool)
            .await?;
    Ok(summary)
}

pub async fn save_summary(pool: &SqlitePool, repo_id: &str, model: &str, summary: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO summaries (repo_id, model, summary, created_at) VALUES (?, ?, ?, ?)
        ON CONFLICT(repo_id, model) DO UPDATE SET
            summary = excluded.summary,
            created_at = excluded.created_at
        "#,
    )
    .bind(repo_id)
    .bind(model)
    .bind(summary)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}
