use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Safe to run on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repositories (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            embedding_model TEXT NOT NULL,
            file_count INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL,
            vectors_complete INTEGER NOT NULL DEFAULT 0,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Databases created before vectors were tracked separately.
    let has_vectors_complete: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('repositories') WHERE name = 'vectors_complete'",
    )
    .fetch_one(pool)
    .await?;
    if !has_vectors_complete {
        sqlx::query(
            "ALTER TABLE repositories ADD COLUMN vectors_complete INTEGER NOT NULL DEFAULT 0",
        )
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            path TEXT NOT NULL,
            extension TEXT NOT NULL,
            start_char INTEGER NOT NULL,
            end_char INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(repo_id, path, chunk_index),
            FOREIGN KEY (repo_id) REFERENCES repositories(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_structures (
            repo_id TEXT NOT NULL,
            path TEXT NOT NULL,
            structure_json TEXT NOT NULL,
            PRIMARY KEY (repo_id, path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summaries (
            repo_id TEXT NOT NULL,
            model TEXT NOT NULL,
            summary TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (repo_id, model)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE has no IF NOT EXISTS guarantee across SQLite builds
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunks_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE chunks_fts USING fts5(
                chunk_id UNINDEXED,
                repo_id UNINDEXED,
                path,
                text
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_repo_id ON chunks(repo_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_repo_id ON chunk_vectors(repo_id)")
        .execute(pool)
        .await?;

    Ok(())
}
