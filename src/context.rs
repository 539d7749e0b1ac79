//! Shared state for one analyzer process.
//!
//! Built once by the CLI or server and passed by reference (or `Arc`) into
//! every operation.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

use crate::config::Config;
use crate::db;
use crate::embedding::Embedder;
use crate::llm::{create_chat_model, ChatModel};
use crate::migrate;
use crate::store::NO_EMBEDDINGS;

/// Summary cache key used when no LLM is configured.
pub const BASIC_SUMMARY_MODEL: &str = "basic";

pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub embedder: Option<Embedder>,
    pub chat: Option<Arc<dyn ChatModel>>,
    repo_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppContext {
    /// Open the database, apply migrations and build the configured clients.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::run_migrations(&pool).await?;
        let embedder = Embedder::from_config(&config.embedding)?;
        let chat = create_chat_model(&config.llm)?;

        tracing::debug!(
            embedding = embedder.as_ref().map(|e| e.model_name()).unwrap_or(NO_EMBEDDINGS),
            llm = chat.as_ref().map(|c| c.model_name()).unwrap_or(BASIC_SUMMARY_MODEL),
            "analyzer context ready"
        );

        Ok(Self {
            config,
            pool,
            embedder,
            chat,
            repo_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the chat model, e.g. with a test double.
    pub fn with_chat(mut self, chat: Option<Arc<dyn ChatModel>>) -> Self {
        self.chat = chat;
        self
    }

    /// Model name recorded alongside stored vectors.
    pub fn embedding_model(&self) -> &str {
        self.embedder
            .as_ref()
            .map(|e| e.model_name())
            .unwrap_or(NO_EMBEDDINGS)
    }

    /// Key under which summaries are cached.
    pub fn summary_model(&self) -> &str {
        self.chat
            .as_ref()
            .map(|c| c.model_name())
            .unwrap_or(BASIC_SUMMARY_MODEL)
    }

    /// Serialise work on one repository. Other repositories proceed in parallel.
    pub async fn lock_repo(&self, repo_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .repo_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry(repo_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
