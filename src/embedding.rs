//! Embedding providers and vector helpers.
//!
//! An [`Embedder`] is built from `[embedding]` config and turns chunk text
//! into vectors:
//! - `openai` calls `POST {base_url}/embeddings` with `OPENAI_API_KEY`.
//! - `ollama` calls `POST {url}/api/embed`.
//! - `local` runs a fastembed model in-process (feature `local-embeddings-fastembed`).
//!
//! `disabled` yields no embedder at all; retrieval then falls back to
//! keyword search. Remote calls go through [`crate::http::post_json`] and
//! share its retry policy.
//!
//! Vectors are stored as little-endian `f32` BLOBs ([`vec_to_blob`],
//! [`blob_to_vec`]) and compared with [`cosine_similarity`].

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};

use crate::config::EmbeddingConfig;
use crate::http;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Backend {
    OpenAI { base_url: String, api_key: String },
    Ollama { url: String },
    Local,
}

/// A configured embedding backend.
pub struct Embedder {
    backend: Backend,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
    /// Loaded on first use and kept for the life of the embedder.
    #[cfg(feature = "local-embeddings-fastembed")]
    local: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

impl Embedder {
    /// Build the embedder for `config`, or `None` when embeddings are disabled.
    ///
    /// # Errors
    ///
    /// Fails when the provider is unknown, `model`/`dims` are missing for a
    /// remote provider, `OPENAI_API_KEY` is unset for `openai`, or `local`
    /// is requested without the fastembed feature.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Option<Self>> {
        if !config.is_enabled() {
            return Ok(None);
        }

        let (backend, model, dims) = match config.provider.as_str() {
            "openai" => {
                let api_key = std::env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
                let (model, dims) = remote_model(config)?;
                (
                    Backend::OpenAI {
                        base_url: base_url.trim_end_matches('/').to_string(),
                        api_key,
                    },
                    model,
                    dims,
                )
            }
            "ollama" => {
                let url = config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string());
                let (model, dims) = remote_model(config)?;
                (
                    Backend::Ollama {
                        url: url.trim_end_matches('/').to_string(),
                    },
                    model,
                    dims,
                )
            }
            "local" => {
                if !cfg!(feature = "local-embeddings-fastembed") {
                    bail!(
                        "Local embedding provider requires --features local-embeddings-fastembed"
                    );
                }
                let (model, dims) = local_model(config);
                (Backend::Local, model, dims)
            }
            other => bail!("Unknown embedding provider: {}", other),
        };

        Ok(Some(Self {
            backend,
            model,
            dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
            #[cfg(feature = "local-embeddings-fastembed")]
            local: Default::default(),
        }))
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Embed `texts`, one vector per input, in input order.
    ///
    /// Remote providers are called once per `batch_size` texts.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if self.backend == Backend::Local {
            return self.embed_local(texts).await;
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = self.embed_remote(batch).await?;
            if batch_vectors.len() != batch.len() {
                bail!(
                    "Embedding response has {} vectors for {} inputs",
                    batch_vectors.len(),
                    batch.len()
                );
            }
            vectors.extend(batch_vectors);
        }
        Ok(vectors)
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }

    async fn embed_remote(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.model,
            "input": batch,
        });

        match &self.backend {
            Backend::OpenAI { base_url, api_key } => {
                let url = format!("{}/embeddings", base_url);
                let json = http::post_json(
                    &self.client,
                    &url,
                    Some(api_key),
                    &body,
                    self.max_retries,
                    "OpenAI",
                )
                .await?;
                parse_openai_response(&json)
            }
            Backend::Ollama { url } => {
                let url = format!("{}/api/embed", url);
                let json =
                    http::post_json(&self.client, &url, None, &body, self.max_retries, "Ollama")
                        .await?;
                parse_ollama_response(&json)
            }
            Backend::Local => bail!("local embeddings do not use HTTP"),
        }
    }
}

fn remote_model(config: &EmbeddingConfig) -> Result<(String, usize)> {
    let model = config.model.clone().ok_or_else(|| {
        anyhow!(
            "embedding.model required for {} provider",
            config.provider
        )
    })?;
    let dims = config
        .dims
        .ok_or_else(|| anyhow!("embedding.dims required for {} provider", config.provider))?;
    Ok((model, dims))
}

fn local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
    let dims = config.dims.unwrap_or(match model.as_str() {
        "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        _ => 384,
    });
    (model, dims)
}

/// `data[].embedding`, ordered by `data[].index` when present.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, json_to_vec(embedding)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(json_to_vec)
        .collect()
}

fn json_to_vec(value: &Value) -> Result<Vec<f32>> {
    Ok(value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid embedding: not an array"))?
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

#[cfg(feature = "local-embeddings-fastembed")]
fn fastembed_model(model: &str) -> Result<fastembed::EmbeddingModel> {
    Ok(match model {
        "all-minilm-l6-v2" => fastembed::EmbeddingModel::AllMiniLML6V2,
        "bge-small-en-v1.5" => fastembed::EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" => fastembed::EmbeddingModel::BGEBaseENV15,
        "bge-large-en-v1.5" => fastembed::EmbeddingModel::BGELargeENV15,
        "nomic-embed-text-v1.5" => fastembed::EmbeddingModel::NomicEmbedTextV15,
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: all-minilm-l6-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, nomic-embed-text-v1.5",
            other
        ),
    })
}

#[cfg(feature = "local-embeddings-fastembed")]
impl Embedder {
    async fn embed_local(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model_id = fastembed_model(&self.model)?;
        let cache = std::sync::Arc::clone(&self.local);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut cached = cache
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            if cached.is_none() {
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model_id).with_show_download_progress(false),
                )
                .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
                tracing::info!("local embedding model loaded");
                *cached = Some(model);
            }
            let Some(model) = cached.as_mut() else {
                bail!("local embedding model unavailable");
            };

            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }

    #[cfg(test)]
    fn local_model_loaded(&self) -> bool {
        self.local.lock().map(|m| m.is_some()).unwrap_or(false)
    }
}

#[cfg(not(feature = "local-embeddings-fastembed"))]
impl Embedder {
    async fn embed_local(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Local embedding provider requires --features local-embeddings-fastembed")
    }
}

/// Encode a float vector as little-endian `f32` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial values are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, mismatched, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, na, nb), (x, y)| {
            (d + x * y, na + x * x, nb + y * y)
        });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
