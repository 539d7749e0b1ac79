//! JSON-over-HTTP calls with retry and exponential backoff.
//!
//! Shared by the embedding and chat clients. The policy:
//! - HTTP 429 and 5xx retry
//! - network errors retry
//! - any other non-success status fails immediately
//! - backoff doubles from 500ms and is capped at 16s

use anyhow::{anyhow, bail, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Build a client with the given request timeout.
pub fn client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500u64 << (attempt - 1).min(5))
}

/// POST `body` to `url` and return the decoded JSON response.
///
/// `service` names the remote side in error messages ("OpenAI", "Ollama").
pub async fn post_json(
    client: &Client,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    max_retries: u32,
    service: &str,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff(attempt);
            tracing::warn!(service, attempt, delay_ms = delay.as_millis() as u64, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", service, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} connection error at {}: {}", service, url, e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", service)))
}
