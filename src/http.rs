//! JSON-over-HTTP helper shared by the remote collaborators.
//!
//! Retry strategy:
//! - HTTP 429 or 5xx → retry with exponential backoff
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error → retry

use std::time::Duration;

use antiplag_core::collaborators::{CollabResult, CollaboratorError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub fn build_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// POSTs `body` to `url` and decodes the JSON answer as `T`.
pub async fn post_json<B, T>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    max_retries: u32,
) -> CollabResult<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    post(client, url, body, max_retries)
        .await?
        .json::<T>()
        .await
        .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))
}

/// POSTs `body` to `url`, returning the first successful response.
pub async fn post<B>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    max_retries: u32,
) -> CollabResult<reqwest::Response>
where
    B: Serialize + ?Sized,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // 1s, 2s, 4s, ... capped at 32s
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(url, attempt, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match client.post(url).json(body).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body_text = response.text().await.unwrap_or_default();
                let message = format!("{} returned {}: {}", url, status, body_text);
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(CollaboratorError::Unavailable(message));
                    continue;
                }
                return Err(CollaboratorError::InvalidResponse(message));
            }
            Err(e) => {
                last_err = Some(CollaboratorError::Unavailable(e.to_string()));
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| CollaboratorError::Unavailable(format!("{} failed after retries", url))))
}
