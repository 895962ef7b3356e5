//! Completion notifications.

use antiplag_core::collaborators::{CollabResult, Notifier};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::NotifyConfig;
use crate::http;

pub const SUBJECT: &str = "Antiplag - Your check has finished!";

/// Link to the results page of `submission_id`.
pub fn results_link(results_url: &str, submission_id: &str) -> String {
    format!("{}/{}/", results_url.trim_end_matches('/'), submission_id)
}

pub fn message_body(results_url: &str, submission_id: &str) -> String {
    format!(
        "Check the results of your check at {}",
        results_link(results_url, submission_id)
    )
}

/// Writes the notification to the log instead of delivering it.
pub struct LogNotifier {
    results_url: String,
}

impl LogNotifier {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            results_url: config.results_url.clone(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_completion(&self, address: &str, submission_id: &str) -> CollabResult<()> {
        info!(
            to = address,
            subject = SUBJECT,
            link = %results_link(&self.results_url, submission_id),
            "completion notification"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    body: String,
    submission_id: &'a str,
}

/// POSTs the message as JSON to a mail relay.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    sender: String,
    results_url: String,
}

impl WebhookNotifier {
    pub fn new(config: &NotifyConfig) -> anyhow::Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("notify.url required"))?;
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            url,
            sender: config.sender.clone(),
            results_url: config.results_url.clone(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_completion(&self, address: &str, submission_id: &str) -> CollabResult<()> {
        let message = WebhookMessage {
            from: &self.sender,
            to: [address],
            subject: SUBJECT,
            body: message_body(&self.results_url, submission_id),
            submission_id,
        };
        // Single attempt; a failed notification is logged by the caller.
        http::post(&self.client, &self.url, &message, 0).await?;
        Ok(())
    }
}
