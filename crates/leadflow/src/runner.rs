//! Trigger client for the external workflow runner.
//!
//! The runner accepts one webhook call per job and later reports back through
//! the progress and completion callbacks. A 2xx response only means the
//! trigger was accepted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::secrets::ApiKeys;

/// Maximum length for runner error bodies kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Kind of input being enriched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    /// A single Apollo search-page URL.
    ApolloUrl,
    /// A list of LinkedIn profile URLs.
    LinkedinUrls,
}

impl std::fmt::Display for EnrichmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentSource::ApolloUrl => write!(f, "apollo_url"),
            EnrichmentSource::LinkedinUrls => write!(f, "linkedin_urls"),
        }
    }
}

/// Submitted workload: one URL, or an ordered list of identifiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EnrichmentPayload {
    SingleUrl(String),
    UrlList(Vec<String>),
}

impl EnrichmentPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            EnrichmentPayload::SingleUrl(url) => url.is_empty(),
            EnrichmentPayload::UrlList(urls) => urls.is_empty(),
        }
    }

    /// Number of items, when it is known before the runner starts.
    pub fn item_count(&self) -> Option<u64> {
        match self {
            EnrichmentPayload::SingleUrl(_) => None,
            EnrichmentPayload::UrlList(urls) => Some(urls.len() as u64),
        }
    }
}

/// Body of the trigger webhook.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub job_id: String,
    pub source: EnrichmentSource,
    pub data: EnrichmentPayload,
    pub api_keys: ApiKeys,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub use_free_credit: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("N8N_WEBHOOK_URL not configured")]
    NotConfigured,

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("n8n webhook failed: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("n8n webhook timed out")]
    Timeout,

    #[error("n8n webhook unreachable: {0}")]
    Transport(String),
}

/// Something that can start an enrichment workflow.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    /// Sends the trigger and resolves once the runner accepted or rejected it.
    async fn trigger(&self, request: &TriggerRequest) -> Result<(), RunnerError>;
}

/// Runner reached through an HTTP webhook (n8n style).
pub struct WebhookRunner {
    client: Client,
    webhook_url: Option<String>,
}

impl WebhookRunner {
    /// Creates a runner with bounded connect and request timeouts.
    pub fn new(
        webhook_url: Option<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, RunnerError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| RunnerError::Client(e.to_string()))?;

        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl WorkflowRunner for WebhookRunner {
    async fn trigger(&self, request: &TriggerRequest) -> Result<(), RunnerError> {
        let url = self.webhook_url.as_deref().ok_or(RunnerError::NotConfigured)?;

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RunnerError::Timeout
                } else {
                    RunnerError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            log::debug!("Runner accepted job {} ({})", request.job_id, status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(RunnerError::Rejected {
            status: status.as_u16(),
            body: truncate_body(&body),
        })
    }
}

/// Truncates a runner error body so a misbehaving runner cannot flood logs.
fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}
