//! Client for the Dify workflow API used to summarize pull-request diffs.
//!
//! The workflow takes the concatenated diff as its `patch` input and returns
//! generated review text. Failures are classified so that callers can report
//! them precisely:
//!
//! - **RejectedInput**: the service refused the request (HTTP 4xx)
//! - **ServiceUnavailable**: the service itself failed (HTTP 5xx)
//! - **Workflow**: transport succeeded but the payload carries a non-null
//!   `data.error` field
//! - **Transport**: the request never completed or the body was unreadable
//!
//! None of these is fatal to a pass: the caller is expected to surface the
//! failure out of band and move on without a summary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Failure classification for a summarization request.
#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("summarizer rejected the input (HTTP {status}): {body}")]
    RejectedInput { status: u16, body: String },

    #[error("summarizer service unavailable (HTTP {status}): {body}")]
    ServiceUnavailable { status: u16, body: String },

    #[error("summarizer workflow reported an error: {0}")]
    Workflow(String),

    #[error("summarizer transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected summarizer response (HTTP {status}): {body}")]
    Unexpected { status: u16, body: String },
}

/// Anything that can turn a diff into generated review text.
///
/// The engine depends on this trait rather than on `DifyClient` directly so
/// that passes can be exercised in tests without a live endpoint.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, diff: &str) -> Result<String, SummarizerError>;
}

#[derive(Debug, Serialize)]
struct WorkflowRunRequest<'a> {
    inputs: WorkflowInputs<'a>,
    response_mode: &'static str,
    user: &'a str,
}

#[derive(Debug, Serialize)]
struct WorkflowInputs<'a> {
    patch: &'a str,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunResponse {
    data: WorkflowRunData,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunData {
    error: Option<String>,
    outputs: Option<WorkflowOutputs>,
}

#[derive(Debug, Deserialize)]
struct WorkflowOutputs {
    data: String,
}

/// HTTP client for a single Dify workflow endpoint.
#[derive(Clone)]
pub struct DifyClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    user: String,
}

impl DifyClient {
    pub fn new(endpoint: String, api_key: String, user: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("sentinel/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint,
            api_key,
            user,
        }
    }

    fn classify_status(status: u16, body: String) -> SummarizerError {
        match status {
            400..=499 => SummarizerError::RejectedInput { status, body },
            500..=599 => SummarizerError::ServiceUnavailable { status, body },
            _ => SummarizerError::Unexpected { status, body },
        }
    }
}

#[async_trait]
impl Summarizer for DifyClient {
    async fn summarize(&self, diff: &str) -> Result<String, SummarizerError> {
        let request = WorkflowRunRequest {
            inputs: WorkflowInputs { patch: diff },
            response_mode: "blocking",
            user: &self.user,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status.as_u16(), body));
        }

        let body = response.text().await?;
        let parsed: WorkflowRunResponse =
            serde_json::from_str(&body).map_err(|_| SummarizerError::Unexpected {
                status: status.as_u16(),
                body: body.clone(),
            })?;

        if let Some(error) = parsed.data.error {
            return Err(SummarizerError::Workflow(error));
        }

        let text = parsed
            .data
            .outputs
            .map(|outputs| outputs.data)
            .ok_or(SummarizerError::Unexpected {
                status: status.as_u16(),
                body,
            })?;

        info!("Received {} bytes of review text from Dify", text.len());
        Ok(text)
    }
}
