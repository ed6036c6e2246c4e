use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, PollError, Result, SubmitError};
use crate::models::watch_url;

pub const DEFAULT_API_URL: &str = "https://tool.lilys.ai";
pub const DEFAULT_RESULT_LANGUAGE: &str = "ko";
pub const DEFAULT_MODEL_TYPE: &str = "gpt-4";

const SOURCE_TYPE: &str = "youtube_video";
const RESULT_TYPE: &str = "shortSummary";
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Status of a submitted job as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Still working. Carries the raw status string for logging.
    Pending(String),
    Done(Option<String>),
    Failed(Option<String>),
}

/// The external summarization service.
#[async_trait]
pub trait SummaryApi: Send + Sync {
    /// Starts summarizing a video and returns the service's request id.
    async fn submit(&self, video_id: &str) -> std::result::Result<String, SubmitError>;

    async fn status(&self, request_id: &str) -> std::result::Result<JobStatus, PollError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSummaryRequest<'a> {
    source: SummarySource,
    result_language: &'a str,
    model_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarySource {
    source_type: &'static str,
    source_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSummaryResponse {
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    data: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct LilysSettings {
    pub api_url: String,
    pub api_key: String,
    pub result_language: String,
    pub model_type: String,
}

impl LilysSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            result_language: DEFAULT_RESULT_LANGUAGE.to_string(),
            model_type: DEFAULT_MODEL_TYPE.to_string(),
        }
    }
}

/// HTTP client for the Lilys summarization API.
pub struct LilysClient {
    client: Client,
    base_url: Url,
    api_key: String,
    result_language: String,
    model_type: String,
}

impl LilysClient {
    pub fn new(settings: LilysSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        // Url::join drops the last path segment unless the base ends in '/'.
        let mut base = settings.api_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| AppError::Config(format!("invalid api_url {:?}: {}", settings.api_url, e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key,
            result_language: settings.result_language,
            model_type: settings.model_type,
        })
    }

    fn summaries_url(&self) -> std::result::Result<Url, url::ParseError> {
        self.base_url.join("summaries")
    }

    fn status_url(&self, request_id: &str) -> std::result::Result<Url, url::ParseError> {
        let mut url = self
            .base_url
            .join(&format!("summaries/{}", urlencoding::encode(request_id)))?;
        url.query_pairs_mut().append_pair("resultType", RESULT_TYPE);
        Ok(url)
    }
}

#[async_trait]
impl SummaryApi for LilysClient {
    async fn submit(&self, video_id: &str) -> std::result::Result<String, SubmitError> {
        let url = self
            .summaries_url()
            .map_err(|e| SubmitError::Fatal(format!("bad summaries URL: {}", e)))?;

        let request = CreateSummaryRequest {
            source: SummarySource {
                source_type: SOURCE_TYPE,
                source_url: watch_url(video_id),
            },
            result_language: &self.result_language,
            model_type: &self.model_type,
        };

        tracing::debug!(video_id, url = %url, "submitting summary request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(SUBMIT_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(submit_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = format!("API error {}: {}", status, truncate(&error_text, 200));
            return Err(if is_transient_status(status) {
                SubmitError::Transient(message)
            } else {
                SubmitError::Fatal(message)
            });
        }

        let body: CreateSummaryResponse = response
            .json()
            .await
            .map_err(|e| SubmitError::Fatal(format!("unreadable submission response: {}", e)))?;

        body.request_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SubmitError::Fatal("no requestId in submission response".to_string()))
    }

    async fn status(&self, request_id: &str) -> std::result::Result<JobStatus, PollError> {
        let url = self
            .status_url(request_id)
            .map_err(|e| PollError::Failed(format!("bad status URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("status check returned {}", status);
            return Err(if is_transient_status(status) {
                PollError::Transport(message)
            } else {
                PollError::Failed(message)
            });
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| PollError::Transport(format!("unreadable status response: {}", e)))?;

        Ok(parse_status(body))
    }
}

fn parse_status(body: StatusResponse) -> JobStatus {
    match body.status.as_str() {
        "done" | "completed" => JobStatus::Done(body.data.as_ref().and_then(summary_payload)),
        "failed" | "error" => JobStatus::Failed(
            body.data
                .as_ref()
                .and_then(|d| d.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string),
        ),
        _ => JobStatus::Pending(body.status),
    }
}

/// The summary lives at `data.summary` or, for typed results, `data.data.summary`.
fn summary_payload(data: &Value) -> Option<String> {
    data.get("summary")
        .or_else(|| data.get("data").and_then(|inner| inner.get("summary")))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn submit_transport_error(e: reqwest::Error) -> SubmitError {
    if e.is_builder() {
        SubmitError::Fatal(e.to_string())
    } else {
        SubmitError::Transient(e.to_string())
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
