use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::ai::{RetryPolicy, SummaryApi};
use crate::error::SubmitError;
use crate::models::SummarizationJob;

const PLACEHOLDER_MESSAGE: &str =
    "The summary service is temporarily unavailable. Please try again in a moment.";

/// What to do when submission fails for good.
///
/// Only ever enabled for local development: see [`DevFallback::from_env`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DevFallback {
    #[default]
    Disabled,
    /// Hand back a synthetic result instead of an error.
    Placeholder { message: String },
}

impl DevFallback {
    pub fn placeholder() -> Self {
        DevFallback::Placeholder {
            message: PLACEHOLDER_MESSAGE.to_string(),
        }
    }

    /// Enabled only in debug builds, with `TUBESUM_ENV=development` and a
    /// truthy `TUBESUM_DEV_FALLBACK`.
    pub fn from_env() -> Self {
        let env = std::env::var("TUBESUM_ENV").ok();
        let flag = std::env::var("TUBESUM_DEV_FALLBACK").ok();
        Self::from_settings(cfg!(debug_assertions), env.as_deref(), flag.as_deref())
    }

    fn from_settings(debug_build: bool, env: Option<&str>, flag: Option<&str>) -> Self {
        let development = env.is_some_and(|e| e.eq_ignore_ascii_case("development"));
        let flagged = flag.is_some_and(|f| matches!(f.trim(), "1" | "true" | "yes" | "on"));
        if debug_build && development && flagged {
            Self::placeholder()
        } else {
            DevFallback::Disabled
        }
    }
}

/// Outcome of a submission.
#[derive(Debug, Clone)]
pub enum Submission {
    Accepted(SummarizationJob),
    /// Synthetic dev-mode result. Never persisted.
    Placeholder(String),
}

/// Submits summarization jobs, retrying transient upstream failures.
pub struct JobSubmitter {
    api: Arc<dyn SummaryApi>,
    policy: RetryPolicy,
    fallback: DevFallback,
}

impl JobSubmitter {
    pub fn new(api: Arc<dyn SummaryApi>) -> Self {
        Self {
            api,
            policy: RetryPolicy::submission(),
            fallback: DevFallback::Disabled,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fallback(mut self, fallback: DevFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub async fn submit(&self, video_id: &str) -> Result<Submission, SubmitError> {
        let started_at = Instant::now();
        let result = self
            .policy
            .run("summary submission", |attempt| {
                tracing::debug!(video_id, attempt, "submitting summary job");
                self.api.submit(video_id)
            })
            .await;

        match result {
            Ok((request_id, attempts)) => {
                info!(video_id, request_id = %request_id, attempts, "summary job accepted");
                Ok(Submission::Accepted(SummarizationJob::submitted(
                    video_id, request_id, attempts, started_at,
                )))
            }
            Err((err, attempts)) => {
                let err = match err {
                    SubmitError::Transient(message) => SubmitError::Fatal(format!(
                        "gave up after {} attempts: {}",
                        attempts, message
                    )),
                    fatal => fatal,
                };

                if let DevFallback::Placeholder { message } = &self.fallback {
                    warn!(video_id, error = %err, "submission failed, returning development placeholder");
                    return Ok(Submission::Placeholder(message.clone()));
                }

                warn!(video_id, attempts, error = %err, "summary submission failed");
                Err(err)
            }
        }
    }
}
