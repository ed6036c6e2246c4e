use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::ai::Retryable;

/// Errors raised by the application shell: configuration, IO and wiring.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("LILYS_API_KEY is not set; summary generation is disabled")]
    NoApiKey,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures of the durable result store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("a summary for video {0} is already stored")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Failures while handing a video to the summarization service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Plausibly fixed by trying again (gateway faults, 5xx, network blips).
    #[error("transient submission failure: {0}")]
    Transient(String),

    #[error("submission failed: {0}")]
    Fatal(String),
}

impl Retryable for SubmitError {
    fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Transient(_))
    }
}

/// Failures while waiting for a submitted job to finish.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("status check failed: {0}")]
    Transport(String),

    #[error("summarization failed: {0}")]
    Failed(String),

    #[error("gave up after {attempts} status checks ({elapsed:?})")]
    TimedOut { attempts: u32, elapsed: Duration },
}

impl Retryable for PollError {
    fn is_retryable(&self) -> bool {
        matches!(self, PollError::Transport(_))
    }
}

/// Which step of generation produced a [`SummaryError::GenerationFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Submit,
    Poll,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Submit => f.write_str("submit"),
            FailureStage::Poll => f.write_str("poll"),
        }
    }
}

/// Errors surfaced by the summary orchestrator to its callers.
///
/// Cloneable so that every caller sharing one in-flight generation
/// receives the same outcome.
#[derive(Error, Debug, Clone)]
pub enum SummaryError {
    #[error("invalid video id: {0:?}")]
    InvalidVideoId(String),

    #[error("summary for video {0} already exists but could not be read back")]
    AlreadyExists(String),

    #[error("summary generation failed during {stage}: {message}")]
    GenerationFailed { stage: FailureStage, message: String },

    #[error("summary generation timed out after {attempts} status checks ({elapsed:?})")]
    TimedOut { attempts: u32, elapsed: Duration },

    #[error("summary storage unavailable: {0}")]
    Storage(#[source] Arc<StoreError>),

    #[error("summary generation task aborted: {0}")]
    Aborted(String),
}

impl SummaryError {
    /// Whether presenting a "try again" affordance makes sense.
    pub fn offers_retry(&self) -> bool {
        match self {
            SummaryError::TimedOut { .. }
            | SummaryError::Storage(_)
            | SummaryError::Aborted(_) => true,
            SummaryError::GenerationFailed { stage, .. } => *stage == FailureStage::Submit,
            SummaryError::InvalidVideoId(_) | SummaryError::AlreadyExists(_) => false,
        }
    }
}

impl From<StoreError> for SummaryError {
    fn from(err: StoreError) -> Self {
        SummaryError::Storage(Arc::new(err))
    }
}

impl From<SubmitError> for SummaryError {
    fn from(err: SubmitError) -> Self {
        let message = match err {
            SubmitError::Transient(m) | SubmitError::Fatal(m) => m,
        };
        SummaryError::GenerationFailed {
            stage: FailureStage::Submit,
            message,
        }
    }
}

impl From<PollError> for SummaryError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::TimedOut { attempts, elapsed } => SummaryError::TimedOut { attempts, elapsed },
            PollError::Failed(message) | PollError::Transport(message) => {
                SummaryError::GenerationFailed {
                    stage: FailureStage::Poll,
                    message,
                }
            }
        }
    }
}
