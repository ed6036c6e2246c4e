use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// User id recorded for summaries generated without a signed-in requester.
pub const SYSTEM_USER_ID: i64 = 1;
pub const SYSTEM_USER_NAME: &str = "AI";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub video_id: String,
    pub formatted_text: String,
    pub raw_text: Option<String>,
    pub creator_id: i64,
    pub creator_name: String,
    pub created_at: DateTime<Utc>,
}

/// Who asked for a summary. Only used for attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: i64,
    pub name: String,
}

impl Requester {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(SYSTEM_USER_ID, SYSTEM_USER_NAME)
    }
}

/// What callers receive: display text plus provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryView {
    pub text: String,
    pub creator: String,
    pub from_cache: bool,
}

impl SummaryView {
    pub fn cached(record: &SummaryRecord) -> Self {
        Self {
            text: record.formatted_text.clone(),
            creator: record.creator_name.clone(),
            from_cache: true,
        }
    }

    pub fn fresh(record: &SummaryRecord) -> Self {
        Self {
            from_cache: false,
            ..Self::cached(record)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Submitted,
    Polling,
    Completed,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::TimedOut)
    }
}

/// One request in flight at the summarization service.
#[derive(Debug, Clone)]
pub struct SummarizationJob {
    pub video_id: String,
    pub request_id: String,
    pub attempts: u32,
    pub started_at: Instant,
    pub state: JobState,
}

impl SummarizationJob {
    pub fn submitted(video_id: &str, request_id: String, attempts: u32, started_at: Instant) -> Self {
        Self {
            video_id: video_id.to_string(),
            request_id,
            attempts,
            started_at,
            state: JobState::Submitted,
        }
    }

    /// Moves the job forward. Terminal states are sticky.
    pub fn transition(&mut self, next: JobState) {
        if !self.state.is_terminal() {
            self.state = next;
        }
    }
}
