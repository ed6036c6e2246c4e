//! Scripted stand-in for the summarization service.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::ai::{JobStatus, SummaryApi};
use crate::error::{PollError, SubmitError};

/// Replays queued responses and records when each call happened.
///
/// Once a queue runs dry, submissions succeed with `r<n>` and status
/// checks report `pending`.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    submissions: Mutex<VecDeque<Result<String, SubmitError>>>,
    statuses: Mutex<VecDeque<Result<JobStatus, PollError>>>,
    submit_log: Mutex<Vec<(String, Instant)>>,
    status_log: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_submissions(
        self,
        items: impl IntoIterator<Item = Result<String, SubmitError>>,
    ) -> Self {
        self.submissions.lock().unwrap().extend(items);
        self
    }

    pub(crate) fn with_statuses(
        self,
        items: impl IntoIterator<Item = Result<JobStatus, PollError>>,
    ) -> Self {
        self.statuses.lock().unwrap().extend(items);
        self
    }

    pub(crate) fn submit_calls(&self) -> usize {
        self.submit_log.lock().unwrap().len()
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_log.lock().unwrap().len()
    }

    pub(crate) fn submitted_videos(&self) -> Vec<String> {
        self.submit_log
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn submit_gaps(&self) -> Vec<Duration> {
        gaps(&self.submit_log.lock().unwrap())
    }

    pub(crate) fn status_gaps(&self) -> Vec<Duration> {
        gaps(&self.status_log.lock().unwrap())
    }
}

fn gaps(log: &[(String, Instant)]) -> Vec<Duration> {
    log.windows(2).map(|w| w[1].1 - w[0].1).collect()
}

#[async_trait]
impl SummaryApi for ScriptedApi {
    async fn submit(&self, video_id: &str) -> Result<String, SubmitError> {
        let n = {
            let mut log = self.submit_log.lock().unwrap();
            log.push((video_id.to_string(), Instant::now()));
            log.len()
        };
        self.submissions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("r{}", n)))
    }

    async fn status(&self, request_id: &str) -> Result<JobStatus, PollError> {
        self.status_log
            .lock()
            .unwrap()
            .push((request_id.to_string(), Instant::now()));
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(JobStatus::Pending("pending".into())))
    }
}
