use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ai::{JobStatus, PollCadence, Retryable, SummaryApi};
use crate::error::PollError;

/// Where the polling loop stands after a status check.
#[derive(Debug)]
enum PollState {
    Polling,
    Done(String),
    Error(PollError),
}

/// Waits for a submitted job to reach a terminal state.
pub struct CompletionPoller {
    api: Arc<dyn SummaryApi>,
    cadence: PollCadence,
}

impl CompletionPoller {
    pub fn new(api: Arc<dyn SummaryApi>, cadence: PollCadence) -> Self {
        Self { api, cadence }
    }

    /// Polls until the job finishes, fails, or the cadence ceiling (or the
    /// caller's `deadline`, whichever comes first) is reached. A status check
    /// still running at the deadline is abandoned.
    pub async fn await_completion(
        &self,
        request_id: &str,
        deadline: Option<Instant>,
    ) -> Result<String, PollError> {
        let started = Instant::now();
        let deadline = match (self.cadence.deadline_from(started), deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let check = self.api.status(request_id);
            let outcome = match deadline {
                Some(d) => match tokio::time::timeout_at(d, check).await {
                    Ok(outcome) => outcome,
                    Err(_) => return Err(give_up(request_id, attempts, started)),
                },
                None => check.await,
            };
            let state = match outcome {
                Ok(JobStatus::Done(Some(summary))) => PollState::Done(summary),
                Ok(JobStatus::Done(None)) => PollState::Error(PollError::Failed(
                    "job completed without a summary".to_string(),
                )),
                Ok(JobStatus::Failed(reason)) => PollState::Error(PollError::Failed(
                    reason.unwrap_or_else(|| "summarization service reported failure".to_string()),
                )),
                Ok(JobStatus::Pending(status)) => {
                    debug!(
                        request_id,
                        attempts,
                        status = %status,
                        elapsed_secs = started.elapsed().as_secs(),
                        "summary still in progress"
                    );
                    PollState::Polling
                }
                Err(e) if e.is_retryable() => {
                    warn!(request_id, attempts, error = %e, "status check failed, will keep polling");
                    PollState::Polling
                }
                Err(e) => PollState::Error(e),
            };

            match state {
                PollState::Done(summary) => {
                    info!(request_id, attempts, elapsed_ms = started.elapsed().as_millis() as u64, "summary ready");
                    return Ok(summary);
                }
                PollState::Error(e) => {
                    warn!(request_id, attempts, error = %e, "summary job failed");
                    return Err(e);
                }
                PollState::Polling => {}
            }

            let now = Instant::now();
            let past_deadline = deadline.is_some_and(|d| now >= d);
            if past_deadline || self.cadence.exhausted(attempts, started) {
                return Err(give_up(request_id, attempts, started));
            }

            let mut delay = self.cadence.interval.delay_for(attempts);
            if let Some(d) = deadline {
                delay = delay.min(d.saturating_duration_since(now));
            }
            tokio::time::sleep(delay).await;

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(give_up(request_id, attempts, started));
            }
        }
    }
}

fn give_up(request_id: &str, attempts: u32, started: Instant) -> PollError {
    let elapsed = started.elapsed();
    warn!(request_id, attempts, elapsed_secs = elapsed.as_secs(), "gave up waiting for summary");
    PollError::TimedOut { attempts, elapsed }
}
