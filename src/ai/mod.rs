mod lilys;
mod poller;
mod retry;
mod submitter;

pub use lilys::{
    JobStatus, LilysClient, LilysSettings, SummaryApi, DEFAULT_API_URL, DEFAULT_MODEL_TYPE,
    DEFAULT_RESULT_LANGUAGE,
};
pub use poller::CompletionPoller;
pub use retry::{Backoff, Ceiling, PollCadence, RetryPolicy, Retryable};
pub use submitter::{DevFallback, JobSubmitter, Submission};
