use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ai::{CompletionPoller, JobSubmitter, Submission};
use crate::db::ResultStore;
use crate::error::{FailureStage, PollError, StoreError, SummaryError};
use crate::format::format_summary;
use crate::models::{parse_video_id, JobState, Requester, SummaryRecord, SummaryView, SYSTEM_USER_NAME};

use super::cache::FreshnessCache;
use super::inflight::{Flight, FlightRegistry};

/// Turns a video id into a summary: cache, then store, then a fresh job at
/// the summarization service. At most one job runs per video at a time.
#[derive(Clone)]
pub struct SummaryOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    cache: FreshnessCache,
    store: Arc<dyn ResultStore>,
    submitter: JobSubmitter,
    poller: CompletionPoller,
    flights: FlightRegistry,
    overall_timeout: Option<Duration>,
}

impl SummaryOrchestrator {
    pub fn new(
        cache: FreshnessCache,
        store: Arc<dyn ResultStore>,
        submitter: JobSubmitter,
        poller: CompletionPoller,
        overall_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                store,
                submitter,
                poller,
                flights: FlightRegistry::default(),
                overall_timeout,
            }),
        }
    }

    /// Returns the existing summary for `video_id`, generating it first if
    /// there is none. Concurrent callers for the same video share one job.
    pub async fn get_or_create(
        &self,
        video_id: &str,
        requester: Option<&Requester>,
    ) -> Result<SummaryView, SummaryError> {
        let video_id = normalize(video_id)?;

        if let Some(view) = self.inner.lookup(&video_id).await? {
            return Ok(view);
        }

        let flight = {
            let mut flights = self.inner.flights.lock();
            if let Some(flight) = flights.get(&video_id) {
                debug!(video_id = %video_id, "joining in-flight summary generation");
                flight.clone()
            } else if let Some(record) = self.inner.cache.get(&video_id) {
                // A generation finished between the lookup and taking the lock.
                return Ok(SummaryView::cached(&record));
            } else {
                let flight = Inner::start(&self.inner, video_id.clone(), requester.cloned());
                flights.insert(video_id.clone(), flight.clone());
                flight
            }
        };

        flight.await
    }

    /// Reads a summary without ever generating one.
    pub async fn lookup(&self, video_id: &str) -> Result<Option<SummaryView>, SummaryError> {
        let video_id = normalize(video_id)?;
        self.inner.lookup(&video_id).await
    }

    /// Generations currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.len()
    }
}

fn normalize(video_id: &str) -> Result<String, SummaryError> {
    parse_video_id(video_id).ok_or_else(|| SummaryError::InvalidVideoId(video_id.to_string()))
}

impl Inner {
    async fn lookup(&self, video_id: &str) -> Result<Option<SummaryView>, SummaryError> {
        if let Some(record) = self.cache.get(video_id) {
            debug!(video_id, "summary cache hit");
            return Ok(Some(SummaryView::cached(&record)));
        }

        let Some(mut record) = self.store.get(video_id).await? else {
            return Ok(None);
        };

        debug!(video_id, "summary store hit, repopulating cache");
        record.formatted_text = format_summary(&record.formatted_text);
        let view = SummaryView::cached(&record);
        self.cache.put(video_id, record);
        Ok(Some(view))
    }

    /// Spawns the generation so it runs to completion even if every caller
    /// goes away. The registry entry is cleared once the outcome is cached.
    fn start(this: &Arc<Self>, video_id: String, requester: Option<Requester>) -> Flight {
        let inner = Arc::clone(this);
        let key = video_id.clone();
        let handle = tokio::spawn(async move {
            let result = inner.generate(&key, requester.as_ref()).await;
            inner.flights.finish(&key);
            result
        });

        let inner = Arc::clone(this);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    inner.flights.finish(&video_id);
                    Err(SummaryError::Aborted(e.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn generate(
        &self,
        video_id: &str,
        requester: Option<&Requester>,
    ) -> Result<SummaryView, SummaryError> {
        let started = Instant::now();
        let deadline = self.overall_timeout.map(|timeout| started + timeout);
        info!(video_id, "generating summary");

        let submission = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.submitter.submit(video_id))
                .await
                .map_err(|_| SummaryError::TimedOut {
                    attempts: 0,
                    elapsed: started.elapsed(),
                })??,
            None => self.submitter.submit(video_id).await?,
        };

        let mut job = match submission {
            Submission::Accepted(job) => job,
            Submission::Placeholder(text) => {
                return Ok(SummaryView {
                    text: format_summary(&text),
                    creator: SYSTEM_USER_NAME.to_string(),
                    from_cache: false,
                });
            }
        };

        job.transition(JobState::Polling);
        let raw = match self.poller.await_completion(&job.request_id, deadline).await {
            Ok(raw) => {
                job.transition(JobState::Completed);
                raw
            }
            Err(e) => {
                job.transition(match e {
                    PollError::TimedOut { .. } => JobState::TimedOut,
                    _ => JobState::Failed,
                });
                warn!(
                    video_id = %job.video_id,
                    request_id = %job.request_id,
                    state = ?job.state,
                    error = %e,
                    "summary job did not complete"
                );
                return Err(e.into());
            }
        };

        let formatted = format_summary(&raw);
        if formatted.is_empty() {
            return Err(SummaryError::GenerationFailed {
                stage: FailureStage::Poll,
                message: "summarization service returned an empty summary".to_string(),
            });
        }

        let creator = requester.cloned().unwrap_or_else(Requester::system);
        let record = SummaryRecord {
            video_id: video_id.to_string(),
            formatted_text: formatted,
            raw_text: Some(raw),
            creator_id: creator.id,
            creator_name: creator.name,
            created_at: Utc::now(),
        };

        match self.store.insert(&record).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => {
                warn!(video_id, "summary was stored concurrently, using the stored copy");
                let existing = self
                    .store
                    .get(video_id)
                    .await?
                    .ok_or_else(|| SummaryError::AlreadyExists(video_id.to_string()))?;
                let view = SummaryView::cached(&existing);
                self.cache.put(video_id, existing);
                return Ok(view);
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            video_id = %job.video_id,
            request_id = %job.request_id,
            submit_attempts = job.attempts,
            elapsed_ms = job.started_at.elapsed().as_millis() as u64,
            "summary generated"
        );
        let view = SummaryView::fresh(&record);
        self.cache.put(video_id, record);
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::ai::{DevFallback, JobStatus, PollCadence, SummaryApi};
    use crate::db::MemoryStore;
    use crate::error::SubmitError;
    use crate::testing::ScriptedApi;

    fn orchestrator(api: Arc<ScriptedApi>, store: Arc<dyn ResultStore>) -> SummaryOrchestrator {
        SummaryOrchestrator::new(
            FreshnessCache::default(),
            store,
            JobSubmitter::new(api.clone()),
            CompletionPoller::new(api, PollCadence::fixed()),
            None,
        )
    }

    fn done(text: &str) -> Result<JobStatus, PollError> {
        Ok(JobStatus::Done(Some(text.to_string())))
    }

    fn pending() -> Result<JobStatus, PollError> {
        Ok(JobStatus::Pending("pending".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_is_served_from_cache() {
        let api = Arc::new(ScriptedApi::new().with_statuses([pending(), done("First. Second.")]));
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(api.clone(), store.clone());

        let first = orch.get_or_create("abc123", None).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.creator, "AI");

        let second = orch.get_or_create("abc123", None).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.text, first.text);
        assert_eq!(api.submit_calls(), 1);
        assert_eq!(api.status_calls(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(orch.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn store_hit_repopulates_cache_and_skips_generation() {
        let api = Arc::new(ScriptedApi::new());
        let store = Arc::new(MemoryStore::new());
        store
            .insert(&SummaryRecord {
                video_id: "abc123".into(),
                formatted_text: "Stored before. Formatting.".into(),
                raw_text: None,
                creator_id: 9,
                creator_name: "jun".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let orch = orchestrator(api.clone(), store);

        let view = orch.get_or_create("abc123", None).await.unwrap();
        assert!(view.from_cache);
        assert_eq!(view.creator, "jun");
        assert_eq!(view.text, format_summary("Stored before. Formatting."));
        assert_eq!(api.submit_calls(), 0);
        assert!(orch.inner.cache.exists("abc123"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_cache_falls_through_to_store() {
        let api = Arc::new(ScriptedApi::new().with_statuses([done("Only once.")]));
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(api.clone(), store);

        orch.get_or_create("abc123", None).await.unwrap();
        tokio::time::advance(Duration::from_secs(60 * 60 + 1)).await;
        assert!(!orch.inner.cache.exists("abc123"));

        let view = orch.get_or_create("abc123", None).await.unwrap();
        assert!(view.from_cache);
        assert_eq!(api.submit_calls(), 1);
        assert!(orch.inner.cache.exists("abc123"));
    }

    #[tokio::test(start_paused = true)]
    async fn requester_is_recorded_as_creator() {
        let api = Arc::new(ScriptedApi::new().with_statuses([done("Hi.")]));
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(api, store.clone());

        let view = orch
            .get_or_create("abc123", Some(&Requester::new(42, "sora")))
            .await
            .unwrap();
        assert_eq!(view.creator, "sora");

        let stored = store.get("abc123").await.unwrap().unwrap();
        assert_eq!(stored.creator_id, 42);
        assert_eq!(stored.raw_text.as_deref(), Some("Hi."));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_job() {
        let api = Arc::new(
            ScriptedApi::new().with_statuses([pending(), pending(), done("Shared result.")]),
        );
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(api.clone(), store.clone());

        let calls = (0..5).map(|_| {
            let orch = orch.clone();
            async move { orch.get_or_create("abc123", None).await }
        });
        let results = futures::future::join_all(calls).await;

        let texts: Vec<_> = results.into_iter().map(|r| r.unwrap().text).collect();
        assert!(texts.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(api.submit_calls(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(orch.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_videos_run_independently() {
        let api = Arc::new(ScriptedApi::new().with_statuses([done("One."), done("Two.")]));
        let orch = orchestrator(api.clone(), Arc::new(MemoryStore::new()));

        let (a, b) = tokio::join!(
            orch.get_or_create("video_a", None),
            orch.get_or_create("video_b", None)
        );
        assert!(a.is_ok() && b.is_ok());
        let mut submitted = api.submitted_videos();
        submitted.sort();
        assert_eq!(submitted, vec!["video_a", "video_b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_failure_surfaces_as_generation_failed() {
        let api = Arc::new(
            ScriptedApi::new()
                .with_submissions([Err(SubmitError::Fatal("401 unauthorized".into()))])
                .with_statuses([done("Recovered.")]),
        );
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(api.clone(), store.clone());

        let err = orch.get_or_create("abc123", None).await.unwrap_err();
        assert!(matches!(
            err,
            SummaryError::GenerationFailed { stage: FailureStage::Submit, ref message } if message.contains("401")
        ));
        assert!(store.is_empty());
        assert_eq!(orch.in_flight(), 0);

        // A failed generation is not remembered; the next call tries again.
        let retried = orch.get_or_create("abc123", None).await.unwrap();
        assert!(!retried.from_cache);
        assert_eq!(api.submit_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_timeout_surfaces_as_timed_out() {
        let api = Arc::new(ScriptedApi::new());
        let orch = orchestrator(api, Arc::new(MemoryStore::new()));

        let err = orch.get_or_create("abc123", None).await.unwrap_err();
        assert!(matches!(err, SummaryError::TimedOut { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn overall_timeout_caps_generation() {
        let api = Arc::new(ScriptedApi::new());
        let orch = SummaryOrchestrator::new(
            FreshnessCache::default(),
            Arc::new(MemoryStore::new()),
            JobSubmitter::new(api.clone()),
            CompletionPoller::new(api, PollCadence::fixed()),
            Some(Duration::from_secs(20)),
        );

        let started = Instant::now();
        let err = orch.get_or_create("abc123", None).await.unwrap_err();
        assert!(matches!(err, SummaryError::TimedOut { .. }));
        assert!(started.elapsed() <= Duration::from_secs(20));
    }

    /// Accepts jobs, then never answers a status check.
    struct NeverAnswers;

    #[async_trait]
    impl SummaryApi for NeverAnswers {
        async fn submit(&self, _video_id: &str) -> Result<String, SubmitError> {
            Ok("r1".into())
        }

        async fn status(&self, _request_id: &str) -> Result<JobStatus, PollError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overall_timeout_holds_when_status_checks_hang() {
        let api = Arc::new(NeverAnswers);
        let store = Arc::new(MemoryStore::new());
        let orch = SummaryOrchestrator::new(
            FreshnessCache::default(),
            store.clone(),
            JobSubmitter::new(api.clone()),
            CompletionPoller::new(api, PollCadence::fixed()),
            Some(Duration::from_secs(20)),
        );

        let started = Instant::now();
        let err = orch.get_or_create("abc123", None).await.unwrap_err();
        assert!(matches!(err, SummaryError::TimedOut { .. }));
        assert!(started.elapsed() <= Duration::from_secs(20));
        assert!(store.is_empty());
        assert_eq!(orch.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_ids_are_rejected_up_front() {
        let api = Arc::new(ScriptedApi::new());
        let orch = orchestrator(api.clone(), Arc::new(MemoryStore::new()));

        let err = orch.get_or_create("  ", None).await.unwrap_err();
        assert!(matches!(err, SummaryError::InvalidVideoId(_)));
        assert_eq!(api.submit_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn links_resolve_to_the_same_summary() {
        let api = Arc::new(ScriptedApi::new().with_statuses([done("Once.")]));
        let orch = orchestrator(api.clone(), Arc::new(MemoryStore::new()));

        orch.get_or_create("abc123", None).await.unwrap();
        let view = orch
            .get_or_create("https://youtu.be/abc123", None)
            .await
            .unwrap();
        assert!(view.from_cache);
        assert_eq!(api.submit_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_is_returned_but_not_persisted() {
        let api = Arc::new(
            ScriptedApi::new().with_submissions([Err(SubmitError::Fatal("offline".into()))]),
        );
        let store = Arc::new(MemoryStore::new());
        let orch = SummaryOrchestrator::new(
            FreshnessCache::default(),
            store.clone(),
            JobSubmitter::new(api.clone()).with_fallback(DevFallback::placeholder()),
            CompletionPoller::new(api, PollCadence::fixed()),
            None,
        );

        let view = orch.get_or_create("abc123", None).await.unwrap();
        assert!(!view.from_cache);
        assert!(view.text.contains("temporarily unavailable"));
        assert!(store.is_empty());
        assert!(!orch.inner.cache.exists("abc123"));
    }

    /// A store that another writer beats to every insert.
    struct RacingStore {
        inner: MemoryStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl ResultStore for RacingStore {
        async fn get(&self, video_id: &str) -> Result<Option<SummaryRecord>, StoreError> {
            self.inner.get(video_id).await
        }

        async fn insert(&self, record: &SummaryRecord) -> Result<(), StoreError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let winner = SummaryRecord {
                    creator_name: "other-process".into(),
                    ..record.clone()
                };
                self.inner.insert(&winner).await?;
            }
            self.inner.insert(record).await
        }

        async fn exists(&self, video_id: &str) -> Result<bool, StoreError> {
            self.inner.exists(video_id).await
        }

        async fn recent(&self, limit: usize) -> Result<Vec<SummaryRecord>, StoreError> {
            self.inner.recent(limit).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn losing_a_persist_race_returns_the_stored_copy() {
        let api = Arc::new(ScriptedApi::new().with_statuses([done("Raced.")]));
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            raced: AtomicBool::new(false),
        });
        let orch = orchestrator(api, store);

        let view = orch.get_or_create("abc123", None).await.unwrap();
        assert!(view.from_cache);
        assert_eq!(view.creator, "other-process");
    }

    /// Takes a second per status check.
    struct SlowThenDone {
        scripted: ScriptedApi,
    }

    #[async_trait]
    impl SummaryApi for SlowThenDone {
        async fn submit(&self, video_id: &str) -> Result<String, SubmitError> {
            self.scripted.submit(video_id).await
        }

        async fn status(&self, request_id: &str) -> Result<JobStatus, PollError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.scripted.status(request_id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn generation_finishes_after_the_caller_gives_up() {
        let api = Arc::new(SlowThenDone {
            scripted: ScriptedApi::new().with_statuses([pending(), done("Finished anyway.")]),
        });
        let store = Arc::new(MemoryStore::new());
        let orch = SummaryOrchestrator::new(
            FreshnessCache::default(),
            store.clone(),
            JobSubmitter::new(api.clone()),
            CompletionPoller::new(api, PollCadence::fixed()),
            None,
        );

        let abandoned =
            tokio::time::timeout(Duration::from_millis(500), orch.get_or_create("abc123", None)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(store.exists("abc123").await.unwrap());
        assert_eq!(orch.in_flight(), 0);
    }
}
