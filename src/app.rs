use std::sync::Arc;

use crate::ai::{CompletionPoller, DevFallback, JobSubmitter, LilysClient, LilysSettings, SummaryApi};
use crate::config::Config;
use crate::db::{Repository, ResultStore};
use crate::error::{AppError, Result, SummaryError};
use crate::format::format_summary;
use crate::models::{parse_video_id, Requester, SummaryRecord, SummaryView};
use crate::services::{FreshnessCache, SummaryOrchestrator};

/// Everything a front end needs, wired from [`Config`].
pub struct App {
    repository: Arc<Repository>,
    /// Present only when an API key is configured.
    orchestrator: Option<SummaryOrchestrator>,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);

        let api: Option<Arc<dyn SummaryApi>> = match config.api_key() {
            Some(key) => {
                let settings = LilysSettings {
                    api_url: config.api_url.clone(),
                    api_key: key.to_string(),
                    result_language: config.result_language.clone(),
                    model_type: config.model_type.clone(),
                };
                Some(Arc::new(LilysClient::new(settings)?))
            }
            None => {
                tracing::warn!("LILYS_API_KEY is not set; only stored summaries are available");
                None
            }
        };

        Ok(Self::with_api(config, repository, api))
    }

    /// Wires the app around an explicit summarization backend.
    pub fn with_api(
        config: &Config,
        repository: Arc<Repository>,
        api: Option<Arc<dyn SummaryApi>>,
    ) -> Self {
        let orchestrator = api.map(|api| {
            let fallback = DevFallback::from_env();
            if fallback != DevFallback::Disabled {
                tracing::warn!("development placeholder summaries are enabled");
            }

            let store: Arc<dyn ResultStore> = repository.clone();
            SummaryOrchestrator::new(
                FreshnessCache::new(config.cache_ttl()),
                store,
                JobSubmitter::new(api.clone()).with_fallback(fallback),
                CompletionPoller::new(api, config.poll_strategy.cadence()),
                config.overall_timeout(),
            )
        });

        Self {
            repository,
            orchestrator,
        }
    }

    /// Returns the summary for a video id or link, generating it if needed.
    pub async fn summarize(&self, video: &str, requester: Option<&Requester>) -> Result<SummaryView> {
        let video_id = resolve(video)?;
        match &self.orchestrator {
            Some(orchestrator) => Ok(orchestrator.get_or_create(&video_id, requester).await?),
            // Stored summaries stay readable without a key.
            None => self.show(&video_id).await?.ok_or(AppError::NoApiKey),
        }
    }

    pub async fn show(&self, video: &str) -> Result<Option<SummaryView>> {
        let video_id = resolve(video)?;
        if let Some(orchestrator) = &self.orchestrator {
            return Ok(orchestrator.lookup(&video_id).await?);
        }

        let view = self.repository.get(&video_id).await?.map(|mut record| {
            record.formatted_text = format_summary(&record.formatted_text);
            SummaryView::cached(&record)
        });
        Ok(view)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<SummaryRecord>> {
        let mut records = self.repository.recent(limit).await?;
        for record in &mut records {
            record.formatted_text = format_summary(&record.formatted_text);
        }
        Ok(records)
    }

    pub async fn reformat_all(&self) -> Result<usize> {
        let changed = self.repository.reformat_all(format_summary).await?;
        tracing::info!(changed, "reformatted stored summaries");
        Ok(changed)
    }
}

fn resolve(video: &str) -> Result<String> {
    parse_video_id(video).ok_or_else(|| SummaryError::InvalidVideoId(video.to_string()).into())
}
