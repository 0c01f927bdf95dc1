//! Job state machine.
//!
//! `pending -> running -> completed | failed`. Each stage handles one job
//! event; stage results come back as follow-up events for the job effect
//! to emit.
//!
//! # Guarantees
//!
//! - **Terminal is final**: every write is guarded in the store, so a late or
//!   duplicated event for a finished job changes nothing
//! - **One analysis per job**: the analysis stage claims the job first
//! - **No automatic re-scrape**: a failed scrape fails the job; the caller
//!   submits a new one
//! - **Stored scrape wins**: a scrape failure reported after a result was
//!   stored is ignored

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::error::JobError;
use super::events::JobEvent;
use super::models::{JobId, RawScrapeResult};
use crate::domains::ads::{AdItem, ContentCategory};
use crate::domains::analysis::{AdAnalysis, AnalysisStore, ItemOutcome, OutcomeSink};
use crate::kernel::{ScrapeRequest, ServerDeps};

const NO_ADS_ERROR: &str = "no ads returned";

pub struct JobStateMachine {
    deps: ServerDeps,
}

impl JobStateMachine {
    pub fn new(deps: ServerDeps) -> Self {
        Self { deps }
    }

    /// Run the stage for `event` and return the events it causes.
    ///
    /// A stage that errors fails the job instead of leaving it `running`.
    pub async fn handle(&self, event: JobEvent) -> Result<Vec<JobEvent>> {
        let job_id = event.job_id().clone();
        let name = event.name();

        match self.step(event).await {
            Ok(next) => Ok(next),
            Err(err) => {
                error!(job_id = %job_id, event = name, error = %format!("{:#}", err), "Job step failed");
                self.fail(&job_id, format!("{} failed: {:#}", name, err)).await
            }
        }
    }

    async fn step(&self, event: JobEvent) -> Result<Vec<JobEvent>> {
        match event {
            JobEvent::Created { job_id, keyword, .. } => {
                debug!(job_id = %job_id, keyword = %keyword, "Job created");
                Ok(vec![])
            }
            JobEvent::ScrapeRequested {
                job_id,
                keyword,
                max_items,
                region,
                ..
            } => {
                self.scrape(job_id, ScrapeRequest {
                    keyword,
                    max_items,
                    region,
                })
                .await
            }
            JobEvent::ScrapeCompleted {
                job_id,
                run_id,
                items,
            } => self.ingest(job_id, run_id, items).await,
            JobEvent::ScrapeFailed { job_id, message } => {
                self.scrape_failed(job_id, message).await
            }
            JobEvent::AnalysisRequested { job_id } => self.analyze(job_id).await,
            JobEvent::Completed {
                job_id,
                analyzed,
                fallback,
                errored,
            } => {
                info!(job_id = %job_id, analyzed, fallback, errored, "Job completed");
                Ok(vec![])
            }
            JobEvent::Failed { job_id, error } => {
                warn!(job_id = %job_id, error = %error, "Job failed");
                Ok(vec![])
            }
        }
    }

    async fn scrape(&self, job_id: JobId, request: ScrapeRequest) -> Result<Vec<JobEvent>> {
        let Some(job) = self.deps.jobs.find(&job_id).await? else {
            warn!(job_id = %job_id, "Scrape requested for unknown job");
            return Ok(vec![]);
        };
        if job.status.is_terminal() || job.raw_result.is_some() {
            debug!(job_id = %job_id, status = %job.status, "Scrape already done, ignoring");
            return Ok(vec![]);
        }

        info!(
            job_id = %job_id,
            keyword = %request.keyword,
            max_items = request.max_items,
            region = %request.region,
            "Starting scrape"
        );
        match self.deps.scraper.scrape(&request).await {
            Ok(response) => {
                info!(job_id = %job_id, run_id = %response.run_id, items = response.items.len(), "Scrape finished");
                Ok(vec![JobEvent::ScrapeCompleted {
                    job_id,
                    run_id: response.run_id,
                    items: response.items,
                }])
            }
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "Scrape failed");
                Ok(vec![JobEvent::ScrapeFailed {
                    job_id,
                    message: err.to_string(),
                }])
            }
        }
    }

    async fn scrape_failed(&self, job_id: JobId, message: String) -> Result<Vec<JobEvent>> {
        let Some(job) = self.deps.jobs.find(&job_id).await? else {
            warn!(job_id = %job_id, "Scrape failure for unknown job");
            return Ok(vec![]);
        };
        if job.status.is_terminal() || job.raw_result.is_some() {
            debug!(job_id = %job_id, status = %job.status, "Scrape result already stored, ignoring failure");
            return Ok(vec![]);
        }
        // Quota taken at admission stays consumed.
        let error = JobError::ScrapeFailed(message).to_string();
        self.fail(&job_id, error).await
    }

    async fn ingest(
        &self,
        job_id: JobId,
        run_id: String,
        items: Vec<AdItem>,
    ) -> Result<Vec<JobEvent>> {
        let item_count = items.len();
        let raw = serde_json::to_value(RawScrapeResult { run_id, items })?;
        if !self.deps.jobs.store_raw_result(&job_id, &raw).await? {
            debug!(job_id = %job_id, "Scrape result already stored or job finished, ignoring");
            return Ok(vec![]);
        }

        if item_count == 0 {
            return self.fail(&job_id, NO_ADS_ERROR.to_string()).await;
        }
        Ok(vec![JobEvent::AnalysisRequested { job_id }])
    }

    async fn analyze(&self, job_id: JobId) -> Result<Vec<JobEvent>> {
        if !self.deps.jobs.claim_analysis(&job_id).await? {
            debug!(job_id = %job_id, "Analysis already claimed or job finished, ignoring");
            return Ok(vec![]);
        }
        let Some(job) = self.deps.jobs.find(&job_id).await? else {
            return Ok(vec![]);
        };
        let items = job
            .scrape_result()?
            .map(|raw| raw.items)
            .unwrap_or_default();
        if items.is_empty() {
            return self.fail(&job_id, NO_ADS_ERROR.to_string()).await;
        }

        info!(job_id = %job_id, items = items.len(), "Starting analysis");
        let sink = AnalysisRecorder {
            job_id: job_id.clone(),
            store: self.deps.analyses.clone(),
        };
        let summary = self
            .deps
            .analysis_processor()
            .process(&job_id, &items, &sink)
            .await?;

        if summary.usable() == 0 {
            return self.fail(&job_id, summary.aggregate_error()).await;
        }
        if !self.deps.jobs.complete(&job_id).await? {
            return Ok(vec![]);
        }
        Ok(vec![JobEvent::Completed {
            job_id,
            analyzed: summary.analyzed,
            fallback: summary.fallback,
            errored: summary.errored,
        }])
    }

    async fn fail(&self, job_id: &JobId, error: String) -> Result<Vec<JobEvent>> {
        if !self.deps.jobs.fail(job_id, &error).await? {
            debug!(job_id = %job_id, "Job already finished, failure ignored");
            return Ok(vec![]);
        }
        Ok(vec![JobEvent::Failed {
            job_id: job_id.clone(),
            error,
        }])
    }
}

/// Persists each item's outcome as the processor finishes it.
struct AnalysisRecorder {
    job_id: JobId,
    store: Arc<dyn AnalysisStore>,
}

#[async_trait]
impl OutcomeSink for AnalysisRecorder {
    async fn item_finished(
        &self,
        index: usize,
        item: &AdItem,
        category: ContentCategory,
        outcome: &ItemOutcome,
    ) -> Result<()> {
        let record = AdAnalysis::from_outcome(&self.job_id, index, item, category, outcome);
        self.store.insert(&record).await?;
        Ok(())
    }
}
