//! Job admission.
//!
//! Quota is reserved before the job row exists; a rejected admission leaves
//! no job behind. The caller gets an answer as soon as the job is durably
//! `running`; the scrape runs on the engine in a background task.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::error::JobError;
use super::events::JobEvent;
use super::models::{Job, JobId, JobStatus};
use crate::kernel::{AppEngine, ServerDeps};

const MAX_KEYWORD_LEN: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJob {
    pub organization_id: String,
    pub keyword: String,
    pub requested_count: i32,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobAdmission {
    pub job_id: JobId,
    pub status: JobStatus,
    pub quota_remaining: i32,
}

pub async fn submit_job(
    request: SubmitJob,
    deps: &ServerDeps,
    engine: &Arc<AppEngine>,
) -> Result<JobAdmission, JobError> {
    let keyword = request.keyword.trim().to_string();
    if keyword.is_empty() {
        return Err(JobError::InvalidRequest("keyword is required".into()));
    }
    if keyword.chars().count() > MAX_KEYWORD_LEN {
        return Err(JobError::InvalidRequest(format!(
            "keyword longer than {} characters",
            MAX_KEYWORD_LEN
        )));
    }

    let region = request
        .region
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(deps.default_region.as_str())
        .to_ascii_uppercase();

    let job_id = match request.job_id.as_deref() {
        Some(raw) => {
            let id = JobId::parse(raw).map_err(JobError::InvalidRequest)?;
            if deps.jobs.find(&id).await?.is_some() {
                return Err(JobError::InvalidRequest(format!(
                    "job {} already exists",
                    id
                )));
            }
            id
        }
        None => JobId::generate(),
    };

    let ledger = deps.quota_ledger();
    let reservation = ledger
        .check_and_reserve(&request.organization_id, request.requested_count)
        .await?;

    let job = Job::new(
        job_id,
        reservation.organization_id,
        keyword,
        request.requested_count,
        region,
    );
    if let Err(err) = deps.jobs.insert(&job).await {
        error!(job_id = %job.id, error = %err, "Job insert failed after quota reservation");
        if let Err(release_err) = ledger.release(&reservation).await {
            error!(org_id = %reservation.organization_id, error = %release_err, "Quota release failed");
        }
        return Err(JobError::Store(err));
    }
    deps.jobs.mark_running(&job.id).await?;

    info!(
        job_id = %job.id,
        org_id = %job.organization_id,
        keyword = %job.keyword,
        requested_count = job.requested_count,
        quota_remaining = reservation.remaining,
        "Job admitted"
    );

    let events = [
        JobEvent::Created {
            job_id: job.id.clone(),
            organization_id: job.organization_id,
            keyword: job.keyword.clone(),
            requested_count: job.requested_count,
        },
        JobEvent::ScrapeRequested {
            job_id: job.id.clone(),
            organization_id: job.organization_id,
            keyword: job.keyword.clone(),
            max_items: job.requested_count as u32,
            region: job.region.clone(),
        },
    ];
    let engine = engine.clone();
    let job_id = job.id.clone();
    tokio::spawn(async move {
        for event in events {
            let name = event.name();
            if let Err(err) = engine.process(event).await {
                error!(job_id = %job_id, event = name, error = %err, "Job event processing failed");
                return;
            }
        }
    });

    Ok(JobAdmission {
        job_id: job.id,
        status: JobStatus::Running,
        quota_remaining: reservation.remaining,
    })
}
