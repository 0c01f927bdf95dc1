use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::common::OrganizationId;
use crate::domains::analysis::{AdAnalysis, AnalysisOutcome, AttemptError};
use crate::domains::jobs::{submit_job, Job, JobAdmission, JobError, JobId, JobStatus, SubmitJob};
use crate::server::app::AxumAppState;
use crate::server::error::ApiError;

/// Admission. 202 once the job is durably `running`.
pub async fn submit_job_handler(
    Extension(state): Extension<AxumAppState>,
    Json(request): Json<SubmitJob>,
) -> Result<(StatusCode, Json<JobAdmission>), ApiError> {
    let admission = submit_job(request, &state.deps, &state.engine).await?;
    Ok((StatusCode::ACCEPTED, Json(admission)))
}

#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub organization_id: OrganizationId,
    pub keyword: String,
    pub requested_count: i32,
    pub region: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub scraped_items: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub analyses: Vec<AdAnalysis>,
    pub errors: Vec<ItemErrorView>,
}

#[derive(Debug, Serialize)]
pub struct ItemErrorView {
    pub item_index: i32,
    pub ad_archive_id: Option<String>,
    pub attempts: Vec<AttemptError>,
}

impl JobView {
    fn new(job: Job, records: Vec<AdAnalysis>) -> Self {
        let scraped_items = job.scrape_result().ok().flatten().map(|raw| raw.items.len());
        let (errors, analyses): (Vec<AdAnalysis>, Vec<AdAnalysis>) = records
            .into_iter()
            .partition(|r| r.outcome == AnalysisOutcome::Error);

        Self {
            id: job.id,
            organization_id: job.organization_id,
            keyword: job.keyword,
            requested_count: job.requested_count,
            region: job.region,
            status: job.status,
            error: job.error,
            scraped_items,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            analyses,
            errors: errors
                .into_iter()
                .map(|r| ItemErrorView {
                    item_index: r.item_index,
                    ad_archive_id: r.ad_archive_id,
                    attempts: r.errors.0,
                })
                .collect(),
        }
    }
}

/// Job status with its analyses and per-item error trails.
pub async fn get_job_handler(
    Extension(state): Extension<AxumAppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let id = JobId::parse(&raw_id).map_err(JobError::InvalidRequest)?;
    let job = state
        .deps
        .jobs
        .find(&id)
        .await
        .map_err(JobError::Store)?
        .ok_or_else(|| JobError::NotFound(id.to_string()))?;
    let records = state
        .deps
        .analyses
        .list_for_job(&id)
        .await
        .map_err(JobError::Store)?;
    Ok(Json(JobView::new(job, records)))
}
