//! Job persistence. Writes after a terminal status report `false` and change nothing.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::models::{Job, JobId, JobStatus};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &Job) -> Result<Job>;

    async fn find(&self, id: &JobId) -> Result<Option<Job>>;

    async fn mark_running(&self, id: &JobId) -> Result<bool>;

    async fn store_raw_result(&self, id: &JobId, raw: &JsonValue) -> Result<bool>;

    async fn claim_analysis(&self, id: &JobId) -> Result<bool>;

    async fn complete(&self, id: &JobId) -> Result<bool>;

    async fn fail(&self, id: &JobId, error: &str) -> Result<bool>;
}

// =============================================================================
// Postgres
// =============================================================================

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> Result<Job> {
        job.insert(&self.pool).await
    }

    async fn find(&self, id: &JobId) -> Result<Option<Job>> {
        Job::find_by_id(id, &self.pool).await
    }

    async fn mark_running(&self, id: &JobId) -> Result<bool> {
        Job::mark_running(id, &self.pool).await
    }

    async fn store_raw_result(&self, id: &JobId, raw: &JsonValue) -> Result<bool> {
        Job::store_raw_result(id, raw, &self.pool).await
    }

    async fn claim_analysis(&self, id: &JobId) -> Result<bool> {
        Job::claim_analysis(id, &self.pool).await
    }

    async fn complete(&self, id: &JobId) -> Result<bool> {
        Job::complete(id, &self.pool).await
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<bool> {
        Job::fail(id, error, &self.pool).await
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` if `guard` holds; report whether it did.
    fn guarded(
        &self,
        id: &JobId,
        guard: impl FnOnce(&Job) -> bool,
        change: impl FnOnce(&mut Job),
    ) -> bool {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(job) if guard(job) => {
                change(job);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<Job> {
        let mut jobs = self.lock();
        if jobs.contains_key(&job.id) {
            anyhow::bail!("job {} already exists", job.id);
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job.clone())
    }

    async fn find(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.lock().get(id).cloned())
    }

    async fn mark_running(&self, id: &JobId) -> Result<bool> {
        Ok(self.guarded(
            id,
            |job| job.status == JobStatus::Pending,
            |job| {
                job.status = JobStatus::Running;
                job.started_at = Some(Utc::now());
            },
        ))
    }

    async fn store_raw_result(&self, id: &JobId, raw: &JsonValue) -> Result<bool> {
        Ok(self.guarded(
            id,
            |job| job.status == JobStatus::Running && job.raw_result.is_none(),
            |job| job.raw_result = Some(raw.clone()),
        ))
    }

    async fn claim_analysis(&self, id: &JobId) -> Result<bool> {
        Ok(self.guarded(
            id,
            |job| job.status == JobStatus::Running && job.analysis_started_at.is_none(),
            |job| job.analysis_started_at = Some(Utc::now()),
        ))
    }

    async fn complete(&self, id: &JobId) -> Result<bool> {
        Ok(self.guarded(
            id,
            |job| !job.status.is_terminal(),
            |job| {
                job.status = JobStatus::Completed;
                job.error = None;
                job.completed_at = Some(Utc::now());
            },
        ))
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<bool> {
        Ok(self.guarded(
            id,
            |job| !job.status.is_terminal(),
            |job| {
                job.status = JobStatus::Failed;
                job.error = Some(error.to_string());
                job.completed_at = Some(Utc::now());
            },
        ))
    }
}
