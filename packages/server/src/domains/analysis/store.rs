//! Per-item analysis records.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::models::AdAnalysis;
use crate::domains::jobs::models::JobId;

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Idempotent per `(job_id, item_index)`: a second write keeps the first row.
    async fn insert(&self, analysis: &AdAnalysis) -> Result<AdAnalysis>;

    async fn list_for_job(&self, job_id: &JobId) -> Result<Vec<AdAnalysis>>;
}

pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn insert(&self, analysis: &AdAnalysis) -> Result<AdAnalysis> {
        analysis.insert(&self.pool).await
    }

    async fn list_for_job(&self, job_id: &JobId) -> Result<Vec<AdAnalysis>> {
        AdAnalysis::find_by_job(job_id, &self.pool).await
    }
}

#[derive(Default)]
pub struct InMemoryAnalysisStore {
    rows: Mutex<Vec<AdAnalysis>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AdAnalysis>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn insert(&self, analysis: &AdAnalysis) -> Result<AdAnalysis> {
        let mut rows = self.lock();
        if let Some(existing) = rows
            .iter()
            .find(|r| r.job_id == analysis.job_id && r.item_index == analysis.item_index)
        {
            return Ok(existing.clone());
        }
        rows.push(analysis.clone());
        Ok(analysis.clone())
    }

    async fn list_for_job(&self, job_id: &JobId) -> Result<Vec<AdAnalysis>> {
        let mut rows: Vec<AdAnalysis> = self
            .lock()
            .iter()
            .filter(|r| &r.job_id == job_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.item_index);
        Ok(rows)
    }
}
