use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::fmt;

use crate::common::OrganizationId;
use crate::domains::ads::AdItem;

const MAX_JOB_ID_LEN: usize = 128;

/// Opaque job identifier, caller-supplied or generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Fresh time-ordered id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Accept a caller-supplied id: 1..=128 chars of `[A-Za-z0-9_.:-]`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("job id must not be empty".into());
        }
        if trimmed.len() > MAX_JOB_ID_LEN {
            return Err(format!("job id longer than {} characters", MAX_JOB_ID_LEN));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
        {
            return Err(format!("job id '{}' contains invalid characters", trimmed));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status. Advances monotonically; `completed` and `failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ad_job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scrape payload as stored on the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScrapeResult {
    pub run_id: String,
    pub items: Vec<AdItem>,
}

/// Job - one keyword scrape and its analysis for one organization.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: JobId,
    pub organization_id: OrganizationId,
    pub keyword: String,
    pub requested_count: i32,
    pub region: String,
    pub status: JobStatus,
    pub input: JsonValue,
    pub raw_result: Option<JsonValue>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub analysis_started_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A new `pending` job.
    pub fn new(
        id: JobId,
        organization_id: OrganizationId,
        keyword: impl Into<String>,
        requested_count: i32,
        region: impl Into<String>,
    ) -> Self {
        let keyword = keyword.into();
        let region = region.into();
        let input = serde_json::json!({
            "keyword": keyword,
            "count": requested_count,
            "region": region,
        });
        Self {
            id,
            organization_id,
            keyword,
            requested_count,
            region,
            status: JobStatus::Pending,
            input,
            raw_result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            analysis_started_at: None,
        }
    }

    /// Parse the stored scrape payload, if there is one.
    pub fn scrape_result(&self) -> Result<Option<RawScrapeResult>> {
        match &self.raw_result {
            Some(raw) => Ok(Some(serde_json::from_value(raw.clone())?)),
            None => Ok(None),
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================
//
// Every status/raw_result/error write is guarded on a non-terminal status and
// reports whether a row changed, so duplicate events become no-ops.

impl Job {
    pub async fn find_by_id(id: &JobId, pool: &PgPool) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM ad_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO ad_jobs (
                id, organization_id, keyword, requested_count, region, status,
                input, raw_result, error, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(&self.id)
        .bind(self.organization_id)
        .bind(&self.keyword)
        .bind(self.requested_count)
        .bind(&self.region)
        .bind(self.status)
        .bind(&self.input)
        .bind(&self.raw_result)
        .bind(&self.error)
        .bind(self.created_at)
        .fetch_one(pool)
        .await?;
        Ok(job)
    }

    /// pending -> running
    pub async fn mark_running(id: &JobId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ad_jobs
            SET status = 'running', started_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn store_raw_result(id: &JobId, raw: &JsonValue, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ad_jobs
            SET raw_result = $2
            WHERE id = $1 AND status = 'running' AND raw_result IS NULL
            "#,
        )
        .bind(id)
        .bind(raw)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Take the analysis stage. Only one caller ever gets `true`.
    pub async fn claim_analysis(id: &JobId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ad_jobs
            SET analysis_started_at = NOW()
            WHERE id = $1 AND status = 'running' AND analysis_started_at IS NULL
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn complete(id: &JobId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ad_jobs
            SET status = 'completed', error = NULL, completed_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn fail(id: &JobId, error: &str, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ad_jobs
            SET status = 'failed', error = $2, completed_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
