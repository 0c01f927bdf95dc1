use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::common::AnalysisId;
use crate::domains::ads::{AdItem, ContentCategory};
use crate::domains::jobs::models::JobId;
use crate::kernel::AnalysisRoute;

/// Structured analysis of one ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub key_insights: Vec<String>,
    pub rewritten_copy: Option<String>,
    pub strategic_notes: Vec<String>,
    /// Raw output of the media call for image/video ads.
    pub media_analysis: Option<JsonValue>,
    /// Produced by the local pattern analyzer instead of a provider.
    pub fallback: bool,
}

impl AnalysisResult {
    /// Read the synthesizer's JSON leniently; missing keys become empty.
    pub fn from_provider(synthesis: &JsonValue, media_analysis: Option<JsonValue>) -> Self {
        Self {
            summary: string_field(synthesis, "summary").unwrap_or_default(),
            key_insights: string_list(synthesis, "key_insights"),
            rewritten_copy: string_field(synthesis, "rewritten_copy"),
            strategic_notes: string_list(synthesis, "strategic_notes"),
            media_analysis,
            fallback: false,
        }
    }
}

fn string_field(value: &JsonValue, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn string_list(value: &JsonValue, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|i| i.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(JsonValue::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// One failed provider attempt, kept for the diagnostic trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptError {
    pub attempt: u32,
    pub route: AnalysisRoute,
    pub provider: String,
    pub model: String,
    pub message: String,
    pub status: Option<u16>,
    pub retryable: bool,
}

/// Where an item ended up. Every item gets exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Analyzed { result: AnalysisResult, attempts: u32 },
    /// `attempts` and `errors` cover provider attempts made before the fallback.
    Fallback {
        result: AnalysisResult,
        reason: String,
        attempts: u32,
        errors: Vec<AttemptError>,
    },
    Error { attempts: Vec<AttemptError> },
}

impl ItemOutcome {
    pub fn kind(&self) -> AnalysisOutcome {
        match self {
            Self::Analyzed { .. } => AnalysisOutcome::Success,
            Self::Fallback { .. } => AnalysisOutcome::Fallback,
            Self::Error { .. } => AnalysisOutcome::Error,
        }
    }

    /// Summary line for an errored item, used in the job's aggregate error.
    pub fn error_summary(&self) -> Option<String> {
        match self {
            Self::Error { attempts } => attempts.last().map(|last| {
                format!(
                    "{} attempt(s), last: {}",
                    attempts.len(),
                    last.message
                )
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "analysis_outcome", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Success,
    Fallback,
    Error,
}

/// Persisted per-item record: an analysis, a fallback analysis, or an error trail.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdAnalysis {
    pub id: AnalysisId,
    pub job_id: JobId,
    pub item_index: i32,
    pub ad_archive_id: Option<String>,
    pub category: ContentCategory,
    pub outcome: AnalysisOutcome,
    pub result: Option<Json<AnalysisResult>>,
    pub errors: Json<Vec<AttemptError>>,
    pub attempts: i32,
    /// Why the fallback analyzer was used instead of a provider.
    pub fallback_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AdAnalysis {
    pub fn from_outcome(
        job_id: &JobId,
        item_index: usize,
        item: &AdItem,
        category: ContentCategory,
        outcome: &ItemOutcome,
    ) -> Self {
        let (result, errors, attempts, fallback_reason) = match outcome {
            ItemOutcome::Analyzed { result, attempts } => {
                (Some(result.clone()), Vec::new(), *attempts, None)
            }
            ItemOutcome::Fallback {
                result,
                reason,
                attempts,
                errors,
            } => (
                Some(result.clone()),
                errors.clone(),
                *attempts,
                Some(reason.clone()),
            ),
            ItemOutcome::Error { attempts } => {
                (None, attempts.clone(), attempts.len() as u32, None)
            }
        };
        Self {
            id: AnalysisId::new(),
            job_id: job_id.clone(),
            item_index: item_index as i32,
            ad_archive_id: item.ad_archive_id.clone(),
            category,
            outcome: outcome.kind(),
            result: result.map(Json),
            errors: Json(errors),
            attempts: attempts as i32,
            fallback_reason,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl AdAnalysis {
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let row = sqlx::query_as::<_, AdAnalysis>(
            r#"
            INSERT INTO ad_analyses (
                id, job_id, item_index, ad_archive_id, category, outcome, result, errors, attempts,
                fallback_reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (job_id, item_index) DO UPDATE SET job_id = EXCLUDED.job_id
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.job_id)
        .bind(self.item_index)
        .bind(&self.ad_archive_id)
        .bind(self.category)
        .bind(self.outcome)
        .bind(&self.result)
        .bind(&self.errors)
        .bind(self.attempts)
        .bind(&self.fallback_reason)
        .bind(self.created_at)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_job(job_id: &JobId, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, AdAnalysis>(
            "SELECT * FROM ad_analyses WHERE job_id = $1 ORDER BY item_index",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
