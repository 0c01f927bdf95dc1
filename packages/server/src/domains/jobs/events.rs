//! Job events - facts that move a job between stages.
//!
//! Each stage runs as its own effect invocation; the job row carries the
//! durable state, events only carry what the next stage needs.

use serde::{Deserialize, Serialize};

use super::models::JobId;
use crate::common::OrganizationId;
use crate::domains::ads::AdItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Job admitted and durably `running`.
    Created {
        job_id: JobId,
        organization_id: OrganizationId,
        keyword: String,
        requested_count: i32,
    },
    ScrapeRequested {
        job_id: JobId,
        organization_id: OrganizationId,
        keyword: String,
        max_items: u32,
        region: String,
    },
    ScrapeCompleted {
        job_id: JobId,
        run_id: String,
        items: Vec<AdItem>,
    },
    ScrapeFailed {
        job_id: JobId,
        message: String,
    },
    AnalysisRequested {
        job_id: JobId,
    },
    Completed {
        job_id: JobId,
        analyzed: usize,
        fallback: usize,
        errored: usize,
    },
    Failed {
        job_id: JobId,
        error: String,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Created { job_id, .. }
            | Self::ScrapeRequested { job_id, .. }
            | Self::ScrapeCompleted { job_id, .. }
            | Self::ScrapeFailed { job_id, .. }
            | Self::AnalysisRequested { job_id }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => job_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::ScrapeRequested { .. } => "scrape_requested",
            Self::ScrapeCompleted { .. } => "scrape_completed",
            Self::ScrapeFailed { .. } => "scrape_failed",
            Self::AnalysisRequested { .. } => "analysis_requested",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Terminal notifications; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
