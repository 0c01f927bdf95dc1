use thiserror::Error;

use crate::domains::organization::QuotaError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("scrape failed: {0}")]
    ScrapeFailed(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
