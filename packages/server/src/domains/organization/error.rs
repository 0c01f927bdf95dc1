use thiserror::Error;

/// Admission and quota errors. Surfaced directly to the caller.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota exceeded: {used} of {limit} ads used")]
    QuotaExceeded { used: i32, limit: i32 },

    #[error("invalid organization: {0}")]
    InvalidOrganization(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
