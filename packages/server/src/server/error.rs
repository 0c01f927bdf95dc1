//! Domain errors as HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domains::jobs::JobError;
use crate::domains::organization::QuotaError;

#[derive(Debug)]
pub struct ApiError(JobError);

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        Self(err)
    }
}

impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        Self(JobError::Quota(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, body) = match self.0 {
            JobError::Quota(QuotaError::QuotaExceeded { used, limit }) => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": "quota_exceeded", "message": message, "used": used, "limit": limit }),
            ),
            JobError::Quota(QuotaError::InvalidOrganization(_)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid_organization", "message": message }),
            ),
            JobError::Quota(QuotaError::InvalidRequest(_)) | JobError::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid_request", "message": message }),
            ),
            JobError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "not_found", "message": message }),
            ),
            JobError::ScrapeFailed(_) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "scrape_failed", "message": message }),
            ),
            JobError::Quota(QuotaError::Store(err)) | JobError::Store(err) => {
                error!(error = %format!("{:#}", err), "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal", "message": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
