use axum::{
    extract::{Extension, Path},
    Json,
};

use crate::domains::organization::QuotaStatus;
use crate::server::app::AxumAppState;
use crate::server::error::ApiError;

pub async fn quota_status_handler(
    Extension(state): Extension<AxumAppState>,
    Path(org_id): Path<String>,
) -> Result<Json<QuotaStatus>, ApiError> {
    let status = state.deps.quota_ledger().get_status(&org_id).await?;
    Ok(Json(status))
}
