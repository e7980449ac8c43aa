use axum::extract::{Query, State};
use axum::response::Response;

use crate::models::ScanFilter;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn list_scans(
    State(state): State<AppState>,
    Query(filter): Query<ScanFilter>,
) -> Result<Response, AppError> {
    let scans = state.registry.list_scans(&filter).await?;
    let message = format!("{} scan(s)", scans.len());
    Ok(success(scans, message))
}
