use axum::extract::State;
use axum::response::Response;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn stats(State(state): State<AppState>) -> Result<Response, AppError> {
    let stats = state.registry.stats().await?;
    Ok(success(stats, "Statistics computed"))
}
