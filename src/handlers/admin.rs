use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::services::export::{tickets_to_csv, CSV_FILENAME};
use crate::services::import::import_from_file;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn import_tickets(State(state): State<AppState>) -> Result<Response, AppError> {
    let report = import_from_file(&state.registry, &state.import_path).await?;
    Ok(success(report, "Import finished"))
}

pub async fn export_csv(State(state): State<AppState>) -> Result<Response, AppError> {
    let tickets = state.registry.all_tickets().await?;
    let body = tickets_to_csv(&tickets)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", CSV_FILENAME),
            ),
        ],
        body,
    )
        .into_response())
}
