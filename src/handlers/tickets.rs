use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::models::TicketFilter;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Serialize)]
struct StatusChange {
    changes: u64,
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(filter): Query<TicketFilter>,
) -> Result<Response, AppError> {
    let tickets = state.registry.list_tickets(&filter).await?;
    let message = format!("{} ticket(s)", tickets.len());
    Ok(success(tickets, message))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let ticket = state
        .registry
        .get(&code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' was not found", code)))?;
    Ok(success(ticket, "Ticket found"))
}

pub async fn update_ticket_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(update) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let status = update.status.trim().to_lowercase();
    if status.is_empty() {
        return Err(AppError::ValidationError("Status is required".to_string()));
    }

    let changes = state.registry.update_status(&code, &status).await?;
    if changes == 0 {
        return Err(AppError::NotFound(format!("Ticket '{}' was not found", code)));
    }

    tracing::info!(code = %code, status = %status, "Ticket status changed");
    Ok(success(StatusChange { changes }, "Ticket status updated"))
}
