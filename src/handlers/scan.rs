use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ScanAction, Ticket};
use crate::services::{Decision, RejectReason};
use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub code: String,
    pub action: ScanAction,
    #[serde(default)]
    pub scanner_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ScanResponse {
    Allowed {
        success: bool,
        message: &'static str,
        action: ScanAction,
        timestamp: DateTime<Utc>,
        ticket: Ticket,
    },
    Duplicate {
        success: bool,
        warning: &'static str,
        duplicate: bool,
        ticket: Ticket,
    },
    Rejected {
        success: bool,
        error: &'static str,
        reason: RejectReason,
        code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ticket: Option<Ticket>,
    },
}

impl ScanResponse {
    pub fn from_decision(code: &str, decision: Decision) -> (StatusCode, Self) {
        match decision {
            Decision::Allowed {
                action,
                ticket,
                timestamp,
            } => {
                let message = match action {
                    ScanAction::Entry => "Entry authorized",
                    ScanAction::Exit => "Exit recorded",
                };
                (
                    StatusCode::OK,
                    ScanResponse::Allowed {
                        success: true,
                        message,
                        action,
                        timestamp,
                        ticket,
                    },
                )
            }
            Decision::Duplicate { ticket } => (
                StatusCode::OK,
                ScanResponse::Duplicate {
                    success: false,
                    warning: "Duplicate entry detected",
                    duplicate: true,
                    ticket,
                },
            ),
            Decision::Rejected { reason, ticket } => {
                let (status, error) = match reason {
                    RejectReason::UnknownTicket => (StatusCode::NOT_FOUND, "Unknown ticket"),
                    RejectReason::TicketIneligible => {
                        (StatusCode::BAD_REQUEST, "Ticket is invalid or cancelled")
                    }
                    RejectReason::SequenceError => (
                        StatusCode::BAD_REQUEST,
                        "Ticket not checked in or already exited",
                    ),
                };
                (
                    status,
                    ScanResponse::Rejected {
                        success: false,
                        error,
                        reason,
                        code: code.to_string(),
                        ticket,
                    },
                )
            }
        }
    }
}

pub async fn submit_scan(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;

    let code = request.code.trim();
    if code.is_empty() {
        return Err(AppError::ValidationError("Ticket code is required".to_string()));
    }
    let scanner_id = request
        .scanner_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let decision = state
        .engine
        .evaluate(code, request.action, scanner_id, Utc::now())
        .await?;

    let (status, body) = ScanResponse::from_decision(code, decision);
    Ok((status, Json(body)).into_response())
}
