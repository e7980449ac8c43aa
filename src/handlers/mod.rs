use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::utils::response::success;

pub mod admin;
pub mod scan;
pub mod scans;
pub mod stats;
pub mod tickets;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "checkin-api",
    };

    success(payload, "Health check successful")
}

pub async fn index() -> Response {
    Json(json!({
        "message": "Ticket check-in API",
        "endpoints": {
            "tickets": "/api/tickets",
            "scan": "/api/scan",
            "stats": "/api/stats",
            "scans": "/api/scans",
            "import": "/api/import-tickets",
            "export": "/api/export/csv",
        }
    }))
    .into_response()
}
