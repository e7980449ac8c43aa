use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::create_cors_layer;
use crate::handlers::{admin, health_check, index, scan, scans, stats, tickets};
use crate::state::AppState;

pub fn create_routes(state: AppState, cors_allowed_origins: Option<&str>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/scan", post(scan::submit_scan))
        .route("/api/tickets", get(tickets::list_tickets))
        .route(
            "/api/tickets/:code",
            get(tickets::get_ticket).put(tickets::update_ticket_status),
        )
        .route("/api/scans", get(scans::list_scans))
        .route("/api/stats", get(stats::stats))
        .route("/api/import-tickets", post(admin::import_tickets))
        .route("/api/export/csv", get(admin::export_csv))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer(cors_allowed_origins))
}
