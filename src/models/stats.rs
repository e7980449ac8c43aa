use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct SeriesStats {
    pub prefix: String,
    pub total: i64,
    pub scanned: i64,
}

/// Live occupancy figures for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: i64,
    pub scanned: i64,
    /// Tickets scanned for entry more than once.
    pub duplicates: i64,
    pub currently_inside: i64,
    pub total_scans: i64,
    pub by_series: Vec<SeriesStats>,
}
