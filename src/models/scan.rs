use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ScanAction {
    Entry,
    Exit,
}

impl ScanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanAction::Entry => "entry",
            ScanAction::Exit => "exit",
        }
    }
}

/// Outcome tag stored with every scan attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Duplicate,
    Invalid,
    Cancelled,
    Error,
}

/// Immutable audit row. Unknown codes are logged too, so `ticket_code`
/// does not necessarily reference an existing ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ScanRecord {
    pub scan_id: i64,
    pub ticket_code: String,
    pub action: ScanAction,
    pub timestamp: DateTime<Utc>,
    pub scanner_id: Option<String>,
    pub status: ScanStatus,
    pub duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    pub ticket_code: String,
    pub action: ScanAction,
    pub timestamp: DateTime<Utc>,
    pub scanner_id: Option<String>,
    pub status: ScanStatus,
}

impl NewScan {
    pub fn new(
        ticket_code: impl Into<String>,
        action: ScanAction,
        scanner_id: Option<&str>,
        timestamp: DateTime<Utc>,
        status: ScanStatus,
    ) -> Self {
        Self {
            ticket_code: ticket_code.into(),
            action,
            timestamp,
            scanner_id: scanner_id.map(str::to_owned),
            status,
        }
    }

    /// The duplicate flag is set exactly when the outcome is a duplicate.
    pub fn duplicate(&self) -> bool {
        self.status == ScanStatus::Duplicate
    }
}

pub const DEFAULT_SCAN_LIMIT: i64 = 100;
pub const MAX_SCAN_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanFilter {
    pub limit: Option<i64>,
    pub code: Option<String>,
    pub duplicate: Option<bool>,
    pub status: Option<ScanStatus>,
}

impl ScanFilter {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_SCAN_LIMIT)
            .clamp(1, MAX_SCAN_LIMIT)
    }
}
