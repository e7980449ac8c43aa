use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Status value that makes a ticket eligible for admission.
pub const STATUS_VALID: &str = "valid";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Column order used by the CSV export.
pub const TICKET_COLUMNS: [&str; 11] = [
    "ticket_id",
    "code",
    "prefix",
    "status",
    "scanned",
    "exited",
    "scan_count",
    "first_scan_time",
    "last_scan_time",
    "exit_time",
    "created_at",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub ticket_id: i64,
    pub code: String,
    pub prefix: String,
    pub status: String,
    pub scanned: bool,
    pub exited: bool,
    pub scan_count: i64,
    pub first_scan_time: Option<DateTime<Utc>>,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub exit_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Derived admission phase of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Outside,
    Inside,
}

impl Ticket {
    pub fn is_valid(&self) -> bool {
        self.status == STATUS_VALID
    }

    pub fn phase(&self) -> Phase {
        if self.scanned && !self.exited {
            Phase::Inside
        } else {
            Phase::Outside
        }
    }

    pub fn is_inside(&self) -> bool {
        self.phase() == Phase::Inside
    }
}

/// A ticket row as written by the bulk import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub ticket_id: i64,
    pub code: String,
    pub prefix: String,
    pub status: String,
    pub scanned: bool,
    pub scan_count: i64,
    pub first_scan_time: Option<DateTime<Utc>>,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Conjunctive filters for ticket listings. Unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<String>,
    pub prefix: Option<String>,
    pub scanned: Option<bool>,
}
