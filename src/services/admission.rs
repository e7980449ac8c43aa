use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::{NewScan, ScanAction, ScanStatus, Ticket};
use crate::services::registry::{RegistryTx, TicketRegistry};
use crate::utils::error::StoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    #[serde(rename = "unknown_ticket")]
    UnknownTicket,
    #[serde(rename = "ticket_invalid")]
    TicketIneligible,
    #[serde(rename = "not_checked_in_or_already_exited")]
    SequenceError,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UnknownTicket => "unknown_ticket",
            RejectReason::TicketIneligible => "ticket_invalid",
            RejectReason::SequenceError => "not_checked_in_or_already_exited",
        }
    }
}

/// Result of evaluating one scan. Every variant has already been written to
/// the audit log by the time it is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allowed {
        action: ScanAction,
        ticket: Ticket,
        timestamp: DateTime<Utc>,
    },
    /// Re-entry without an intervening exit. The holder is not blocked; the
    /// operator is warned.
    Duplicate { ticket: Ticket },
    Rejected {
        reason: RejectReason,
        ticket: Option<Ticket>,
    },
}

impl Decision {
    pub fn scan_status(&self) -> ScanStatus {
        match self {
            Decision::Allowed { .. } => ScanStatus::Success,
            Decision::Duplicate { .. } => ScanStatus::Duplicate,
            Decision::Rejected { reason, .. } => match reason {
                RejectReason::UnknownTicket => ScanStatus::Invalid,
                RejectReason::TicketIneligible => ScanStatus::Cancelled,
                RejectReason::SequenceError => ScanStatus::Error,
            },
        }
    }
}

/// What the admission policy wants done, before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    RejectUnknown,
    RejectIneligible,
    Duplicate,
    Enter,
    RejectSequence,
    Exit,
}

impl Verdict {
    pub fn scan_status(&self) -> ScanStatus {
        match self {
            Verdict::RejectUnknown => ScanStatus::Invalid,
            Verdict::RejectIneligible => ScanStatus::Cancelled,
            Verdict::Duplicate => ScanStatus::Duplicate,
            Verdict::Enter | Verdict::Exit => ScanStatus::Success,
            Verdict::RejectSequence => ScanStatus::Error,
        }
    }
}

/// Admission policy. Checks run in a fixed order and the first match wins.
pub fn decide(ticket: Option<&Ticket>, action: ScanAction) -> Verdict {
    let Some(ticket) = ticket else {
        return Verdict::RejectUnknown;
    };
    if !ticket.is_valid() {
        return Verdict::RejectIneligible;
    }

    match action {
        ScanAction::Entry if ticket.is_inside() => Verdict::Duplicate,
        ScanAction::Entry => Verdict::Enter,
        ScanAction::Exit if !ticket.is_inside() => Verdict::RejectSequence,
        ScanAction::Exit => Verdict::Exit,
    }
}

/// Applies the admission policy to scans and records every attempt.
///
/// Evaluations for the same code are serialized behind a per-code lock;
/// different codes proceed independently.
pub struct AdmissionEngine {
    registry: TicketRegistry,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AdmissionEngine {
    pub fn new(registry: TicketRegistry) -> Self {
        Self {
            registry,
            locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &TicketRegistry {
        &self.registry
    }

    /// Evaluates one scan atomically. Only storage failures are returned as
    /// errors; in that case neither the ticket nor the audit log changed.
    pub async fn evaluate(
        &self,
        code: &str,
        action: ScanAction,
        scanner_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<Decision> {
        let lock = self.lock_for(code);
        let guard = lock.lock().await;

        let result = self.evaluate_locked(code, action, scanner_id, timestamp).await;

        drop(guard);
        self.release(code, lock);

        match &result {
            Ok(decision) => log_decision(code, action, scanner_id, decision),
            Err(e) => tracing::error!(code, action = action.as_str(), error = %e, "Scan evaluation failed"),
        }
        result
    }

    async fn evaluate_locked(
        &self,
        code: &str,
        action: ScanAction,
        scanner_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<Decision> {
        let mut tx = self.registry.begin_for(code).await?;
        let current = tx.get(code).await?;
        let verdict = decide(current.as_ref(), action);

        let decision = match verdict {
            Verdict::RejectUnknown => Decision::Rejected {
                reason: RejectReason::UnknownTicket,
                ticket: None,
            },
            Verdict::RejectIneligible => Decision::Rejected {
                reason: RejectReason::TicketIneligible,
                ticket: current,
            },
            Verdict::RejectSequence => Decision::Rejected {
                reason: RejectReason::SequenceError,
                ticket: current,
            },
            Verdict::Duplicate => Decision::Duplicate {
                ticket: tx.apply_duplicate_entry(code, timestamp).await?,
            },
            Verdict::Enter => Decision::Allowed {
                action,
                ticket: tx.apply_entry(code, timestamp).await?,
                timestamp,
            },
            Verdict::Exit => Decision::Allowed {
                action,
                ticket: tx.apply_exit(code, timestamp).await?,
                timestamp,
            },
        };

        record(&mut tx, code, action, scanner_id, timestamp, verdict).await?;
        tx.commit().await?;
        Ok(decision)
    }

    fn lock_for(&self, code: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(code.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // The map holds one reference and the caller another; anything above
    // that is a waiter that still needs the entry.
    fn release(&self, code: &str, lock: Arc<Mutex<()>>) {
        self.locks
            .remove_if(code, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }
}

async fn record(
    tx: &mut RegistryTx,
    code: &str,
    action: ScanAction,
    scanner_id: Option<&str>,
    timestamp: DateTime<Utc>,
    verdict: Verdict,
) -> StoreResult<i64> {
    let scan = NewScan::new(code, action, scanner_id, timestamp, verdict.scan_status());
    tx.record_scan(&scan).await
}

fn log_decision(code: &str, action: ScanAction, scanner_id: Option<&str>, decision: &Decision) {
    let action = action.as_str();
    let scanner = scanner_id.unwrap_or("-");
    match decision {
        Decision::Allowed { .. } => {
            info!(code, action, scanner, "Scan accepted");
        }
        Decision::Duplicate { ticket } => {
            warn!(code, action, scanner, scan_count = ticket.scan_count, "Duplicate entry scan");
        }
        Decision::Rejected { reason, .. } => {
            warn!(code, action, scanner, reason = reason.as_str(), "Scan rejected");
        }
    }
}
