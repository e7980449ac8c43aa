use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::ticket::STATUS_VALID;
use crate::models::NewTicket;
use crate::services::registry::TicketRegistry;
use crate::utils::error::ImportError;

/// One row of the ticket generator's JSON output.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketSeed {
    pub ticket_id: i64,
    pub code: String,
    pub prefix: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub scanned: bool,
    #[serde(default)]
    pub scan_count: i64,
    #[serde(default)]
    pub first_scan_time: Option<String>,
    #[serde(default)]
    pub last_scan_time: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_status() -> String {
    STATUS_VALID.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: u64,
    pub skipped: u64,
    pub total: u64,
}

impl TicketSeed {
    fn into_new_ticket(self, now: DateTime<Utc>) -> Result<NewTicket, String> {
        let code = self.code.trim();
        let prefix = self.prefix.trim();
        if code.is_empty() {
            return Err("empty code".to_string());
        }
        if prefix.is_empty() {
            return Err("empty prefix".to_string());
        }
        if self.scan_count < 0 {
            return Err(format!("negative scan_count {}", self.scan_count));
        }

        Ok(NewTicket {
            ticket_id: self.ticket_id,
            code: code.to_string(),
            prefix: prefix.to_string(),
            status: self.status,
            scanned: self.scanned,
            scan_count: self.scan_count,
            first_scan_time: self.first_scan_time.as_deref().and_then(parse_timestamp),
            last_scan_time: self.last_scan_time.as_deref().and_then(parse_timestamp),
            created_at: self
                .created_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(now),
        })
    }
}

/// Accepts RFC 3339 or offset-less ISO 8601 (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Loads seeds with insert-if-absent semantics. Rows that fail validation
/// are skipped alongside rows whose code already exists.
pub async fn import_seeds(
    registry: &TicketRegistry,
    seeds: Vec<TicketSeed>,
) -> Result<ImportReport, ImportError> {
    let total = seeds.len() as u64;
    let now = Utc::now();

    let tickets: Vec<NewTicket> = seeds
        .into_iter()
        .filter_map(|seed| {
            let ticket_id = seed.ticket_id;
            match seed.into_new_ticket(now) {
                Ok(ticket) => Some(ticket),
                Err(reason) => {
                    warn!(ticket_id, %reason, "Skipping malformed ticket row");
                    None
                }
            }
        })
        .collect();

    let imported = registry.insert_if_absent(&tickets).await?;
    let report = ImportReport {
        imported,
        skipped: total - imported,
        total,
    };
    info!(
        imported = report.imported,
        skipped = report.skipped,
        total = report.total,
        "Ticket import finished"
    );
    Ok(report)
}

pub async fn import_from_file(
    registry: &TicketRegistry,
    path: &Path,
) -> Result<ImportReport, ImportError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let seeds: Vec<TicketSeed> = serde_json::from_str(&raw)?;
    info!(path = %path.display(), rows = seeds.len(), "Importing tickets");
    import_seeds(registry, seeds).await
}

/// Startup seeding: imports only when the registry holds no tickets and the
/// source file exists.
pub async fn seed_if_empty(
    registry: &TicketRegistry,
    path: &Path,
) -> Result<Option<ImportReport>, ImportError> {
    if registry.count_tickets().await? > 0 {
        return Ok(None);
    }
    if !tokio::fs::try_exists(path).await? {
        warn!(path = %path.display(), "Registry is empty and no import file was found");
        return Ok(None);
    }

    info!("Registry is empty, running automatic import");
    import_from_file(registry, path).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::tests::{new_ticket, seeded_registry};
    use chrono::{Datelike, Timelike};
    use std::io::Write;

    const SAMPLE: &str = r#"[
        {
            "ticket_id": 1,
            "code": "A-4821-BOKAT",
            "prefix": "A",
            "status": "valid",
            "scanned": false,
            "scan_count": 0,
            "first_scan_time": null,
            "last_scan_time": null,
            "created_at": "2025-06-01T18:30:12.482913"
        },
        {
            "ticket_id": 2,
            "code": "B-1934-DUMER",
            "prefix": "B"
        },
        {
            "ticket_id": 3,
            "code": "   ",
            "prefix": "C"
        }
    ]"#;

    #[test]
    fn test_parse_timestamp_formats() {
        let naive = parse_timestamp("2025-06-01T18:30:12.482913").unwrap();
        assert_eq!(naive.year(), 2025);
        assert_eq!(naive.hour(), 18);

        let offset = parse_timestamp("2025-06-01T20:30:12+02:00").unwrap();
        assert_eq!(offset.hour(), 18);

        assert!(parse_timestamp("2025-06-01 18:30:12").is_some());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[tokio::test]
    async fn test_import_seeds_skips_invalid_and_existing() {
        let registry = seeded_registry(&[new_ticket(1, "A-4821-BOKAT", "A")]).await;
        let seeds: Vec<TicketSeed> = serde_json::from_str(SAMPLE).unwrap();

        let report = import_seeds(&registry, seeds).await.unwrap();
        assert_eq!(
            report,
            ImportReport {
                imported: 1,
                skipped: 2,
                total: 3,
            }
        );

        let imported = registry.get("B-1934-DUMER").await.unwrap().unwrap();
        assert_eq!(imported.status, STATUS_VALID);
        assert!(!imported.scanned);
        assert!(!imported.exited);
    }

    #[tokio::test]
    async fn test_seed_if_empty_imports_once() {
        let registry = seeded_registry(&[]).await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let first = seed_if_empty(&registry, file.path()).await.unwrap();
        assert_eq!(first.map(|r| r.imported), Some(2));

        let ticket = registry.get("A-4821-BOKAT").await.unwrap().unwrap();
        assert_eq!(ticket.created_at.minute(), 30);

        let second = seed_if_empty(&registry, file.path()).await.unwrap();
        assert!(second.is_none());
        assert_eq!(registry.count_tickets().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_seed_if_empty_without_file() {
        let registry = seeded_registry(&[]).await;
        let dir = tempfile::tempdir().unwrap();

        let report = seed_if_empty(&registry, &dir.path().join("missing.json"))
            .await
            .unwrap();
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn test_import_from_file_rejects_malformed_json() {
        let registry = seeded_registry(&[]).await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = import_from_file(&registry, file.path()).await.unwrap_err();
        assert!(matches!(err, ImportError::Json(_)));
    }
}
