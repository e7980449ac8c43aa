use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::{FromRow, QueryBuilder, Sqlite, Transaction};

use crate::models::{
    NewScan, NewTicket, ScanFilter, ScanRecord, SeriesStats, Stats, Ticket, TicketFilter,
};
use crate::utils::error::StoreResult;

/// Authoritative admission state of every ticket plus the scan audit log.
#[derive(Debug, Clone)]
pub struct TicketRegistry {
    pool: SqlitePool,
}

impl TicketRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a write transaction scoped to one ticket code.
    ///
    /// The first statement claims the database write lock, so the following
    /// read sees the latest committed state and cannot be invalidated before
    /// commit. Dropping the returned handle without `commit` rolls back.
    pub async fn begin_for(&self, code: &str) -> StoreResult<RegistryTx> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE tickets SET code = code WHERE code = ?")
            .bind(code)
            .execute(&mut *tx)
            .await?;
        Ok(RegistryTx { tx })
    }

    pub async fn get(&self, code: &str) -> StoreResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    /// Administrative eligibility override. Returns the number of rows
    /// changed; zero means the code is unknown.
    pub async fn update_status(&self, code: &str, status: &str) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE tickets SET status = ? WHERE code = ?")
            .bind(status)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_tickets(&self, filter: &TicketFilter) -> StoreResult<Vec<Ticket>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tickets WHERE 1=1");

        if let Some(status) = &filter.status {
            query.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(prefix) = &filter.prefix {
            query.push(" AND prefix = ").push_bind(prefix.clone());
        }
        if let Some(scanned) = filter.scanned {
            query.push(" AND scanned = ").push_bind(scanned);
        }
        query.push(" ORDER BY ticket_id");

        let tickets = query.build_query_as::<Ticket>().fetch_all(&self.pool).await?;
        Ok(tickets)
    }

    pub async fn all_tickets(&self) -> StoreResult<Vec<Ticket>> {
        self.list_tickets(&TicketFilter::default()).await
    }

    /// Scan history, newest first.
    pub async fn list_scans(&self, filter: &ScanFilter) -> StoreResult<Vec<ScanRecord>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM scans WHERE 1=1");

        if let Some(code) = &filter.code {
            query.push(" AND ticket_code = ").push_bind(code.clone());
        }
        if let Some(duplicate) = filter.duplicate {
            query.push(" AND duplicate = ").push_bind(duplicate);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        query
            .push(" ORDER BY scan_id DESC LIMIT ")
            .push_bind(filter.effective_limit());

        let scans = query
            .build_query_as::<ScanRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(scans)
    }

    pub async fn count_tickets(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Inserts every row whose `ticket_id` and `code` are both unseen.
    /// Existing tickets are never overwritten. Returns the inserted count.
    pub async fn insert_if_absent(&self, tickets: &[NewTicket]) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for ticket in tickets {
            let result = sqlx::query(
                r#"
                INSERT INTO tickets
                    (ticket_id, code, prefix, status, scanned, scan_count,
                     first_scan_time, last_scan_time, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(ticket.ticket_id)
            .bind(&ticket.code)
            .bind(&ticket.prefix)
            .bind(&ticket.status)
            .bind(ticket.scanned)
            .bind(ticket.scan_count)
            .bind(ticket.first_scan_time)
            .bind(ticket.last_scan_time)
            .bind(ticket.created_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Occupancy aggregates, computed as three independent read-only queries
    /// merged into one value.
    pub async fn stats(&self) -> StoreResult<Stats> {
        let totals = sqlx::query_as::<_, TicketTotals>(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN scanned = 1 THEN 1 ELSE 0 END), 0) AS scanned,
                COALESCE(SUM(CASE WHEN scan_count > 1 THEN 1 ELSE 0 END), 0) AS duplicates,
                COALESCE(SUM(CASE WHEN scanned = 1 AND exited = 0 THEN 1 ELSE 0 END), 0)
                    AS currently_inside
            FROM tickets
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let total_scans = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await?;

        let by_series = sqlx::query_as::<_, SeriesStats>(
            r#"
            SELECT
                prefix,
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN scanned = 1 THEN 1 ELSE 0 END), 0) AS scanned
            FROM tickets
            GROUP BY prefix
            ORDER BY prefix
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(Stats {
            total: totals.total,
            scanned: totals.scanned,
            duplicates: totals.duplicates,
            currently_inside: totals.currently_inside,
            total_scans,
            by_series,
        })
    }
}

#[derive(FromRow)]
struct TicketTotals {
    total: i64,
    scanned: i64,
    duplicates: i64,
    currently_inside: i64,
}

/// Transaction-scoped registry access used by the admission engine. A ticket
/// mutation and its audit row commit together or not at all.
pub struct RegistryTx {
    tx: Transaction<'static, Sqlite>,
}

impl RegistryTx {
    pub async fn get(&mut self, code: &str) -> StoreResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE code = ?")
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(ticket)
    }

    /// Marks the ticket inside. `first_scan_time` is set once and kept.
    pub async fn apply_entry(&mut self, code: &str, at: DateTime<Utc>) -> StoreResult<Ticket> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET scanned = 1,
                exited = 0,
                first_scan_time = COALESCE(first_scan_time, ?),
                last_scan_time = ?,
                scan_count = scan_count + 1
            WHERE code = ?
            RETURNING *
            "#,
        )
        .bind(at)
        .bind(at)
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(ticket)
    }

    /// Counts a re-entry attempt without changing the admission phase.
    pub async fn apply_duplicate_entry(
        &mut self,
        code: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Ticket> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET scan_count = scan_count + 1,
                last_scan_time = ?
            WHERE code = ?
            RETURNING *
            "#,
        )
        .bind(at)
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(ticket)
    }

    pub async fn apply_exit(&mut self, code: &str, at: DateTime<Utc>) -> StoreResult<Ticket> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET exited = 1,
                exit_time = ?
            WHERE code = ?
            RETURNING *
            "#,
        )
        .bind(at)
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(ticket)
    }

    /// Appends an audit row and returns its `scan_id`.
    pub async fn record_scan(&mut self, scan: &NewScan) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO scans (ticket_code, action, timestamp, scanner_id, status, duplicate)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&scan.ticket_code)
        .bind(scan.action)
        .bind(scan.timestamp)
        .bind(&scan.scanner_id)
        .bind(scan.status)
        .bind(scan.duplicate())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db;
    use crate::models::ticket::{STATUS_CANCELLED, STATUS_VALID};
    use crate::models::{ScanAction, ScanStatus};
    use chrono::Duration;

    pub(crate) fn new_ticket(ticket_id: i64, code: &str, prefix: &str) -> NewTicket {
        NewTicket {
            ticket_id,
            code: code.to_string(),
            prefix: prefix.to_string(),
            status: STATUS_VALID.to_string(),
            scanned: false,
            scan_count: 0,
            first_scan_time: None,
            last_scan_time: None,
            created_at: Utc::now(),
        }
    }

    pub(crate) async fn seeded_registry(tickets: &[NewTicket]) -> TicketRegistry {
        let pool = db::in_memory().await.unwrap();
        let registry = TicketRegistry::new(pool);
        registry.insert_if_absent(tickets).await.unwrap();
        registry
    }

    #[tokio::test]
    async fn test_get_is_exact_match() {
        let registry = seeded_registry(&[new_ticket(1, "A-1000-BACOD", "A")]).await;

        let ticket = registry.get("A-1000-BACOD").await.unwrap().unwrap();
        assert_eq!(ticket.ticket_id, 1);
        assert!(!ticket.scanned);
        assert!(!ticket.exited);
        assert_eq!(ticket.scan_count, 0);

        assert!(registry.get("a-1000-bacod").await.unwrap().is_none());
        assert!(registry.get("A-1000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_scan_time_is_set_once() {
        let registry = seeded_registry(&[new_ticket(1, "A1", "A")]).await;
        let first = Utc::now();
        let later = first + Duration::minutes(30);

        let mut tx = registry.begin_for("A1").await.unwrap();
        let entered = tx.apply_entry("A1", first).await.unwrap();
        let exited = tx.apply_exit("A1", first + Duration::minutes(10)).await.unwrap();
        let reentered = tx.apply_entry("A1", later).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(entered.first_scan_time, Some(first));
        assert!(exited.exited);
        assert_eq!(exited.scan_count, 1);
        assert!(exited.scanned);

        assert_eq!(reentered.first_scan_time, Some(first));
        assert_eq!(reentered.last_scan_time, Some(later));
        assert!(reentered.scanned);
        assert!(!reentered.exited);
        assert_eq!(reentered.scan_count, 2);
    }

    #[tokio::test]
    async fn test_duplicate_entry_keeps_phase() {
        let registry = seeded_registry(&[new_ticket(1, "A1", "A")]).await;
        let first = Utc::now();
        let again = first + Duration::seconds(5);

        let mut tx = registry.begin_for("A1").await.unwrap();
        tx.apply_entry("A1", first).await.unwrap();
        let ticket = tx.apply_duplicate_entry("A1", again).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(ticket.scan_count, 2);
        assert_eq!(ticket.first_scan_time, Some(first));
        assert_eq!(ticket.last_scan_time, Some(again));
        assert!(ticket.is_inside());
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let registry = seeded_registry(&[new_ticket(1, "A1", "A")]).await;

        {
            let mut tx = registry.begin_for("A1").await.unwrap();
            tx.apply_entry("A1", Utc::now()).await.unwrap();
            tx.record_scan(&NewScan::new(
                "A1",
                ScanAction::Entry,
                None,
                Utc::now(),
                ScanStatus::Success,
            ))
            .await
            .unwrap();
        }

        let ticket = registry.get("A1").await.unwrap().unwrap();
        assert!(!ticket.scanned);
        assert_eq!(ticket.scan_count, 0);
        let scans = registry.list_scans(&ScanFilter::default()).await.unwrap();
        assert!(scans.is_empty());
    }

    #[tokio::test]
    async fn test_record_scan_accepts_unknown_codes() {
        let registry = seeded_registry(&[]).await;

        let mut tx = registry.begin_for("ZZZ").await.unwrap();
        let first = tx
            .record_scan(&NewScan::new(
                "ZZZ",
                ScanAction::Entry,
                Some("gate-2"),
                Utc::now(),
                ScanStatus::Invalid,
            ))
            .await
            .unwrap();
        let second = tx
            .record_scan(&NewScan::new(
                "ZZZ",
                ScanAction::Exit,
                None,
                Utc::now(),
                ScanStatus::Invalid,
            ))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(second > first);

        let scans = registry.list_scans(&ScanFilter::default()).await.unwrap();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].scan_id, second);
        assert_eq!(scans[1].scanner_id.as_deref(), Some("gate-2"));
        assert!(scans.iter().all(|s| s.status == ScanStatus::Invalid && !s.duplicate));
    }

    #[tokio::test]
    async fn test_update_status_reports_changed_rows() {
        let registry = seeded_registry(&[new_ticket(1, "A1", "A")]).await;

        assert_eq!(registry.update_status("A1", STATUS_CANCELLED).await.unwrap(), 1);
        assert_eq!(registry.update_status("nope", STATUS_CANCELLED).await.unwrap(), 0);

        let ticket = registry.get("A1").await.unwrap().unwrap();
        assert_eq!(ticket.status, STATUS_CANCELLED);
    }

    #[tokio::test]
    async fn test_insert_if_absent_never_overwrites() {
        let registry = seeded_registry(&[new_ticket(1, "A1", "A")]).await;

        let mut replacement = new_ticket(1, "A1", "B");
        replacement.status = STATUS_CANCELLED.to_string();
        let inserted = registry
            .insert_if_absent(&[replacement, new_ticket(2, "B1", "B")])
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        let ticket = registry.get("A1").await.unwrap().unwrap();
        assert_eq!(ticket.prefix, "A");
        assert_eq!(ticket.status, STATUS_VALID);
        assert_eq!(registry.count_tickets().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_tickets_filters() {
        let registry = seeded_registry(&[
            new_ticket(1, "A1", "A"),
            new_ticket(2, "A2", "A"),
            new_ticket(3, "B1", "B"),
        ])
        .await;
        registry.update_status("A2", STATUS_CANCELLED).await.unwrap();
        let mut tx = registry.begin_for("B1").await.unwrap();
        tx.apply_entry("B1", Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let all = registry.all_tickets().await.unwrap();
        assert_eq!(all.len(), 3);

        let series_a = registry
            .list_tickets(&TicketFilter {
                prefix: Some("A".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(series_a.len(), 2);

        let valid_a = registry
            .list_tickets(&TicketFilter {
                status: Some(STATUS_VALID.to_string()),
                prefix: Some("A".to_string()),
                scanned: None,
            })
            .await
            .unwrap();
        assert_eq!(valid_a.len(), 1);
        assert_eq!(valid_a[0].code, "A1");

        let scanned = registry
            .list_tickets(&TicketFilter {
                scanned: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].code, "B1");
    }

    #[tokio::test]
    async fn test_stats_on_empty_registry() {
        let registry = seeded_registry(&[]).await;
        let stats = registry.stats().await.unwrap();

        assert_eq!(stats.total, 0);
        assert_eq!(stats.scanned, 0);
        assert_eq!(stats.duplicates, 0);
        assert_eq!(stats.currently_inside, 0);
        assert_eq!(stats.total_scans, 0);
        assert!(stats.by_series.is_empty());
    }

    #[tokio::test]
    async fn test_stats_counts_occupancy() {
        let registry = seeded_registry(&[
            new_ticket(1, "A1", "A"),
            new_ticket(2, "A2", "A"),
            new_ticket(3, "B1", "B"),
        ])
        .await;
        let now = Utc::now();

        let mut tx = registry.begin_for("A1").await.unwrap();
        tx.apply_entry("A1", now).await.unwrap();
        tx.apply_duplicate_entry("A1", now).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = registry.begin_for("B1").await.unwrap();
        tx.apply_entry("B1", now).await.unwrap();
        tx.apply_exit("B1", now).await.unwrap();
        tx.record_scan(&NewScan::new("B1", ScanAction::Exit, None, now, ScanStatus::Success))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.currently_inside, 1);
        assert_eq!(stats.total_scans, 1);
        assert_eq!(
            stats.by_series,
            vec![
                SeriesStats {
                    prefix: "A".to_string(),
                    total: 2,
                    scanned: 1,
                },
                SeriesStats {
                    prefix: "B".to_string(),
                    total: 1,
                    scanned: 1,
                },
            ]
        );
    }
}
