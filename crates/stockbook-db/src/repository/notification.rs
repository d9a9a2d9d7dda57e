//! # Notification Emitter
//!
//! Derives `stock_low` and `unpaid` signals from ledger and transaction
//! state. Never touches inventory or transactions; writes only to the
//! `notifications` table.
//!
//! ## Idempotency
//! ```text
//! emit(kind, target)
//!    │
//!    ├── unread notification for (kind, target) exists? ──► skip
//!    └── otherwise ──► insert
//! ```
//! Once the user marks a notification read, the next scan may raise it again
//! if the condition still holds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::{Item, Money, Notification, NotificationKind, Transaction, TransactionStatus};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;

/// Counts from one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub stock_low_created: usize,
    pub unpaid_created: usize,
    /// Conditions that already had an unread notification.
    pub skipped: usize,
}

/// Inserts a notification unless an unread one exists for the same target.
///
/// Returns whether a row was written.
pub(crate) async fn emit(
    conn: &mut SqliteConnection,
    kind: NotificationKind,
    target_id: i64,
    message: &str,
) -> DbResult<bool> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM notifications WHERE kind = ?1 AND target_id = ?2 AND is_read = 0 LIMIT 1",
    )
    .bind(kind)
    .bind(target_id)
    .fetch_optional(&mut *conn)
    .await?;

    if existing.is_some() {
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO notifications (kind, target_id, message, is_read, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
    )
    .bind(kind)
    .bind(target_id)
    .bind(message)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    debug!(kind = ?kind, target_id, "Notification emitted");
    Ok(true)
}

pub(crate) async fn emit_stock_low(
    conn: &mut SqliteConnection,
    item: &Item,
    quantity: i64,
) -> DbResult<bool> {
    let message = stock_low_message(&item.name, &item.code, quantity, &item.unit, item.min_stock_level);
    emit(conn, NotificationKind::StockLow, item.id, &message).await
}

fn stock_low_message(name: &str, code: &str, quantity: i64, unit: &str, minimum: i64) -> String {
    format!("{name} ({code}) is low: {quantity} {unit} left, minimum {minimum}")
}

#[derive(sqlx::FromRow)]
struct LowStockRow {
    id: i64,
    code: String,
    name: String,
    unit: String,
    min_stock_level: i64,
    quantity: i64,
}

#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
    gate: WriteGate,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        NotificationRepository { pool, gate }
    }

    /// Scans for low stock and overdue unpaid transactions as of `now`.
    pub async fn scan(&self, now: DateTime<Utc>) -> DbResult<ScanReport> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut report = ScanReport::default();

        let low: Vec<LowStockRow> = sqlx::query_as(
            r#"
            SELECT i.id, i.code, i.name, i.unit, i.min_stock_level, inv.quantity
            FROM items i
            JOIN inventory inv ON inv.item_id = i.id
            WHERE i.is_active = 1 AND inv.quantity <= i.min_stock_level
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        for row in low {
            let message =
                stock_low_message(&row.name, &row.code, row.quantity, &row.unit, row.min_stock_level);
            if emit(&mut *tx, NotificationKind::StockLow, row.id, &message).await? {
                report.stock_low_created += 1;
            } else {
                report.skipped += 1;
            }
        }

        let unpaid: Vec<Transaction> = sqlx::query_as("SELECT * FROM transactions WHERE status = ?1")
            .bind(TransactionStatus::Unpaid)
            .fetch_all(&mut *tx)
            .await?;

        let today = now.date_naive();
        for t in unpaid.iter().filter(|t| t.due_date < today) {
            let message = format!(
                "{} is unpaid: {} due {}",
                t.reference,
                Money::from_cents(t.total_cents),
                t.due_date
            );
            if emit(&mut *tx, NotificationKind::Unpaid, t.id, &message).await? {
                report.unpaid_created += 1;
            } else {
                report.skipped += 1;
            }
        }

        tx.commit().await?;

        info!(
            stock_low = report.stock_low_created,
            unpaid = report.unpaid_created,
            skipped = report.skipped,
            "Notification scan complete"
        );
        Ok(report)
    }

    /// Newest first.
    pub async fn list(&self, unread_only: bool) -> DbResult<Vec<Notification>> {
        let rows = sqlx::query_as(
            "SELECT * FROM notifications WHERE (?1 = 0 OR is_read = 0) ORDER BY id DESC",
        )
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn mark_read(&self, id: i64) -> DbResult<Notification> {
        sqlx::query_as("UPDATE notifications SET is_read = 1 WHERE id = ?1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Notification", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_item, new_partner, purchase, setup, stock};
    use chrono::Duration;
    use stockbook_core::requests::PaymentRequest;
    use stockbook_core::{PartnerKind, PaymentMethod, PaymentStatus};

    #[tokio::test]
    async fn test_scan_is_idempotent() {
        let db = setup().await;
        let a = db.items().create(&new_item("A", 10)).await.unwrap();
        let b = db.items().create(&new_item("B", 10)).await.unwrap();
        stock(&db, a.id, 3).await;
        stock(&db, b.id, 50).await;

        // stock() already emitted for A through the ledger
        let first = db.notifications().scan(Utc::now()).await.unwrap();
        assert_eq!(first.stock_low_created, 0);
        assert_eq!(first.skipped, 1);

        let second = db.notifications().scan(Utc::now()).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(db.notifications().list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_allows_new_signal() {
        let db = setup().await;
        let item = db.items().create(&new_item("A", 10)).await.unwrap();
        stock(&db, item.id, 1).await;

        let unread = db.notifications().list(true).await.unwrap();
        let read = db.notifications().mark_read(unread[0].id).await.unwrap();
        assert!(read.is_read);
        assert!(db.notifications().list(true).await.unwrap().is_empty());

        let report = db.notifications().scan(Utc::now()).await.unwrap();
        assert_eq!(report.stock_low_created, 1);
    }

    #[tokio::test]
    async fn test_inactive_items_are_ignored() {
        let db = setup().await;
        let item = db.items().create(&new_item("A", 10)).await.unwrap();
        db.items().deactivate(item.id).await.unwrap();

        let report = db.notifications().scan(Utc::now()).await.unwrap();
        assert_eq!(report, ScanReport::default());
    }

    #[tokio::test]
    async fn test_unpaid_past_due_date() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let item = db.items().create(&new_item("A", 0)).await.unwrap();
        let outcome = purchase(&db, supplier.id, item.id, 10, 100).await;
        let id = outcome.transaction.transaction.id;

        // A planned payment does not settle anything; reconcile marks it unpaid.
        db.payments()
            .create(
                &PaymentRequest {
                    transaction_id: Some(id),
                    voucher_id: None,
                    method: PaymentMethod::Bank,
                    amount_cents: 500,
                    status: PaymentStatus::Planned,
                    reference: None,
                },
                "alice",
            )
            .await
            .unwrap();
        let t = db.transactions().reconcile(id, "alice").await.unwrap();
        assert_eq!(t.status, TransactionStatus::Unpaid);

        // Not overdue yet
        let now = Utc::now();
        assert_eq!(db.notifications().scan(now).await.unwrap().unpaid_created, 0);

        let later = now + Duration::days(31);
        let report = db.notifications().scan(later).await.unwrap();
        assert_eq!(report.unpaid_created, 1);
        assert_eq!(db.notifications().scan(later).await.unwrap().unpaid_created, 0);
    }

    #[tokio::test]
    async fn test_mark_read_missing_is_not_found() {
        let db = setup().await;
        assert!(matches!(
            db.notifications().mark_read(7).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
