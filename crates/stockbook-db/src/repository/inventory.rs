//! # Inventory Ledger
//!
//! Applies quantity deltas to the `inventory` table and appends one
//! `inventory_history` row per change, on the caller's connection.
//!
//! ## One Adjustment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  adjust(conn, Adjustment { item_id, delta, kind, transaction_id })      │
//! │       │                                                                 │
//! │       ├── item exists?                  no → NotFound                   │
//! │       ├── INSERT inventory row (0) if missing                           │
//! │       ├── UPDATE inventory SET quantity = quantity + delta              │
//! │       │          RETURNING quantity            ──► after                │
//! │       │   before = after - delta                                        │
//! │       ├── INSERT inventory_history (before, after, change)              │
//! │       ├── after < 0 ?                   → NegativeStock warning         │
//! │       └── after ≤ min_stock_level ?     → stock_low notification        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The quantity is never read and written back: the increment happens inside
//! SQLite, so two writers cannot lose an update even without the write gate.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::requests::AdjustInventoryRequest;
use stockbook_core::{InventoryHistory, InventoryLevel, Item, MovementKind};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;
use crate::repository::notification;

/// One ledger write.
#[derive(Debug, Clone, Copy)]
pub struct Adjustment<'a> {
    pub item_id: i64,
    pub delta: i64,
    pub kind: MovementKind,
    pub transaction_id: Option<i64>,
    pub actor: &'a str,
}

/// Non-fatal conditions raised by an adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerWarning {
    #[serde(rename_all = "camelCase")]
    NegativeStock {
        item_id: i64,
        code: String,
        quantity: i64,
    },
}

/// Result of one adjustment: the history row plus any warnings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerOutcome {
    pub record: InventoryHistory,
    pub warnings: Vec<LedgerWarning>,
}

/// Ledger replay check for one item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub item_id: i64,
    pub quantity: i64,
    pub history_sum: i64,
    pub entries: usize,
    /// Every row satisfies `after = before + change` and chains onto the
    /// previous row's `after`.
    pub chain_intact: bool,
}

impl ReplayReport {
    pub fn is_consistent(&self) -> bool {
        self.chain_intact && self.quantity == self.history_sum
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Stateless entry points composed by every writer of stock.
pub struct InventoryLedger;

impl InventoryLedger {
    /// Applies one delta inside the caller's transaction.
    pub async fn adjust(conn: &mut SqliteConnection, adj: Adjustment<'_>) -> DbResult<LedgerOutcome> {
        let item: Item = sqlx::query_as("SELECT * FROM items WHERE id = ?1")
            .bind(adj.item_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Inventory", adj.item_id))?;

        let now = Utc::now();

        sqlx::query(
            "INSERT INTO inventory (item_id, quantity, updated_at) VALUES (?1, 0, ?2)
             ON CONFLICT(item_id) DO NOTHING",
        )
        .bind(adj.item_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let after: i64 = sqlx::query_scalar(
            "UPDATE inventory SET quantity = quantity + ?1, updated_at = ?2
             WHERE item_id = ?3
             RETURNING quantity",
        )
        .bind(adj.delta)
        .bind(now)
        .bind(adj.item_id)
        .fetch_one(&mut *conn)
        .await?;
        let before = after - adj.delta;

        let record: InventoryHistory = sqlx::query_as(
            r#"
            INSERT INTO inventory_history (
                item_id, quantity_before, quantity_after, change,
                kind, transaction_id, actor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING *
            "#,
        )
        .bind(adj.item_id)
        .bind(before)
        .bind(after)
        .bind(adj.delta)
        .bind(adj.kind)
        .bind(adj.transaction_id)
        .bind(adj.actor)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        debug!(
            item_id = adj.item_id,
            before,
            after,
            kind = ?adj.kind,
            transaction_id = ?adj.transaction_id,
            "Inventory adjusted"
        );

        let mut warnings = Vec::new();
        if after < 0 {
            warn!(item_id = item.id, code = %item.code, quantity = after, "Negative stock");
            warnings.push(LedgerWarning::NegativeStock {
                item_id: item.id,
                code: item.code.clone(),
                quantity: after,
            });
        }

        if item.is_active && item.is_low(after) {
            notification::emit_stock_low(&mut *conn, &item, after).await?;
        }

        Ok(LedgerOutcome { record, warnings })
    }

    /// Current quantity, 0 when no inventory row exists yet.
    pub async fn quantity(conn: &mut SqliteConnection, item_id: i64) -> DbResult<i64> {
        let quantity: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM inventory WHERE item_id = ?1")
                .bind(item_id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(quantity.unwrap_or(0))
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Read side of the ledger plus standalone manual adjustments.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
    gate: WriteGate,
}

const LEVEL_SELECT: &str = r#"
    SELECT
        i.id AS item_id,
        i.code AS item_code,
        i.name AS item_name,
        inv.quantity AS quantity,
        i.min_stock_level AS min_stock_level,
        inv.updated_at AS updated_at
    FROM inventory inv
    JOIN items i ON i.id = inv.item_id
"#;

impl InventoryRepository {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        InventoryRepository { pool, gate }
    }

    /// Wraps one manual adjustment in its own database transaction.
    pub async fn adjust_inventory(
        &self,
        item_id: i64,
        request: &AdjustInventoryRequest,
        actor: &str,
    ) -> DbResult<LedgerOutcome> {
        request.validate()?;
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let outcome = InventoryLedger::adjust(
            &mut *tx,
            Adjustment {
                item_id,
                delta: request.delta,
                kind: MovementKind::Adjustment,
                transaction_id: None,
                actor,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn level(&self, item_id: i64) -> DbResult<InventoryLevel> {
        sqlx::query_as(&format!("{LEVEL_SELECT} WHERE inv.item_id = ?1"))
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Inventory", item_id))
    }

    /// All levels, optionally only those at or below their minimum.
    pub async fn levels(&self, low_only: bool) -> DbResult<Vec<InventoryLevel>> {
        let levels = sqlx::query_as(&format!(
            "{LEVEL_SELECT} WHERE i.is_active = 1 AND (?1 = 0 OR inv.quantity <= i.min_stock_level)
             ORDER BY i.code"
        ))
        .bind(low_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(levels)
    }

    /// History of one item, oldest first.
    pub async fn history(&self, item_id: i64) -> DbResult<Vec<InventoryHistory>> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM items WHERE id = ?1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Item", item_id));
        }

        let rows = sqlx::query_as("SELECT * FROM inventory_history WHERE item_id = ?1 ORDER BY id")
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Replays the history of an item against its current quantity.
    pub async fn replay(&self, item_id: i64) -> DbResult<ReplayReport> {
        let history = self.history(item_id).await?;
        let mut conn = self.pool.acquire().await?;
        let quantity = InventoryLedger::quantity(&mut *conn, item_id).await?;

        let mut expected_before = 0;
        let mut chain_intact = true;
        for row in &history {
            if row.quantity_before != expected_before
                || row.quantity_after != row.quantity_before + row.change
            {
                chain_intact = false;
            }
            expected_before = row.quantity_after;
        }

        Ok(ReplayReport {
            item_id,
            quantity,
            history_sum: history.iter().map(|h| h.change).sum(),
            entries: history.len(),
            chain_intact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_item, setup};
    use stockbook_core::NotificationKind;

    fn adjust(delta: i64) -> AdjustInventoryRequest {
        AdjustInventoryRequest { delta }
    }

    #[tokio::test]
    async fn test_adjust_records_before_after() {
        let db = setup().await;
        let item = db.items().create(&new_item("SOAP", 0)).await.unwrap();

        let first = db.inventory().adjust_inventory(item.id, &adjust(10), "alice").await.unwrap();
        assert_eq!(first.record.quantity_before, 0);
        assert_eq!(first.record.quantity_after, 10);
        assert_eq!(first.record.kind, MovementKind::Adjustment);
        assert_eq!(first.record.actor, "alice");

        let second = db.inventory().adjust_inventory(item.id, &adjust(-4), "alice").await.unwrap();
        assert_eq!(second.record.quantity_before, 10);
        assert_eq!(second.record.quantity_after, 6);
        assert!(second.warnings.is_empty());

        let report = db.inventory().replay(item.id).await.unwrap();
        assert_eq!(report.quantity, 6);
        assert_eq!(report.entries, 2);
        assert!(report.is_consistent());
    }

    #[tokio::test]
    async fn test_manual_adjustment_may_go_negative_with_warning() {
        let db = setup().await;
        let item = db.items().create(&new_item("SOAP", 0)).await.unwrap();

        let outcome = db.inventory().adjust_inventory(item.id, &adjust(-3), "bob").await.unwrap();
        assert_eq!(outcome.record.quantity_after, -3);
        assert_eq!(
            outcome.warnings,
            vec![LedgerWarning::NegativeStock {
                item_id: item.id,
                code: "SOAP".to_string(),
                quantity: -3,
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found_and_nothing_written() {
        let db = setup().await;
        let err = db.inventory().adjust_inventory(999, &adjust(1), "bob").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Inventory"));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_history")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_low_stock_notification_is_emitted_once() {
        let db = setup().await;
        let item = db.items().create(&new_item("MILK", 5)).await.unwrap();

        db.inventory().adjust_inventory(item.id, &adjust(20), "x").await.unwrap();
        assert!(db.notifications().list(true).await.unwrap().is_empty());

        db.inventory().adjust_inventory(item.id, &adjust(-16), "x").await.unwrap();
        db.inventory().adjust_inventory(item.id, &adjust(-1), "x").await.unwrap();

        let unread = db.notifications().list(true).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].kind, NotificationKind::StockLow);
        assert_eq!(unread[0].target_id, item.id);
    }

    #[tokio::test]
    async fn test_levels_low_only() {
        let db = setup().await;
        let low = db.items().create(&new_item("LOW", 5)).await.unwrap();
        let ok = db.items().create(&new_item("OK", 5)).await.unwrap();
        db.inventory().adjust_inventory(low.id, &adjust(2), "x").await.unwrap();
        db.inventory().adjust_inventory(ok.id, &adjust(50), "x").await.unwrap();

        let levels = db.inventory().levels(true).await.unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].item_code, "LOW");
        assert_eq!(db.inventory().levels(false).await.unwrap().len(), 2);
    }
}
