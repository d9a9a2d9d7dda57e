//! # Transaction Processor
//!
//! Turns a purchase or sale request into a persisted transaction, its
//! inventory postings and (optionally) a voucher.
//!
//! ## Creating a Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  write gate ─► BEGIN                                                    │
//! │     │                                                                   │
//! │     ├── partner exists, active, trades this kind                        │
//! │     ├── every line: item exists + active, price defaulted from item     │
//! │     ├── sale: cumulative quantity per item ≤ stock   else Insufficient  │
//! │     ├── totals (subtotal + flat tax)                                    │
//! │     ├── INSERT transaction (pending) + transaction_items                 │
//! │     ├── ledger adjust per line                                          │
//! │     ├── status: pending ──PostingSucceeded──► completed                 │
//! │     ├── voucher (auto post on, total ≠ 0)                               │
//! │     ▼                                                                   │
//! │  COMMIT    any error before this point rolls back every row above       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancellation runs the same way in reverse: `cancellation` ledger rows with
//! the inverse delta, reversing vouchers, status `canceled`, one transaction.

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use stockbook_core::posting::{compute_totals, transaction_voucher, PricedLine};
use stockbook_core::requests::TransactionRequest;
use stockbook_core::{
    CoreError, Item, Money, MovementKind, Partner, StatusTrigger, Transaction, TransactionDetail,
    TransactionItem, TransactionKind, TransactionStatus, ValidationError,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::{PostingPolicy, WriteGate};
use crate::repository::accounting::{self, VoucherHeader};
use crate::repository::inventory::{Adjustment, InventoryLedger, LedgerWarning};
use crate::repository::setting;

/// Filters for [`TransactionRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub partner_id: Option<i64>,
    pub limit: Option<u32>,
}

const DEFAULT_LIST_LIMIT: u32 = 100;

/// Result of a create or cancel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    pub transaction: TransactionDetail,
    /// Voucher posted by this call; the reversal when canceling.
    pub voucher_id: Option<i64>,
    pub warnings: Vec<LedgerWarning>,
}

fn transaction_reference(kind: TransactionKind, date: NaiveDate, id: i64) -> String {
    format!("{}-{}-{:06}", kind.reference_prefix(), date.format("%Y%m%d"), id)
}

async fn load_transaction(conn: &mut SqliteConnection, id: i64) -> DbResult<Transaction> {
    sqlx::query_as("SELECT * FROM transactions WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Transaction", id))
}

async fn load_detail(conn: &mut SqliteConnection, id: i64) -> DbResult<TransactionDetail> {
    let transaction = load_transaction(&mut *conn, id).await?;
    let items = sqlx::query_as("SELECT * FROM transaction_items WHERE transaction_id = ?1 ORDER BY id")
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(TransactionDetail { transaction, items })
}

async fn set_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: TransactionStatus,
) -> DbResult<Transaction> {
    let transaction = sqlx::query_as(
        "UPDATE transactions SET status = ?2, updated_at = ?3 WHERE id = ?1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(transaction)
}

/// Re-derives the status of a posted transaction from its completed payments.
pub(crate) async fn reconcile_in(conn: &mut SqliteConnection, id: i64) -> DbResult<Transaction> {
    let transaction = load_transaction(&mut *conn, id).await?;

    let paid: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE transaction_id = ?1 AND status = 'completed'",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    let next = transaction.status.apply(
        id,
        StatusTrigger::Reconcile {
            paid: Money::from_cents(paid),
            total: transaction.total(),
        },
    )?;

    if next == transaction.status {
        return Ok(transaction);
    }

    let updated = set_status(conn, id, next).await?;
    info!(
        transaction_id = id,
        from = %transaction.status,
        to = %next,
        paid_cents = paid,
        "Transaction reconciled"
    );
    Ok(updated)
}

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
    gate: WriteGate,
    posting: PostingPolicy,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool, gate: WriteGate, posting: PostingPolicy) -> Self {
        TransactionRepository { pool, gate, posting }
    }

    /// Creates, posts and completes a transaction atomically.
    pub async fn create(&self, request: &TransactionRequest, actor: &str) -> DbResult<TransactionOutcome> {
        request.validate()?;
        debug!(
            kind = request.kind.as_str(),
            partner_id = request.partner_id,
            lines = request.lines.len(),
            "Creating transaction"
        );

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        // ---------------------------------------------------------------------
        // Partner
        // ---------------------------------------------------------------------
        let partner: Partner = sqlx::query_as("SELECT * FROM partners WHERE id = ?1")
            .bind(request.partner_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Partner", request.partner_id))?;

        if !partner.is_active {
            return Err(CoreError::InactivePartner(partner.id).into());
        }
        if !partner.kind.trades(request.kind) {
            return Err(ValidationError::invalid(
                "partnerId",
                format!("partner {} cannot be used for a {}", partner.id, request.kind.as_str()),
            )
            .into());
        }

        // ---------------------------------------------------------------------
        // Lines
        // ---------------------------------------------------------------------
        let mut items: HashMap<i64, Item> = HashMap::new();
        let mut requested: HashMap<i64, i64> = HashMap::new();
        let mut priced = Vec::with_capacity(request.lines.len());

        for line in &request.lines {
            if !items.contains_key(&line.item_id) {
                let item: Item = sqlx::query_as("SELECT * FROM items WHERE id = ?1")
                    .bind(line.item_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| DbError::not_found("Item", line.item_id))?;
                if !item.is_active {
                    return Err(CoreError::InactiveItem(item.code).into());
                }
                items.insert(item.id, item);
            }
            let item = &items[&line.item_id];

            if request.kind == TransactionKind::Sale {
                let cumulative = requested.entry(item.id).or_insert(0);
                *cumulative += line.quantity;
                let available = InventoryLedger::quantity(&mut *tx, item.id).await?;
                if *cumulative > available {
                    return Err(CoreError::InsufficientStock {
                        code: item.code.clone(),
                        available,
                        requested: *cumulative,
                    }
                    .into());
                }
            }

            let unit_price = line
                .unit_price_cents
                .map(Money::from_cents)
                .unwrap_or_else(|| item.default_price(request.kind));
            priced.push(PricedLine::new(item.id, line.quantity, unit_price)?);
        }

        let rate = setting::tax_rate(&mut *tx, self.posting.default_tax_rate).await?;
        let totals = compute_totals(&priced, rate)?;

        // ---------------------------------------------------------------------
        // Persist
        // ---------------------------------------------------------------------
        let now = Utc::now();
        let transaction_date = request.transaction_date.unwrap_or_else(|| now.date_naive());
        let due_date = transaction_date
            .checked_add_signed(Duration::days(self.posting.payment_terms_days))
            .ok_or_else(|| ValidationError::invalid("transactionDate", "due date is out of range"))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (
                reference, kind, partner_id, status,
                subtotal_cents, tax_cents, total_cents,
                transaction_date, due_date, note, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            RETURNING id
            "#,
        )
        .bind(format!("TMP-{}", Uuid::new_v4()))
        .bind(request.kind)
        .bind(partner.id)
        .bind(TransactionStatus::Pending)
        .bind(totals.subtotal.cents())
        .bind(totals.tax.cents())
        .bind(totals.total.cents())
        .bind(transaction_date)
        .bind(due_date)
        .bind(&request.note)
        .bind(actor)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let reference = transaction_reference(request.kind, transaction_date, id);
        sqlx::query("UPDATE transactions SET reference = ?2 WHERE id = ?1")
            .bind(id)
            .bind(&reference)
            .execute(&mut *tx)
            .await?;

        for line in &priced {
            sqlx::query(
                r#"
                INSERT INTO transaction_items (transaction_id, item_id, quantity, unit_price_cents, amount_cents)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(line.unit_price.cents())
            .bind(line.amount.cents())
            .execute(&mut *tx)
            .await?;
        }

        // ---------------------------------------------------------------------
        // Post to the ledger
        // ---------------------------------------------------------------------
        let mut warnings = Vec::new();
        for line in &priced {
            let outcome = InventoryLedger::adjust(
                &mut *tx,
                Adjustment {
                    item_id: line.item_id,
                    delta: request.kind.stock_delta(line.quantity),
                    kind: MovementKind::from(request.kind),
                    transaction_id: Some(id),
                    actor,
                },
            )
            .await?;
            warnings.extend(outcome.warnings);
        }

        let status = TransactionStatus::Pending.apply(id, StatusTrigger::PostingSucceeded)?;
        set_status(&mut *tx, id, status).await?;

        // ---------------------------------------------------------------------
        // Voucher
        // ---------------------------------------------------------------------
        let post = request.post_voucher.unwrap_or(self.posting.auto_post_vouchers);
        let voucher_id = if post && !totals.total.is_zero() {
            let accounts = setting::posting_accounts(&mut *tx).await?;
            let lines = transaction_voucher(request.kind, &totals, &accounts);
            let header = VoucherHeader {
                description: format!("{} {}", request.kind.as_str(), reference),
                voucher_date: transaction_date,
                transaction_id: Some(id),
                payment_id: None,
                reverses_voucher_id: None,
                actor,
            };
            Some(accounting::post_voucher(&mut *tx, &header, &lines).await?.id)
        } else {
            None
        };

        let detail = load_detail(&mut *tx, id).await?;
        tx.commit().await?;

        info!(
            transaction_id = id,
            reference = %reference,
            total = %totals.total,
            voucher_id = ?voucher_id,
            "Transaction completed"
        );

        Ok(TransactionOutcome {
            transaction: detail,
            voucher_id,
            warnings,
        })
    }

    /// Cancels a transaction and reverses its postings.
    ///
    /// Refused while completed payments exist against it.
    pub async fn cancel(&self, id: i64, actor: &str) -> DbResult<TransactionOutcome> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let detail = load_detail(&mut *tx, id).await?;
        let transaction = &detail.transaction;
        let next = transaction.status.apply(id, StatusTrigger::Cancel)?;

        let completed_payments: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments WHERE transaction_id = ?1 AND status = 'completed'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if completed_payments > 0 {
            return Err(DbError::Conflict(format!(
                "Transaction {} has {} completed payment(s); refund them before canceling",
                transaction.reference, completed_payments
            )));
        }

        let mut warnings = Vec::new();
        if transaction.status.is_posted() {
            for line in &detail.items {
                let outcome = InventoryLedger::adjust(
                    &mut *tx,
                    Adjustment {
                        item_id: line.item_id,
                        delta: -transaction.kind.stock_delta(line.quantity),
                        kind: MovementKind::Cancellation,
                        transaction_id: Some(id),
                        actor,
                    },
                )
                .await?;
                warnings.extend(outcome.warnings);
            }
        }

        let reversals = accounting::reverse_transaction_vouchers(&mut *tx, id, actor).await?;
        set_status(&mut *tx, id, next).await?;
        let detail = load_detail(&mut *tx, id).await?;

        tx.commit().await?;

        info!(
            transaction_id = id,
            reference = %detail.transaction.reference,
            reversals = reversals.len(),
            "Transaction canceled"
        );

        Ok(TransactionOutcome {
            transaction: detail,
            voucher_id: reversals.first().copied(),
            warnings,
        })
    }

    /// Sets partial / unpaid / completed from the completed payments.
    pub async fn reconcile(&self, id: i64, actor: &str) -> DbResult<Transaction> {
        debug!(transaction_id = id, actor, "Reconciling transaction");
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let transaction = reconcile_in(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(transaction)
    }

    pub async fn get(&self, id: i64) -> DbResult<TransactionDetail> {
        let mut conn = self.pool.acquire().await?;
        load_detail(&mut *conn, id).await
    }

    /// Newest first.
    pub async fn list(&self, filter: &TransactionFilter) -> DbResult<Vec<Transaction>> {
        let transactions = sqlx::query_as(
            r#"
            SELECT * FROM transactions
            WHERE (?1 IS NULL OR kind = ?1)
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR partner_id = ?3)
            ORDER BY id DESC
            LIMIT ?4
            "#,
        )
        .bind(filter.kind)
        .bind(filter.status)
        .bind(filter.partner_id)
        .bind(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .fetch_all(&self.pool)
        .await?;
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_item, new_partner, purchase, sale, setup, stock};
    use crate::{Database, DbConfig};
    use serde_json::json;
    use stockbook_core::requests::{LineRequest, PaymentRequest};
    use stockbook_core::{PartnerKind, PaymentMethod, PaymentStatus};

    fn request(kind: TransactionKind, partner_id: i64, lines: Vec<(i64, i64)>) -> TransactionRequest {
        TransactionRequest {
            kind,
            partner_id,
            transaction_date: NaiveDate::from_ymd_opt(2024, 5, 2),
            lines: lines
                .into_iter()
                .map(|(item_id, quantity)| LineRequest {
                    item_id,
                    quantity,
                    unit_price_cents: None,
                })
                .collect(),
            note: None,
            post_voucher: None,
        }
    }

    async fn history_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory_history")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn account_balance(db: &Database, code: &str) -> i64 {
        let account = db.accounts().get_by_code(code).await.unwrap();
        db.accounts().balance(account.id).await.unwrap().balance_cents
    }

    #[tokio::test]
    async fn test_purchase_then_sale_moves_stock() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let customer = db.partners().create(&new_partner("Jane", PartnerKind::Customer)).await.unwrap();
        let item = db.items().create(&new_item("X", 0)).await.unwrap();

        let bought = purchase(&db, supplier.id, item.id, 10, 300).await;
        assert_eq!(bought.transaction.transaction.status, TransactionStatus::Completed);
        let sold = sale(&db, customer.id, item.id, 4, 500).await;
        assert_eq!(sold.transaction.transaction.status, TransactionStatus::Completed);

        assert_eq!(db.inventory().level(item.id).await.unwrap().quantity, 6);
        let history = db.inventory().history(item.id).await.unwrap();
        let changes: Vec<i64> = history.iter().map(|h| h.change).collect();
        assert_eq!(changes, vec![10, -4]);
        assert_eq!(history[0].kind, MovementKind::Purchase);
        assert_eq!(history[1].kind, MovementKind::Sale);
        assert_eq!(history[1].transaction_id, Some(sold.transaction.transaction.id));
        assert!(db.inventory().replay(item.id).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_reference_and_due_date() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let item = db.items().create(&new_item("X", 0)).await.unwrap();

        let outcome = db
            .transactions()
            .create(&request(TransactionKind::Purchase, supplier.id, vec![(item.id, 2)]), "alice")
            .await
            .unwrap();
        let t = &outcome.transaction.transaction;

        assert_eq!(t.reference, format!("PO-20240502-{:06}", t.id));
        assert_eq!(t.due_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(t.created_by, "alice");
        // Purchases default to the item's cost price
        assert_eq!(outcome.transaction.items[0].unit_price_cents, 60);
    }

    #[tokio::test]
    async fn test_out_of_range_date_is_a_validation_error() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let item = db.items().create(&new_item("X", 0)).await.unwrap();

        let mut req = request(TransactionKind::Purchase, supplier.id, vec![(item.id, 2)]);
        req.transaction_date = Some(serde_json::from_value(json!("+262142-12-31")).unwrap());

        let err = db.transactions().create(&req, "alice").await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
        assert!(db.transactions().list(&Default::default()).await.unwrap().is_empty());
        assert_eq!(history_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_everything() {
        let db = setup().await;
        let customer = db.partners().create(&new_partner("Jane", PartnerKind::Customer)).await.unwrap();
        let a = db.items().create(&new_item("A", 0)).await.unwrap();
        let b = db.items().create(&new_item("B", 0)).await.unwrap();
        stock(&db, a.id, 5).await;
        stock(&db, b.id, 5).await;
        let before = history_count(&db).await;

        // Each line alone fits; together they overdraw A
        let err = db
            .transactions()
            .create(
                &request(TransactionKind::Sale, customer.id, vec![(b.id, 1), (a.id, 3), (a.id, 3)]),
                "alice",
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 5, requested: 6, .. })
        ));
        assert_eq!(history_count(&db).await, before);
        assert_eq!(db.inventory().level(a.id).await.unwrap().quantity, 5);
        assert_eq!(db.inventory().level(b.id).await.unwrap().quantity, 5);
        assert!(db.transactions().list(&TransactionFilter::default()).await.unwrap().is_empty());
        assert!(db.vouchers().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partner_and_item_checks() {
        let db = setup().await;
        let customer = db.partners().create(&new_partner("Jane", PartnerKind::Customer)).await.unwrap();
        let item = db.items().create(&new_item("A", 0)).await.unwrap();

        // A customer cannot sell to us
        let err = db
            .transactions()
            .create(&request(TransactionKind::Purchase, customer.id, vec![(item.id, 1)]), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        let err = db
            .transactions()
            .create(&request(TransactionKind::Sale, 404, vec![(item.id, 1)]), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Partner"));

        db.items().deactivate(item.id).await.unwrap();
        let err = db
            .transactions()
            .create(&request(TransactionKind::Sale, customer.id, vec![(item.id, 1)]), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InactiveItem(_))));

        let empty = request(TransactionKind::Sale, customer.id, vec![]);
        assert!(db.transactions().create(&empty, "a").await.is_err());
    }

    #[tokio::test]
    async fn test_totals_with_tax_setting() {
        let db = setup().await;
        db.settings().put("tax_rate", json!(1000)).await.unwrap();
        let customer = db.partners().create(&new_partner("Jane", PartnerKind::Customer)).await.unwrap();
        let a = db.items().create(&new_item("A", 0)).await.unwrap();
        let b = db.items().create(&new_item("B", 0)).await.unwrap();
        stock(&db, a.id, 10).await;
        stock(&db, b.id, 10).await;

        let mut req = request(TransactionKind::Sale, customer.id, vec![(a.id, 3), (b.id, 1)]);
        req.lines[1].unit_price_cents = Some(250);
        let outcome = db.transactions().create(&req, "alice").await.unwrap();
        let t = &outcome.transaction.transaction;

        let line_sum: i64 = outcome.transaction.items.iter().map(|i| i.amount_cents).sum();
        assert_eq!(line_sum, t.total_cents - t.tax_cents);
        // 3 × 1.00 + 2.50 = 5.50, 10% tax
        assert_eq!(t.subtotal_cents, 550);
        assert_eq!(t.tax_cents, 55);
        assert_eq!(t.total_cents, 605);
    }

    #[tokio::test]
    async fn test_sale_voucher_balances_and_hits_accounts() {
        let db = setup().await;
        db.settings().put("tax_rate", json!(1000)).await.unwrap();
        let customer = db.partners().create(&new_partner("Jane", PartnerKind::Customer)).await.unwrap();
        let item = db.items().create(&new_item("A", 0)).await.unwrap();
        stock(&db, item.id, 10).await;

        let outcome = sale(&db, customer.id, item.id, 2, 1000).await;
        let voucher = db.vouchers().get(outcome.voucher_id.unwrap()).await.unwrap();

        let debit: i64 = voucher.items.iter().map(|i| i.debit_cents).sum();
        let credit: i64 = voucher.items.iter().map(|i| i.credit_cents).sum();
        assert_eq!(debit, credit);
        assert_eq!(debit, 2200);
        assert_eq!(account_balance(&db, "1100").await, 2200);
        assert_eq!(account_balance(&db, "4000").await, -2000);
        assert_eq!(account_balance(&db, "2100").await, -200);
    }

    #[tokio::test]
    async fn test_voucher_posting_can_be_disabled_per_request() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let item = db.items().create(&new_item("A", 0)).await.unwrap();

        let mut req = request(TransactionKind::Purchase, supplier.id, vec![(item.id, 1)]);
        req.post_voucher = Some(false);
        let outcome = db.transactions().create(&req, "alice").await.unwrap();
        assert_eq!(outcome.voucher_id, None);
        assert!(db.vouchers().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_reverses_stock_and_vouchers() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let customer = db.partners().create(&new_partner("Jane", PartnerKind::Customer)).await.unwrap();
        let item = db.items().create(&new_item("X", 0)).await.unwrap();
        purchase(&db, supplier.id, item.id, 10, 300).await;

        let sold = sale(&db, customer.id, item.id, 4, 500).await;
        let id = sold.transaction.transaction.id;
        let canceled = db.transactions().cancel(id, "bob").await.unwrap();

        assert_eq!(canceled.transaction.transaction.status, TransactionStatus::Canceled);
        assert_eq!(db.inventory().level(item.id).await.unwrap().quantity, 10);

        let history = db.inventory().history(item.id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.kind, MovementKind::Cancellation);
        assert_eq!(last.change, 4);
        let net: i64 = history
            .iter()
            .filter(|h| h.transaction_id == Some(id))
            .map(|h| h.change)
            .sum();
        assert_eq!(net, 0);

        let reversal = db.vouchers().get(canceled.voucher_id.unwrap()).await.unwrap();
        assert_eq!(reversal.voucher.reverses_voucher_id, sold.voucher_id);
        assert_eq!(account_balance(&db, "1100").await, 0);
        assert_eq!(account_balance(&db, "4000").await, 0);

        // Canceled is terminal
        let err = db.transactions().cancel(id, "bob").await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_cancel_refused_with_completed_payment() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let item = db.items().create(&new_item("X", 0)).await.unwrap();
        let outcome = purchase(&db, supplier.id, item.id, 10, 300).await;
        let id = outcome.transaction.transaction.id;

        db.payments()
            .create(
                &PaymentRequest {
                    transaction_id: Some(id),
                    voucher_id: None,
                    method: PaymentMethod::Cash,
                    amount_cents: 1000,
                    status: PaymentStatus::Completed,
                    reference: None,
                },
                "alice",
            )
            .await
            .unwrap();

        let err = db.transactions().cancel(id, "bob").await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(db.inventory().level(item.id).await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_reconcile_requires_posted_transaction() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let item = db.items().create(&new_item("X", 0)).await.unwrap();
        let id = purchase(&db, supplier.id, item.id, 1, 300).await.transaction.transaction.id;

        assert_eq!(
            db.transactions().reconcile(id, "a").await.unwrap().status,
            TransactionStatus::Unpaid
        );
        db.transactions().cancel(id, "a").await.unwrap();
        assert!(matches!(
            db.transactions().reconcile(id, "a").await,
            Err(DbError::Core(CoreError::InvalidStatus { .. }))
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = setup().await;
        let both = db.partners().create(&new_partner("Shop", PartnerKind::Both)).await.unwrap();
        let item = db.items().create(&new_item("X", 0)).await.unwrap();
        purchase(&db, both.id, item.id, 10, 100).await;
        sale(&db, both.id, item.id, 1, 200).await;

        let sales = db
            .transactions()
            .list(&TransactionFilter {
                kind: Some(TransactionKind::Sale),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(sales.len(), 1);
        assert!(sales[0].reference.starts_with("SO-"));

        let by_partner = db
            .transactions()
            .list(&TransactionFilter {
                partner_id: Some(both.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_partner.len(), 2);
    }

    /// Several pool connections and concurrent tasks against one item: no
    /// lost updates and no sale overdraws stock.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_overdraw() {
        let dir = std::env::temp_dir().join(format!("stockbook-concurrency-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let db = Database::new(DbConfig::new(dir.join("stockbook.db")).max_connections(4))
            .await
            .unwrap();

        let customer = db.partners().create(&new_partner("Jane", PartnerKind::Customer)).await.unwrap();
        let item = db.items().create(&new_item("HOT", 0)).await.unwrap();
        stock(&db, item.id, 20).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let db = db.clone();
            let customer_id = customer.id;
            let item_id = item.id;
            handles.push(tokio::spawn(async move {
                db.transactions()
                    .create(&request(TransactionKind::Sale, customer_id, vec![(item_id, 3)]), "rush")
                    .await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DbError::Core(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 6);
        let level = db.inventory().level(item.id).await.unwrap();
        assert_eq!(level.quantity, 2);
        let report = db.inventory().replay(item.id).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.entries, 7);

        db.close().await;
        std::fs::remove_dir_all(&dir).ok();
    }
}
