//! # Payments
//!
//! Money received or paid against a transaction (or a manual voucher).
//!
//! ```text
//! create(planned)  ──► row only; does not count toward settlement
//! create(completed) ─┐
//! complete(id) ──────┴─► paid_at set
//!                       ├── settlement voucher (transaction target, auto post on)
//!                       └── reconcile transaction ─► completed | partial | unpaid
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::posting::settlement_voucher;
use stockbook_core::requests::PaymentRequest;
use stockbook_core::{CoreError, Money, Payment, PaymentStatus, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::{PostingPolicy, WriteGate};
use crate::repository::accounting::{self, VoucherHeader};
use crate::repository::setting;
use crate::repository::transaction::reconcile_in;

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
    gate: WriteGate,
    posting: PostingPolicy,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool, gate: WriteGate, posting: PostingPolicy) -> Self {
        PaymentRepository { pool, gate, posting }
    }

    pub async fn create(&self, request: &PaymentRequest, actor: &str) -> DbResult<Payment> {
        request.validate()?;
        debug!(
            transaction_id = ?request.transaction_id,
            voucher_id = ?request.voucher_id,
            amount_cents = request.amount_cents,
            "Creating payment"
        );

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        if let Some(transaction_id) = request.transaction_id {
            ensure_payable(&mut *tx, transaction_id, "record a payment").await?;
        }
        if let Some(voucher_id) = request.voucher_id {
            accounting::load_voucher(&mut *tx, voucher_id).await?;
        }

        let now = Utc::now();
        let paid_at = (request.status == PaymentStatus::Completed).then_some(now);

        let payment: Payment = sqlx::query_as(
            r#"
            INSERT INTO payments (
                transaction_id, voucher_id, method, status, amount_cents,
                reference, paid_at, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING *
            "#,
        )
        .bind(request.transaction_id)
        .bind(request.voucher_id)
        .bind(request.method)
        .bind(request.status)
        .bind(request.amount_cents)
        .bind(&request.reference)
        .bind(paid_at)
        .bind(actor)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if payment.status == PaymentStatus::Completed {
            self.settle(&mut *tx, &payment, actor).await?;
        }

        tx.commit().await?;

        info!(payment_id = payment.id, status = ?payment.status, "Payment recorded");
        Ok(payment)
    }

    /// Moves a planned payment to completed and settles it.
    pub async fn complete(&self, id: i64, actor: &str) -> DbResult<Payment> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let current: Payment = sqlx::query_as("SELECT * FROM payments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", id))?;
        if current.status == PaymentStatus::Completed {
            return Err(DbError::Conflict(format!("Payment {} is already completed", id)));
        }
        if let Some(transaction_id) = current.transaction_id {
            ensure_payable(&mut *tx, transaction_id, "complete a payment").await?;
        }

        let payment: Payment = sqlx::query_as(
            "UPDATE payments SET status = ?2, paid_at = ?3 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(PaymentStatus::Completed)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        self.settle(&mut *tx, &payment, actor).await?;
        tx.commit().await?;

        info!(payment_id = id, "Payment completed");
        Ok(payment)
    }

    pub async fn get(&self, id: i64) -> DbResult<Payment> {
        sqlx::query_as("SELECT * FROM payments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", id))
    }

    pub async fn list_for_transaction(&self, transaction_id: i64) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as("SELECT * FROM payments WHERE transaction_id = ?1 ORDER BY id")
            .bind(transaction_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }

    /// Settlement voucher plus reconcile; only transaction targets have either.
    async fn settle(&self, conn: &mut SqliteConnection, payment: &Payment, actor: &str) -> DbResult<()> {
        let Some(transaction_id) = payment.transaction_id else {
            return Ok(());
        };

        if self.posting.auto_post_vouchers {
            let transaction: Transaction = sqlx::query_as("SELECT * FROM transactions WHERE id = ?1")
                .bind(transaction_id)
                .fetch_one(&mut *conn)
                .await?;
            let accounts = setting::posting_accounts(&mut *conn).await?;
            let lines = settlement_voucher(
                transaction.kind,
                payment.method,
                Money::from_cents(payment.amount_cents),
                &accounts,
            );
            let header = VoucherHeader {
                description: format!("Payment {} for {}", payment.id, transaction.reference),
                voucher_date: Utc::now().date_naive(),
                transaction_id: Some(transaction_id),
                payment_id: Some(payment.id),
                reverses_voucher_id: None,
                actor,
            };
            accounting::post_voucher(&mut *conn, &header, &lines).await?;
        }

        reconcile_in(conn, transaction_id).await?;
        Ok(())
    }
}

/// Payments only settle posted transactions; a canceled one keeps its
/// planned rows but can no longer take money.
async fn ensure_payable(conn: &mut SqliteConnection, transaction_id: i64, action: &str) -> DbResult<()> {
    let transaction: Transaction = sqlx::query_as("SELECT * FROM transactions WHERE id = ?1")
        .bind(transaction_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Transaction", transaction_id))?;
    if !transaction.status.is_posted() {
        return Err(CoreError::InvalidStatus {
            transaction_id,
            status: transaction.status,
            action: action.to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_item, new_partner, purchase, sale, setup, stock};
    use stockbook_core::{PartnerKind, PaymentMethod, TransactionStatus};

    fn pay(transaction_id: i64, amount_cents: i64, status: PaymentStatus) -> PaymentRequest {
        PaymentRequest {
            transaction_id: Some(transaction_id),
            voucher_id: None,
            method: PaymentMethod::Bank,
            amount_cents,
            status,
            reference: Some("INV-1".to_string()),
        }
    }

    async fn balance(db: &crate::Database, code: &str) -> i64 {
        let account = db.accounts().get_by_code(code).await.unwrap();
        db.accounts().balance(account.id).await.unwrap().balance_cents
    }

    #[tokio::test]
    async fn test_partial_then_full_settlement() {
        let db = setup().await;
        let customer = db.partners().create(&new_partner("Jane", PartnerKind::Customer)).await.unwrap();
        let item = db.items().create(&new_item("A", 0)).await.unwrap();
        stock(&db, item.id, 10).await;
        let id = sale(&db, customer.id, item.id, 2, 500).await.transaction.transaction.id;

        db.payments().create(&pay(id, 400, PaymentStatus::Completed), "alice").await.unwrap();
        let t = db.transactions().get(id).await.unwrap().transaction;
        assert_eq!(t.status, TransactionStatus::Partial);

        db.payments().create(&pay(id, 600, PaymentStatus::Completed), "alice").await.unwrap();
        let t = db.transactions().get(id).await.unwrap().transaction;
        assert_eq!(t.status, TransactionStatus::Completed);

        // Receivable fully cleared into the bank
        assert_eq!(balance(&db, "1100").await, 0);
        assert_eq!(balance(&db, "1010").await, 1000);
    }

    #[tokio::test]
    async fn test_planned_payment_counts_once_completed() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let item = db.items().create(&new_item("A", 0)).await.unwrap();
        let id = purchase(&db, supplier.id, item.id, 5, 200).await.transaction.transaction.id;

        let planned = db.payments().create(&pay(id, 1000, PaymentStatus::Planned), "alice").await.unwrap();
        assert!(planned.paid_at.is_none());
        assert_eq!(
            db.transactions().get(id).await.unwrap().transaction.status,
            TransactionStatus::Completed
        );
        assert_eq!(balance(&db, "2000").await, -1000);

        let done = db.payments().complete(planned.id, "alice").await.unwrap();
        assert_eq!(done.status, PaymentStatus::Completed);
        assert!(done.paid_at.is_some());
        assert_eq!(balance(&db, "2000").await, 0);
        assert_eq!(balance(&db, "1010").await, -1000);

        assert!(matches!(
            db.payments().complete(planned.id, "alice").await,
            Err(DbError::Conflict(_))
        ));
        assert_eq!(db.payments().list_for_transaction(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_targets_are_checked() {
        let db = setup().await;
        assert!(matches!(
            db.payments().create(&pay(77, 100, PaymentStatus::Completed), "alice").await,
            Err(DbError::NotFound { .. })
        ));

        let both = PaymentRequest {
            voucher_id: Some(1),
            ..pay(77, 100, PaymentStatus::Completed)
        };
        assert!(matches!(
            db.payments().create(&both, "alice").await,
            Err(DbError::Core(CoreError::Validation(_)))
        ));

        assert!(db.payments().create(&pay(77, 0, PaymentStatus::Completed), "alice").await.is_err());
    }

    #[tokio::test]
    async fn test_canceled_transaction_takes_no_payment() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let item = db.items().create(&new_item("A", 0)).await.unwrap();
        let id = purchase(&db, supplier.id, item.id, 1, 200).await.transaction.transaction.id;
        db.transactions().cancel(id, "alice").await.unwrap();

        assert!(matches!(
            db.payments().create(&pay(id, 200, PaymentStatus::Completed), "alice").await,
            Err(DbError::Core(CoreError::InvalidStatus { .. }))
        ));
    }

    #[tokio::test]
    async fn test_planned_payment_cannot_complete_after_cancel() {
        let db = setup().await;
        let supplier = db.partners().create(&new_partner("Acme", PartnerKind::Supplier)).await.unwrap();
        let item = db.items().create(&new_item("A", 0)).await.unwrap();
        let id = purchase(&db, supplier.id, item.id, 2, 300).await.transaction.transaction.id;

        let planned = db.payments().create(&pay(id, 600, PaymentStatus::Planned), "alice").await.unwrap();
        db.transactions().cancel(id, "alice").await.unwrap();

        assert!(matches!(
            db.payments().complete(planned.id, "alice").await,
            Err(DbError::Core(CoreError::InvalidStatus { .. }))
        ));

        // Rolled back: still planned, no settlement voucher
        let payment = db.payments().get(planned.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Planned);
        assert!(payment.paid_at.is_none());
        let settlements: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vouchers WHERE payment_id = ?1")
                .bind(planned.id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(settlements, 0);
    }
}
