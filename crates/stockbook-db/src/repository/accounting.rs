//! # Accounting Repositories
//!
//! Chart of accounts and vouchers (journal entries).
//!
//! ## Who Posts Vouchers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  VoucherRepository::create ──► manual entry, lines by account id        │
//! │  transaction processor     ──► post_voucher(lines by account code)      │
//! │  payment completion        ──► post_voucher(settlement lines)           │
//! │  transaction cancel        ──► reverse_transaction_vouchers             │
//! │                                                                         │
//! │  every path ends in insert_voucher: balance check, JV reference,        │
//! │  voucher_items rows, all on the caller's connection                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use stockbook_core::posting::{check_balanced, check_posting_balanced, PostingLine};
use stockbook_core::requests::{NewAccount, VoucherRequest};
use stockbook_core::{Account, AccountBalance, CoreError, Voucher, VoucherDetail, VoucherItem};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;

/// Voucher header fields shared by every posting path.
#[derive(Debug, Clone)]
pub(crate) struct VoucherHeader<'a> {
    pub description: String,
    pub voucher_date: NaiveDate,
    pub transaction_id: Option<i64>,
    pub payment_id: Option<i64>,
    pub reverses_voucher_id: Option<i64>,
    pub actor: &'a str,
}

/// A voucher line after its account has been resolved.
#[derive(Debug, Clone)]
struct ResolvedLine {
    account_id: i64,
    debit_cents: i64,
    credit_cents: i64,
    memo: Option<String>,
}

fn voucher_reference(date: NaiveDate, id: i64) -> String {
    format!("JV-{}-{:06}", date.format("%Y%m%d"), id)
}

async fn insert_voucher(
    conn: &mut SqliteConnection,
    header: &VoucherHeader<'_>,
    lines: &[ResolvedLine],
) -> DbResult<Voucher> {
    let sides: Vec<(i64, i64)> = lines.iter().map(|l| (l.debit_cents, l.credit_cents)).collect();
    check_balanced(&sides)?;

    let now = Utc::now();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO vouchers (
            reference, description, transaction_id, payment_id,
            reverses_voucher_id, voucher_date, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        RETURNING id
        "#,
    )
    .bind(format!("TMP-{}", Uuid::new_v4()))
    .bind(&header.description)
    .bind(header.transaction_id)
    .bind(header.payment_id)
    .bind(header.reverses_voucher_id)
    .bind(header.voucher_date)
    .bind(header.actor)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    let voucher: Voucher = sqlx::query_as("UPDATE vouchers SET reference = ?2 WHERE id = ?1 RETURNING *")
        .bind(id)
        .bind(voucher_reference(header.voucher_date, id))
        .fetch_one(&mut *conn)
        .await?;

    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO voucher_items (voucher_id, account_id, debit_cents, credit_cents, memo)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(id)
        .bind(line.account_id)
        .bind(line.debit_cents)
        .bind(line.credit_cents)
        .bind(&line.memo)
        .execute(&mut *conn)
        .await?;
    }

    info!(
        voucher_id = id,
        reference = %voucher.reference,
        lines = lines.len(),
        "Voucher posted"
    );
    Ok(voucher)
}

fn ensure_usable(account: Account) -> DbResult<Account> {
    if !account.is_active {
        return Err(CoreError::InactiveAccount(account.code).into());
    }
    Ok(account)
}

async fn account_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Account> {
    let account: Account = sqlx::query_as("SELECT * FROM accounts WHERE code = ?1")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Account", code))?;
    ensure_usable(account)
}

async fn account_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Account> {
    let account: Account = sqlx::query_as("SELECT * FROM accounts WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Account", id))?;
    ensure_usable(account)
}

/// Posts generated lines whose accounts are named by code.
pub(crate) async fn post_voucher(
    conn: &mut SqliteConnection,
    header: &VoucherHeader<'_>,
    lines: &[PostingLine],
) -> DbResult<Voucher> {
    check_posting_balanced(lines)?;

    let mut ids: HashMap<&str, i64> = HashMap::new();
    let mut resolved = Vec::with_capacity(lines.len());
    for line in lines {
        let account_id = match ids.get(line.account_code.as_str()) {
            Some(id) => *id,
            None => {
                let account = account_by_code(&mut *conn, &line.account_code).await?;
                ids.insert(&line.account_code, account.id);
                account.id
            }
        };
        resolved.push(ResolvedLine {
            account_id,
            debit_cents: line.debit.cents(),
            credit_cents: line.credit.cents(),
            memo: line.memo.clone(),
        });
    }

    insert_voucher(conn, header, &resolved).await
}

/// Posts a mirror image of every live voucher of a transaction.
///
/// Settlement vouchers and earlier reversals are left alone. Returns the new
/// voucher ids.
pub(crate) async fn reverse_transaction_vouchers(
    conn: &mut SqliteConnection,
    transaction_id: i64,
    actor: &str,
) -> DbResult<Vec<i64>> {
    let originals: Vec<Voucher> = sqlx::query_as(
        r#"
        SELECT v.* FROM vouchers v
        WHERE v.transaction_id = ?1
          AND v.payment_id IS NULL
          AND v.reverses_voucher_id IS NULL
          AND NOT EXISTS (SELECT 1 FROM vouchers r WHERE r.reverses_voucher_id = v.id)
        ORDER BY v.id
        "#,
    )
    .bind(transaction_id)
    .fetch_all(&mut *conn)
    .await?;

    let today = Utc::now().date_naive();
    let mut reversal_ids = Vec::with_capacity(originals.len());

    for original in originals {
        let items: Vec<VoucherItem> =
            sqlx::query_as("SELECT * FROM voucher_items WHERE voucher_id = ?1 ORDER BY id")
                .bind(original.id)
                .fetch_all(&mut *conn)
                .await?;

        let swapped: Vec<ResolvedLine> = items
            .into_iter()
            .map(|item| ResolvedLine {
                account_id: item.account_id,
                debit_cents: item.credit_cents,
                credit_cents: item.debit_cents,
                memo: item.memo,
            })
            .collect();

        let header = VoucherHeader {
            description: format!("Reversal of {}", original.reference),
            voucher_date: today,
            transaction_id: Some(transaction_id),
            payment_id: None,
            reverses_voucher_id: Some(original.id),
            actor,
        };
        let reversal = insert_voucher(&mut *conn, &header, &swapped).await?;
        reversal_ids.push(reversal.id);
    }

    Ok(reversal_ids)
}

pub(crate) async fn load_voucher(conn: &mut SqliteConnection, id: i64) -> DbResult<VoucherDetail> {
    let voucher: Voucher = sqlx::query_as("SELECT * FROM vouchers WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Voucher", id))?;

    let items = sqlx::query_as("SELECT * FROM voucher_items WHERE voucher_id = ?1 ORDER BY id")
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(VoucherDetail { voucher, items })
}

// =============================================================================
// Accounts
// =============================================================================

#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    pub async fn create(&self, input: &NewAccount) -> DbResult<Account> {
        input.validate()?;
        let code = input.code.trim();

        let account: Account = sqlx::query_as(
            r#"
            INSERT INTO accounts (code, name, kind, is_active, created_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(input.name.trim())
        .bind(input.kind)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(code))?;

        info!(account_id = account.id, code = %account.code, "Account created");
        Ok(account)
    }

    /// Ordered by code.
    pub async fn list(&self) -> DbResult<Vec<Account>> {
        let accounts = sqlx::query_as("SELECT * FROM accounts ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    pub async fn get(&self, id: i64) -> DbResult<Account> {
        sqlx::query_as("SELECT * FROM accounts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Account", id))
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Account> {
        sqlx::query_as("SELECT * FROM accounts WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Account", code))
    }

    /// `sum(debit) - sum(credit)` over every voucher line of the account.
    pub async fn balance(&self, id: i64) -> DbResult<AccountBalance> {
        let account = self.get(id).await?;

        let (debit_cents, credit_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(debit_cents), 0), COALESCE(SUM(credit_cents), 0)
            FROM voucher_items
            WHERE account_id = ?1
            "#,
        )
        .bind(account.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(AccountBalance {
            account_id: account.id,
            debit_cents,
            credit_cents,
            balance_cents: debit_cents - credit_cents,
        })
    }
}

// =============================================================================
// Vouchers
// =============================================================================

#[derive(Debug, Clone)]
pub struct VoucherRepository {
    pool: SqlitePool,
    gate: WriteGate,
}

impl VoucherRepository {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        VoucherRepository { pool, gate }
    }

    /// Posts a manual voucher. Every account must exist and be active.
    pub async fn create(&self, request: &VoucherRequest, actor: &str) -> DbResult<VoucherDetail> {
        request.validate()?;
        debug!(lines = request.lines.len(), "Creating manual voucher");

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut lines = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let account = account_by_id(&mut *tx, line.account_id).await?;
            lines.push(ResolvedLine {
                account_id: account.id,
                debit_cents: line.debit_cents,
                credit_cents: line.credit_cents,
                memo: line.memo.clone(),
            });
        }

        let header = VoucherHeader {
            description: request.description.trim().to_string(),
            voucher_date: request.voucher_date.unwrap_or_else(|| Utc::now().date_naive()),
            transaction_id: None,
            payment_id: None,
            reverses_voucher_id: None,
            actor,
        };
        let voucher = insert_voucher(&mut *tx, &header, &lines).await?;
        let detail = load_voucher(&mut *tx, voucher.id).await?;

        tx.commit().await?;
        Ok(detail)
    }

    pub async fn get(&self, id: i64) -> DbResult<VoucherDetail> {
        let mut conn = self.pool.acquire().await?;
        load_voucher(&mut *conn, id).await
    }

    /// Newest first, optionally only those linked to one transaction.
    pub async fn list(&self, transaction_id: Option<i64>) -> DbResult<Vec<Voucher>> {
        let vouchers = sqlx::query_as(
            "SELECT * FROM vouchers WHERE (?1 IS NULL OR transaction_id = ?1) ORDER BY id DESC",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(vouchers)
    }
}
