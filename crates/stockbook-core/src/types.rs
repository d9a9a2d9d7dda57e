//! # Domain Types
//!
//! Core domain types used throughout Stockbook.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalogue            Stock                   Trade                     │
//! │  ──────────           ─────                   ─────                     │
//! │  Item ◄──── Barcode   InventoryLevel (1:1)    Transaction               │
//! │   │                   InventoryHistory (1:N)   └── TransactionItem (1:N)│
//! │   └──► Category                                Partner                  │
//! │         └──► parent                                                     │
//! │                                                                         │
//! │  Accounting                                    Signals                  │
//! │  ──────────                                    ───────                  │
//! │  Account ◄── VoucherItem ──► Voucher           Notification             │
//! │  Payment ──► Transaction | Voucher                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity is keyed by an auto-increment `i64`. Business identifiers
//! (item code, account code, barcode, transaction reference) are unique too,
//! but only the item code is immutable.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (825 = 8.25%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

// =============================================================================
// Enumerations
// =============================================================================

/// Direction of a trade transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Goods come in from a supplier: stock increases.
    Purchase,
    /// Goods go out to a customer: stock decreases.
    Sale,
}

impl TransactionKind {
    /// Signed inventory delta for `quantity` units of this kind.
    #[inline]
    pub const fn stock_delta(&self, quantity: i64) -> i64 {
        match self {
            TransactionKind::Purchase => quantity,
            TransactionKind::Sale => -quantity,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Sale => "sale",
        }
    }

    /// Prefix used in human-readable transaction references.
    pub const fn reference_prefix(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "PO",
            TransactionKind::Sale => "SO",
        }
    }
}

/// Lifecycle status of a transaction.
///
/// Transitions are owned by [`crate::status`]; never assign this field
/// directly outside that module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Canceled,
    Partial,
    Unpaid,
}

impl TransactionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Canceled => "canceled",
            TransactionStatus::Partial => "partial",
            TransactionStatus::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an inventory quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Purchase,
    Sale,
    /// Manual correction (stock count, damage, ...).
    Adjustment,
    /// Inverse posting written when a transaction is canceled.
    Cancellation,
}

impl From<TransactionKind> for MovementKind {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Purchase => MovementKind::Purchase,
            TransactionKind::Sale => MovementKind::Sale,
        }
    }
}

/// Customer, supplier, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PartnerKind {
    Customer,
    Supplier,
    Both,
}

impl PartnerKind {
    /// Whether a partner of this kind can be the counterparty of `kind`.
    pub const fn trades(&self, kind: TransactionKind) -> bool {
        matches!(
            (self, kind),
            (PartnerKind::Both, _)
                | (PartnerKind::Customer, TransactionKind::Sale)
                | (PartnerKind::Supplier, TransactionKind::Purchase)
        )
    }
}

/// Classification of a ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Bank,
}

/// Planned payments are promises; only completed ones settle anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Planned,
    #[default]
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// `target_id` is an item id.
    StockLow,
    /// `target_id` is a transaction id.
    Unpaid,
}

/// What a scheduled task does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Backup,
    NotificationScan,
}

// =============================================================================
// Catalogue
// =============================================================================

/// A stocked item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    /// Business identifier, unique and immutable.
    pub code: String,
    pub name: String,
    pub category_id: Option<i64>,
    /// Unit label shown next to quantities ("pcs", "kg", ...).
    pub unit: String,
    /// Default selling price.
    pub unit_price_cents: i64,
    /// Default purchase price.
    pub cost_price_cents: i64,
    /// Quantity at or below which a `stock_low` notification fires.
    pub min_stock_level: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// Default line price for a transaction of `kind`.
    pub fn default_price(&self, kind: TransactionKind) -> Money {
        match kind {
            TransactionKind::Purchase => self.cost_price(),
            TransactionKind::Sale => self.unit_price(),
        }
    }

    /// Low-stock rule shared by the ledger and the notification scan.
    #[inline]
    pub fn is_low(&self, quantity: i64) -> bool {
        quantity <= self.min_stock_level
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Barcode {
    pub id: i64,
    pub item_id: i64,
    pub code: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub kind: PartnerKind,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Inventory
// =============================================================================

/// Current stock of one item, joined with the item fields the UI needs.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLevel {
    pub item_id: i64,
    pub item_code: String,
    pub item_name: String,
    pub quantity: i64,
    pub min_stock_level: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of one quantity change.
///
/// ## Invariant
/// `quantity_after == quantity_before + change`, and `quantity_after` was the
/// inventory row's quantity when this record was written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryHistory {
    pub id: i64,
    pub item_id: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub change: i64,
    pub kind: MovementKind,
    pub transaction_id: Option<i64>,
    pub actor: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    /// Human-readable reference, e.g. `SO-20261019-000042`.
    pub reference: String,
    pub kind: TransactionKind,
    pub partner_id: i64,
    pub status: TransactionStatus,
    /// Sum of line amounts.
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    /// `subtotal_cents + tax_cents`.
    pub total_cents: i64,
    #[ts(as = "String")]
    pub transaction_date: NaiveDate,
    /// End of the settlement window; unpaid past this date raises a notification.
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub note: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line of a transaction. Owned exclusively by its transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub id: i64,
    pub transaction_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// `quantity × unit_price_cents`.
    pub amount_cents: i64,
}

/// A transaction with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
}

// =============================================================================
// Accounting
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Header of a journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: i64,
    pub reference: String,
    pub description: String,
    pub transaction_id: Option<i64>,
    pub payment_id: Option<i64>,
    /// Set on reversing vouchers written by a cancellation.
    pub reverses_voucher_id: Option<i64>,
    #[ts(as = "String")]
    pub voucher_date: NaiveDate,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct VoucherItem {
    pub id: i64,
    pub voucher_id: i64,
    pub account_id: i64,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct VoucherDetail {
    #[serde(flatten)]
    pub voucher: Voucher,
    pub items: Vec<VoucherItem>,
}

/// Net position of an account: `debit - credit`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub account_id: i64,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub balance_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub transaction_id: Option<i64>,
    pub voucher_id: Option<i64>,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub reference: Option<String>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Signals, settings, scheduling, users
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub kind: NotificationKind,
    pub target_id: i64,
    pub message: String,
    pub is_read: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A key/value settings blob.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    #[ts(type = "unknown")]
    pub value: serde_json::Value,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Value of the `backup_schedule` setting. Writing it reconfigures the
/// scheduled task of kind `backup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BackupSchedule {
    pub enabled: bool,
    pub interval_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: i64,
    pub name: String,
    pub kind: TaskKind,
    pub interval_minutes: i64,
    pub enabled: bool,
    #[ts(as = "Option<String>")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub next_run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ScheduledTask {
    #[inline]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at <= now
    }
}

/// A user account as exposed by the API (no password hash).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: crate::access::Role,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_delta_sign() {
        assert_eq!(TransactionKind::Purchase.stock_delta(10), 10);
        assert_eq!(TransactionKind::Sale.stock_delta(4), -4);
    }

    #[test]
    fn test_partner_kind_trades() {
        assert!(PartnerKind::Customer.trades(TransactionKind::Sale));
        assert!(!PartnerKind::Customer.trades(TransactionKind::Purchase));
        assert!(PartnerKind::Supplier.trades(TransactionKind::Purchase));
        assert!(PartnerKind::Both.trades(TransactionKind::Sale));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TransactionStatus::Canceled).unwrap();
        assert_eq!(json, "\"canceled\"");
        assert_eq!(TransactionStatus::default(), TransactionStatus::Pending);
    }

    #[test]
    fn test_notification_kind_wire_name() {
        let json = serde_json::to_string(&NotificationKind::StockLow).unwrap();
        assert_eq!(json, "\"stock_low\"");
    }
}
