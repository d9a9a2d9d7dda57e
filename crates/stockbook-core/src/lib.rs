//! # stockbook-core: Pure Business Logic for Stockbook
//!
//! Everything Stockbook decides without touching the database: money math,
//! the transaction status machine, voucher line generation, category cycle
//! checks, permissions and input validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Browser client                               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/server (axum)                           │   │
//! │  │    auth, routes, error mapping, scheduler                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    stockbook-db                                 │   │
//! │  │    ledger, transaction processor, repositories                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls into                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ stockbook-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   types · money · requests · validation · status · posting      │   │
//! │  │   category · access · error                                     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Item, Transaction, Voucher, ...)
//! - [`money`] - Integer money
//! - [`requests`] - Request bodies with field validation
//! - [`validation`] - Field rules
//! - [`status`] - Transaction status machine
//! - [`posting`] - Totals and voucher lines
//! - [`category`] - Category hierarchy rules
//! - [`access`] - Roles and permissions
//! - [`error`] - Domain error types
//!
//! ## Example
//!
//! ```rust
//! use stockbook_core::money::Money;
//! use stockbook_core::posting::{compute_totals, PricedLine};
//! use stockbook_core::types::TaxRate;
//!
//! let line = PricedLine::new(1, 3, Money::from_cents(1099)).unwrap();
//! let totals = compute_totals(&[line], TaxRate::from_bps(825)).unwrap();
//!
//! // 32.97 at 8.25% = 2.72
//! assert_eq!(totals.tax.cents(), 272);
//! assert_eq!(totals.total.to_string(), "35.69");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod category;
pub mod error;
pub mod money;
pub mod posting;
pub mod requests;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::{Permission, Role};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use status::StatusTrigger;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines in one transaction.
pub const MAX_TRANSACTION_LINES: usize = 200;

/// Maximum quantity on a single line or adjustment.
///
/// Catches typos like 10000 instead of 100 before they hit the ledger.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Accepted year range for transaction and voucher dates.
pub const MIN_DOCUMENT_YEAR: i32 = 1900;
pub const MAX_DOCUMENT_YEAR: i32 = 9999;

/// File name prefix of backup snapshots.
pub const BACKUP_FILE_PREFIX: &str = "stockbook-";

/// Actor recorded for changes made by the scheduler.
pub const SYSTEM_ACTOR: &str = "system";

/// Well-known setting keys.
pub mod setting_keys {
    pub const COMPANY_INFO: &str = "company_info";
    pub const BACKUP_SCHEDULE: &str = "backup_schedule";
    pub const POSTING_ACCOUNTS: &str = "posting_accounts";
    pub const TAX_RATE: &str = "tax_rate";
}
