//! # stockbook-db: Database Layer for Stockbook
//!
//! This crate provides database access for the Stockbook backend.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (POST /api/transactions)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockbook-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Transactions  │    │              │  │   │
//! │  │   │ SqlitePool    │    │ Inventory     │    │ 0001_initial │  │   │
//! │  │   │ WriteGate     │◄───│ Payments      │    │ _schema.sql  │  │   │
//! │  │   │ PostingPolicy │    │ Vouchers ...  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/stockbook/stockbook.db (platform data dir)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, write gate, repository accessors
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockbook_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/stockbook.db")).await?;
//!
//! let outcome = db.transactions().create(&request, "alice").await?;
//! let level = db.inventory().level(item_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, PostingPolicy};

// Repository re-exports for convenience
pub use repository::accounting::{AccountRepository, VoucherRepository};
pub use repository::backup::{BackupFile, BackupService};
pub use repository::catalog::{CategoryRepository, ItemFilter, ItemRepository};
pub use repository::inventory::{InventoryLedger, InventoryRepository, LedgerOutcome, LedgerWarning, ReplayReport};
pub use repository::notification::{NotificationRepository, ScanReport};
pub use repository::partner::PartnerRepository;
pub use repository::payment::PaymentRepository;
pub use repository::setting::SettingRepository;
pub use repository::task::ScheduledTaskRepository;
pub use repository::transaction::{TransactionFilter, TransactionOutcome, TransactionRepository};
pub use repository::user::{UserCredentials, UserRepository};
