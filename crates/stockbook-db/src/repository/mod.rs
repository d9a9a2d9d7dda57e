//! # Repository Module
//!
//! Every SQL statement in Stockbook lives under this module.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  HTTP handler                                                           │
//! │       │  state.db.transactions().create(&request, actor)                │
//! │       ▼                                                                 │
//! │  TransactionRepository ──┬──► InventoryLedger::adjust(&mut conn, ..)    │
//! │   (one db transaction)   ├──► accounting::post_voucher(&mut conn, ..)   │
//! │                          └──► notification::emit(&mut conn, ..)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! │                                                                         │
//! │  Repositories own their statements. Building blocks that must join a   │
//! │  caller's transaction take `&mut SqliteConnection` instead of the pool. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog`] - Items, barcodes, categories
//! - [`partner`] - Customers and suppliers
//! - [`inventory`] - The inventory ledger
//! - [`transaction`] - The transaction processor
//! - [`payment`] - Payments and reconciliation
//! - [`accounting`] - Accounts and vouchers
//! - [`notification`] - Notification emitter
//! - [`setting`] - Settings store
//! - [`task`] - Scheduled task rows
//! - [`backup`] - Snapshot and restore
//! - [`user`] - Login accounts

pub mod accounting;
pub mod backup;
pub mod catalog;
pub mod inventory;
pub mod notification;
pub mod partner;
pub mod payment;
pub mod setting;
pub mod task;
pub mod transaction;
pub mod user;
