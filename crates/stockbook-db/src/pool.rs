//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite, plus the handle
//! every caller goes through to reach a repository.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Server startup                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← pool size, posting policy, backup dir           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐   ┌──────────────────┐    │
//! │  │            SqlitePool                    │   │   WriteGate      │    │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │   │ tokio Mutex<()>  │    │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │   │ one posting tx   │    │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │   │ open at a time   │    │
//! │  └─────────────────────────────────────────┘   └──────────────────┘    │
//! │                                                                         │
//! │  Reads run in parallel on any connection. Multi-statement writes take  │
//! │  the gate first, then open a transaction.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so readers never block
//! the single writer.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use stockbook_core::TaxRate;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::accounting::{AccountRepository, VoucherRepository};
use crate::repository::backup::BackupService;
use crate::repository::catalog::{CategoryRepository, ItemRepository};
use crate::repository::inventory::InventoryRepository;
use crate::repository::notification::NotificationRepository;
use crate::repository::partner::PartnerRepository;
use crate::repository::payment::PaymentRepository;
use crate::repository::setting::SettingRepository;
use crate::repository::task::ScheduledTaskRepository;
use crate::repository::transaction::TransactionRepository;
use crate::repository::user::UserRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How the transaction processor books money.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingPolicy {
    /// Used when the `tax_rate` setting is absent.
    pub default_tax_rate: TaxRate,
    /// Post vouchers for transactions and payments unless a request says otherwise.
    pub auto_post_vouchers: bool,
    /// `due_date = transaction_date + payment_terms_days`.
    pub payment_terms_days: i64,
}

impl Default for PostingPolicy {
    fn default() -> Self {
        PostingPolicy {
            default_tax_rate: TaxRate::zero(),
            auto_post_vouchers: true,
            payment_terms_days: 30,
        }
    }
}

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/stockbook/stockbook.db")
///     .max_connections(5)
///     .backup_dir("/var/lib/stockbook/backups");
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    pub posting: PostingPolicy,

    /// Where backup snapshots are written.
    /// Default: `backups/` next to the database file
    pub backup_dir: PathBuf,

    /// Number of snapshots kept after each backup.
    /// Default: 7
    pub backup_retain: usize,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let database_path: PathBuf = path.into();
        let backup_dir = database_path
            .parent()
            .map(|p| p.join("backups"))
            .unwrap_or_else(|| PathBuf::from("backups"));

        DbConfig {
            database_path,
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            posting: PostingPolicy::default(),
            backup_dir,
            backup_retain: 7,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn posting_policy(mut self, policy: PostingPolicy) -> Self {
        self.posting = policy;
        self
    }

    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    pub fn backup_retain(mut self, retain: usize) -> Self {
        self.backup_retain = retain;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// An in-memory database lives as long as its one connection, so the pool
    /// is pinned to a single connection that is never recycled.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            posting: PostingPolicy::default(),
            backup_dir: std::env::temp_dir().join("stockbook-backups"),
            backup_retain: 7,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Write Gate
// =============================================================================

/// Serialises multi-statement write transactions inside this process.
///
/// SQLite allows one writer anyway; taking the gate before `BEGIN` turns
/// `SQLITE_BUSY` retries into an orderly queue.
#[derive(Debug, Clone, Default)]
pub struct WriteGate(Arc<Mutex<()>>);

impl WriteGate {
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone; the server keeps one in its shared state.
///
/// ## Usage in a handler
/// ```rust,ignore
/// async fn get_item(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Item>> {
///     let item = state.db.items().get(id).await?;
///     Ok(Json(item))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
    gate: WriteGate,
    posting: PostingPolicy,
    backup_dir: PathBuf,
    backup_retain: usize,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite: WAL, NORMAL synchronous, foreign keys on
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let base = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new().filename(&config.database_path)
        };

        let connect_options = base
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        debug!("Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        pool_options = if config.is_in_memory() {
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            gate: WriteGate::default(),
            posting: config.posting,
            backup_dir: config.backup_dir,
            backup_retain: config.backup_retain,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For diagnostics and tests. Prefer repository methods.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn posting_policy(&self) -> PostingPolicy {
        self.posting
    }

    // -------------------------------------------------------------------------
    // Repositories
    // -------------------------------------------------------------------------

    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.pool.clone())
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone(), self.gate.clone())
    }

    pub fn partners(&self) -> PartnerRepository {
        PartnerRepository::new(self.pool.clone())
    }

    /// Inventory levels, history, and manual adjustments.
    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone(), self.gate.clone())
    }

    /// The transaction processor.
    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone(), self.gate.clone(), self.posting)
    }

    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.pool.clone())
    }

    pub fn vouchers(&self) -> VoucherRepository {
        VoucherRepository::new(self.pool.clone(), self.gate.clone())
    }

    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone(), self.gate.clone(), self.posting)
    }

    pub fn notifications(&self) -> NotificationRepository {
        NotificationRepository::new(self.pool.clone(), self.gate.clone())
    }

    pub fn settings(&self) -> SettingRepository {
        SettingRepository::new(self.pool.clone(), self.gate.clone())
    }

    pub fn scheduled_tasks(&self) -> ScheduledTaskRepository {
        ScheduledTaskRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn backups(&self) -> BackupService {
        BackupService::new(
            self.pool.clone(),
            self.gate.clone(),
            self.backup_dir.clone(),
            self.backup_retain,
        )
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
