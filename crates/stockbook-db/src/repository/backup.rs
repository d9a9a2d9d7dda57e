//! # Backup & Restore
//!
//! Snapshots of the whole database file.
//!
//! ## Backup
//! `VACUUM INTO` writes a consistent, compacted copy while readers and
//! writers keep going. Files are named `stockbook-YYYYmmdd-HHMMSS.db` and
//! only the newest `retain` are kept.
//!
//! ## Restore
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate file name (no separators, stockbook-*.db)                     │
//! │       │                                                                 │
//! │  ATTACH snapshot ──► same applied migration count?  no → Conflict       │
//! │       │                                                                 │
//! │  BEGIN; defer foreign keys                                              │
//! │    DELETE every table      (RESTORE_ORDER, children first)              │
//! │    INSERT … SELECT * FROM snapshot.<table>  (parents first)             │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │  DETACH (always)                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};
use stockbook_core::validation::validate_backup_file_name;
use stockbook_core::BACKUP_FILE_PREFIX;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;

/// Every application table, parents before children.
///
/// Must list every table created by the migrations.
pub const RESTORE_ORDER: &[&str] = &[
    "users",
    "categories",
    "items",
    "barcodes",
    "partners",
    "inventory",
    "transactions",
    "transaction_items",
    "inventory_history",
    "accounts",
    "vouchers",
    "payments",
    "voucher_items",
    "notifications",
    "settings",
    "scheduled_tasks",
];

/// One snapshot file in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub file_name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

fn io_error(context: &str, path: &Path, err: std::io::Error) -> DbError {
    DbError::Backup(format!("{context} {}: {err}", path.display()))
}

/// Single-quoted SQL string literal; ATTACH and VACUUM INTO take no binds.
fn sql_literal(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}

fn is_backup_name(name: &str) -> bool {
    name.starts_with(BACKUP_FILE_PREFIX) && name.ends_with(".db")
}

#[derive(Debug, Clone)]
pub struct BackupService {
    pool: SqlitePool,
    gate: WriteGate,
    dir: PathBuf,
    retain: usize,
}

impl BackupService {
    pub fn new(pool: SqlitePool, gate: WriteGate, dir: PathBuf, retain: usize) -> Self {
        BackupService {
            pool,
            gate,
            dir,
            retain,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a new snapshot and prunes old ones.
    pub async fn create(&self) -> DbResult<BackupFile> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("creating", &self.dir, e))?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let mut file_name = format!("{BACKUP_FILE_PREFIX}{stamp}.db");
        let mut path = self.dir.join(&file_name);
        let mut suffix = 1;
        while tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error("checking", &path, e))?
        {
            file_name = format!("{BACKUP_FILE_PREFIX}{stamp}-{suffix}.db");
            path = self.dir.join(&file_name);
            suffix += 1;
        }

        {
            let _guard = self.gate.lock().await;
            sqlx::query(&format!("VACUUM INTO {}", sql_literal(&path)))
                .execute(&self.pool)
                .await?;
        }

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error("reading", &path, e))?;
        info!(file = %file_name, bytes = metadata.len(), "Backup written");

        let pruned = self.prune().await?;
        if pruned > 0 {
            debug!(pruned, "Old backups removed");
        }

        Ok(BackupFile {
            file_name,
            size_bytes: metadata.len(),
            created_at: metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now()),
        })
    }

    /// Snapshot files, newest first. A missing directory means no backups.
    pub async fn list(&self) -> DbResult<Vec<BackupFile>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("listing", &self.dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("listing", &self.dir, e))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_backup_name(&name) {
                continue;
            }
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| io_error("reading", &entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }
            files.push(BackupFile {
                file_name: name,
                size_bytes: metadata.len(),
                created_at: metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now()),
            });
        }

        files.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(files)
    }

    /// Deletes all but the newest `retain` snapshots. Returns how many went.
    pub async fn prune(&self) -> DbResult<usize> {
        let files = self.list().await?;
        let mut removed = 0;
        for file in files.iter().skip(self.retain) {
            let path = self.dir.join(&file.file_name);
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| io_error("removing", &path, e))?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Replaces the content of every table with the snapshot's.
    pub async fn restore(&self, file_name: &str) -> DbResult<()> {
        validate_backup_file_name(file_name)?;
        let path = self.dir.join(file_name);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error("checking", &path, e))?;
        if !exists {
            return Err(DbError::not_found("Backup", file_name));
        }

        let _guard = self.gate.lock().await;
        let mut conn = self.pool.acquire().await?;

        sqlx::query(&format!("ATTACH DATABASE {} AS snapshot", sql_literal(&path)))
            .execute(&mut *conn)
            .await?;

        let copied = copy_from_snapshot(&mut *conn).await;
        let detached = sqlx::query("DETACH DATABASE snapshot").execute(&mut *conn).await;

        copied?;
        if let Err(e) = detached {
            warn!(error = %e, "Could not detach snapshot");
        }

        info!(file = %file_name, "Database restored from backup");
        Ok(())
    }
}

async fn copy_from_snapshot(conn: &mut SqliteConnection) -> DbResult<()> {
    let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM main._sqlx_migrations WHERE success = 1")
        .fetch_one(&mut *conn)
        .await?;
    let snapshot: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM snapshot._sqlx_migrations WHERE success = 1")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| DbError::Conflict(format!("Snapshot is not a stockbook database: {e}")))?;
    if live != snapshot {
        return Err(DbError::Conflict(format!(
            "Snapshot schema has {snapshot} migration(s), this database has {live}"
        )));
    }

    let mut tx = conn.begin().await?;
    sqlx::query("PRAGMA defer_foreign_keys = ON").execute(&mut *tx).await?;

    for table in RESTORE_ORDER.iter().rev() {
        sqlx::query(&format!("DELETE FROM main.{table}"))
            .execute(&mut *tx)
            .await?;
    }
    for table in RESTORE_ORDER {
        sqlx::query(&format!("INSERT INTO main.{table} SELECT * FROM snapshot.{table}"))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_item, stock};
    use crate::{Database, DbConfig};
    use uuid::Uuid;

    async fn setup_with_dir(retain: usize) -> (Database, PathBuf) {
        let dir = std::env::temp_dir().join(format!("stockbook-backup-test-{}", Uuid::new_v4()));
        let db = Database::new(DbConfig::in_memory().backup_dir(&dir).backup_retain(retain))
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn test_backup_and_restore_roundtrip() {
        let (db, dir) = setup_with_dir(7).await;
        let item = db.items().create(&new_item("KEEP", 0)).await.unwrap();
        stock(&db, item.id, 12).await;

        let backup = db.backups().create().await.unwrap();
        assert!(backup.file_name.starts_with("stockbook-"));
        assert!(backup.size_bytes > 0);

        // Changes after the snapshot are rolled back by the restore
        stock(&db, item.id, -5).await;
        db.items().create(&new_item("GONE", 0)).await.unwrap();

        db.backups().restore(&backup.file_name).await.unwrap();

        assert_eq!(db.inventory().level(item.id).await.unwrap().quantity, 12);
        assert!(db.items().get_by_code("GONE").await.unwrap().is_none());
        assert_eq!(db.inventory().history(item.id).await.unwrap().len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_prune_keeps_newest() {
        let (db, dir) = setup_with_dir(2).await;
        for _ in 0..3 {
            db.backups().create().await.unwrap();
        }
        let files = db.backups().list().await.unwrap();
        assert_eq!(files.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_restore_rejects_bad_names() {
        let (db, _dir) = setup_with_dir(2).await;
        assert!(matches!(
            db.backups().restore("../etc/passwd").await,
            Err(DbError::Core(_))
        ));
        assert!(matches!(
            db.backups().restore("stockbook-19990101-000000.db").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_without_directory_is_empty() {
        let (db, _dir) = setup_with_dir(2).await;
        assert!(db.backups().list().await.unwrap().is_empty());
    }
}
