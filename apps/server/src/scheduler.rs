//! # Scheduler
//!
//! One tokio interval timer drives every scheduled task.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  every scheduler.tick_secs                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  scheduled_tasks().due(now) ──► for each task: run_task                │
//! │                                    │                                    │
//! │                  ┌─────────────────┴──────────────────┐                 │
//! │                  ▼                                    ▼                 │
//! │          Backup: backups().create()     NotificationScan: scan(now)    │
//! │                  │                                    │                 │
//! │                  └─────────────────┬──────────────────┘                 │
//! │                                    ▼                                    │
//! │                 record_run(last_run, next_run, last_error)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failing task is recorded and retried at its next interval; it never
//! stops the timer.

use chrono::Utc;
use std::time::Duration;
use stockbook_core::{ScheduledTask, TaskKind};
use stockbook_db::{Database, DbResult};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Runs one task now and records the outcome.
///
/// Only a failure to record the run is returned as an error; the task's own
/// failure ends up in `last_error`.
pub async fn run_task(db: &Database, task: &ScheduledTask) -> DbResult<ScheduledTask> {
    let started = Utc::now();
    debug!(task = %task.name, kind = ?task.kind, "Running scheduled task");

    let result = match task.kind {
        TaskKind::Backup => db.backups().create().await.map(|file| {
            info!(task = %task.name, file = %file.file_name, "Scheduled backup written");
        }),
        TaskKind::NotificationScan => db.notifications().scan(started).await.map(|report| {
            info!(
                task = %task.name,
                stock_low = report.stock_low_created,
                unpaid = report.unpaid_created,
                "Scheduled notification scan finished"
            );
        }),
    };

    let error_text = match result {
        Ok(()) => None,
        Err(e) => {
            warn!(task = %task.name, error = %e, "Scheduled task failed");
            Some(e.to_string())
        }
    };

    db.scheduled_tasks()
        .record_run(task.id, started, error_text.as_deref())
        .await
}

/// Runs every due task once. Returns how many ran.
pub async fn run_due(db: &Database) -> DbResult<usize> {
    let due = db.scheduled_tasks().due(Utc::now()).await?;
    for task in &due {
        run_task(db, task).await?;
    }
    Ok(due.len())
}

/// Starts the timer loop on the runtime.
pub fn spawn(db: Database, tick: Duration) -> JoinHandle<()> {
    info!(tick_secs = tick.as_secs(), "Scheduler started");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match run_due(&db).await {
                Ok(0) => {}
                Ok(ran) => debug!(ran, "Scheduler tick"),
                Err(e) => error!(error = %e, "Scheduler tick failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbook_db::DbConfig;

    #[tokio::test]
    async fn test_run_due_runs_scan_and_reschedules() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        // The seeded notification scan is due immediately, the backup is not
        assert_eq!(run_due(&db).await.unwrap(), 1);
        assert_eq!(run_due(&db).await.unwrap(), 0);

        let tasks = db.scheduled_tasks().list().await.unwrap();
        let scan = tasks
            .iter()
            .find(|t| t.kind == TaskKind::NotificationScan)
            .unwrap();
        assert!(scan.last_run_at.is_some());
        assert!(scan.last_error.is_none());
        assert!(scan.next_run_at > Utc::now());
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        // A file in place of the backup directory makes create_dir_all fail
        let blocker = std::env::temp_dir().join(format!("stockbook-sched-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        let db = Database::new(DbConfig::in_memory().backup_dir(&blocker))
            .await
            .unwrap();

        let backup = db
            .scheduled_tasks()
            .list()
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.kind == TaskKind::Backup)
            .unwrap();
        let after = run_task(&db, &backup).await.unwrap();
        assert!(after.last_error.is_some());
        assert!(after.last_run_at.is_some());

        std::fs::remove_file(&blocker).ok();
    }
}
