//! # Scheduled Tasks
//!
//! Rows describing periodic jobs. The server's scheduler timer asks for the
//! due ones, runs them, and records the outcome here.

use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::requests::NewScheduledTask;
use stockbook_core::{BackupSchedule, ScheduledTask, TaskKind};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// Name of the task driven by the `backup_schedule` setting.
pub const BACKUP_TASK_NAME: &str = "backup";

/// Points the `backup` task at the given schedule, creating it if needed.
pub(crate) async fn apply_backup_schedule(
    conn: &mut SqliteConnection,
    schedule: &BackupSchedule,
) -> DbResult<()> {
    let now = Utc::now();
    let next_run = now + Duration::minutes(schedule.interval_minutes);

    sqlx::query(
        r#"
        INSERT INTO scheduled_tasks (name, kind, interval_minutes, enabled, next_run_at, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(name) DO UPDATE SET
            interval_minutes = excluded.interval_minutes,
            enabled = excluded.enabled,
            next_run_at = excluded.next_run_at
        "#,
    )
    .bind(BACKUP_TASK_NAME)
    .bind(TaskKind::Backup)
    .bind(schedule.interval_minutes)
    .bind(schedule.enabled)
    .bind(next_run)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(
        enabled = schedule.enabled,
        interval_minutes = schedule.interval_minutes,
        "Backup schedule applied"
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ScheduledTaskRepository {
    pool: SqlitePool,
}

impl ScheduledTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ScheduledTaskRepository { pool }
    }

    pub async fn list(&self) -> DbResult<Vec<ScheduledTask>> {
        let tasks = sqlx::query_as("SELECT * FROM scheduled_tasks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    pub async fn get(&self, id: i64) -> DbResult<ScheduledTask> {
        sqlx::query_as("SELECT * FROM scheduled_tasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("ScheduledTask", id))
    }

    /// Creates a task; its first run is due immediately.
    pub async fn create(&self, input: &NewScheduledTask) -> DbResult<ScheduledTask> {
        input.validate()?;
        let now = Utc::now();
        let name = input.name.trim();

        let task: ScheduledTask = sqlx::query_as(
            r#"
            INSERT INTO scheduled_tasks (name, kind, interval_minutes, enabled, next_run_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(input.kind)
        .bind(input.interval_minutes)
        .bind(input.enabled)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(name))?;

        info!(task_id = task.id, kind = ?task.kind, "Scheduled task created");
        Ok(task)
    }

    /// Enabled tasks whose `next_run_at` has passed.
    pub async fn due(&self, now: DateTime<Utc>) -> DbResult<Vec<ScheduledTask>> {
        let enabled: Vec<ScheduledTask> =
            sqlx::query_as("SELECT * FROM scheduled_tasks WHERE enabled = 1 ORDER BY next_run_at")
                .fetch_all(&self.pool)
                .await?;
        Ok(enabled.into_iter().filter(|t| t.is_due(now)).collect())
    }

    /// Records a run and schedules the next one `interval_minutes` later.
    pub async fn record_run(
        &self,
        id: i64,
        ran_at: DateTime<Utc>,
        error: Option<&str>,
    ) -> DbResult<ScheduledTask> {
        let task = self.get(id).await?;
        let next_run = ran_at + Duration::minutes(task.interval_minutes);

        let task = sqlx::query_as(
            r#"
            UPDATE scheduled_tasks
            SET last_run_at = ?2, next_run_at = ?3, last_error = ?4
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ran_at)
        .bind(next_run)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;

        Ok(task)
    }
}
