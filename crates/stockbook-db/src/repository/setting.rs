//! # Settings
//!
//! Key → JSON blob store. Unknown keys are stored as given; well-known keys
//! are decoded into their typed form before they are written:
//!
//! | Key                | Shape                         | Effect                         |
//! |--------------------|-------------------------------|--------------------------------|
//! | `company_info`     | any JSON object               | shown on documents by the UI   |
//! | `posting_accounts` | [`PostingAccounts`]           | accounts used by auto posting  |
//! | `tax_rate`         | basis points (`825`)          | overrides the configured rate  |
//! | `backup_schedule`  | [`BackupSchedule`]            | reconfigures the backup task   |

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::posting::PostingAccounts;
use stockbook_core::setting_keys::{BACKUP_SCHEDULE, COMPANY_INFO, POSTING_ACCOUNTS, TAX_RATE};
use stockbook_core::validation::{validate_interval_minutes, validate_setting_key, validate_tax_rate_bps};
use stockbook_core::{BackupSchedule, Setting, TaxRate, ValidationError};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;
use crate::repository::task;

type SettingRow = (String, String, DateTime<Utc>);

fn decode_row((key, value, updated_at): SettingRow) -> DbResult<Setting> {
    let value = serde_json::from_str(&value)
        .map_err(|e| DbError::CorruptData(format!("setting {key}: {e}")))?;
    Ok(Setting {
        key,
        value,
        updated_at,
    })
}

async fn read_typed<T: DeserializeOwned>(conn: &mut SqliteConnection, key: &str) -> DbResult<Option<T>> {
    let raw: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

    raw.map(|s| serde_json::from_str(&s).map_err(|e| DbError::CorruptData(format!("setting {key}: {e}"))))
        .transpose()
}

/// Accounts used by automatic postings; defaults when the setting is absent.
pub(crate) async fn posting_accounts(conn: &mut SqliteConnection) -> DbResult<PostingAccounts> {
    Ok(read_typed(conn, POSTING_ACCOUNTS).await?.unwrap_or_default())
}

/// Tax rate for new transactions; `default` when the setting is absent.
pub(crate) async fn tax_rate(conn: &mut SqliteConnection, default: TaxRate) -> DbResult<TaxRate> {
    Ok(read_typed(conn, TAX_RATE).await?.unwrap_or(default))
}

fn decode_as<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, ValidationError> {
    serde_json::from_value(value.clone()).map_err(|e| ValidationError::invalid(key, e.to_string()))
}

#[derive(Debug, Clone)]
pub struct SettingRepository {
    pool: SqlitePool,
    gate: WriteGate,
}

impl SettingRepository {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        SettingRepository { pool, gate }
    }

    pub async fn get(&self, key: &str) -> DbResult<Setting> {
        let row: Option<SettingRow> =
            sqlx::query_as("SELECT key, value, updated_at FROM settings WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        row.map(decode_row)
            .transpose()?
            .ok_or_else(|| DbError::not_found("Setting", key))
    }

    pub async fn list(&self) -> DbResult<Vec<Setting>> {
        let rows: Vec<SettingRow> =
            sqlx::query_as("SELECT key, value, updated_at FROM settings ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(decode_row).collect()
    }

    /// Validates and upserts a setting.
    pub async fn put(&self, key: &str, value: Value) -> DbResult<Setting> {
        validate_setting_key(key)?;

        match key {
            COMPANY_INFO if !value.is_object() => {
                return Err(ValidationError::invalid(key, "must be a JSON object").into());
            }
            POSTING_ACCOUNTS => {
                decode_as::<PostingAccounts>(key, &value)?;
            }
            TAX_RATE => {
                let rate: TaxRate = decode_as(key, &value)?;
                validate_tax_rate_bps(rate.bps())?;
            }
            BACKUP_SCHEDULE => {
                let schedule: BackupSchedule = decode_as(key, &value)?;
                validate_interval_minutes(schedule.interval_minutes)?;
            }
            _ => {}
        }

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let row: SettingRow = sqlx::query_as(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            RETURNING key, value, updated_at
            "#,
        )
        .bind(key)
        .bind(value.to_string())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        if key == BACKUP_SCHEDULE {
            let schedule: BackupSchedule = decode_as(key, &value)?;
            task::apply_backup_schedule(&mut *tx, &schedule).await?;
        }

        tx.commit().await?;

        info!(key, "Setting saved");
        decode_row(row)
    }
}
