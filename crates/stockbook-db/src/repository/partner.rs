//! # Partner Repository
//!
//! Customers and suppliers. Partners are deactivated, never deleted, so old
//! transactions keep their counterparty.

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::requests::PartnerInput;
use stockbook_core::{Partner, PartnerKind};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct PartnerRepository {
    pool: SqlitePool,
}

impl PartnerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PartnerRepository { pool }
    }

    pub async fn create(&self, input: &PartnerInput) -> DbResult<Partner> {
        input.validate()?;
        let now = Utc::now();

        let partner: Partner = sqlx::query_as(
            r#"
            INSERT INTO partners (name, kind, phone, email, address, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
            RETURNING *
            "#,
        )
        .bind(input.name.trim())
        .bind(input.kind)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        info!(partner_id = partner.id, kind = ?partner.kind, "Partner created");
        Ok(partner)
    }

    pub async fn get(&self, id: i64) -> DbResult<Partner> {
        sqlx::query_as("SELECT * FROM partners WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Partner", id))
    }

    /// Lists partners by name. A kind filter of `customer` also returns
    /// partners of kind `both`, and likewise for `supplier`.
    pub async fn list(&self, kind: Option<PartnerKind>, include_inactive: bool) -> DbResult<Vec<Partner>> {
        let partners = sqlx::query_as(
            r#"
            SELECT * FROM partners
            WHERE (?1 IS NULL OR kind = ?1 OR kind = 'both')
              AND (?2 = 1 OR is_active = 1)
            ORDER BY name
            "#,
        )
        .bind(kind)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(partners)
    }

    /// Replaces every editable field. `is_active` is kept when absent.
    pub async fn update(&self, id: i64, input: &PartnerInput) -> DbResult<Partner> {
        input.validate()?;

        let partner = sqlx::query_as(
            r#"
            UPDATE partners SET
                name = ?2,
                kind = ?3,
                phone = ?4,
                email = ?5,
                address = ?6,
                is_active = COALESCE(?7, is_active),
                updated_at = ?8
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(input.kind)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(input.is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Partner", id))?;

        debug!(partner_id = id, "Partner updated");
        Ok(partner)
    }
}
