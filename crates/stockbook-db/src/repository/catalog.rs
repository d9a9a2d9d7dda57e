//! # Catalogue Repositories
//!
//! Items, their barcodes, and the category tree.
//!
//! ## Item Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create ──► items row + inventory row (quantity 0), one db transaction │
//! │    │                                                                    │
//! │    ├──► add_barcode (n)        code globally unique → Conflict          │
//! │    ├──► update                 pricing / metadata, code is immutable    │
//! │    └──► deactivate             kept for history, refused by new lines   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use stockbook_core::category::check_parent;
use stockbook_core::requests::{CategoryInput, ItemUpdate, NewBarcode, NewItem};
use stockbook_core::validation::validate_search_query;
use stockbook_core::{Barcode, Category, Item};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;

/// Filters for [`ItemRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Substring of code or name.
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub include_inactive: bool,
    pub limit: Option<u32>,
}

const DEFAULT_LIST_LIMIT: u32 = 100;

// =============================================================================
// Items
// =============================================================================

/// Repository for items and barcodes.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Creates an item together with its zero-quantity inventory row.
    pub async fn create(&self, input: &NewItem) -> DbResult<Item> {
        input.validate()?;
        debug!(code = %input.code, "Creating item");

        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
        }

        let now = Utc::now();
        let code = input.code.trim();
        let mut tx = self.pool.begin().await?;

        let item: Item = sqlx::query_as(
            r#"
            INSERT INTO items (
                code, name, category_id, unit,
                unit_price_cents, cost_price_cents, min_stock_level,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(input.name.trim())
        .bind(input.category_id)
        .bind(input.unit.as_deref().unwrap_or("pcs"))
        .bind(input.unit_price_cents)
        .bind(input.cost_price_cents)
        .bind(input.min_stock_level)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_value(code))?;

        sqlx::query("INSERT INTO inventory (item_id, quantity, updated_at) VALUES (?1, 0, ?2)")
            .bind(item.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(item_id = item.id, code = %item.code, "Item created");
        Ok(item)
    }

    pub async fn get(&self, id: i64) -> DbResult<Item> {
        sqlx::query_as("SELECT * FROM items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as("SELECT * FROM items WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Lists items ordered by code.
    pub async fn list(&self, filter: &ItemFilter) -> DbResult<Vec<Item>> {
        let pattern = match &filter.search {
            Some(q) => {
                let q = validate_search_query(q)?;
                (!q.is_empty()).then(|| format!("%{}%", q))
            }
            None => None,
        };

        let items = sqlx::query_as(
            r#"
            SELECT * FROM items
            WHERE (?1 IS NULL OR code LIKE ?1 OR name LIKE ?1)
              AND (?2 IS NULL OR category_id = ?2)
              AND (?3 = 1 OR is_active = 1)
            ORDER BY code
            LIMIT ?4
            "#,
        )
        .bind(pattern)
        .bind(filter.category_id)
        .bind(filter.include_inactive)
        .bind(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Applies a partial update. The code never changes.
    pub async fn update(&self, id: i64, update: &ItemUpdate) -> DbResult<Item> {
        update.validate()?;
        let current = self.get(id).await?;

        if let Some(Some(category_id)) = update.category_id {
            self.ensure_category(category_id).await?;
        }

        let item: Item = sqlx::query_as(
            r#"
            UPDATE items SET
                name = ?2,
                category_id = ?3,
                unit = ?4,
                unit_price_cents = ?5,
                cost_price_cents = ?6,
                min_stock_level = ?7,
                is_active = ?8,
                updated_at = ?9
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.name.as_deref().map(str::trim).unwrap_or(&current.name))
        .bind(update.category_id.unwrap_or(current.category_id))
        .bind(update.unit.as_deref().unwrap_or(&current.unit))
        .bind(update.unit_price_cents.unwrap_or(current.unit_price_cents))
        .bind(update.cost_price_cents.unwrap_or(current.cost_price_cents))
        .bind(update.min_stock_level.unwrap_or(current.min_stock_level))
        .bind(update.is_active.unwrap_or(current.is_active))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        debug!(item_id = id, "Item updated");
        Ok(item)
    }

    /// Soft-deletes an item. History and old transactions still reference it.
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE items SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        info!(item_id = id, "Item deactivated");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Barcodes
    // -------------------------------------------------------------------------

    /// Attaches a barcode. Barcodes are unique across all items.
    pub async fn add_barcode(&self, item_id: i64, input: &NewBarcode) -> DbResult<Barcode> {
        input.validate()?;
        self.get(item_id).await?;

        let code = input.code.trim();
        let barcode = sqlx::query_as(
            "INSERT INTO barcodes (item_id, code, created_at) VALUES (?1, ?2, ?3) RETURNING *",
        )
        .bind(item_id)
        .bind(code)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(code))?;

        debug!(item_id, code, "Barcode added");
        Ok(barcode)
    }

    pub async fn barcodes(&self, item_id: i64) -> DbResult<Vec<Barcode>> {
        self.get(item_id).await?;
        let barcodes = sqlx::query_as("SELECT * FROM barcodes WHERE item_id = ?1 ORDER BY id")
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(barcodes)
    }

    /// Scanner lookup.
    pub async fn find_by_barcode(&self, code: &str) -> DbResult<Item> {
        sqlx::query_as(
            r#"
            SELECT i.* FROM items i
            JOIN barcodes b ON b.item_id = i.id
            WHERE b.code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Barcode", code))
    }

    async fn ensure_category(&self, id: i64) -> DbResult<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        exists.map(|_| ()).ok_or_else(|| DbError::not_found("Category", id))
    }
}

// =============================================================================
// Categories
// =============================================================================

/// Repository for the category tree.
///
/// Parent changes run under the write gate so two concurrent re-parents
/// cannot each pass the cycle check and together close a loop.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    gate: WriteGate,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        CategoryRepository { pool, gate }
    }

    pub async fn create(&self, input: &CategoryInput) -> DbResult<Category> {
        input.validate()?;
        let _guard = self.gate.lock().await;

        if let Some(parent_id) = input.parent_id {
            check_parent(&self.parent_map().await?, None, parent_id)?;
        }

        let category: Category = sqlx::query_as(
            "INSERT INTO categories (name, parent_id, created_at) VALUES (?1, ?2, ?3) RETURNING *",
        )
        .bind(input.name.trim())
        .bind(input.parent_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(category_id = category.id, "Category created");
        Ok(category)
    }

    /// Renames and/or re-parents a category.
    pub async fn update(&self, id: i64, input: &CategoryInput) -> DbResult<Category> {
        input.validate()?;
        let _guard = self.gate.lock().await;

        let parents = self.parent_map().await?;
        if !parents.contains_key(&id) {
            return Err(DbError::not_found("Category", id));
        }
        if let Some(parent_id) = input.parent_id {
            check_parent(&parents, Some(id), parent_id)?;
        }

        let category = sqlx::query_as(
            "UPDATE categories SET name = ?2, parent_id = ?3 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(input.parent_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(category_id = id, parent_id = ?input.parent_id, "Category updated");
        Ok(category)
    }

    pub async fn get(&self, id: i64) -> DbResult<Category> {
        sqlx::query_as("SELECT * FROM categories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    async fn parent_map(&self) -> DbResult<HashMap<i64, Option<i64>>> {
        let rows: Vec<(i64, Option<i64>)> = sqlx::query_as("SELECT id, parent_id FROM categories")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_item, setup};
    use stockbook_core::CoreError;

    #[tokio::test]
    async fn test_create_item_creates_inventory_row() {
        let db = setup().await;
        let item = db.items().create(&new_item("COKE-330", 10)).await.unwrap();

        assert_eq!(item.unit, "pcs");
        assert!(item.is_active);
        let level = db.inventory().level(item.id).await.unwrap();
        assert_eq!(level.quantity, 0);
    }

    #[tokio::test]
    async fn test_duplicate_item_code_conflicts() {
        let db = setup().await;
        db.items().create(&new_item("COKE-330", 0)).await.unwrap();
        let err = db.items().create(&new_item("COKE-330", 0)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "COKE-330"));
    }

    #[tokio::test]
    async fn test_update_keeps_unspecified_fields() {
        let db = setup().await;
        let item = db.items().create(&new_item("TEA-01", 5)).await.unwrap();

        let updated = db
            .items()
            .update(
                item.id,
                &ItemUpdate {
                    unit_price_cents: Some(450),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.unit_price_cents, 450);
        assert_eq!(updated.name, item.name);
        assert_eq!(updated.min_stock_level, 5);
        assert_eq!(updated.code, "TEA-01");
    }

    #[tokio::test]
    async fn test_update_moves_and_clears_category() {
        let db = setup().await;
        let drinks = db
            .categories()
            .create(&CategoryInput {
                name: "Drinks".to_string(),
                parent_id: None,
            })
            .await
            .unwrap();
        let item = db.items().create(&new_item("TEA-01", 0)).await.unwrap();
        assert_eq!(item.category_id, None);

        let moved = db
            .items()
            .update(
                item.id,
                &ItemUpdate {
                    category_id: Some(Some(drinks.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.category_id, Some(drinks.id));

        // Absent keeps it
        let renamed = db
            .items()
            .update(
                item.id,
                &ItemUpdate {
                    name: Some("Green tea".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.category_id, Some(drinks.id));

        let cleared = db
            .items()
            .update(
                item.id,
                &ItemUpdate {
                    category_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.category_id, None);
        assert_eq!(cleared.name, "Green tea");

        assert!(matches!(
            db.items()
                .update(
                    item.id,
                    &ItemUpdate {
                        category_id: Some(Some(999)),
                        ..Default::default()
                    },
                )
                .await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_search_and_deactivate() {
        let db = setup().await;
        let coke = db.items().create(&new_item("COKE-330", 0)).await.unwrap();
        db.items().create(&new_item("PEPSI-330", 0)).await.unwrap();

        let filter = ItemFilter {
            search: Some("coke".to_string()),
            ..Default::default()
        };
        let found = db.items().list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);

        db.items().deactivate(coke.id).await.unwrap();
        assert!(db.items().list(&filter).await.unwrap().is_empty());

        let all = ItemFilter {
            include_inactive: true,
            ..Default::default()
        };
        assert_eq!(db.items().list(&all).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_barcode_conflicts() {
        let db = setup().await;
        let a = db.items().create(&new_item("A-1", 0)).await.unwrap();
        let b = db.items().create(&new_item("B-1", 0)).await.unwrap();
        let code = NewBarcode {
            code: "4006381333931".to_string(),
        };

        db.items().add_barcode(a.id, &code).await.unwrap();
        let err = db.items().add_barcode(b.id, &code).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let found = db.items().find_by_barcode("4006381333931").await.unwrap();
        assert_eq!(found.id, a.id);
        assert!(matches!(
            db.items().find_by_barcode("0000").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_category_cycles_are_rejected() {
        let db = setup().await;
        let cats = db.categories();
        let root = cats
            .create(&CategoryInput {
                name: "Drinks".to_string(),
                parent_id: None,
            })
            .await
            .unwrap();
        let child = cats
            .create(&CategoryInput {
                name: "Soda".to_string(),
                parent_id: Some(root.id),
            })
            .await
            .unwrap();

        let err = cats
            .update(
                root.id,
                &CategoryInput {
                    name: "Drinks".to_string(),
                    parent_id: Some(child.id),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::CategoryCycle { .. })));

        let err = cats
            .update(
                child.id,
                &CategoryInput {
                    name: "Soda".to_string(),
                    parent_id: Some(child.id),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::CategoryCycle { .. })));

        // Unchanged by the failed attempts
        assert_eq!(cats.get(root.id).await.unwrap().parent_id, None);
    }
}
