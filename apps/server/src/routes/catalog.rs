//! Categories, items and barcodes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use stockbook_core::requests::{CategoryInput, ItemUpdate, NewBarcode, NewItem};
use stockbook_core::{Barcode, Category, Item, Permission};
use stockbook_db::ItemFilter;

use crate::context::RequestContext;
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/categories/{id}", put(update_category).get(fetch_category))
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/{id}", get(fetch_item).put(update_item).delete(deactivate_item))
        .route("/api/items/{id}/barcodes", get(list_barcodes).post(add_barcode))
        .route("/api/barcodes/{code}", get(find_by_barcode))
}

// =============================================================================
// Categories
// =============================================================================

async fn create_category(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(input): ApiJson<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    ctx.require(Permission::CatalogWrite)?;
    let category = state.db.categories().create(&input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn list_categories(State(state): State<AppState>, ctx: RequestContext) -> ApiResult<Json<Vec<Category>>> {
    ctx.require(Permission::CatalogRead)?;
    Ok(Json(state.db.categories().list().await?))
}

async fn fetch_category(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<Category>> {
    ctx.require(Permission::CatalogRead)?;
    Ok(Json(state.db.categories().get(id).await?))
}

/// Rename or re-parent. A parent that would close a loop is a 400.
async fn update_category(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> ApiResult<Json<Category>> {
    ctx.require(Permission::CatalogWrite)?;
    Ok(Json(state.db.categories().update(id, &input).await?))
}

// =============================================================================
// Items
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuery {
    pub search: Option<String>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<u32>,
}

async fn create_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(input): ApiJson<NewItem>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    ctx.require(Permission::CatalogWrite)?;
    let item = state.db.items().create(&input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn list_items(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Json<Vec<Item>>> {
    ctx.require(Permission::CatalogRead)?;
    let filter = ItemFilter {
        search: query.search,
        category_id: query.category_id,
        include_inactive: query.include_inactive,
        limit: query.limit,
    };
    Ok(Json(state.db.items().list(&filter).await?))
}

async fn fetch_item(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<i64>) -> ApiResult<Json<Item>> {
    ctx.require(Permission::CatalogRead)?;
    Ok(Json(state.db.items().get(id).await?))
}

async fn update_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<ItemUpdate>,
) -> ApiResult<Json<Item>> {
    ctx.require(Permission::CatalogWrite)?;
    Ok(Json(state.db.items().update(id, &update).await?))
}

/// Soft delete: history and transactions keep referencing the item.
async fn deactivate_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    ctx.require(Permission::CatalogWrite)?;
    state.db.items().deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Barcodes
// =============================================================================

async fn add_barcode(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<NewBarcode>,
) -> ApiResult<(StatusCode, Json<Barcode>)> {
    ctx.require(Permission::CatalogWrite)?;
    let barcode = state.db.items().add_barcode(id, &input).await?;
    Ok((StatusCode::CREATED, Json(barcode)))
}

async fn list_barcodes(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Barcode>>> {
    ctx.require(Permission::CatalogRead)?;
    Ok(Json(state.db.items().barcodes(id).await?))
}

async fn find_by_barcode(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(code): Path<String>,
) -> ApiResult<Json<Item>> {
    ctx.require(Permission::CatalogRead)?;
    Ok(Json(state.db.items().find_by_barcode(&code).await?))
}
