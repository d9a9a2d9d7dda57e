//! Stock levels and the inventory ledger.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use stockbook_core::requests::AdjustInventoryRequest;
use stockbook_core::{InventoryHistory, InventoryLevel, Permission};
use stockbook_db::{LedgerOutcome, ReplayReport};

use crate::context::RequestContext;
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/inventory", get(levels))
        .route("/api/items/{id}/inventory", get(level))
        .route("/api/items/{id}/inventory/history", get(history))
        .route("/api/items/{id}/inventory/replay", get(replay))
        .route("/api/items/{id}/inventory/adjust", post(adjust))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelQuery {
    #[serde(default)]
    pub low_only: bool,
}

async fn levels(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<LevelQuery>,
) -> ApiResult<Json<Vec<InventoryLevel>>> {
    ctx.require(Permission::InventoryRead)?;
    Ok(Json(state.db.inventory().levels(query.low_only).await?))
}

async fn level(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<InventoryLevel>> {
    ctx.require(Permission::InventoryRead)?;
    Ok(Json(state.db.inventory().level(id).await?))
}

async fn history(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<InventoryHistory>>> {
    ctx.require(Permission::InventoryRead)?;
    Ok(Json(state.db.inventory().history(id).await?))
}

async fn replay(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReplayReport>> {
    ctx.require(Permission::InventoryRead)?;
    Ok(Json(state.db.inventory().replay(id).await?))
}

/// Manual correction. Going below zero succeeds with a negative-stock warning.
async fn adjust(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    ApiJson(request): ApiJson<AdjustInventoryRequest>,
) -> ApiResult<Json<LedgerOutcome>> {
    ctx.require(Permission::InventoryAdjust)?;
    Ok(Json(state.db.inventory().adjust_inventory(id, &request, ctx.actor()).await?))
}
