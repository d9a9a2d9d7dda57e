//! Settings store, backup and restore. Admin only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use stockbook_core::{Permission, Setting};
use stockbook_db::BackupFile;
use tracing::warn;

use crate::context::RequestContext;
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(list))
        .route("/api/settings/backup", post(backup))
        .route("/api/settings/backups", get(list_backups))
        .route("/api/settings/restore", post(restore))
        .route("/api/settings/{key}", get(fetch).put(put))
}

async fn list(State(state): State<AppState>, ctx: RequestContext) -> ApiResult<Json<Vec<Setting>>> {
    ctx.require(Permission::Settings)?;
    Ok(Json(state.db.settings().list().await?))
}

async fn fetch(State(state): State<AppState>, ctx: RequestContext, Path(key): Path<String>) -> ApiResult<Json<Setting>> {
    ctx.require(Permission::Settings)?;
    Ok(Json(state.db.settings().get(&key).await?))
}

/// The body is the raw JSON value. Well-known keys are shape-checked.
async fn put(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(key): Path<String>,
    ApiJson(value): ApiJson<Value>,
) -> ApiResult<Json<Setting>> {
    ctx.require(Permission::Settings)?;
    Ok(Json(state.db.settings().put(&key, value).await?))
}

async fn backup(State(state): State<AppState>, ctx: RequestContext) -> ApiResult<(StatusCode, Json<BackupFile>)> {
    ctx.require(Permission::Settings)?;
    let file = state.db.backups().create().await?;
    Ok((StatusCode::CREATED, Json(file)))
}

async fn list_backups(State(state): State<AppState>, ctx: RequestContext) -> ApiResult<Json<Vec<BackupFile>>> {
    ctx.require(Permission::Settings)?;
    Ok(Json(state.db.backups().list().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    #[serde(alias = "file_name")]
    pub file_name: String,
}

async fn restore(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(request): ApiJson<RestoreRequest>,
) -> ApiResult<StatusCode> {
    ctx.require(Permission::Settings)?;
    warn!(user = %ctx.username, file = %request.file_name, "Restoring database from backup");
    state.db.backups().restore(&request.file_name).await?;
    Ok(StatusCode::NO_CONTENT)
}
