use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use stockbook_core::{Notification, Permission};
use stockbook_db::ScanReport;

use crate::context::RequestContext;
use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/scan", post(scan))
        .route("/api/notifications/{id}/read", post(mark_read))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    ctx.require(Permission::Notifications)?;
    Ok(Json(state.db.notifications().list(query.unread_only).await?))
}

/// On-demand run of the same scan the scheduler performs.
async fn scan(State(state): State<AppState>, ctx: RequestContext) -> ApiResult<Json<ScanReport>> {
    ctx.require(Permission::Notifications)?;
    Ok(Json(state.db.notifications().scan(Utc::now()).await?))
}

async fn mark_read(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<Notification>> {
    ctx.require(Permission::Notifications)?;
    Ok(Json(state.db.notifications().mark_read(id).await?))
}
