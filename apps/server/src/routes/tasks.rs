use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use stockbook_core::requests::NewScheduledTask;
use stockbook_core::{Permission, ScheduledTask};

use crate::context::RequestContext;
use crate::error::{ApiJson, ApiResult};
use crate::scheduler;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/scheduled-tasks", get(list).post(create))
        .route("/api/scheduled-tasks/{id}", get(fetch))
        .route("/api/scheduled-tasks/{id}/run", post(run_now))
}

async fn list(State(state): State<AppState>, ctx: RequestContext) -> ApiResult<Json<Vec<ScheduledTask>>> {
    ctx.require(Permission::Settings)?;
    Ok(Json(state.db.scheduled_tasks().list().await?))
}

async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(input): ApiJson<NewScheduledTask>,
) -> ApiResult<(StatusCode, Json<ScheduledTask>)> {
    ctx.require(Permission::Settings)?;
    let task = state.db.scheduled_tasks().create(&input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn fetch(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<ScheduledTask>> {
    ctx.require(Permission::Settings)?;
    Ok(Json(state.db.scheduled_tasks().get(id).await?))
}

/// Runs the task regardless of its schedule; the task's own failure is
/// reported in `lastError`, not as an HTTP error.
async fn run_now(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<ScheduledTask>> {
    ctx.require(Permission::Settings)?;
    let task = state.db.scheduled_tasks().get(id).await?;
    Ok(Json(scheduler::run_task(&state.db, &task).await?))
}
