use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use stockbook_core::requests::PaymentRequest;
use stockbook_core::{Payment, Permission};

use crate::context::RequestContext;
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payments", post(create))
        .route("/api/payments/{id}", get(fetch))
        .route("/api/payments/{id}/complete", post(complete))
        .route("/api/transactions/{id}/payments", get(list_for_transaction))
}

/// A completed payment against a transaction settles it immediately;
/// a planned one waits for `complete`.
async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(request): ApiJson<PaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    ctx.require(Permission::PaymentsWrite)?;
    let payment = state.db.payments().create(&request, ctx.actor()).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn fetch(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<i64>) -> ApiResult<Json<Payment>> {
    ctx.require(Permission::PaymentsRead)?;
    Ok(Json(state.db.payments().get(id).await?))
}

async fn complete(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<Payment>> {
    ctx.require(Permission::PaymentsWrite)?;
    Ok(Json(state.db.payments().complete(id, ctx.actor()).await?))
}

async fn list_for_transaction(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Payment>>> {
    ctx.require(Permission::PaymentsRead)?;
    Ok(Json(state.db.payments().list_for_transaction(id).await?))
}
