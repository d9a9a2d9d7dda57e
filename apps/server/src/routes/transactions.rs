//! Purchases and sales.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use stockbook_core::requests::TransactionRequest;
use stockbook_core::{Permission, Transaction, TransactionDetail, TransactionKind, TransactionStatus};
use stockbook_db::{TransactionFilter, TransactionOutcome};

use crate::context::RequestContext;
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/transactions", get(list).post(create))
        .route("/api/transactions/{id}", get(fetch))
        .route("/api/transactions/{id}/cancel", post(cancel))
        .route("/api/transactions/{id}/reconcile", post(reconcile))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub partner_id: Option<i64>,
    pub limit: Option<u32>,
}

/// Creates, posts to inventory and completes in one database transaction.
async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(request): ApiJson<TransactionRequest>,
) -> ApiResult<(StatusCode, Json<TransactionOutcome>)> {
    ctx.require(Permission::TransactionsWrite)?;
    let outcome = state.db.transactions().create(&request, ctx.actor()).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<Vec<Transaction>>> {
    ctx.require(Permission::TransactionsRead)?;
    let filter = TransactionFilter {
        kind: query.kind,
        status: query.status,
        partner_id: query.partner_id,
        limit: query.limit,
    };
    Ok(Json(state.db.transactions().list(&filter).await?))
}

async fn fetch(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<TransactionDetail>> {
    ctx.require(Permission::TransactionsRead)?;
    Ok(Json(state.db.transactions().get(id).await?))
}

async fn cancel(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<TransactionOutcome>> {
    ctx.require(Permission::TransactionsWrite)?;
    Ok(Json(state.db.transactions().cancel(id, ctx.actor()).await?))
}

async fn reconcile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transaction>> {
    ctx.require(Permission::TransactionsWrite)?;
    Ok(Json(state.db.transactions().reconcile(id, ctx.actor()).await?))
}
