//! Chart of accounts and journal vouchers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use stockbook_core::requests::{NewAccount, VoucherRequest};
use stockbook_core::{Account, AccountBalance, Permission, Voucher, VoucherDetail};

use crate::context::RequestContext;
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/accounts", get(list_accounts).post(create_account))
        .route("/api/accounts/{id}", get(fetch_account))
        .route("/api/accounts/{id}/balance", get(balance))
        .route("/api/vouchers", get(list_vouchers).post(create_voucher))
        .route("/api/vouchers/{id}", get(fetch_voucher))
}

async fn create_account(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(input): ApiJson<NewAccount>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    ctx.require(Permission::AccountingWrite)?;
    let account = state.db.accounts().create(&input).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_accounts(State(state): State<AppState>, ctx: RequestContext) -> ApiResult<Json<Vec<Account>>> {
    ctx.require(Permission::AccountingRead)?;
    Ok(Json(state.db.accounts().list().await?))
}

async fn fetch_account(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<Account>> {
    ctx.require(Permission::AccountingRead)?;
    Ok(Json(state.db.accounts().get(id).await?))
}

async fn balance(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<AccountBalance>> {
    ctx.require(Permission::AccountingRead)?;
    Ok(Json(state.db.accounts().balance(id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherQuery {
    pub transaction_id: Option<i64>,
}

/// Manual journal entry; must balance.
async fn create_voucher(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(request): ApiJson<VoucherRequest>,
) -> ApiResult<(StatusCode, Json<VoucherDetail>)> {
    ctx.require(Permission::AccountingWrite)?;
    let voucher = state.db.vouchers().create(&request, ctx.actor()).await?;
    Ok((StatusCode::CREATED, Json(voucher)))
}

async fn list_vouchers(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<VoucherQuery>,
) -> ApiResult<Json<Vec<Voucher>>> {
    ctx.require(Permission::AccountingRead)?;
    Ok(Json(state.db.vouchers().list(query.transaction_id).await?))
}

async fn fetch_voucher(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<VoucherDetail>> {
    ctx.require(Permission::AccountingRead)?;
    Ok(Json(state.db.vouchers().get(id).await?))
}
