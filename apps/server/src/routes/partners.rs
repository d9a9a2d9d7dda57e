use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use stockbook_core::requests::PartnerInput;
use stockbook_core::{Partner, PartnerKind, Permission};

use crate::context::RequestContext;
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/partners", get(list).post(create))
        .route("/api/partners/{id}", get(fetch).put(update))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerQuery {
    pub kind: Option<PartnerKind>,
    #[serde(default)]
    pub include_inactive: bool,
}

async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(input): ApiJson<PartnerInput>,
) -> ApiResult<(StatusCode, Json<Partner>)> {
    ctx.require(Permission::PartnersWrite)?;
    let partner = state.db.partners().create(&input).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}

async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<PartnerQuery>,
) -> ApiResult<Json<Vec<Partner>>> {
    ctx.require(Permission::PartnersRead)?;
    let partners = state.db.partners().list(query.kind, query.include_inactive).await?;
    Ok(Json(partners))
}

async fn fetch(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<i64>) -> ApiResult<Json<Partner>> {
    ctx.require(Permission::PartnersRead)?;
    Ok(Json(state.db.partners().get(id).await?))
}

/// Full update; `isActive: false` deactivates.
async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<PartnerInput>,
) -> ApiResult<Json<Partner>> {
    ctx.require(Permission::PartnersWrite)?;
    Ok(Json(state.db.partners().update(id, &input).await?))
}
