//! Login and "who am I".

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use stockbook_core::{Permission, User};
use tracing::{info, warn};

use crate::auth::verify_password;
use crate::context::RequestContext;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: User,
    pub permissions: Vec<Permission>,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    // Same answer for unknown user, wrong password and deactivated user
    let rejected = || ApiError::unauthenticated("Invalid username or password");

    let Some(credentials) = state.db.users().find_credentials(&request.username).await? else {
        warn!(username = %request.username, "Login for unknown user");
        return Err(rejected());
    };
    if !credentials.user.is_active || !verify_password(&request.password, &credentials.password_hash) {
        warn!(username = %request.username, "Login rejected");
        return Err(rejected());
    }

    let user = credentials.user;
    let token = state.jwt.issue(user.id, &user.username, user.role)?;
    info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: state.jwt.lifetime_secs(),
        user,
    }))
}

pub async fn me(State(state): State<AppState>, ctx: RequestContext) -> ApiResult<Json<MeResponse>> {
    let user = state.db.users().get(ctx.user_id).await?;
    Ok(Json(MeResponse {
        user,
        permissions: ctx.permissions,
    }))
}
