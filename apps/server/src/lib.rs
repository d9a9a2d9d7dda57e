//! # Stockbook Server
//!
//! REST API over the Stockbook database.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Server                                 │
//! │                                                                         │
//! │  Browser ───► axum (8080) ───► routes ───► stockbook-db ───► SQLite   │
//! │                  │                              ▲                       │
//! │          request_span                           │                       │
//! │          authenticate (JWT)              scheduler (tokio timer)        │
//! │                                          backups, notification scan     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - TOML + environment configuration
//! - [`auth`] - JWT tokens and argon2 passwords
//! - [`context`] - Per-request caller identity and middleware
//! - [`error`] - `ApiError` and its HTTP mapping
//! - [`routes`] - Handlers, one module per area
//! - [`scheduler`] - Background task runner

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod routes;
pub mod scheduler;

use axum::Router;
use std::sync::Arc;
use stockbook_core::Role;
use stockbook_db::Database;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::JwtManager;
use crate::config::ServerConfig;

/// Username of the account created on first start.
pub const BOOTSTRAP_ADMIN: &str = "admin";

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let jwt = JwtManager::new(config.auth.jwt_secret.clone(), config.auth.token_lifetime_secs);
        AppState {
            db,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        }
    }
}

/// Build the full HTTP router.
pub fn build_app(state: AppState) -> Router {
    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        context::authenticate,
    ));

    Router::new()
        .merge(routes::public_router())
        .merge(protected)
        .layer(axum::middleware::from_fn(context::request_span))
        .with_state(state)
}

/// Creates the `admin` user when the users table is empty.
///
/// Uses `auth.bootstrap_admin_password` when configured, otherwise generates a
/// one-time password and logs it. Returns the password that was set.
pub async fn bootstrap_admin(state: &AppState) -> anyhow::Result<Option<String>> {
    if state.db.users().count().await? > 0 {
        return Ok(None);
    }

    let password = match &state.config.auth.bootstrap_admin_password {
        Some(password) => password.clone(),
        None => {
            let generated = Uuid::new_v4().simple().to_string();
            warn!(
                username = BOOTSTRAP_ADMIN,
                password = %generated,
                "No bootstrap_admin_password configured; generated one. Change it after first login"
            );
            generated
        }
    };

    let hash = auth::hash_password(&password)?;
    let user = state.db.users().create(BOOTSTRAP_ADMIN, &hash, Role::Admin).await?;
    info!(user_id = user.id, "Bootstrap admin created");
    Ok(Some(password))
}
