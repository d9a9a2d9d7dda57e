//! HTTP routes, one file per area.
//!
//! Every protected handler starts with `ctx.require(Permission::…)?` and then
//! calls exactly one repository operation; all rules live in stockbook-db and
//! stockbook-core.
//!
//! ```text
//! public      /health, /api/auth/login
//! protected   everything else under /api (Bearer JWT)
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub mod accounting;
pub mod auth;
pub mod catalog;
pub mod inventory;
pub mod notifications;
pub mod partners;
pub mod payments;
pub mod settings;
pub mod system;
pub mod tasks;
pub mod transactions;

/// Routes reachable without a token.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .route("/api/auth/login", post(auth::login))
}

/// Routes behind the `authenticate` middleware.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(auth::me))
        .merge(partners::router())
        .merge(catalog::router())
        .merge(inventory::router())
        .merge(transactions::router())
        .merge(accounting::router())
        .merge(payments::router())
        .merge(notifications::router())
        .merge(settings::router())
        .merge(tasks::router())
}
