pub mod auth;
mod state;
pub mod tasks;

use crate::config::AuthConfig;
use axum::{routing::get, Router};
use std::sync::Arc;

pub use auth::{AuthUser, LoginRequest, StartVerificationRequest, VerificationStarted, VerifyRequest};
pub use state::{AppState, Pool};

pub fn create_router(pool: Pool, auth: AuthConfig) -> Router {
    let state = AppState {
        pool: Arc::new(pool),
        auth: Arc::new(auth),
    };

    Router::new()
        .merge(auth::create_router())
        .merge(tasks::create_router())
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
