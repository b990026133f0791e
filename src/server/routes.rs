//! Route definitions

use axum::{
    Router,
    routing::{get, post},
};

use super::{handlers, state::AppState};

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .with_state(state)
}
