//! # HTTP Surface
//!
//! Exposes the gateway to the browser chat page.
//!
//! - `POST /api/chat`: reply, correction and score for one turn
//! - `GET /health`: liveness plus the active provider

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use log::{info, warn};
use tokio::net::TcpListener;

pub use routes::create_router;
pub use state::AppState;

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C, graceful shutdown disabled: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
