//! Application state shared across handlers

use std::sync::Arc;

use crate::core::gateway::Gateway;

/// Shared application state. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Pass backend error messages through to the caller.
    pub expose_error_details: bool,
}

impl AppState {
    pub fn new(gateway: Gateway, expose_error_details: bool) -> Self {
        Self {
            gateway: Arc::new(gateway),
            expose_error_details,
        }
    }
}
