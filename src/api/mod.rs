//! Read-only REST API over a finished dispatch run.
//!
//! Provides three GET endpoints:
//! - `/summary` — run span and run summary
//! - `/allocations` — per-tick allocation log with optional time filtering
//! - `/sessions` — session ledger as left by the run

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::error::Result;
use crate::runner::RunOutput;

/// Immutable application state shared across all request handlers.
///
/// Constructed once after the run completes and wrapped in `Arc`; all data
/// is read-only.
pub struct AppState {
    pub output: RunOutput,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/summary", get(handlers::get_summary))
        .route("/allocations", get(handlers::get_allocations))
        .route("/sessions", get(handlers::get_sessions))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process stops.
///
/// # Errors
///
/// Returns [`crate::error::DispatchError::Io`] if the listener cannot bind
/// or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
