//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{AllocationQuery, AllocationRecord, ErrorResponse, SummaryResponse};
use crate::data::Session;

/// `GET /summary` → 200 + `SummaryResponse` JSON
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    let out = &state.output;
    Json(SummaryResponse {
        start: out.start,
        end: out.end,
        summary: out.summary.clone(),
    })
}

/// Returns logged ticks, optionally filtered by tick time.
///
/// `GET /allocations` → 200 + `Vec<AllocationRecord>` JSON
/// `GET /allocations?from=T1&to=T2` → ticks in `[T1, T2]`
/// `GET /allocations?from=T2&to=T1` with `T2 > T1` → 400 + `ErrorResponse`
pub async fn get_allocations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AllocationQuery>,
) -> impl IntoResponse {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("`from` ({from}) must be <= `to` ({to})"),
                }),
            ));
        }
    }

    let records: Vec<AllocationRecord> = state
        .output
        .logs
        .iter()
        .filter(|e| query.from.is_none_or(|from| e.timestamp >= from))
        .filter(|e| query.to.is_none_or(|to| e.timestamp <= to))
        .map(AllocationRecord::from)
        .collect();

    Ok(Json(records))
}

/// `GET /sessions` → 200 + `Vec<Session>` JSON
pub async fn get_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<Session>> {
    Json(state.output.sessions.clone())
}
