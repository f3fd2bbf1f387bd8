//! Server-Sent Events endpoint

use axum::{extract::State, response::IntoResponse};

use crate::AppState;

/// GET /events
///
/// Stage progress, cache invalidations and relay dispatches.
pub async fn event_stream(State(state): State<AppState>) -> impl IntoResponse {
    insights_common::sse::create_event_sse_stream("insights-reports", &state.event_bus)
}
