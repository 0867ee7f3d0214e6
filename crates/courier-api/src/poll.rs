use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use courier_types::api::PollResponse;

use crate::error::ApiError;
use crate::AppState;

/// Upper bound on a single long-poll wait; larger requests are clamped.
const MAX_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub last_event_id: Option<u64>,
    pub timeout_ms: Option<u64>,
}

/// Pull-fallback surface for clients without a live push connection. Blocks
/// until events newer than the cursor exist or the wait budget elapses; an
/// elapsed budget returns an empty list with the cursor unchanged.
pub async fn poll_events(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>, ApiError> {
    let transport = state
        .dispatcher
        .transport()
        .ok_or(ApiError::TransportUnavailable)?;

    let budget = query
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(MAX_WAIT)
        .min(MAX_WAIT);

    let events = transport.wait_for_events(query.last_event_id, budget).await;
    let last_event_id = events.last().map(|e| e.id).or(query.last_event_id);

    Ok(Json(PollResponse {
        events,
        last_event_id,
    }))
}
