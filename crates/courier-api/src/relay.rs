use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::debug;

use courier_types::events::{RelayEnvelope, RELAY_SECRET_HEADER};

use crate::error::ApiError;
use crate::AppState;

/// Relay surface: a producer process without a local push transport forwards
/// events here. The shared secret is checked before anything else — a
/// mismatch appends nothing and dispatches nothing. A process that hosts no
/// transport itself answers 503; the producer logs that and moves on.
pub async fn relay_dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(envelope): Json<RelayEnvelope>,
) -> Result<StatusCode, ApiError> {
    let presented = headers
        .get(RELAY_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::RelayAuth)?;
    if state.relay_secret.is_empty() || presented != state.relay_secret {
        return Err(ApiError::RelayAuth);
    }

    let transport = state
        .dispatcher
        .transport()
        .ok_or(ApiError::TransportUnavailable)?;

    let event = transport.publish_scoped(envelope.event, envelope.target);
    debug!("relayed event {} accepted", event.id);
    Ok(StatusCode::NO_CONTENT)
}
