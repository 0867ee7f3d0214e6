use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use courier_types::api::UpdateRoomRequest;
use courier_types::models::{Room, RoomFilter};

use crate::error::ApiError;
use crate::{blocking, AppState};

#[derive(Debug, Deserialize)]
pub struct RoomsQuery {
    #[serde(default)]
    pub filter: RoomFilter,
    pub search: Option<String>,
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<RoomsQuery>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let rooms = blocking(&state, move |db| {
        db.list_rooms(query.filter, query.search.as_deref())
    })
    .await?;
    Ok(Json(rooms))
}

pub async fn update_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(patch): Json<UpdateRoomRequest>,
) -> Result<Json<Room>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::Validation("empty room patch".into()));
    }

    let room = blocking(&state, move |db| db.update_room(room_id, &patch)).await?;
    state.dispatcher.notify_room_update(&room);
    Ok(Json(room))
}

/// Read-receipt endpoint: flips the room's unread customer messages to
/// `read` and zeroes the counter in one transaction, then notifies.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Room>, ApiError> {
    let room = blocking(&state, move |db| db.mark_room_read(room_id)).await?;
    state.dispatcher.notify_room_update(&room);
    Ok(Json(room))
}
