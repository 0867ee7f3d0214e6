use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::ChatEvent;
use crate::models::{MessageKind, RoomStatus};

// -- Rooms --

/// PATCH body for a room. Only supplied fields are merged; an all-empty
/// patch is rejected before any mutation.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoomRequest {
    pub is_pinned: Option<bool>,
    pub is_muted: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub status: Option<RoomStatus>,
}

impl UpdateRoomRequest {
    pub fn is_empty(&self) -> bool {
        self.is_pinned.is_none()
            && self.is_muted.is_none()
            && self.tags.is_none()
            && self.status.is_none()
    }
}

// -- Messages --

/// Agent-originated outbound message. Appended with status `sending`; the
/// outbound-send collaborator reports the external outcome afterwards via
/// the status endpoint.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub kind: MessageKind,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub sticker_id: Option<String>,
    pub sticker_package_id: Option<String>,
    pub sender_name: Option<String>,
    pub reply_to_id: Option<Uuid>,
}

/// Normalized inbound message handed over by the ingestion collaborator.
/// Wire-format parsing and media handling already happened upstream.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestMessageRequest {
    pub external_user_id: String,
    pub channel_token_id: Option<Uuid>,
    /// Profile refreshes for the room, overwritten when supplied.
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub status_message: Option<String>,
    pub external_message_id: Option<String>,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub sticker_id: Option<String>,
    pub sticker_package_id: Option<String>,
    pub sender_name: Option<String>,
    pub reply_to_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMessageStatusRequest {
    pub status: crate::models::MessageStatus,
}

// -- Quick replies --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuickReplyRequest {
    pub channel_token_id: Uuid,
    pub title: String,
    pub label: String,
    pub icon: Option<String>,
    pub attachments: Option<Vec<String>>,
    #[serde(default)]
    pub is_favorite: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuickReplyRequest {
    pub title: Option<String>,
    pub label: Option<String>,
    pub icon: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub is_favorite: Option<bool>,
}

// -- Long-poll --

#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub events: Vec<ChatEvent>,
    /// Cursor for the next poll: the id of the newest returned event, or the
    /// request's own cursor (possibly absent) when no events were returned.
    pub last_event_id: Option<u64>,
}
