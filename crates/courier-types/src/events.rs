use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, MessageStatus, Room};

/// Header carrying the shared secret on relay calls between processes.
pub const RELAY_SECRET_HEADER: &str = "x-relay-secret";

/// One entry in the in-memory event log, also the frame pushed to WebSocket
/// subscribers. Ids are assigned by the process-local transport and increase
/// monotonically; they are never persisted, so a restart resets the sequence
/// and long-poll clients resynchronize via the unknown-id path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub id: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ChatEventKind,
}

/// Notification payloads, one fixed shape per kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChatEventKind {
    /// A message was appended to a room. Carries the post-append room
    /// summary so subscribers need no follow-up read for unread counts.
    NewMessage { room: Room, message: Message },

    /// Room summary or moderation fields changed (mark-read, pin, mute,
    /// tags, status).
    RoomUpdate { room: Room },

    /// A message moved through its status state machine.
    MessageStatus {
        room_id: Uuid,
        message_id: Uuid,
        status: MessageStatus,
    },
}

impl ChatEventKind {
    /// The room this event belongs to. Subscribers of that room's group and
    /// of the all-rooms aggregate both receive it.
    pub fn room_id(&self) -> Uuid {
        match self {
            Self::NewMessage { room, .. } => room.id,
            Self::RoomUpdate { room } => room.id,
            Self::MessageStatus { room_id, .. } => *room_id,
        }
    }
}

/// Body of a cross-process relay call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub event: ChatEventKind,
    pub target: RelayTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "room_id", rename_all = "snake_case")]
pub enum RelayTarget {
    Room(Uuid),
    AllRooms,
}
