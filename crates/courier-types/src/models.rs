use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A string column held a value no enum variant maps to.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized {field} value: {value}")]
pub struct UnknownCode {
    pub field: &'static str,
    pub value: String,
}

/// One conversation thread: one external end-user on one channel token.
///
/// Exactly one room exists per (external_user_id, channel_token_id) pair.
/// Rooms are created on first inbound contact and never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub external_user_id: String,
    pub channel_token_id: Option<Uuid>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub status_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: u32,
    pub is_pinned: bool,
    pub is_muted: bool,
    pub tags: Vec<String>,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Active,
    Archived,
    Blocked,
    Spam,
    Cleared,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Blocked => "blocked",
            Self::Spam => "spam",
            Self::Cleared => "cleared",
        }
    }
}

impl FromStr for RoomStatus {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "blocked" => Ok(Self::Blocked),
            "spam" => Ok(Self::Spam),
            "cleared" => Ok(Self::Cleared),
            other => Err(UnknownCode {
                field: "room status",
                value: other.to_string(),
            }),
        }
    }
}

/// Room list filter. `All` excludes spam and cleared rooms; the other
/// variants select exactly what they name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomFilter {
    #[default]
    All,
    Unread,
    Pinned,
    Spam,
    Archived,
    Cleared,
}

/// One chat message. Append-only; the ordering key is (created_at, id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub external_message_id: Option<String>,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub sticker_id: Option<String>,
    pub sticker_package_id: Option<String>,
    pub sender: Sender,
    pub sender_name: Option<String>,
    pub status: MessageStatus,
    /// Weak reference to another message in the same room. Relation only —
    /// the target may no longer be in the visible window.
    pub reply_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Sticker,
    Video,
    Audio,
    File,
    Location,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Sticker => "sticker",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
            Self::Location => "location",
        }
    }
}

impl FromStr for MessageKind {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "sticker" => Ok(Self::Sticker),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "file" => Ok(Self::File),
            "location" => Ok(Self::Location),
            other => Err(UnknownCode {
                field: "message kind",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Customer,
    Agent,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
        }
    }
}

impl FromStr for Sender {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "agent" => Ok(Self::Agent),
            other => Err(UnknownCode {
                field: "sender",
                value: other.to_string(),
            }),
        }
    }
}

/// Message delivery state machine.
///
/// `sending → sent → delivered → read`, with `failed` reachable from
/// `sending` or `sent`. `delivered` is channel-dependent and may be skipped
/// entirely (`sent → read` is a legal edge). `read` and `failed` are
/// terminal; failed messages are retained for audit and never auto-retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_advance(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Sending, Sent)
                | (Sending, Failed)
                | (Sent, Delivered)
                | (Sent, Read)
                | (Sent, Failed)
                | (Delivered, Read)
        )
    }
}

impl FromStr for MessageStatus {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownCode {
                field: "message status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent-facing canned reply template, scoped to one channel token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickReply {
    pub id: Uuid,
    pub channel_token_id: Uuid,
    pub title: String,
    pub label: String,
    pub icon: Option<String>,
    /// Ordered attachment tokens; omitted when the reply has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
