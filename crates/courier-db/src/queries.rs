use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use uuid::Uuid;

use courier_types::api::{UpdateQuickReplyRequest, UpdateRoomRequest};
use courier_types::models::{
    Message, MessageKind, MessageStatus, QuickReply, Room, RoomFilter, RoomStatus, Sender,
};

use crate::error::{Result, StoreError};
use crate::Database;

const ROOM_COLS: &str = "id, external_user_id, channel_token_id, display_name, avatar_url, \
     status_message, last_message_at, unread_count, is_pinned, is_muted, tags, status, \
     created_at, updated_at";

const MESSAGE_COLS: &str = "id, room_id, external_message_id, kind, content, media_url, \
     sticker_id, sticker_package_id, sender, sender_name, status, reply_to_id, \
     created_at, updated_at";

const QUICK_REPLY_COLS: &str =
    "id, channel_token_id, title, label, icon, attachments, is_favorite, created_at, updated_at";

/// Channel-profile fields refreshed on room resolution. Only supplied fields
/// overwrite what the room already has.
#[derive(Debug, Default, Clone)]
pub struct RoomProfile {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub status_message: Option<String>,
}

impl RoomProfile {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_url.is_none() && self.status_message.is_none()
    }
}

/// Input to [`Database::append_message`]. Id and created_at are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
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
    pub reply_to_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewQuickReply {
    pub channel_token_id: Uuid,
    pub title: String,
    pub label: String,
    pub icon: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub is_favorite: bool,
}

impl Database {
    // -- Rooms --

    /// Return the room for (external_user_id, channel_token_id), creating it
    /// on first contact. The unique identity index is the arbiter under
    /// concurrent creation: an insert that loses the race re-reads the
    /// winner, so exactly one room ever results for a pair.
    pub fn resolve_room(
        &self,
        external_user_id: &str,
        channel_token_id: Option<Uuid>,
        profile: &RoomProfile,
    ) -> Result<Room> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let token = channel_token_id.map(|t| t.to_string());

            let room = match query_room_by_identity(&tx, external_user_id, token.as_deref())? {
                Some(existing) => {
                    if profile.is_empty() {
                        existing
                    } else {
                        refresh_profile(&tx, existing.id, profile)?;
                        query_room(&tx, existing.id)?.ok_or(StoreError::NotFound)?
                    }
                }
                None => {
                    let now = Utc::now();
                    let room = Room {
                        id: Uuid::new_v4(),
                        external_user_id: external_user_id.to_string(),
                        channel_token_id,
                        display_name: profile.display_name.clone().unwrap_or_default(),
                        avatar_url: profile.avatar_url.clone(),
                        status_message: profile.status_message.clone(),
                        last_message_at: None,
                        unread_count: 0,
                        is_pinned: false,
                        is_muted: false,
                        tags: Vec::new(),
                        status: RoomStatus::Active,
                        created_at: now,
                        updated_at: now,
                    };
                    match insert_room(&tx, &room) {
                        Ok(()) => room,
                        // Lost the creation race to another process; the
                        // existing record wins and stays unchanged.
                        Err(StoreError::Conflict) => {
                            query_room_by_identity(&tx, external_user_id, token.as_deref())?
                                .ok_or(StoreError::Conflict)?
                        }
                        Err(e) => return Err(e),
                    }
                }
            };

            tx.commit()?;
            Ok(room)
        })
    }

    pub fn get_room(&self, id: Uuid) -> Result<Room> {
        self.with_conn(|conn| query_room(conn, id)?.ok_or(StoreError::NotFound))
    }

    /// Rooms ordered pinned-first, then most recently active. `search` is a
    /// case-insensitive substring match on display_name.
    pub fn list_rooms(&self, filter: RoomFilter, search: Option<&str>) -> Result<Vec<Room>> {
        self.with_conn(|conn| {
            let clause = match filter {
                RoomFilter::All => "status NOT IN ('spam', 'cleared')",
                RoomFilter::Unread => "unread_count > 0",
                RoomFilter::Pinned => "is_pinned = 1",
                RoomFilter::Spam => "status = 'spam'",
                RoomFilter::Archived => "status = 'archived'",
                RoomFilter::Cleared => "status = 'cleared'",
            };

            let mut sql = format!("SELECT {ROOM_COLS} FROM rooms WHERE {clause}");
            if search.is_some() {
                sql.push_str(" AND instr(lower(display_name), lower(?1)) > 0");
            }
            sql.push_str(" ORDER BY is_pinned DESC, last_message_at DESC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = match search {
                Some(needle) => stmt.query_map(params![needle], row_to_room)?,
                None => stmt.query_map([], row_to_room)?,
            };

            let mut rooms = Vec::new();
            for row in rows {
                rooms.push(row?);
            }
            Ok(rooms)
        })
    }

    /// Merge the supplied moderation fields into a room. Emptiness of the
    /// patch is rejected at the API boundary before this runs.
    pub fn update_room(&self, id: Uuid, patch: &UpdateRoomRequest) -> Result<Room> {
        self.with_conn(|conn| {
            let mut sets = vec!["updated_at = ?1".to_string()];
            let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(ts(Utc::now()))];

            if let Some(pinned) = patch.is_pinned {
                sets.push(format!("is_pinned = ?{}", values.len() + 1));
                values.push(Box::new(pinned));
            }
            if let Some(muted) = patch.is_muted {
                sets.push(format!("is_muted = ?{}", values.len() + 1));
                values.push(Box::new(muted));
            }
            if let Some(tags) = &patch.tags {
                sets.push(format!("tags = ?{}", values.len() + 1));
                values.push(Box::new(serde_json::to_string(tags)?));
            }
            if let Some(status) = patch.status {
                sets.push(format!("status = ?{}", values.len() + 1));
                values.push(Box::new(status.as_str()));
            }

            let sql = format!(
                "UPDATE rooms SET {} WHERE id = ?{}",
                sets.join(", "),
                values.len() + 1
            );
            values.push(Box::new(id.to_string()));

            let affected = conn.execute(
                &sql,
                rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }

            query_room(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    // -- Messages --

    /// Append a message and fold it into the owning room's summary
    /// (last_message_at always; unread_count for customer messages) in one
    /// transaction, so no reader sees the summary ahead of the message.
    pub fn append_message(&self, new: &NewMessage) -> Result<(Room, Message)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if query_room(&tx, new.room_id)?.is_none() {
                return Err(StoreError::NotFound);
            }

            let now = Utc::now();
            let message = Message {
                id: Uuid::new_v4(),
                room_id: new.room_id,
                external_message_id: new.external_message_id.clone(),
                kind: new.kind,
                content: new.content.clone(),
                media_url: new.media_url.clone(),
                sticker_id: new.sticker_id.clone(),
                sticker_package_id: new.sticker_package_id.clone(),
                sender: new.sender,
                sender_name: new.sender_name.clone(),
                status: new.status,
                reply_to_id: new.reply_to_id,
                created_at: now,
                updated_at: now,
            };

            tx.execute(
                &format!("INSERT INTO messages ({MESSAGE_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
                params![
                    message.id.to_string(),
                    message.room_id.to_string(),
                    message.external_message_id,
                    message.kind.as_str(),
                    message.content,
                    message.media_url,
                    message.sticker_id,
                    message.sticker_package_id,
                    message.sender.as_str(),
                    message.sender_name,
                    message.status.as_str(),
                    message.reply_to_id.map(|r| r.to_string()),
                    ts(message.created_at),
                    ts(message.updated_at),
                ],
            )?;

            let inbound = i64::from(message.sender == Sender::Customer);
            tx.execute(
                "UPDATE rooms
                 SET last_message_at = ?1, updated_at = ?1, unread_count = unread_count + ?2
                 WHERE id = ?3",
                params![ts(now), inbound, message.room_id.to_string()],
            )?;

            let room = query_room(&tx, message.room_id)?.ok_or(StoreError::NotFound)?;
            tx.commit()?;
            Ok((room, message))
        })
    }

    /// At most `limit` messages of a room, strictly older than `before` when
    /// given, returned oldest→newest.
    pub fn list_messages(
        &self,
        room_id: Uuid,
        limit: u32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            if query_room(conn, room_id)?.is_none() {
                return Err(StoreError::NotFound);
            }

            let mut sql = format!("SELECT {MESSAGE_COLS} FROM messages WHERE room_id = ?1");
            if before.is_some() {
                sql.push_str(" AND created_at < ?3");
            }
            sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?2");

            let mut stmt = conn.prepare(&sql)?;
            let rows = match before {
                Some(cursor) => stmt.query_map(
                    params![room_id.to_string(), limit, ts(cursor)],
                    row_to_message,
                )?,
                None => stmt.query_map(params![room_id.to_string(), limit], row_to_message)?,
            };

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            // Queried newest-first to honor the limit; callers read history
            // in chronological order.
            messages.reverse();
            Ok(messages)
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Message> {
        self.with_conn(|conn| query_message(conn, id)?.ok_or(StoreError::NotFound))
    }

    /// Advance a message through its state machine. Illegal edges are
    /// rejected without mutation.
    pub fn update_message_status(&self, id: Uuid, next: MessageStatus) -> Result<Message> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut message = query_message(&tx, id)?.ok_or(StoreError::NotFound)?;
            if !message.status.can_advance(next) {
                return Err(StoreError::InvalidTransition {
                    from: message.status,
                    to: next,
                });
            }

            let now = Utc::now();
            tx.execute(
                "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![next.as_str(), ts(now), id.to_string()],
            )?;
            tx.commit()?;

            message.status = next;
            message.updated_at = now;
            Ok(message)
        })
    }

    /// Read-receipt engine: flip every unread customer message of the room
    /// to `read` and zero the room's unread_count, atomically. Idempotent —
    /// a second call finds nothing to change and writes nothing.
    pub fn mark_room_read(&self, room_id: Uuid) -> Result<Room> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut room = query_room(&tx, room_id)?.ok_or(StoreError::NotFound)?;
            let now = Utc::now();

            let flipped = tx.execute(
                "UPDATE messages SET status = 'read', updated_at = ?1
                 WHERE room_id = ?2 AND sender = 'customer' AND status <> 'read'",
                params![ts(now), room_id.to_string()],
            )?;

            if flipped > 0 || room.unread_count > 0 {
                tx.execute(
                    "UPDATE rooms SET unread_count = 0, updated_at = ?1 WHERE id = ?2",
                    params![ts(now), room_id.to_string()],
                )?;
                room = query_room(&tx, room_id)?.ok_or(StoreError::NotFound)?;
            }

            tx.commit()?;
            Ok(room)
        })
    }

    /// Ground truth for the unread invariant: customer messages not yet read.
    pub fn count_unread(&self, room_id: Uuid) -> Result<u32> {
        self.with_conn(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE room_id = ?1 AND sender = 'customer' AND status <> 'read'",
                params![room_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Quick replies --

    pub fn create_quick_reply(&self, new: &NewQuickReply) -> Result<QuickReply> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let reply = QuickReply {
                id: Uuid::new_v4(),
                channel_token_id: new.channel_token_id,
                title: new.title.clone(),
                label: new.label.clone(),
                icon: new.icon.clone(),
                attachments: new.attachments.clone(),
                is_favorite: new.is_favorite,
                created_at: now,
                updated_at: now,
            };

            let attachments = reply
                .attachments
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            conn.execute(
                &format!("INSERT INTO quick_replies ({QUICK_REPLY_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    reply.id.to_string(),
                    reply.channel_token_id.to_string(),
                    reply.title,
                    reply.label,
                    reply.icon,
                    attachments,
                    reply.is_favorite,
                    ts(reply.created_at),
                    ts(reply.updated_at),
                ],
            )?;
            Ok(reply)
        })
    }

    /// Newest-first; no token returns the whole catalog.
    pub fn list_quick_replies(&self, channel_token_id: Option<Uuid>) -> Result<Vec<QuickReply>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {QUICK_REPLY_COLS} FROM quick_replies");
            if channel_token_id.is_some() {
                sql.push_str(" WHERE channel_token_id = ?1");
            }
            sql.push_str(" ORDER BY created_at DESC, id DESC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = match channel_token_id {
                Some(token) => stmt.query_map(params![token.to_string()], row_to_quick_reply)?,
                None => stmt.query_map([], row_to_quick_reply)?,
            };

            let mut replies = Vec::new();
            for row in rows {
                replies.push(row?);
            }
            Ok(replies)
        })
    }

    pub fn update_quick_reply(
        &self,
        id: Uuid,
        patch: &UpdateQuickReplyRequest,
    ) -> Result<QuickReply> {
        self.with_conn(|conn| {
            let mut sets = vec!["updated_at = ?1".to_string()];
            let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(ts(Utc::now()))];

            if let Some(title) = &patch.title {
                sets.push(format!("title = ?{}", values.len() + 1));
                values.push(Box::new(title.clone()));
            }
            if let Some(label) = &patch.label {
                sets.push(format!("label = ?{}", values.len() + 1));
                values.push(Box::new(label.clone()));
            }
            if let Some(icon) = &patch.icon {
                sets.push(format!("icon = ?{}", values.len() + 1));
                values.push(Box::new(icon.clone()));
            }
            if let Some(attachments) = &patch.attachments {
                sets.push(format!("attachments = ?{}", values.len() + 1));
                values.push(Box::new(serde_json::to_string(attachments)?));
            }
            if let Some(favorite) = patch.is_favorite {
                sets.push(format!("is_favorite = ?{}", values.len() + 1));
                values.push(Box::new(favorite));
            }

            let sql = format!(
                "UPDATE quick_replies SET {} WHERE id = ?{}",
                sets.join(", "),
                values.len() + 1
            );
            values.push(Box::new(id.to_string()));

            let affected = conn.execute(
                &sql,
                rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }

            query_quick_reply(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    pub fn delete_quick_reply(&self, id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM quick_replies WHERE id = ?1",
                params![id.to_string()],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

// -- Row helpers --

/// Fixed-width RFC 3339 UTC so lexicographic order matches chronological
/// order in SQL comparisons.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conv_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conv_err(idx, e))
}

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conv_err(idx, e))
}

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    let id: String = row.get(0)?;
    let channel_token_id: Option<String> = row.get(2)?;
    let last_message_at: Option<String> = row.get(6)?;
    let unread_count: i64 = row.get(7)?;
    let tags: String = row.get(10)?;
    let status: String = row.get(11)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Room {
        id: parse_uuid(0, &id)?,
        external_user_id: row.get(1)?,
        channel_token_id: channel_token_id
            .map(|t| parse_uuid(2, &t))
            .transpose()?,
        display_name: row.get(3)?,
        avatar_url: row.get(4)?,
        status_message: row.get(5)?,
        last_message_at: last_message_at.map(|t| parse_ts(6, &t)).transpose()?,
        unread_count: unread_count.max(0) as u32,
        is_pinned: row.get(8)?,
        is_muted: row.get(9)?,
        tags: serde_json::from_str(&tags).map_err(|e| conv_err(10, e))?,
        status: status.parse::<RoomStatus>().map_err(|e| conv_err(11, e))?,
        created_at: parse_ts(12, &created_at)?,
        updated_at: parse_ts(13, &updated_at)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let room_id: String = row.get(1)?;
    let kind: String = row.get(3)?;
    let sender: String = row.get(8)?;
    let status: String = row.get(10)?;
    let reply_to_id: Option<String> = row.get(11)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Message {
        id: parse_uuid(0, &id)?,
        room_id: parse_uuid(1, &room_id)?,
        external_message_id: row.get(2)?,
        kind: kind.parse::<MessageKind>().map_err(|e| conv_err(3, e))?,
        content: row.get(4)?,
        media_url: row.get(5)?,
        sticker_id: row.get(6)?,
        sticker_package_id: row.get(7)?,
        sender: sender.parse::<Sender>().map_err(|e| conv_err(8, e))?,
        sender_name: row.get(9)?,
        status: status.parse::<MessageStatus>().map_err(|e| conv_err(10, e))?,
        reply_to_id: reply_to_id.map(|r| parse_uuid(11, &r)).transpose()?,
        created_at: parse_ts(12, &created_at)?,
        updated_at: parse_ts(13, &updated_at)?,
    })
}

fn row_to_quick_reply(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuickReply> {
    let id: String = row.get(0)?;
    let channel_token_id: String = row.get(1)?;
    let attachments: Option<String> = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(QuickReply {
        id: parse_uuid(0, &id)?,
        channel_token_id: parse_uuid(1, &channel_token_id)?,
        title: row.get(2)?,
        label: row.get(3)?,
        icon: row.get(4)?,
        attachments: attachments
            .map(|a| serde_json::from_str(&a).map_err(|e| conv_err(5, e)))
            .transpose()?,
        is_favorite: row.get(6)?,
        created_at: parse_ts(7, &created_at)?,
        updated_at: parse_ts(8, &updated_at)?,
    })
}

fn query_room(conn: &Connection, id: Uuid) -> Result<Option<Room>> {
    let mut stmt = conn.prepare(&format!("SELECT {ROOM_COLS} FROM rooms WHERE id = ?1"))?;
    Ok(stmt
        .query_row(params![id.to_string()], row_to_room)
        .optional()?)
}

fn query_room_by_identity(
    conn: &Connection,
    external_user_id: &str,
    channel_token_id: Option<&str>,
) -> Result<Option<Room>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ROOM_COLS} FROM rooms
         WHERE external_user_id = ?1 AND COALESCE(channel_token_id, '') = COALESCE(?2, '')"
    ))?;
    Ok(stmt
        .query_row(params![external_user_id, channel_token_id], row_to_room)
        .optional()?)
}

fn query_message(conn: &Connection, id: Uuid) -> Result<Option<Message>> {
    let mut stmt = conn.prepare(&format!("SELECT {MESSAGE_COLS} FROM messages WHERE id = ?1"))?;
    Ok(stmt
        .query_row(params![id.to_string()], row_to_message)
        .optional()?)
}

fn query_quick_reply(conn: &Connection, id: Uuid) -> Result<Option<QuickReply>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {QUICK_REPLY_COLS} FROM quick_replies WHERE id = ?1"
    ))?;
    Ok(stmt
        .query_row(params![id.to_string()], row_to_quick_reply)
        .optional()?)
}

fn insert_room(conn: &Connection, room: &Room) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO rooms ({ROOM_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
        params![
            room.id.to_string(),
            room.external_user_id,
            room.channel_token_id.map(|t| t.to_string()),
            room.display_name,
            room.avatar_url,
            room.status_message,
            room.last_message_at.map(ts),
            room.unread_count,
            room.is_pinned,
            room.is_muted,
            serde_json::to_string(&room.tags)?,
            room.status.as_str(),
            ts(room.created_at),
            ts(room.updated_at),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict
        }
        other => StoreError::Sqlite(other),
    })?;
    Ok(())
}

fn refresh_profile(conn: &Connection, id: Uuid, profile: &RoomProfile) -> Result<()> {
    conn.execute(
        "UPDATE rooms SET
             display_name = COALESCE(?1, display_name),
             avatar_url = COALESCE(?2, avatar_url),
             status_message = COALESCE(?3, status_message),
             updated_at = ?4
         WHERE id = ?5",
        params![
            profile.display_name,
            profile.avatar_url,
            profile.status_message,
            ts(Utc::now()),
            id.to_string(),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn named(name: &str) -> RoomProfile {
        RoomProfile {
            display_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn inbound_text(room_id: Uuid, content: &str) -> NewMessage {
        NewMessage {
            room_id,
            external_message_id: None,
            kind: MessageKind::Text,
            content: Some(content.to_string()),
            media_url: None,
            sticker_id: None,
            sticker_package_id: None,
            sender: Sender::Customer,
            sender_name: None,
            status: MessageStatus::Sent,
            reply_to_id: None,
        }
    }

    fn outbound_text(room_id: Uuid, content: &str) -> NewMessage {
        NewMessage {
            sender: Sender::Agent,
            status: MessageStatus::Sending,
            ..inbound_text(room_id, content)
        }
    }

    #[test]
    fn resolve_dedupes_per_pair() {
        let db = db();
        let token = Uuid::new_v4();

        let first = db
            .resolve_room("U1", Some(token), &RoomProfile::default())
            .unwrap();
        let second = db
            .resolve_room("U1", Some(token), &RoomProfile::default())
            .unwrap();
        assert_eq!(first.id, second.id);

        // NULL tokens dedupe too.
        let a = db.resolve_room("U2", None, &RoomProfile::default()).unwrap();
        let b = db.resolve_room("U2", None, &RoomProfile::default()).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn distinct_tokens_get_distinct_rooms() {
        let db = db();
        let a = db
            .resolve_room("U1", Some(Uuid::new_v4()), &RoomProfile::default())
            .unwrap();
        let b = db
            .resolve_room("U1", Some(Uuid::new_v4()), &RoomProfile::default())
            .unwrap();
        let c = db.resolve_room("U1", None, &RoomProfile::default()).unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn duplicate_insert_surfaces_conflict() {
        let db = db();
        let existing = db
            .resolve_room("U1", None, &RoomProfile::default())
            .unwrap();

        let dup = Room {
            id: Uuid::new_v4(),
            ..existing.clone()
        };
        let err = db.with_conn(|conn| insert_room(conn, &dup)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        // Existing record unchanged.
        assert_eq!(db.get_room(existing.id).unwrap().id, existing.id);
    }

    #[test]
    fn resolve_refreshes_profile_fields() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();
        assert_eq!(room.display_name, "Dana");

        let room = db.resolve_room("U1", None, &named("Dana K.")).unwrap();
        assert_eq!(room.display_name, "Dana K.");

        // Absent fields are left alone.
        let room = db
            .resolve_room("U1", None, &RoomProfile::default())
            .unwrap();
        assert_eq!(room.display_name, "Dana K.");
    }

    #[test]
    fn inbound_message_updates_summary() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();

        let (room, message) = db.append_message(&inbound_text(room.id, "Hi")).unwrap();
        assert_eq!(room.unread_count, 1);
        assert_eq!(room.last_message_at, Some(message.created_at));
        assert_eq!(db.count_unread(room.id).unwrap(), 1);
    }

    #[test]
    fn agent_message_does_not_touch_unread() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();

        let (room, message) = db.append_message(&outbound_text(room.id, "Hello!")).unwrap();
        assert_eq!(room.unread_count, 0);
        assert_eq!(room.last_message_at, Some(message.created_at));
        assert_eq!(message.status, MessageStatus::Sending);
    }

    #[test]
    fn append_to_unknown_room_is_not_found() {
        let db = db();
        let err = db
            .append_message(&inbound_text(Uuid::new_v4(), "hi"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn append_then_list_round_trip() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();
        let (_, message) = db.append_message(&inbound_text(room.id, "Hi")).unwrap();

        let listed = db.list_messages(room.id, 50, None).unwrap();
        assert!(listed.iter().any(|m| m.id == message.id));
    }

    #[test]
    fn listing_is_chronological_and_paginated() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();

        for i in 0..5 {
            db.append_message(&inbound_text(room.id, &format!("m{i}")))
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let all = db.list_messages(room.id, 50, None).unwrap();
        assert_eq!(all.len(), 5);
        for pair in all.windows(2) {
            assert!((pair[0].created_at, pair[0].id) < (pair[1].created_at, pair[1].id));
        }

        // Most recent two.
        let page = db.list_messages(room.id, 2, None).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[1].id, all[4].id);

        // Strictly older than the cursor.
        let older = db
            .list_messages(room.id, 50, Some(page[0].created_at))
            .unwrap();
        assert_eq!(older.len(), 3);
        assert!(older.iter().all(|m| m.created_at < page[0].created_at));
    }

    #[test]
    fn mark_read_flips_messages_and_counter() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();
        let (_, message) = db.append_message(&inbound_text(room.id, "Hi")).unwrap();
        db.append_message(&inbound_text(room.id, "Anyone there?"))
            .unwrap();

        let room = db.mark_room_read(room.id).unwrap();
        assert_eq!(room.unread_count, 0);
        assert_eq!(db.count_unread(room.id).unwrap(), 0);
        assert_eq!(
            db.get_message(message.id).unwrap().status,
            MessageStatus::Read
        );
    }

    #[test]
    fn mark_read_is_idempotent() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();
        db.append_message(&inbound_text(room.id, "Hi")).unwrap();

        let first = db.mark_room_read(room.id).unwrap();
        let second = db.mark_room_read(room.id).unwrap();
        assert_eq!(first.unread_count, 0);
        assert_eq!(second.unread_count, 0);
        // Second pass wrote nothing, not even updated_at.
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[test]
    fn mark_read_leaves_agent_messages_alone() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();
        let (_, sent) = db.append_message(&outbound_text(room.id, "Hello")).unwrap();

        db.mark_room_read(room.id).unwrap();
        assert_eq!(
            db.get_message(sent.id).unwrap().status,
            MessageStatus::Sending
        );
    }

    #[test]
    fn status_transitions_follow_the_state_machine() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();
        let (_, message) = db.append_message(&outbound_text(room.id, "Hello")).unwrap();

        let message = db
            .update_message_status(message.id, MessageStatus::Sent)
            .unwrap();
        assert_eq!(message.status, MessageStatus::Sent);

        // Channels without delivery confirmation jump straight to read.
        let message = db
            .update_message_status(message.id, MessageStatus::Read)
            .unwrap();
        assert_eq!(message.status, MessageStatus::Read);

        let err = db
            .update_message_status(message.id, MessageStatus::Delivered)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(
            db.get_message(message.id).unwrap().status,
            MessageStatus::Read
        );
    }

    #[test]
    fn failed_messages_stay_failed() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();
        let (_, message) = db.append_message(&outbound_text(room.id, "Hello")).unwrap();

        db.update_message_status(message.id, MessageStatus::Failed)
            .unwrap();
        let err = db
            .update_message_status(message.id, MessageStatus::Sent)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn unknown_message_status_update_is_not_found() {
        let db = db();
        let err = db
            .update_message_status(Uuid::new_v4(), MessageStatus::Sent)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn room_listing_order_and_default_filter() {
        let db = db();
        let spam = db.resolve_room("U1", None, &named("Spammy")).unwrap();
        let quiet = db.resolve_room("U2", None, &named("Quiet")).unwrap();
        let busy = db.resolve_room("U3", None, &named("Busy")).unwrap();
        let pinned = db.resolve_room("U4", None, &named("Pinned")).unwrap();

        db.update_room(
            spam.id,
            &UpdateRoomRequest {
                status: Some(RoomStatus::Spam),
                ..Default::default()
            },
        )
        .unwrap();
        db.update_room(
            pinned.id,
            &UpdateRoomRequest {
                is_pinned: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        db.append_message(&inbound_text(quiet.id, "a")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        db.append_message(&inbound_text(busy.id, "b")).unwrap();

        let listed = db.list_rooms(RoomFilter::All, None).unwrap();
        let names: Vec<&str> = listed.iter().map(|r| r.display_name.as_str()).collect();
        // Pinned first, then most recently active; spam hidden by default.
        assert_eq!(names, vec!["Pinned", "Busy", "Quiet"]);

        let spam_only = db.list_rooms(RoomFilter::Spam, None).unwrap();
        assert_eq!(spam_only.len(), 1);
        assert_eq!(spam_only[0].id, spam.id);

        let unread = db.list_rooms(RoomFilter::Unread, None).unwrap();
        assert_eq!(unread.len(), 2);
    }

    #[test]
    fn room_search_matches_substring() {
        let db = db();
        db.resolve_room("U1", None, &named("Dana Keller")).unwrap();
        db.resolve_room("U2", None, &named("Ben")).unwrap();

        let hits = db.list_rooms(RoomFilter::All, Some("ana k")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "Dana Keller");

        let none = db.list_rooms(RoomFilter::All, Some("zzz")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn update_room_merges_only_supplied_fields() {
        let db = db();
        let room = db.resolve_room("U1", None, &named("Dana")).unwrap();

        let room = db
            .update_room(
                room.id,
                &UpdateRoomRequest {
                    is_muted: Some(true),
                    tags: Some(vec!["vip".into(), "billing".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(room.is_muted);
        assert!(!room.is_pinned);
        assert_eq!(room.tags, vec!["vip", "billing"]);
        assert_eq!(room.status, RoomStatus::Active);

        let err = db
            .update_room(Uuid::new_v4(), &UpdateRoomRequest::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn quick_reply_crud() {
        let db = db();
        let token = Uuid::new_v4();

        let greeting = db
            .create_quick_reply(&NewQuickReply {
                channel_token_id: token,
                title: "Greeting".into(),
                label: "Hi! How can we help?".into(),
                icon: None,
                attachments: None,
                is_favorite: false,
            })
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let hours = db
            .create_quick_reply(&NewQuickReply {
                channel_token_id: token,
                title: "Hours".into(),
                label: "We are open 9-17 CET.".into(),
                icon: Some("clock".into()),
                attachments: Some(vec!["hours.pdf".into()]),
                is_favorite: true,
            })
            .unwrap();

        // Newest first.
        let listed = db.list_quick_replies(Some(token)).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, hours.id);
        assert_eq!(listed[0].attachments.as_deref(), Some(&["hours.pdf".to_string()][..]));

        // Scoped to the token.
        assert!(db
            .list_quick_replies(Some(Uuid::new_v4()))
            .unwrap()
            .is_empty());

        let updated = db
            .update_quick_reply(
                greeting.id,
                &UpdateQuickReplyRequest {
                    label: Some("Welcome!".into()),
                    is_favorite: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.label, "Welcome!");
        assert!(updated.is_favorite);
        assert_eq!(updated.title, "Greeting");

        db.delete_quick_reply(greeting.id).unwrap();
        let err = db.delete_quick_reply(greeting.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        let err = db
            .update_quick_reply(greeting.id, &UpdateQuickReplyRequest::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.db");

        let room_id = {
            let db = Database::open(&path).unwrap();
            let room = db.resolve_room("U1", None, &named("Dana")).unwrap();
            db.append_message(&inbound_text(room.id, "Hi")).unwrap();
            room.id
        };

        let db = Database::open(&path).unwrap();
        let room = db.get_room(room_id).unwrap();
        assert_eq!(room.unread_count, 1);
        assert_eq!(db.list_messages(room_id, 10, None).unwrap().len(), 1);
    }
}
