use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS rooms (
            id                  TEXT PRIMARY KEY,
            external_user_id    TEXT NOT NULL,
            channel_token_id    TEXT,
            display_name        TEXT NOT NULL DEFAULT '',
            avatar_url          TEXT,
            status_message      TEXT,
            last_message_at     TEXT,
            unread_count        INTEGER NOT NULL DEFAULT 0 CHECK (unread_count >= 0),
            is_pinned           INTEGER NOT NULL DEFAULT 0,
            is_muted            INTEGER NOT NULL DEFAULT 0,
            tags                TEXT NOT NULL DEFAULT '[]',
            status              TEXT NOT NULL DEFAULT 'active',
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        -- One room per (user, token) pair. COALESCE folds NULL tokens into a
        -- single key; plain UNIQUE would treat every NULL as distinct.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_rooms_identity
            ON rooms(external_user_id, COALESCE(channel_token_id, ''));

        CREATE INDEX IF NOT EXISTS idx_rooms_ordering
            ON rooms(is_pinned, last_message_at);

        CREATE TABLE IF NOT EXISTS messages (
            id                  TEXT PRIMARY KEY,
            room_id             TEXT NOT NULL REFERENCES rooms(id),
            external_message_id TEXT,
            kind                TEXT NOT NULL,
            content             TEXT,
            media_url           TEXT,
            sticker_id          TEXT,
            sticker_package_id  TEXT,
            sender              TEXT NOT NULL,
            sender_name         TEXT,
            status              TEXT NOT NULL,
            reply_to_id         TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room_id, created_at, id);

        CREATE INDEX IF NOT EXISTS idx_messages_room_unread
            ON messages(room_id, sender, status);

        CREATE TABLE IF NOT EXISTS quick_replies (
            id                  TEXT PRIMARY KEY,
            channel_token_id    TEXT NOT NULL,
            title               TEXT NOT NULL,
            label               TEXT NOT NULL,
            icon                TEXT,
            attachments         TEXT,
            is_favorite         INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_quick_replies_token
            ON quick_replies(channel_token_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
