use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use courier_db::{NewMessage, RoomProfile};
use courier_types::api::{IngestMessageRequest, SendMessageRequest, UpdateMessageStatusRequest};
use courier_types::models::{Message, MessageStatus, Sender};

use crate::error::ApiError;
use crate::{blocking, AppState};

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination — pass the `created_at` of the oldest message
    /// from the previous page to fetch older history.
    pub before: Option<DateTime<Utc>>,
}

fn default_limit() -> u32 {
    50
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let limit = query.limit.min(200);
    let messages = blocking(&state, move |db| {
        db.list_messages(room_id, limit, query.before)
    })
    .await?;
    Ok(Json(messages))
}

/// Agent outbound send. The message is appended as `sending`; the
/// outbound-send collaborator owns the external channel call and reports
/// `sent`/`failed` through [`update_message_status`].
pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let new = NewMessage {
        room_id,
        external_message_id: None,
        kind: req.kind,
        content: req.content,
        media_url: req.media_url,
        sticker_id: req.sticker_id,
        sticker_package_id: req.sticker_package_id,
        sender: Sender::Agent,
        sender_name: req.sender_name,
        status: MessageStatus::Sending,
        reply_to_id: req.reply_to_id,
    };

    let (room, message) = blocking(&state, move |db| db.append_message(&new)).await?;
    state.dispatcher.notify_new_message(&room, &message);
    Ok((StatusCode::CREATED, Json(message)))
}

/// Inbound path for the ingestion collaborator: resolve the room for the
/// (user, token) pair, append the normalized message, notify. The append
/// never fails because of notification problems.
pub async fn ingest_message(
    State(state): State<AppState>,
    Json(req): Json<IngestMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    if req.external_user_id.is_empty() {
        return Err(ApiError::Validation("external_user_id is required".into()));
    }

    let (room, message) = blocking(&state, move |db| {
        let profile = RoomProfile {
            display_name: req.display_name,
            avatar_url: req.avatar_url,
            status_message: req.status_message,
        };
        let room = db.resolve_room(&req.external_user_id, req.channel_token_id, &profile)?;
        db.append_message(&NewMessage {
            room_id: room.id,
            external_message_id: req.external_message_id,
            kind: req.kind,
            content: req.content,
            media_url: req.media_url,
            sticker_id: req.sticker_id,
            sticker_package_id: req.sticker_package_id,
            sender: Sender::Customer,
            sender_name: req.sender_name,
            status: MessageStatus::Sent,
            reply_to_id: req.reply_to_id,
        })
    })
    .await?;

    state.dispatcher.notify_new_message(&room, &message);
    Ok((StatusCode::CREATED, Json(message)))
}

/// The outbound-send collaborator maps the external API outcome onto the
/// state machine (`sent`, best-effort `delivered`, or `failed`).
pub async fn update_message_status(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<UpdateMessageStatusRequest>,
) -> Result<Json<Message>, ApiError> {
    let message = blocking(&state, move |db| {
        db.update_message_status(message_id, req.status)
    })
    .await?;
    state.dispatcher.notify_message_status(&message);
    Ok(Json(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use courier_db::Database;
    use courier_gateway::dispatcher::Dispatcher;
    use courier_gateway::transport::Transport;
    use courier_types::events::ChatEventKind;
    use courier_types::models::MessageKind;

    use crate::AppStateInner;

    fn state_with_transport() -> (AppState, Transport) {
        let transport = Transport::new();
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            dispatcher: Dispatcher::new(Some(transport.clone()), None),
            relay_secret: "test-secret".into(),
        });
        (state, transport)
    }

    fn ingest_request(user: &str, content: &str) -> IngestMessageRequest {
        IngestMessageRequest {
            external_user_id: user.into(),
            channel_token_id: None,
            display_name: Some("Dana".into()),
            avatar_url: None,
            status_message: None,
            external_message_id: None,
            kind: MessageKind::Text,
            content: Some(content.into()),
            media_url: None,
            sticker_id: None,
            sticker_package_id: None,
            sender_name: None,
            reply_to_id: None,
        }
    }

    #[tokio::test]
    async fn ingest_persists_and_publishes() {
        let (state, transport) = state_with_transport();

        let (status, Json(message)) =
            ingest_message(State(state.clone()), Json(ingest_request("U1", "Hi")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        // Durable store: message is immediately listable, summary updated.
        let listed = state.db.list_messages(message.room_id, 10, None).unwrap();
        assert_eq!(listed.len(), 1);
        let room = state.db.get_room(message.room_id).unwrap();
        assert_eq!(room.unread_count, 1);

        // Push/pull paths: the event is in the ring with the room snapshot.
        let events = transport.events_after(None);
        assert_eq!(events.len(), 1);
        match &events[0].kind {
            ChatEventKind::NewMessage { room, message: m } => {
                assert_eq!(m.id, message.id);
                assert_eq!(room.unread_count, 1);
            }
            other => panic!("unexpected event kind: {:?}", other),
        }
    }

    #[tokio::test]
    async fn ingest_requires_external_user_id() {
        let (state, transport) = state_with_transport();

        let err = ingest_message(State(state), Json(ingest_request("", "Hi")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.events_after(None).is_empty());
    }

    #[tokio::test]
    async fn mark_read_emits_room_update() {
        let (state, transport) = state_with_transport();

        let (_, Json(message)) =
            ingest_message(State(state.clone()), Json(ingest_request("U1", "Hi")))
                .await
                .unwrap();

        let Json(room) = crate::rooms::mark_read(State(state.clone()), Path(message.room_id))
            .await
            .unwrap();
        assert_eq!(room.unread_count, 0);

        let events = transport.events_after(None);
        assert!(matches!(
            events.last().map(|e| &e.kind),
            Some(ChatEventKind::RoomUpdate { room }) if room.unread_count == 0
        ));
    }

    #[tokio::test]
    async fn status_update_emits_event_and_rejects_illegal_edge() {
        let (state, transport) = state_with_transport();

        let room = state
            .db
            .resolve_room("U1", None, &RoomProfile::default())
            .unwrap();
        let (_, Json(message)) = send_message(
            State(state.clone()),
            Path(room.id),
            Json(SendMessageRequest {
                kind: MessageKind::Text,
                content: Some("Hello".into()),
                media_url: None,
                sticker_id: None,
                sticker_package_id: None,
                sender_name: Some("Agent Kim".into()),
                reply_to_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(message.status, MessageStatus::Sending);

        let Json(message) = update_message_status(
            State(state.clone()),
            Path(message.id),
            Json(UpdateMessageStatusRequest {
                status: MessageStatus::Sent,
            }),
        )
        .await
        .unwrap();
        assert_eq!(message.status, MessageStatus::Sent);

        let err = update_message_status(
            State(state),
            Path(message.id),
            Json(UpdateMessageStatusRequest {
                status: MessageStatus::Sending,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let kinds: Vec<_> = transport
            .events_after(None)
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert!(matches!(kinds[0], ChatEventKind::NewMessage { .. }));
        assert!(matches!(
            kinds[1],
            ChatEventKind::MessageStatus {
                status: MessageStatus::Sent,
                ..
            }
        ));
        assert_eq!(kinds.len(), 2);
    }
}
