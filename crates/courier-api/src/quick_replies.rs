use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use courier_db::NewQuickReply;
use courier_types::api::{CreateQuickReplyRequest, UpdateQuickReplyRequest};
use courier_types::models::QuickReply;

use crate::error::ApiError;
use crate::{blocking, AppState};

#[derive(Debug, Deserialize)]
pub struct QuickRepliesQuery {
    pub channel_token_id: Option<Uuid>,
}

pub async fn list_quick_replies(
    State(state): State<AppState>,
    Query(query): Query<QuickRepliesQuery>,
) -> Result<Json<Vec<QuickReply>>, ApiError> {
    let replies = blocking(&state, move |db| {
        db.list_quick_replies(query.channel_token_id)
    })
    .await?;
    Ok(Json(replies))
}

pub async fn create_quick_reply(
    State(state): State<AppState>,
    Json(req): Json<CreateQuickReplyRequest>,
) -> Result<(StatusCode, Json<QuickReply>), ApiError> {
    if req.title.is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if req.label.is_empty() {
        return Err(ApiError::Validation("label is required".into()));
    }

    let reply = blocking(&state, move |db| {
        db.create_quick_reply(&NewQuickReply {
            channel_token_id: req.channel_token_id,
            title: req.title,
            label: req.label,
            icon: req.icon,
            attachments: req.attachments,
            is_favorite: req.is_favorite,
        })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn update_quick_reply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateQuickReplyRequest>,
) -> Result<Json<QuickReply>, ApiError> {
    let reply = blocking(&state, move |db| db.update_quick_reply(id, &patch)).await?;
    Ok(Json(reply))
}

pub async fn delete_quick_reply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |db| db.delete_quick_reply(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
