use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use tracing::info;

use banter_types::api::{
    EditMessageRequest, MessageView, SendAttachmentRequest, SendMessageRequest,
};
use banter_types::events::BusEvent;

use crate::{AppState, run_store};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Case-insensitive search term matched against message body and author.
    /// Absent or blank, the history comes back with every `matched` flag false.
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocateQuery {
    pub user_name: String,
    pub text: String,
}

/// A room's ordered log, every message flagged for search highlighting.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let views: Vec<MessageView> = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => {
            let needle = q.to_string();
            run_store(move || store.search(&room, &needle))
                .await?
                .into_iter()
                .map(|(msg, matched)| MessageView::from_stored(msg, matched))
                .collect()
        }
        _ => run_store(move || store.messages(&room))
            .await?
            .into_iter()
            .map(|msg| MessageView::from_stored(msg, false))
            .collect(),
    };

    Ok(Json(views))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_name = req.user_name.trim().to_string();
    if user_name.is_empty() || req.text.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let store = state.store.clone();
    let text = req.text.clone();
    let stored = run_store(move || store.append_chat(&room, &user_name, &text)).await?;

    state.dispatcher.publish(BusEvent::MessageCreate {
        room: stored.room.clone(),
        seq: stored.seq,
        user_name: stored.user_name.clone(),
        text: stored.text.clone(),
        message_type: stored.message_type,
        file_data: None,
        file_name: None,
    });

    Ok((
        StatusCode::CREATED,
        Json(MessageView::from_stored(stored, false)),
    ))
}

/// Post a file into a room. The body text stays empty; the payload rides in
/// `file_data` as base64, exactly as it will sit in the durable log.
pub async fn send_attachment(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(req): Json<SendAttachmentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_name = req.user_name.trim().to_string();
    if user_name.is_empty() || req.file_name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    B64.decode(&req.file_data).map_err(|_| StatusCode::BAD_REQUEST)?;

    let store = state.store.clone();
    let file_data = req.file_data.clone();
    let file_name = req.file_name.clone();
    let stored = run_store(move || {
        store.append_attachment(&room, &user_name, &file_data, &file_name)
    })
    .await?;

    info!(
        "{} attached '{}' in room '{}'",
        stored.user_name, req.file_name, stored.room
    );

    state.dispatcher.publish(BusEvent::MessageCreate {
        room: stored.room.clone(),
        seq: stored.seq,
        user_name: stored.user_name.clone(),
        text: stored.text.clone(),
        message_type: stored.message_type,
        file_data: stored.file_data.clone(),
        file_name: stored.file_name.clone(),
    });

    Ok((
        StatusCode::CREATED,
        Json(MessageView::from_stored(stored, false)),
    ))
}

/// Edit a message's body text, addressed by its stable seq.
pub async fn edit_message(
    State(state): State<AppState>,
    Path((room, seq)): Path<(String, u64)>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let text = req.text.clone();
    let stored = run_store(move || store.edit_message(&room, seq, &text)).await?;

    state.dispatcher.publish(BusEvent::MessageUpdate {
        room: stored.room.clone(),
        seq,
        text: stored.text.clone(),
    });

    Ok(Json(MessageView::from_stored(stored, false)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path((room, seq)): Path<(String, u64)>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let target = room.clone();
    run_store(move || store.delete_message(&target, seq)).await?;

    state.dispatcher.publish(BusEvent::MessageDelete { room, seq });

    Ok(StatusCode::NO_CONTENT)
}

/// Resolve a legacy (author, body) reference to a stable seq. Clients that
/// still address messages by content call this first; an ambiguous match is
/// reported instead of silently picking one.
pub async fn locate_message(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<LocateQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let seq = run_store(move || store.locate(&room, &query.user_name, &query.text))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(serde_json::json!({ "seq": seq })))
}
