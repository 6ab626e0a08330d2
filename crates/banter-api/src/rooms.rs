use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use banter_types::api::CreateRoomRequest;
use banter_types::events::BusEvent;

use crate::{AppState, run_store};

pub async fn list_rooms(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let rooms = run_store(move || store.rooms()).await?;
    Ok(Json(rooms))
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let store = state.store.clone();
    let room = name.clone();
    run_store(move || store.create_room(&room)).await?;
    info!("Room '{}' created", name);

    state
        .dispatcher
        .publish(BusEvent::RoomCreate { name: name.clone() });

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "name": name }))))
}

/// Idempotent join-or-create. Broadcasts a RoomCreate only when this call
/// actually created the room.
pub async fn ensure_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = room.trim().to_string();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let store = state.store.clone();
    let target = name.clone();
    let created = run_store(move || store.ensure_room(&target)).await?;
    if created {
        info!("Room '{}' created on first join", name);
        state
            .dispatcher
            .publish(BusEvent::RoomCreate { name: name.clone() });
    }

    Ok(Json(serde_json::json!({ "name": name, "created": created })))
}

pub async fn delete_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let target = room.clone();
    run_store(move || store.delete_room(&target)).await?;

    // Anyone viewing the deleted room falls back to "no room selected"
    let cleared = state.dispatcher.clear_room(&room).await;
    info!("Room '{}' deleted ({} sessions cleared)", room, cleared);

    state.dispatcher.publish(BusEvent::RoomDelete { name: room });

    Ok(StatusCode::NO_CONTENT)
}
