use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use banter_types::api::ToggleReactionRequest;
use banter_types::events::BusEvent;

use crate::{AppState, run_store};

/// Toggle the caller's reaction on a message: present removes, absent adds.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path((room, seq)): Path<(String, u64)>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_name = req.user_name.trim().to_string();
    if user_name.is_empty() || req.emoji.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let store = state.store.clone();
    let target = room.clone();
    let emoji = req.emoji.clone();
    let user = user_name.clone();
    let (added, reactions) =
        run_store(move || store.toggle_reaction(&target, seq, &emoji, &user)).await?;

    let event = if added {
        BusEvent::ReactionAdd {
            room,
            seq,
            user_name,
            emoji: req.emoji,
            reactions: reactions.clone(),
        }
    } else {
        BusEvent::ReactionRemove {
            room,
            seq,
            user_name,
            emoji: req.emoji,
            reactions: reactions.clone(),
        }
    };
    state.dispatcher.publish(event);

    Ok(Json(
        serde_json::json!({ "added": added, "reactions": reactions }),
    ))
}
