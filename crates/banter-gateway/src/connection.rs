use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use banter_store::Store;
use banter_types::avatar;
use banter_types::events::{BusEvent, GatewayCommand};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one viewer's WebSocket session from upgrade to disconnect.
///
/// Identity is the client-supplied display name, already checked non-empty
/// at the upgrade layer. `requested_room` is the room the client remembers
/// from its last session, if any.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    store: Arc<Store>,
    user_name: String,
    requested_room: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Run the blocking room-list read off the async runtime; the store lock
    // can be held across a file rewrite by a concurrent mutation.
    let store_reader = store.clone();
    let rooms = tokio::task::spawn_blocking(move || store_reader.rooms())
        .await
        .map(|r| r.unwrap_or_default())
        .unwrap_or_default();

    // A remembered room is honored only while it still exists; otherwise the
    // viewer lands in the oldest room, like a first-time join.
    let room = requested_room
        .filter(|name| rooms.iter().any(|r| r == name))
        .or_else(|| rooms.into_iter().next());

    let session_id = dispatcher.join(user_name.clone(), room.clone()).await;
    info!(
        "{} connected to gateway ({} active sessions)",
        user_name,
        dispatcher.session_count().await
    );

    let ready = BusEvent::Ready {
        session_id,
        user_name: user_name.clone(),
        room: room.clone(),
        color_index: avatar::color_index(&user_name),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        dispatcher.leave(session_id).await;
        return;
    }

    // Everyone viewing the room sees the join, the joiner included; the
    // notice is never persisted.
    let mut broadcast_rx = announce_join(&dispatcher, room.as_deref(), &user_name);

    let dispatcher_send = dispatcher.clone();
    let dispatcher_recv = dispatcher.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward bus events to the client, filtered by the session's active
    // room, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let active = dispatcher_send.active_room(session_id).await;
                    if !should_forward(&event, active.as_deref()) {
                        continue;
                    }

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!(
                                "Heartbeat timeout (missed {} pongs), dropping connection",
                                missed_heartbeats
                            );
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client
    let store_recv = store.clone();
    let user_name_recv = user_name.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(
                            &dispatcher_recv,
                            &store_recv,
                            session_id,
                            &user_name_recv,
                            cmd,
                        )
                        .await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_name_recv,
                            e,
                            log_preview(&text)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if let Some(session) = dispatcher.leave(session_id).await {
        if let Some(room) = &session.room {
            dispatcher.publish(BusEvent::Notice {
                room: room.clone(),
                user_name: user_name.clone(),
                text: format!("{} has left the room {}.", user_name, room),
            });
        }
        let connected_secs = (Utc::now() - session.connected_at).num_seconds();
        info!(
            "{} disconnected from gateway after {}s",
            user_name, connected_secs
        );
    }
}

async fn handle_command(
    dispatcher: &Dispatcher,
    store: &Arc<Store>,
    session_id: Uuid,
    user_name: &str,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::SelectRoom { room } => {
            // An unknown room leaves the session where it was; the client
            // refreshes its room list over REST and tries again.
            let store_reader = store.clone();
            let known = tokio::task::spawn_blocking(move || store_reader.rooms())
                .await
                .map(|r| r.unwrap_or_default())
                .unwrap_or_default();
            if !known.iter().any(|r| r == &room) {
                warn!("{} selected unknown room '{}'", user_name, room);
                return;
            }

            info!("{} switched to room '{}'", user_name, room);
            dispatcher.select_room(session_id, Some(room)).await;
        }
    }
}

/// Room-scoped events reach only viewers of that room; global events reach
/// every session.
fn should_forward(event: &BusEvent, active_room: Option<&str>) -> bool {
    match event.room() {
        Some(room) => active_room == Some(room),
        None => true,
    }
}

/// Subscribe first, then announce the join, so the new subscription sees its
/// own join notice like every other viewer of the room.
fn announce_join(
    dispatcher: &Dispatcher,
    room: Option<&str>,
    user_name: &str,
) -> broadcast::Receiver<BusEvent> {
    let rx = dispatcher.subscribe();
    if let Some(room) = room {
        dispatcher.publish(BusEvent::Notice {
            room: room.to_string(),
            user_name: user_name.to_string(),
            text: format!("{} has joined the room {}.", user_name, room),
        });
    }
    rx
}

/// Clamp a client frame to a loggable snippet without splitting a character.
fn log_preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
