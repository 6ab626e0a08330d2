use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use banter_types::events::BusEvent;

/// Broadcast channel capacity. A consumer that falls further behind than
/// this skips ahead with a lag warning instead of stalling everyone else.
const BROADCAST_CAPACITY: usize = 1024;

/// A connected viewer's ephemeral state. Dropped when the connection closes;
/// nothing here is persisted.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_name: String,
    pub room: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Tracks connected sessions and fans events out to them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// All events flow through one channel; each connection filters by its
    /// session's active room before forwarding to the socket.
    broadcast_tx: broadcast::Sender<BusEvent>,

    /// Live sessions: session_id -> session state
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to the event stream. Events publish in call order.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event to every subscriber. Delivery is best-effort; a bus
    /// with no listeners is not an error.
    pub fn publish(&self, event: BusEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a new session. Returns its id.
    pub async fn join(&self, user_name: String, room: Option<String>) -> Uuid {
        let session_id = Uuid::new_v4();
        self.inner.sessions.write().await.insert(
            session_id,
            Session {
                user_name,
                room,
                connected_at: Utc::now(),
            },
        );
        session_id
    }

    /// Drop a session, returning its final state if it was still registered.
    pub async fn leave(&self, session_id: Uuid) -> Option<Session> {
        self.inner.sessions.write().await.remove(&session_id)
    }

    /// Point a session at a different room (or at none).
    pub async fn select_room(&self, session_id: Uuid, room: Option<String>) {
        let mut sessions = self.inner.sessions.write().await;
        if let Some(session) = sessions.get_mut(&session_id) {
            session.room = room;
        }
    }

    /// The room a session is currently viewing.
    pub async fn active_room(&self, session_id: Uuid) -> Option<String> {
        self.inner
            .sessions
            .read()
            .await
            .get(&session_id)
            .and_then(|s| s.room.clone())
    }

    /// Reset every session whose active room was `room`. Returns how many
    /// sessions were cleared; callers run this when a room is deleted.
    pub async fn clear_room(&self, room: &str) -> usize {
        let mut sessions = self.inner.sessions.write().await;
        let mut cleared = 0;
        for session in sessions.values_mut() {
            if session.room.as_deref() == Some(room) {
                session.room = None;
                cleared += 1;
            }
        }
        cleared
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_delivers_in_order() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        dispatcher.publish(BusEvent::RoomCreate { name: "a".into() });
        dispatcher.publish(BusEvent::RoomCreate { name: "b".into() });

        match rx.recv().await.unwrap() {
            BusEvent::RoomCreate { name } => assert_eq!(name, "a"),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            BusEvent::RoomCreate { name } => assert_eq!(name, "b"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let dispatcher = Dispatcher::new();

        let session_id = dispatcher
            .join("alice".to_string(), Some("general".to_string()))
            .await;
        assert_eq!(dispatcher.session_count().await, 1);
        assert_eq!(
            dispatcher.active_room(session_id).await,
            Some("general".to_string())
        );

        dispatcher
            .select_room(session_id, Some("random".to_string()))
            .await;
        assert_eq!(
            dispatcher.active_room(session_id).await,
            Some("random".to_string())
        );

        let session = dispatcher.leave(session_id).await.unwrap();
        assert_eq!(session.user_name, "alice");
        assert_eq!(session.room.as_deref(), Some("random"));
        assert_eq!(dispatcher.session_count().await, 0);

        // double leave is a no-op
        assert!(dispatcher.leave(session_id).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_room_resets_only_matching_sessions() {
        let dispatcher = Dispatcher::new();

        let viewer = dispatcher
            .join("alice".to_string(), Some("general".to_string()))
            .await;
        let elsewhere = dispatcher
            .join("bob".to_string(), Some("random".to_string()))
            .await;
        let nowhere = dispatcher.join("carol".to_string(), None).await;

        let cleared = dispatcher.clear_room("general").await;
        assert_eq!(cleared, 1);
        assert_eq!(dispatcher.active_room(viewer).await, None);
        assert_eq!(
            dispatcher.active_room(elsewhere).await,
            Some("random".to_string())
        );
        assert_eq!(dispatcher.active_room(nowhere).await, None);
    }

    #[tokio::test]
    async fn test_session_records_connection_time() {
        let before = Utc::now();
        let dispatcher = Dispatcher::new();

        let session_id = dispatcher.join("alice".to_string(), None).await;
        let session = dispatcher.leave(session_id).await.unwrap();

        assert!(session.connected_at >= before);
        assert!(session.connected_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let dispatcher = Dispatcher::new();
        dispatcher.publish(BusEvent::RoomDelete {
            name: "general".into(),
        });
    }
}
