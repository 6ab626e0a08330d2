use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MessageKind, ReactionMap};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BusEvent {
    /// Server confirms the connection and reports the session's landing room.
    Ready {
        session_id: Uuid,
        user_name: String,
        room: Option<String>,
        color_index: u8,
    },

    /// A new message was appended to a room's log.
    MessageCreate {
        room: String,
        seq: u64,
        user_name: String,
        text: String,
        message_type: MessageKind,
        file_data: Option<String>,
        file_name: Option<String>,
    },

    /// A message's body text was edited.
    MessageUpdate { room: String, seq: u64, text: String },

    /// A message was removed from a room's log.
    MessageDelete { room: String, seq: u64 },

    /// A reaction was added to a message. Carries the full reaction map so
    /// viewers can re-render the pill row without applying deltas.
    ReactionAdd {
        room: String,
        seq: u64,
        user_name: String,
        emoji: String,
        reactions: ReactionMap,
    },

    /// A reaction was removed from a message.
    ReactionRemove {
        room: String,
        seq: u64,
        user_name: String,
        emoji: String,
        reactions: ReactionMap,
    },

    /// A room was created.
    RoomCreate { name: String },

    /// A room and all its messages were deleted.
    RoomDelete { name: String },

    /// Transient system notice ("X has joined the room Y."). Never persisted;
    /// durability comes solely from the message store.
    Notice {
        room: String,
        user_name: String,
        text: String,
    },
}

impl BusEvent {
    /// Returns the room this event is scoped to.
    /// Events that return `None` are global and go to every connected viewer.
    pub fn room(&self) -> Option<&str> {
        match self {
            Self::MessageCreate { room, .. } => Some(room),
            Self::MessageUpdate { room, .. } => Some(room),
            Self::MessageDelete { room, .. } => Some(room),
            Self::ReactionAdd { room, .. } => Some(room),
            Self::ReactionRemove { room, .. } => Some(room),
            Self::Notice { room, .. } => Some(room),
            // Ready, RoomCreate, RoomDelete are global
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
/// All mutations go over REST; the socket only steers the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Switch the session's active room.
    SelectRoom { room: String },
}
