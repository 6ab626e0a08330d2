use serde::{Deserialize, Serialize};

use crate::models::{MessageKind, ReactionMap, StoredMessage};

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub name: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub user_name: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendAttachmentRequest {
    pub user_name: String,
    pub file_name: String,
    /// Attachment payload, base64-encoded.
    pub file_data: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub text: String,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub user_name: String,
    pub emoji: String,
}

// -- Views --

/// A message as handed to the rendering layer: the stored fields plus the
/// stable sequence number and the search highlight flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub seq: u64,
    pub user_name: String,
    pub text: String,
    pub message_type: MessageKind,
    pub room: String,
    pub file_data: Option<String>,
    pub file_name: Option<String>,
    pub reactions: ReactionMap,
    pub matched: bool,
}

impl MessageView {
    pub fn from_stored(msg: StoredMessage, matched: bool) -> Self {
        Self {
            seq: msg.seq,
            user_name: msg.user_name,
            text: msg.text,
            message_type: msg.message_type,
            room: msg.room,
            file_data: msg.file_data,
            file_name: msg.file_name,
            reactions: msg.reactions,
            matched,
        }
    }
}
