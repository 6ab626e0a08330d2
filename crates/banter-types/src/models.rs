use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// The durable room map: room name -> ordered message log.
/// Key order is room insertion order and survives serialization.
pub type RoomMap = IndexMap<String, Vec<StoredMessage>>;

/// Per-message reactions: emoji -> names of the users who reacted.
pub type ReactionMap = BTreeMap<String, Vec<String>>;

/// Message kind discriminator, persisted in the `message_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// User-authored chat content.
    #[serde(rename = "chat_message")]
    Chat,

    /// Synthetic system notice ("X has joined ..."), rendered differently
    /// and never authored by a user directly.
    #[serde(rename = "login_message")]
    Notice,
}

/// A message as it sits in a room's log.
///
/// The serialized field set is the durable file schema; saved data from
/// earlier versions of the application must keep loading unchanged. `seq`
/// is assigned by the store for the lifetime of the process and is never
/// written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(skip)]
    pub seq: u64,
    pub user_name: String,
    pub text: String,
    pub message_type: MessageKind,
    pub room: String,
    pub file_data: Option<String>,
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "reactions_compat")]
    pub reactions: ReactionMap,
}

/// Early saves stored reactions as a list. Nothing in that shape is
/// recoverable, so it normalizes to an empty map on load.
fn reactions_compat<'de, D>(de: D) -> Result<ReactionMap, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::IgnoredAny;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Compat {
        Map(ReactionMap),
        Legacy(Vec<IgnoredAny>),
    }

    Ok(match Compat::deserialize(de)? {
        Compat::Map(map) => map,
        Compat::Legacy(_) => ReactionMap::new(),
    })
}
