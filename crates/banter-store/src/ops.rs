use banter_types::models::{MessageKind, ReactionMap, StoredMessage};

use crate::{Result, Store, StoreError};

impl Store {
    // -- Rooms --

    /// Create a room. Fails closed on a name collision; creation never
    /// silently wipes an existing log.
    pub fn create_room(&self, name: &str) -> Result<()> {
        self.commit(|rooms, _| {
            if rooms.contains_key(name) {
                return Err(StoreError::DuplicateRoom(name.to_string()));
            }
            rooms.insert(name.to_string(), Vec::new());
            Ok(())
        })
    }

    /// Join-or-create: make sure `name` exists, reporting whether this call
    /// created it.
    pub fn ensure_room(&self, name: &str) -> Result<bool> {
        self.commit(|rooms, _| {
            if rooms.contains_key(name) {
                return Ok(false);
            }
            rooms.insert(name.to_string(), Vec::new());
            Ok(true)
        })
    }

    /// Room names in insertion order.
    pub fn rooms(&self) -> Result<Vec<String>> {
        self.read(|rooms| Ok(rooms.keys().cloned().collect()))
    }

    /// Delete a room and every message in it.
    pub fn delete_room(&self, name: &str) -> Result<()> {
        self.commit(|rooms, _| {
            // shift_remove keeps the remaining rooms in insertion order
            if rooms.shift_remove(name).is_none() {
                return Err(StoreError::RoomNotFound(name.to_string()));
            }
            Ok(())
        })
    }

    // -- Messages --

    /// Append a chat message, returning the stored copy with its seq.
    pub fn append_chat(&self, room: &str, user_name: &str, text: &str) -> Result<StoredMessage> {
        self.append(room, user_name, text, None, None)
    }

    /// Append an attachment message. The body text is empty; the payload
    /// travels base64-encoded in `file_data`.
    pub fn append_attachment(
        &self,
        room: &str,
        user_name: &str,
        file_data: &str,
        file_name: &str,
    ) -> Result<StoredMessage> {
        self.append(room, user_name, "", Some(file_data), Some(file_name))
    }

    fn append(
        &self,
        room: &str,
        user_name: &str,
        text: &str,
        file_data: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<StoredMessage> {
        self.commit(|rooms, next_seq| {
            let messages = rooms
                .get_mut(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))?;

            let msg = StoredMessage {
                seq: *next_seq,
                user_name: user_name.to_string(),
                text: text.to_string(),
                message_type: MessageKind::Chat,
                room: room.to_string(),
                file_data: file_data.map(str::to_string),
                file_name: file_name.map(str::to_string),
                reactions: ReactionMap::new(),
            };
            *next_seq += 1;

            messages.push(msg.clone());
            Ok(msg)
        })
    }

    /// Replace a message's body text. Attachments and reactions are untouched.
    pub fn edit_message(&self, room: &str, seq: u64, text: &str) -> Result<StoredMessage> {
        self.commit(|rooms, _| {
            let messages = rooms
                .get_mut(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))?;
            let msg = messages
                .iter_mut()
                .find(|m| m.seq == seq)
                .ok_or(StoreError::MessageNotFound {
                    room: room.to_string(),
                    seq,
                })?;

            msg.text = text.to_string();
            Ok(msg.clone())
        })
    }

    /// Remove a message from its room's log.
    pub fn delete_message(&self, room: &str, seq: u64) -> Result<()> {
        self.commit(|rooms, _| {
            let messages = rooms
                .get_mut(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))?;
            let idx = messages
                .iter()
                .position(|m| m.seq == seq)
                .ok_or(StoreError::MessageNotFound {
                    room: room.to_string(),
                    seq,
                })?;

            messages.remove(idx);
            Ok(())
        })
    }

    /// A room's log as cloned snapshots, oldest first.
    pub fn messages(&self, room: &str) -> Result<Vec<StoredMessage>> {
        self.read(|rooms| {
            rooms
                .get(room)
                .cloned()
                .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))
        })
    }

    /// Resolve a legacy (author, body) reference to a sequence number.
    ///
    /// Returns `Ok(None)` when nothing matches and refuses to guess when
    /// more than one message does.
    pub fn locate(&self, room: &str, user_name: &str, text: &str) -> Result<Option<u64>> {
        self.read(|rooms| {
            let messages = rooms
                .get(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))?;

            let mut hits = messages
                .iter()
                .filter(|m| m.user_name == user_name && m.text == text);
            let first = match hits.next() {
                Some(m) => m.seq,
                None => return Ok(None),
            };

            let extra = hits.count();
            if extra > 0 {
                return Err(StoreError::AmbiguousReference {
                    room: room.to_string(),
                    count: extra + 1,
                });
            }
            Ok(Some(first))
        })
    }

    // -- Reactions --

    /// Toggle `user_name`'s reaction under `emoji`: present removes, absent
    /// adds. Removing the last user drops the emoji key entirely.
    /// Returns whether the reaction was added and the resulting map.
    pub fn toggle_reaction(
        &self,
        room: &str,
        seq: u64,
        emoji: &str,
        user_name: &str,
    ) -> Result<(bool, ReactionMap)> {
        self.commit(|rooms, _| {
            let messages = rooms
                .get_mut(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))?;
            let msg = messages
                .iter_mut()
                .find(|m| m.seq == seq)
                .ok_or(StoreError::MessageNotFound {
                    room: room.to_string(),
                    seq,
                })?;

            let added = match msg.reactions.get_mut(emoji) {
                Some(users) if users.iter().any(|u| u == user_name) => {
                    users.retain(|u| u != user_name);
                    if users.is_empty() {
                        msg.reactions.remove(emoji);
                    }
                    false
                }
                Some(users) => {
                    users.push(user_name.to_string());
                    true
                }
                None => {
                    msg.reactions
                        .insert(emoji.to_string(), vec![user_name.to_string()]);
                    true
                }
            };

            Ok((added, msg.reactions.clone()))
        })
    }

    // -- Search --

    /// Case-insensitive substring match of `query` against every message's
    /// body and author. Every message comes back, paired with its is-match
    /// flag, so callers can highlight rather than filter. A blank query
    /// marks nothing.
    pub fn search(&self, room: &str, query: &str) -> Result<Vec<(StoredMessage, bool)>> {
        let needle = query.trim().to_lowercase();
        self.read(|rooms| {
            let messages = rooms
                .get(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))?;

            Ok(messages
                .iter()
                .map(|msg| {
                    let matched = !needle.is_empty()
                        && (msg.text.to_lowercase().contains(&needle)
                            || msg.user_name.to_lowercase().contains(&needle));
                    (msg.clone(), matched)
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store(dir: &tempfile::TempDir) -> Store {
        Store::open(&dir.path().join("rooms.json")).unwrap()
    }

    #[test]
    fn create_room_fails_on_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room("general").unwrap();
        let err = store.create_room("general").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRoom(_)));

        // The original log is untouched by the rejected create
        store.append_chat("general", "alice", "still here").unwrap();
        assert_eq!(store.messages("general").unwrap().len(), 1);
    }

    #[test]
    fn ensure_room_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        assert!(store.ensure_room("general").unwrap());
        assert!(!store.ensure_room("general").unwrap());
        assert_eq!(store.rooms().unwrap(), ["general"]);
    }

    #[test]
    fn rooms_list_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room("zulu").unwrap();
        store.create_room("alpha").unwrap();
        store.create_room("mike").unwrap();
        assert_eq!(store.rooms().unwrap(), ["zulu", "alpha", "mike"]);

        store.delete_room("alpha").unwrap();
        assert_eq!(store.rooms().unwrap(), ["zulu", "mike"]);
    }

    #[test]
    fn delete_room_cascades_to_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room("general").unwrap();
        store.append_chat("general", "alice", "hi").unwrap();
        store.delete_room("general").unwrap();

        let err = store.messages("general").unwrap_err();
        assert!(matches!(err, StoreError::RoomNotFound(_)));

        let err = store.delete_room("general").unwrap_err();
        assert!(matches!(err, StoreError::RoomNotFound(_)));
    }

    #[test]
    fn append_to_missing_room_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let err = store.append_chat("nowhere", "alice", "hi").unwrap_err();
        assert!(matches!(err, StoreError::RoomNotFound(_)));
    }

    #[test]
    fn attachment_keeps_payload_and_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room("general").unwrap();
        let msg = store
            .append_attachment("general", "alice", "aGVsbG8=", "hello.txt")
            .unwrap();

        assert_eq!(msg.text, "");
        assert_eq!(msg.file_data.as_deref(), Some("aGVsbG8="));
        assert_eq!(msg.file_name.as_deref(), Some("hello.txt"));
        assert_eq!(msg.message_type, MessageKind::Chat);
    }

    #[test]
    fn edit_and_delete_address_by_seq() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room("general").unwrap();
        let first = store.append_chat("general", "alice", "same").unwrap();
        let second = store.append_chat("general", "alice", "same").unwrap();

        // Two identical messages stay individually addressable
        store.edit_message("general", second.seq, "different").unwrap();
        let messages = store.messages("general").unwrap();
        assert_eq!(messages[0].text, "same");
        assert_eq!(messages[1].text, "different");

        store.delete_message("general", first.seq).unwrap();
        let messages = store.messages("general").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].seq, second.seq);

        let err = store.delete_message("general", first.seq).unwrap_err();
        assert!(matches!(err, StoreError::MessageNotFound { .. }));
    }

    #[test]
    fn locate_resolves_unique_content_references() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room("general").unwrap();
        let msg = store.append_chat("general", "alice", "only one").unwrap();

        assert_eq!(store.locate("general", "alice", "only one").unwrap(), Some(msg.seq));
        assert_eq!(store.locate("general", "alice", "never sent").unwrap(), None);
    }

    #[test]
    fn locate_refuses_ambiguous_references() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room("general").unwrap();
        store.append_chat("general", "alice", "same").unwrap();
        store.append_chat("general", "alice", "same").unwrap();

        let err = store.locate("general", "alice", "same").unwrap_err();
        assert!(matches!(err, StoreError::AmbiguousReference { count: 2, .. }));
    }

    #[test]
    fn toggle_reaction_is_self_inverse() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room("general").unwrap();
        let msg = store.append_chat("general", "alice", "hi").unwrap();

        let (added, reactions) = store
            .toggle_reaction("general", msg.seq, "👍", "alice")
            .unwrap();
        assert!(added);
        assert_eq!(reactions["👍"], vec!["alice"]);

        let (added, reactions) = store
            .toggle_reaction("general", msg.seq, "👍", "alice")
            .unwrap();
        assert!(!added);
        assert!(reactions.is_empty());

        let (added, reactions) = store
            .toggle_reaction("general", msg.seq, "👍", "bob")
            .unwrap();
        assert!(added);
        assert_eq!(reactions["👍"], vec!["bob"]);
    }

    #[test]
    fn empty_reaction_sets_never_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.json");

        let store = Store::open(&path).unwrap();
        store.create_room("general").unwrap();
        let msg = store.append_chat("general", "alice", "hi").unwrap();

        store.toggle_reaction("general", msg.seq, "🎉", "alice").unwrap();
        store.toggle_reaction("general", msg.seq, "🎉", "bob").unwrap();
        store.toggle_reaction("general", msg.seq, "🎉", "alice").unwrap();
        store.toggle_reaction("general", msg.seq, "🎉", "bob").unwrap();

        let reloaded = Store::open(&path).unwrap();
        let messages = reloaded.messages("general").unwrap();
        assert!(messages[0].reactions.is_empty());

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["general"][0]["reactions"], serde_json::json!({}));
    }

    #[test]
    fn search_is_case_insensitive_over_body_and_author() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room("general").unwrap();
        store.append_chat("general", "alice", "hi there").unwrap();
        store.append_chat("general", "Hi-bot", "just passing").unwrap();
        store.append_chat("general", "carol", "unrelated").unwrap();

        let results = store.search("general", "HI").unwrap();
        let flags: Vec<bool> = results.iter().map(|(_, matched)| *matched).collect();
        assert_eq!(flags, [true, true, false]);

        // Every message comes back, matched or not
        assert_eq!(results.len(), 3);

        let results = store.search("general", "  ").unwrap();
        assert!(results.iter().all(|(_, matched)| !matched));
    }

    #[test]
    fn durable_format_matches_reference_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.json");

        // A file written by the original application
        std::fs::write(
            &path,
            r#"{"general":[{"user_name":"alice","text":"hi","message_type":"chat_message","room":"general","file_data":null,"file_name":null,"reactions":{"👍":["bob"]}}]}"#,
        )
        .unwrap();

        let store = Store::open(&path).unwrap();
        let messages = store.messages("general").unwrap();
        assert_eq!(messages[0].reactions["👍"], vec!["bob"]);

        // A mutation writes the same field set back, still without seq
        store.append_chat("general", "bob", "hello").unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let written = &raw["general"][1];
        assert_eq!(written["user_name"], "bob");
        assert_eq!(written["text"], "hello");
        assert_eq!(written["message_type"], "chat_message");
        assert_eq!(written["room"], "general");
        assert!(written["file_data"].is_null());
        assert!(written["file_name"].is_null());
        assert_eq!(written["reactions"], serde_json::json!({}));
        assert!(written.get("seq").is_none());
    }

    #[test]
    fn legacy_reaction_lists_normalize_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.json");

        std::fs::write(
            &path,
            r#"{"general":[{"user_name":"alice","text":"old","message_type":"chat_message","room":"general","file_data":null,"file_name":null,"reactions":["👍"]}]}"#,
        )
        .unwrap();

        let store = Store::open(&path).unwrap();
        let messages = store.messages("general").unwrap();
        assert!(messages[0].reactions.is_empty());
    }

    #[test]
    fn login_notices_in_old_saves_still_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.json");

        std::fs::write(
            &path,
            r#"{"general":[{"user_name":"alice","text":"alice has joined the room general.","message_type":"login_message","room":"general","file_data":null,"file_name":null,"reactions":{}}]}"#,
        )
        .unwrap();

        let store = Store::open(&path).unwrap();
        let messages = store.messages("general").unwrap();
        assert_eq!(messages[0].message_type, MessageKind::Notice);
    }
}
