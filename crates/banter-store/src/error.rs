use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The persisted room map is unparseable or the wrong shape.
    /// Fatal to the caller; the store never repairs in place.
    #[error("Corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Room name collision on create.
    #[error("Room '{0}' already exists")]
    DuplicateRoom(String),

    /// Operation referenced a deleted or unknown room.
    #[error("Room '{0}' not found")]
    RoomNotFound(String),

    /// Sequence-number lookup missed; the caller holds a stale reference.
    #[error("Message {seq} not found in room '{room}'")]
    MessageNotFound { room: String, seq: u64 },

    /// A content-based reference resolved to more than one message.
    #[error("Message reference is ambiguous: {count} matches in room '{room}'")]
    AmbiguousReference { room: String, count: usize },

    /// Generic I/O failure while persisting.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The room map failed to serialize.
    #[error("JSON encode error: {0}")]
    Encode(serde_json::Error),

    /// A thread panicked while holding the store lock.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
