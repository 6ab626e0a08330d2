//! # banter-store
//!
//! Durable room and message storage for the banter relay.
//!
//! The on-disk format is a single JSON object keyed by room name, each value
//! an ordered array of messages — the same file the original application
//! wrote, so existing saves load unchanged. The whole map lives in memory
//! behind a mutex as the authoritative copy; every mutation rewrites the file
//! through a temp-file + rename swap, and the in-memory map is only replaced
//! once the new state is on disk.

mod error;
mod ops;

pub use error::{Result, StoreError};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

use banter_types::models::RoomMap;

#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    state: Mutex<StoreState>,
}

#[derive(Debug)]
struct StoreState {
    rooms: RoomMap,
    next_seq: u64,
}

impl Store {
    /// Open the store at `path`, loading the room map if the file exists.
    /// A missing file starts an empty map; an unreadable one is fatal.
    pub fn open(path: &Path) -> Result<Self> {
        let mut rooms: RoomMap = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: path.to_path_buf(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RoomMap::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        // Sequence numbers are process-lifetime identifiers, assigned here in
        // file order and from the counter for everything appended later.
        let mut next_seq: u64 = 1;
        for messages in rooms.values_mut() {
            for msg in messages.iter_mut() {
                msg.seq = next_seq;
                next_seq += 1;
            }
        }

        let message_count: usize = rooms.values().map(Vec::len).sum();
        info!(
            "Store opened at {} ({} rooms, {} messages)",
            path.display(),
            rooms.len(),
            message_count
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(StoreState { rooms, next_seq }),
        })
    }

    pub(crate) fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&RoomMap) -> Result<T>,
    {
        let state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&state.rooms)
    }

    /// Run one mutation as a single load-mutate-save unit.
    ///
    /// The closure works on a scratch copy; the live map is only replaced
    /// once the new state is safely on disk, so a failed persist leaves
    /// memory and file agreeing on the previous state.
    pub(crate) fn commit<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut RoomMap, &mut u64) -> Result<T>,
    {
        let mut state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;

        let mut rooms = state.rooms.clone();
        let mut next_seq = state.next_seq;
        let out = f(&mut rooms, &mut next_seq)?;
        self.persist(&rooms)?;

        state.rooms = rooms;
        state.next_seq = next_seq;
        Ok(out)
    }

    /// Write the whole map to a sibling temp file, then rename over the
    /// target. A crash mid-write leaves the previous file intact.
    fn persist(&self, rooms: &RoomMap) -> Result<()> {
        let bytes = serde_json::to_vec(rooms).map_err(StoreError::Encode)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
