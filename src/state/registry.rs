//! In-memory registry of live rooms keyed by their join code.

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;

use super::room::{Room, RoomContext};
use crate::catalog::{GenreFilter, Song};

/// Number of characters in a room code.
pub const ROOM_CODE_LENGTH: usize = 5;
/// Characters used in room codes; look-alikes such as `0`/`O` and `1`/`I` are left out.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Concurrent map of every live room.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new room under a fresh random code.
    pub fn create(&self, song: Song, genres: GenreFilter, context: RoomContext) -> Arc<Room> {
        loop {
            match self.rooms.entry(generate_room_code()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let room = Room::new(slot.key().clone(), song, genres, context);
                    slot.insert(room.clone());
                    return room;
                }
            }
        }
    }

    /// Look a room up by code; codes are matched case-insensitively.
    pub fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms
            .get(&code.trim().to_ascii_uppercase())
            .map(|entry| entry.value().clone())
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is live.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Remove rooms that have had no players for at least `ttl`, returning how many went away.
    ///
    /// Rooms still held outside the registry (a socket resolved the code and is
    /// mid-handshake) and rooms whose lock is held right now are kept.
    pub fn sweep_abandoned(&self, ttl: Duration) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, room| {
            if Arc::strong_count(room) > 1 {
                return true;
            }
            match room.try_lock() {
                Ok(session) => !session.is_abandoned(ttl),
                Err(_) => true,
            }
        });
        before.saturating_sub(self.rooms.len())
    }
}

/// Draw a random room code.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}
