//! Players of a room and the roster that orders them by join time.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::broadcast::{self, Connection};
use crate::dto::ws::{PlayerSnapshot, ServerMessage};

/// Opaque player identifier, stable across reconnects.
pub type PlayerId = Uuid;

/// Outcome of a player's submission for the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    /// The player passed on this round.
    Skip,
    /// Both title and artist matched.
    Correct,
    /// Exactly one of title or artist matched.
    Close,
    /// Neither matched, or the guess was malformed.
    Incorrect,
}

/// A connected member of a room.
#[derive(Debug)]
pub struct Player {
    /// Identifier handed to the client for reconnection.
    pub id: PlayerId,
    /// Validated display name.
    pub name: String,
    /// Writer queue of the player's socket.
    pub connection: Connection,
    /// Submission for the current round, `None` until the player answers.
    pub status: Option<PlayerStatus>,
    /// Points accumulated in this room.
    pub score: u32,
    /// Whether the player's tab is in the background.
    pub idle: bool,
}

impl Player {
    /// Fresh player with no score.
    pub fn new(id: PlayerId, name: String, connection: Connection) -> Self {
        Self {
            id,
            name,
            connection,
            status: None,
            score: 0,
            idle: false,
        }
    }

    /// Public view of the player sent in room snapshots.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            player_id: self.id,
            player_name: self.name.clone(),
            status: self.status,
            score: self.score,
            idle: self.idle,
        }
    }
}

/// What a room remembers about a player after their connection drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentPlayer {
    /// Identifier the player may present when reconnecting.
    pub id: PlayerId,
    /// Name that must match on reconnection.
    pub name: String,
    /// Score at disconnect time.
    pub score: u32,
    /// Status at disconnect time.
    pub status: Option<PlayerStatus>,
    /// Song that was active at disconnect time.
    pub song_id: String,
    /// Round that was active at disconnect time.
    pub round: u32,
}

/// Active players of a room, ordered by join time.
#[derive(Debug, Default)]
pub struct Roster {
    players: IndexMap<PlayerId, Player>,
}

impl Roster {
    /// Add a player at the end of the join order.
    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Remove a player while keeping the order of the others.
    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.shift_remove(id)
    }

    /// Look up a player.
    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Look up a player for mutation.
    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Whether `id` is currently connected.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// Number of connected players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// True when the roster is non-empty and every player has answered.
    pub fn all_answered(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|player| player.status.is_some())
    }

    /// True when at least one player has answered the open round.
    pub fn any_answered(&self) -> bool {
        self.players.values().any(|player| player.status.is_some())
    }

    /// Players whose status for the round is `correct`, in join order.
    pub fn correct_players(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|player| player.status == Some(PlayerStatus::Correct))
            .map(|player| player.id)
            .collect()
    }

    /// Reset every status for a new round.
    pub fn clear_statuses(&mut self) {
        for player in self.players.values_mut() {
            player.status = None;
        }
    }

    /// Public view of every player, in join order.
    pub fn snapshots(&self) -> Vec<PlayerSnapshot> {
        self.players.values().map(Player::snapshot).collect()
    }

    /// Send `message` to every player except `except`.
    pub fn broadcast(&self, message: &ServerMessage, except: Option<PlayerId>) -> usize {
        broadcast::fan_out(
            self.players
                .values()
                .filter(|player| Some(player.id) != except)
                .map(|player| &player.connection),
            message,
        )
    }

    /// Send `message` to a single player.
    pub fn send_to(&self, id: &PlayerId, message: &ServerMessage) -> bool {
        self.players
            .get(id)
            .is_some_and(|player| player.connection.send(message))
    }
}
