use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    catalog::Genre,
    state::{phase::RoomPhase, player::PlayerStatus, room::StatusUpdate},
};

#[derive(Debug, Deserialize)]
/// Envelopes accepted from player WebSocket clients.
#[serde(tag = "event")]
pub enum ClientMessage {
    /// Join handshake; `playerId` is presented when reconnecting.
    #[serde(rename = "player_init")]
    PlayerInit {
        #[serde(rename = "playerName")]
        player_name: Option<String>,
        #[serde(rename = "playerId")]
        player_id: Option<String>,
    },
    /// Either `{"status": "skip"}` or a `songName`/`songArtist` guess.
    #[serde(rename = "update_status")]
    UpdateStatus {
        status: Option<String>,
        #[serde(rename = "songName")]
        song_name: Option<String>,
        #[serde(rename = "songArtist")]
        song_artist: Option<String>,
    },
    /// The player's tab lost or regained focus.
    #[serde(rename = "update_idle")]
    UpdateIdle {
        #[serde(rename = "playerIdle")]
        player_idle: bool,
    },
    /// Vote to start the next game.
    #[serde(rename = "player_ready")]
    PlayerReady,
    /// Replace the room's genre filter.
    #[serde(rename = "update_genres")]
    UpdateGenres {
        #[serde(rename = "songGenres")]
        song_genres: Vec<String>,
    },
    /// Application-level heartbeat.
    #[serde(rename = "ping")]
    Ping,
    /// Any event name this server does not know.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame into an envelope.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Reasons an `update_status` envelope is not a usable submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusFieldsError {
    /// `status` was present but not `skip`.
    #[error("unsupported status `{0}`")]
    UnsupportedStatus(String),
    /// Neither a skip nor a complete guess.
    #[error("a guess requires both songName and songArtist")]
    IncompleteGuess,
}

impl StatusUpdate {
    /// Interpret the loose fields of an `update_status` envelope.
    pub fn from_fields(
        status: Option<String>,
        song_name: Option<String>,
        song_artist: Option<String>,
    ) -> Result<Self, StatusFieldsError> {
        match (status, song_name, song_artist) {
            (Some(status), _, _) if status == "skip" => Ok(StatusUpdate::Skip),
            (Some(status), _, _) => Err(StatusFieldsError::UnsupportedStatus(status)),
            (None, Some(name), Some(artist)) => Ok(StatusUpdate::Guess { name, artist }),
            _ => Err(StatusFieldsError::IncompleteGuess),
        }
    }
}

/// Playable reference to the current song; it never reveals the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SongRef {
    #[serde(rename = "songId")]
    pub song_id: String,
    #[serde(rename = "previewUrl")]
    pub preview_url: String,
}

/// The answer revealed when a game ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SongInfo {
    pub name: String,
    pub artist: String,
}

/// Why a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EndType {
    /// Every player answered, or someone guessed correctly.
    Guessed,
    /// The countdown ran out.
    Timer,
}

/// Public view of a room member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerSnapshot {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
    #[serde(rename = "playerName")]
    pub player_name: String,
    pub status: Option<PlayerStatus>,
    pub score: u32,
    pub idle: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Envelopes pushed to player WebSocket clients.
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full room snapshot sent to a player right after joining.
    RoomInit {
        #[serde(rename = "playerId")]
        player_id: Uuid,
        round: u32,
        #[serde(rename = "timeLeft")]
        time_left: u32,
        song: SongRef,
        genres: Vec<Genre>,
        phase: RoomPhase,
        players: Vec<PlayerSnapshot>,
    },
    /// Someone else joined the room.
    PlayerJoined {
        #[serde(rename = "playerId")]
        player_id: Uuid,
        #[serde(rename = "playerName")]
        player_name: String,
    },
    /// Someone left the room.
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: Uuid,
        #[serde(rename = "playerName")]
        player_name: String,
    },
    /// A player's tab focus changed.
    PlayerIdle {
        #[serde(rename = "playerId")]
        player_id: Uuid,
        #[serde(rename = "playerIdle")]
        player_idle: bool,
    },
    /// A player answered, or a winner's score changed.
    PlayerStatus {
        #[serde(rename = "playerId")]
        player_id: Uuid,
        status: Option<PlayerStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        score: Option<u32>,
    },
    /// A new reveal window of the same song begins.
    RoundStart {
        round: u32,
        #[serde(rename = "timeLeft")]
        time_left: u32,
        song: SongRef,
    },
    /// The current round is over.
    RoundEnd {
        #[serde(rename = "endType")]
        end_type: EndType,
    },
    /// The song is over; the answer is revealed and ready voting opens.
    GameEnd {
        #[serde(rename = "correctPlayers")]
        correct_players: Vec<Uuid>,
        #[serde(rename = "songInfo")]
        song_info: SongInfo,
    },
    /// Enough players are ready; a new song starts at round 0.
    GameStart {
        round: u32,
        #[serde(rename = "timeLeft")]
        time_left: u32,
        song: SongRef,
    },
    /// Current ready vote tally.
    ReadyVotes { count: usize, required: usize },
    /// The room's genre filter changed.
    UpdateGenres { genres: Vec<Genre> },
    /// Countdown tick.
    UpdateTimer {
        #[serde(rename = "timeLeft")]
        time_left: u32,
    },
    /// Reply to `ping`.
    Pong,
    /// Something went wrong; see `message`.
    Error { message: String },
}

impl ServerMessage {
    /// Build an `error` envelope.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
