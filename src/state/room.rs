//! Room session: round lifecycle, roster, ready voting, and genre filter of one room.
//!
//! Every method of [`RoomSession`] runs under the room's mutex, so each one is an
//! atomic transaction over the room state. Work that has to wait (the next-round
//! delay, the countdown, the next-song fetch) runs in spawned tasks holding a weak
//! reference to the room and re-enters the lock to apply its result.

use std::{
    collections::HashSet,
    ops::ControlFlow,
    sync::{Arc, Weak},
    time::Duration,
};

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;
use tokio::{
    sync::{Mutex, MutexGuard, TryLockError},
    time::{Instant, sleep},
};
use tracing::{debug, info, warn};

use super::{
    broadcast::Connection,
    judge,
    phase::{PhaseMachine, RoomEvent, RoomPhase},
    player::{Player, PlayerId, PlayerStatus, RecentPlayer, Roster},
    scoring,
    timer::RoundTimer,
};
use crate::{
    catalog::{CatalogResult, GenreFilter, GenreFilterError, Song, SongCatalog},
    config::{GameRules, RetentionPolicy},
    dto::ws::{EndType, ServerMessage, SongInfo},
};

/// Collaborators and limits shared by every room.
#[derive(Clone)]
pub struct RoomContext {
    /// Provider of songs and guess verdicts.
    pub catalog: Arc<dyn SongCatalog>,
    /// Round timings.
    pub rules: GameRules,
    /// History caps.
    pub retention: RetentionPolicy,
}

/// A player's submission for the open round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Pass on this round.
    Skip,
    /// Free-text guess of title and artist.
    Guess {
        /// Guessed title.
        name: String,
        /// Guessed artist.
        artist: String,
    },
}

/// Requests that are well-formed but not allowed in the room's current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The player is not part of this room.
    #[error("player is not in this room")]
    UnknownPlayer,
    /// Guesses are only accepted while a round is open.
    #[error("no round is accepting guesses right now")]
    NotAcceptingGuesses,
    /// The player already answered this round.
    #[error("you already answered this round")]
    AlreadyAnswered,
    /// Ready votes are only counted after a game ends.
    #[error("ready votes are only accepted after a game ends")]
    NotInReadyCheck,
    /// The player already voted.
    #[error("you already voted to start the next game")]
    AlreadyVoted,
    /// The requested genre filter is not a valid selection.
    #[error("invalid genre selection: {0}")]
    InvalidGenres(#[from] GenreFilterError),
}

/// Lifecycle of the song that the next game will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextSong {
    /// `current_song` is playable for the upcoming or running game.
    Ready,
    /// A fetch is in flight; start the game as soon as it lands when flagged.
    Fetching { start_when_ready: bool },
    /// The last fetch failed; retried when the room reaches the ready threshold again.
    Failed,
}

/// Shared handle of one room.
pub struct Room {
    code: String,
    session: Mutex<RoomSession>,
}

impl Room {
    /// Create a room whose first game plays `song`.
    pub fn new(code: String, song: Song, genres: GenreFilter, context: RoomContext) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            session: Mutex::new(RoomSession::new(
                weak.clone(),
                code.clone(),
                song,
                genres,
                context,
            )),
            code,
        })
    }

    /// Five-character code players use to join.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Enter the room's critical section.
    pub async fn lock(&self) -> MutexGuard<'_, RoomSession> {
        self.session.lock().await
    }

    /// Enter the critical section only if nobody else holds it.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, RoomSession>, TryLockError> {
        self.session.try_lock()
    }
}

/// Mutable state of a room; only reachable through [`Room::lock`].
pub struct RoomSession {
    room: Weak<Room>,
    code: String,
    context: RoomContext,
    phase: PhaseMachine,
    roster: Roster,
    recent_players: IndexMap<PlayerId, RecentPlayer>,
    current_song: Song,
    next_song: NextSong,
    previous_song_ids: IndexSet<String>,
    round: u32,
    time_left: u32,
    timer: RoundTimer,
    ready_voters: HashSet<PlayerId>,
    genre_filter: GenreFilter,
    games_finished: u64,
    empty_since: Option<Instant>,
}

impl RoomSession {
    fn new(
        room: Weak<Room>,
        code: String,
        song: Song,
        genre_filter: GenreFilter,
        context: RoomContext,
    ) -> Self {
        let time_left = context.rules.round_duration(0);
        Self {
            room,
            code,
            context,
            phase: PhaseMachine::new(),
            roster: Roster::default(),
            recent_players: IndexMap::new(),
            current_song: song,
            next_song: NextSong::Ready,
            previous_song_ids: IndexSet::new(),
            round: 0,
            time_left,
            timer: RoundTimer::default(),
            ready_voters: HashSet::new(),
            genre_filter,
            games_finished: 0,
            empty_since: Some(Instant::now()),
        }
    }

    /// Current phase of the room.
    pub fn phase(&self) -> RoomPhase {
        self.phase.phase()
    }

    /// Zero-based reveal window of the running game.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Seconds left in the open round.
    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    /// Song of the running game, or the pre-fetched song of the next one.
    pub fn current_song(&self) -> &Song {
        &self.current_song
    }

    /// Genres allowed for the next fetch.
    pub fn genre_filter(&self) -> &GenreFilter {
        &self.genre_filter
    }

    /// Connected players in join order.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Ready votes cast since the last game ended.
    pub fn ready_votes(&self) -> usize {
        self.ready_voters.len()
    }

    /// Whether the round countdown is running.
    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Whether a disconnected player with this id is remembered.
    pub fn remembers(&self, id: &PlayerId) -> bool {
        self.recent_players.contains_key(id)
    }

    /// Whether `song_id` is excluded from future picks.
    pub fn has_played(&self, song_id: &str) -> bool {
        self.previous_song_ids.contains(song_id)
    }

    /// True when the room has had no players for at least `ttl`.
    pub fn is_abandoned(&self, ttl: Duration) -> bool {
        self.roster.is_empty()
            && self
                .empty_since
                .is_some_and(|since| since.elapsed() >= ttl)
    }

    /// Admit a connection into the room, restoring a recent player when the id and name match.
    ///
    /// Returns the id the client must keep for reconnecting.
    pub fn join(
        &mut self,
        name: String,
        claimed_id: Option<PlayerId>,
        connection: Connection,
    ) -> PlayerId {
        let restored = claimed_id
            .filter(|id| !self.roster.contains(id))
            .and_then(|id| self.take_recent_player(id, &name));

        let player = match restored {
            Some(recent) => {
                let same_context =
                    recent.song_id == self.current_song.id && recent.round == self.round;
                info!(
                    room = %self.code,
                    player_id = %recent.id,
                    name = %recent.name,
                    status_restored = same_context,
                    "player reconnected"
                );
                Player {
                    status: if same_context { recent.status } else { None },
                    score: recent.score,
                    ..Player::new(recent.id, recent.name, connection)
                }
            }
            None => {
                let player = Player::new(PlayerId::new_v4(), name, connection);
                info!(room = %self.code, player_id = %player.id, name = %player.name, "player joined");
                player
            }
        };

        let player_id = player.id;
        let joined = ServerMessage::PlayerJoined {
            player_id,
            player_name: player.name.clone(),
        };
        self.roster.insert(player);
        self.empty_since = None;

        self.roster.broadcast(&joined, Some(player_id));
        let snapshot = self.room_init(player_id);
        self.roster.send_to(&player_id, &snapshot);

        self.resume_round();
        if self.phase() == RoomPhase::ReadyCheck {
            self.broadcast_ready_votes();
        }
        self.check_ready_threshold();
        player_id
    }

    /// Drop a player's connection, keeping a snapshot for reconnection.
    pub fn leave(&mut self, player_id: PlayerId) {
        let Some(player) = self.roster.remove(&player_id) else {
            return;
        };
        info!(room = %self.code, player_id = %player.id, name = %player.name, "player left");

        self.remember_player(RecentPlayer {
            id: player.id,
            name: player.name.clone(),
            score: player.score,
            status: player.status,
            song_id: self.current_song.id.clone(),
            round: self.round,
        });
        self.roster.broadcast(
            &ServerMessage::PlayerLeft {
                player_id: player.id,
                player_name: player.name,
            },
            None,
        );

        if self.roster.is_empty() {
            self.timer.disarm();
            self.empty_since = Some(Instant::now());
            info!(room = %self.code, "room is empty");
            return;
        }

        self.check_round_complete();
        if self.phase() == RoomPhase::ReadyCheck {
            self.broadcast_ready_votes();
        }
        self.check_ready_threshold();
    }

    /// Record a skip or a guess for the open round.
    pub fn submit_status(
        &mut self,
        player_id: PlayerId,
        update: StatusUpdate,
    ) -> Result<PlayerStatus, SessionError> {
        if self.phase() != RoomPhase::AwaitingGuesses {
            return Err(SessionError::NotAcceptingGuesses);
        }
        let player = self
            .roster
            .get(&player_id)
            .ok_or(SessionError::UnknownPlayer)?;
        if player.status.is_some() {
            return Err(SessionError::AlreadyAnswered);
        }

        let status = match update {
            StatusUpdate::Skip => PlayerStatus::Skip,
            StatusUpdate::Guess { name, artist } => self.judge(&name, &artist),
        };
        if let Some(player) = self.roster.get_mut(&player_id) {
            player.status = Some(status);
        }
        debug!(room = %self.code, player_id = %player_id, status = ?status, round = self.round, "status submitted");

        if !self.timer.is_armed() {
            self.timer.arm(self.room.clone(), self.context.rules.tick);
        }

        self.roster.broadcast(
            &ServerMessage::PlayerStatus {
                player_id,
                status: Some(status),
                score: None,
            },
            None,
        );

        if status == PlayerStatus::Correct {
            self.end_round(EndType::Guessed);
        } else {
            self.check_round_complete();
        }
        Ok(status)
    }

    /// Update a player's focus flag; round logic is unaffected.
    pub fn set_idle(&mut self, player_id: PlayerId, idle: bool) -> Result<(), SessionError> {
        let player = self
            .roster
            .get_mut(&player_id)
            .ok_or(SessionError::UnknownPlayer)?;
        player.idle = idle;
        self.roster.broadcast(
            &ServerMessage::PlayerIdle {
                player_id,
                player_idle: idle,
            },
            None,
        );
        Ok(())
    }

    /// Count a vote to start the next game.
    pub fn vote_ready(&mut self, player_id: PlayerId) -> Result<(), SessionError> {
        if self.phase() != RoomPhase::ReadyCheck {
            return Err(SessionError::NotInReadyCheck);
        }
        if !self.roster.contains(&player_id) {
            return Err(SessionError::UnknownPlayer);
        }
        if !self.ready_voters.insert(player_id) {
            return Err(SessionError::AlreadyVoted);
        }

        self.broadcast_ready_votes();
        self.check_ready_threshold();
        Ok(())
    }

    /// Replace the genre filter used by the next fetch.
    pub fn update_genres<S: AsRef<str>>(
        &mut self,
        player_id: PlayerId,
        names: &[S],
    ) -> Result<(), SessionError> {
        if !self.roster.contains(&player_id) {
            return Err(SessionError::UnknownPlayer);
        }
        let filter = GenreFilter::parse(names)?;
        info!(room = %self.code, player_id = %player_id, genres = ?filter.to_vec(), "genre filter updated");

        self.roster.broadcast(
            &ServerMessage::UpdateGenres {
                genres: filter.to_vec(),
            },
            None,
        );
        self.genre_filter = filter;
        Ok(())
    }

    /// Advance the countdown armed under `epoch`.
    pub fn on_timer_tick(&mut self, epoch: u64) -> ControlFlow<()> {
        if !self.timer.is_current(epoch) || self.phase() != RoomPhase::AwaitingGuesses {
            return ControlFlow::Break(());
        }

        self.time_left = self.time_left.saturating_sub(1);
        self.roster.broadcast(
            &ServerMessage::UpdateTimer {
                time_left: self.time_left,
            },
            None,
        );

        if self.time_left == 0 {
            self.end_round(EndType::Timer);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    fn judge(&self, name: &str, artist: &str) -> PlayerStatus {
        if !judge::is_well_formed(name, artist) {
            return PlayerStatus::Incorrect;
        }

        let song = &self.current_song;
        match self.context.catalog.match_guess(&song.id, name, artist) {
            Ok(verdict) => verdict.status(),
            Err(err) => {
                warn!(room = %self.code, song_id = %song.id, error = %err, "catalog could not judge guess; using stored answer");
                judge::match_guess(&song.name, &song.artist, name, artist).status()
            }
        }
    }

    fn check_round_complete(&mut self) {
        if self.phase() == RoomPhase::AwaitingGuesses && self.roster.all_answered() {
            self.end_round(EndType::Guessed);
        }
    }

    /// Restored statuses can complete the round, or keep it running with the countdown disarmed.
    fn resume_round(&mut self) {
        self.check_round_complete();
        if self.phase() == RoomPhase::AwaitingGuesses
            && !self.timer.is_armed()
            && self.roster.any_answered()
        {
            debug!(room = %self.code, round = self.round, "resuming countdown for restored answers");
            self.timer.arm(self.room.clone(), self.context.rules.tick);
        }
    }

    fn broadcast_ready_votes(&self) {
        self.roster.broadcast(
            &ServerMessage::ReadyVotes {
                count: self.ready_voters.len(),
                required: self.roster.len() / 2 + 1,
            },
            None,
        );
    }

    fn check_ready_threshold(&mut self) {
        if self.phase() != RoomPhase::ReadyCheck
            || self.roster.is_empty()
            || self.ready_voters.len() * 2 <= self.roster.len()
        {
            return;
        }

        info!(room = %self.code, votes = self.ready_voters.len(), connected = self.roster.len(), "ready threshold reached");
        self.ready_voters.clear();
        match self.next_song {
            NextSong::Ready => self.begin_game(),
            NextSong::Fetching { .. } => {
                self.next_song = NextSong::Fetching {
                    start_when_ready: true,
                };
            }
            NextSong::Failed => {
                self.next_song = NextSong::Fetching {
                    start_when_ready: true,
                };
                self.spawn_song_fetch();
            }
        }
    }

    fn end_round(&mut self, cause: EndType) {
        self.timer.disarm();

        let winners = self.roster.correct_players();
        let game_over = !winners.is_empty() || self.round + 1 >= self.context.rules.max_rounds;
        if let Err(err) = self.phase.apply(RoomEvent::RoundEnded { game_over }) {
            warn!(room = %self.code, error = %err, "round already ended");
            return;
        }
        info!(room = %self.code, round = self.round, cause = ?cause, winners = winners.len(), "round ended");

        self.roster
            .broadcast(&ServerMessage::RoundEnd { end_type: cause }, None);

        let points = scoring::points_per_winner(winners.len());
        for id in &winners {
            let Some(player) = self.roster.get_mut(id) else {
                continue;
            };
            player.score += points;
            let update = ServerMessage::PlayerStatus {
                player_id: player.id,
                status: player.status,
                score: Some(player.score),
            };
            self.roster.broadcast(&update, None);
        }

        if game_over {
            self.finish_game(winners);
        } else {
            self.round += 1;
            self.schedule_next_round();
        }
    }

    fn finish_game(&mut self, winners: Vec<PlayerId>) {
        let finished = self.current_song.clone();
        info!(room = %self.code, song_id = %finished.id, winners = winners.len(), "game ended");

        self.round = 0;
        self.time_left = self.context.rules.round_duration(0);
        self.ready_voters.clear();
        self.remember_song(finished.id.clone());
        self.games_finished += 1;
        self.next_song = NextSong::Fetching {
            start_when_ready: false,
        };
        self.spawn_song_fetch();
        self.roster.clear_statuses();

        self.roster.broadcast(
            &ServerMessage::GameEnd {
                correct_players: winners,
                song_info: SongInfo {
                    name: finished.name,
                    artist: finished.artist,
                },
            },
            None,
        );
    }

    fn begin_game(&mut self) {
        if let Err(err) = self.phase.apply(RoomEvent::GameStarted) {
            warn!(room = %self.code, error = %err, "cannot start a game");
            return;
        }

        self.timer.disarm();
        self.round = 0;
        self.time_left = self.context.rules.round_duration(0);
        self.ready_voters.clear();
        self.roster.clear_statuses();
        info!(room = %self.code, song_id = %self.current_song.id, "game started");

        self.roster.broadcast(
            &ServerMessage::GameStart {
                round: self.round,
                time_left: self.time_left,
                song: self.current_song.reference(),
            },
            None,
        );
    }

    fn schedule_next_round(&self) {
        let room = self.room.clone();
        let version = self.phase.version();
        let delay = self.context.rules.next_round_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            if let Some(room) = room.upgrade() {
                room.lock().await.start_next_round(version);
            }
        });
    }

    fn start_next_round(&mut self, version: u64) {
        if self.phase.version() != version {
            debug!(room = %self.code, "next round superseded");
            return;
        }
        if let Err(err) = self.phase.apply(RoomEvent::NextRound) {
            warn!(room = %self.code, error = %err, "cannot open the next round");
            return;
        }

        self.roster.clear_statuses();
        self.time_left = self.context.rules.round_duration(self.round);
        debug!(room = %self.code, round = self.round, time_left = self.time_left, "round started");

        self.roster.broadcast(
            &ServerMessage::RoundStart {
                round: self.round,
                time_left: self.time_left,
                song: self.current_song.reference(),
            },
            None,
        );
    }

    fn spawn_song_fetch(&self) {
        let fetch = self.context.catalog.fetch_random_song(
            self.previous_song_ids.iter().cloned().collect(),
            self.genre_filter.clone(),
        );
        let room = self.room.clone();
        let game = self.games_finished;
        tokio::spawn(async move {
            let result = fetch.await;
            if let Some(room) = room.upgrade() {
                room.lock().await.apply_fetched_song(game, result);
            }
        });
    }

    fn apply_fetched_song(&mut self, game: u64, result: CatalogResult<Song>) {
        let NextSong::Fetching { start_when_ready } = self.next_song else {
            debug!(room = %self.code, "discarding unexpected song fetch result");
            return;
        };
        if game != self.games_finished {
            debug!(room = %self.code, "discarding stale song fetch result");
            return;
        }

        match result {
            Ok(song) => {
                info!(room = %self.code, song_id = %song.id, "next song ready");
                self.current_song = song;
                self.next_song = NextSong::Ready;
                if start_when_ready {
                    self.begin_game();
                }
            }
            Err(err) => {
                warn!(room = %self.code, error = %err, "failed to fetch the next song");
                self.next_song = NextSong::Failed;
                self.roster.broadcast(
                    &ServerMessage::error(format!("failed to load the next song: {err}")),
                    None,
                );
            }
        }
    }

    fn room_init(&self, player_id: PlayerId) -> ServerMessage {
        ServerMessage::RoomInit {
            player_id,
            round: self.round,
            time_left: self.time_left,
            song: self.current_song.reference(),
            genres: self.genre_filter.to_vec(),
            phase: self.phase(),
            players: self.roster.snapshots(),
        }
    }

    fn take_recent_player(&mut self, id: PlayerId, name: &str) -> Option<RecentPlayer> {
        match self.recent_players.get(&id) {
            Some(recent) if recent.name == name => self.recent_players.shift_remove(&id),
            _ => None,
        }
    }

    fn remember_player(&mut self, recent: RecentPlayer) {
        self.recent_players.insert(recent.id, recent);
        while self.recent_players.len() > self.context.retention.recent_players {
            self.recent_players.shift_remove_index(0);
        }
    }

    fn remember_song(&mut self, song_id: String) {
        self.previous_song_ids.insert(song_id);
        while self.previous_song_ids.len() > self.context.retention.previous_songs {
            self.previous_song_ids.shift_remove_index(0);
        }
    }
}
