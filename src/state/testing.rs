//! Test doubles shared by the room tests.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::extract::ws::Message;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    broadcast::Connection,
    judge::{self, GuessVerdict},
    room::RoomContext,
};
use crate::{
    catalog::{CatalogError, CatalogResult, GenreFilter, Song, SongCatalog},
    config::{GameRules, RetentionPolicy},
};

pub fn song(id: &str) -> Song {
    Song {
        id: id.into(),
        name: format!("Song {id}"),
        artist: "The Testers".into(),
        preview_url: format!("https://cdn.test/{id}.m4a"),
    }
}

/// Catalog handing out songs in order, optionally failing every fetch.
#[derive(Default)]
pub struct StubCatalog {
    songs: Vec<Song>,
    failing: AtomicBool,
    requests: Mutex<Vec<(HashSet<String>, GenreFilter)>>,
}

impl StubCatalog {
    pub fn new(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            songs: ids.iter().map(|id| song(id)).collect(),
            ..Self::default()
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<(HashSet<String>, GenreFilter)> {
        self.requests.lock().unwrap().clone()
    }
}

impl SongCatalog for StubCatalog {
    fn fetch_random_song(
        &self,
        exclude: HashSet<String>,
        genres: GenreFilter,
    ) -> BoxFuture<'static, CatalogResult<Song>> {
        let pick = if self.failing.load(Ordering::SeqCst) {
            Err(CatalogError::Exhausted)
        } else {
            self.songs
                .iter()
                .find(|song| !exclude.contains(&song.id))
                .cloned()
                .ok_or(CatalogError::Exhausted)
        };
        self.requests.lock().unwrap().push((exclude, genres));
        Box::pin(async move { pick })
    }

    fn match_guess(
        &self,
        song_id: &str,
        guess_name: &str,
        guess_artist: &str,
    ) -> CatalogResult<GuessVerdict> {
        let stored = song(song_id);
        Ok(judge::match_guess(
            &stored.name,
            &stored.artist,
            guess_name,
            guess_artist,
        ))
    }
}

pub fn rules() -> GameRules {
    GameRules {
        next_round_delay: Duration::from_millis(500),
        ..GameRules::default()
    }
}

pub fn context_with(catalog: Arc<StubCatalog>) -> RoomContext {
    RoomContext {
        catalog,
        rules: rules(),
        retention: RetentionPolicy::default(),
    }
}

pub fn context(ids: &[&str]) -> RoomContext {
    context_with(StubCatalog::new(ids))
}

/// Receiving end of a fake player socket.
pub struct TestClient {
    rx: mpsc::UnboundedReceiver<Message>,
    closed: bool,
}

impl TestClient {
    pub fn new() -> (Connection, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), Self { rx, closed: false })
    }

    /// Every event received so far, as JSON.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut events = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            match message {
                Message::Text(text) => events.push(serde_json::from_str(text.as_str()).unwrap()),
                Message::Close(_) => self.closed = true,
                _ => {}
            }
        }
        events
    }

    /// Whether a close frame was drained.
    pub fn saw_close(&self) -> bool {
        self.closed
    }

    /// Names of every event received so far.
    pub fn drain_names(&mut self) -> Vec<String> {
        self.drain()
            .iter()
            .map(|event| event["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

/// Events named `name` among `events`.
pub fn named<'a>(events: &'a [Value], name: &str) -> Vec<&'a Value> {
    events.iter().filter(|event| event["event"] == name).collect()
}

/// A correct guess for `song(id)`.
pub fn correct_guess(id: &str) -> super::room::StatusUpdate {
    let stored = song(id);
    super::room::StatusUpdate::Guess {
        name: stored.name,
        artist: stored.artist,
    }
}

/// A guess that matches nothing.
pub fn wrong_guess() -> super::room::StatusUpdate {
    super::room::StatusUpdate::Guess {
        name: "Nothing Alike".into(),
        artist: "Nobody".into(),
    }
}

/// Let spawned room tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
