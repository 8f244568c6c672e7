//! Song catalog boundary: picking playable songs and checking guesses against them.

pub mod error;
#[cfg(feature = "itunes-preview")]
pub mod itunes;
pub mod list;

use std::{
    collections::{BTreeSet, HashSet},
    fmt,
};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{dto::ws::SongRef, state::judge::GuessVerdict};

pub use self::error::{CatalogError, CatalogResult};
pub use self::list::SongListCatalog;

/// Abstraction over the provider of playable songs.
pub trait SongCatalog: Send + Sync {
    /// Pick a random playable song whose id is not in `exclude` and whose genre is allowed.
    fn fetch_random_song(
        &self,
        exclude: HashSet<String>,
        genres: GenreFilter,
    ) -> BoxFuture<'static, CatalogResult<Song>>;

    /// Judge a free-text guess against the stored name and artist of `song_id`.
    fn match_guess(
        &self,
        song_id: &str,
        guess_name: &str,
        guess_artist: &str,
    ) -> CatalogResult<GuessVerdict>;
}

/// A song that can be played in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    /// Stable catalog identifier.
    pub id: String,
    /// Title as stored in the catalog, revealed at game end.
    pub name: String,
    /// Artist field as stored in the catalog, revealed at game end.
    pub artist: String,
    /// URL of the audio clip handed to clients.
    pub preview_url: String,
}

impl Song {
    /// Public reference sent to clients; it never carries the answer.
    pub fn reference(&self) -> SongRef {
        SongRef {
            song_id: self.id.clone(),
            preview_url: self.preview_url.clone(),
        }
    }
}

/// Fixed set of song categories a room can filter on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub enum Genre {
    /// Legendary older songs.
    Classics,
    /// Hits from the '80s to the early 2000s.
    Throwbacks,
    /// Modern chart music that is not rap.
    Pop,
    /// Rap and hip hop, old and new.
    HipHop,
}

impl Genre {
    /// Every genre, in display order.
    pub const ALL: [Genre; 4] = [Genre::Classics, Genre::Throwbacks, Genre::Pop, Genre::HipHop];

    /// Parse the wire name of a genre.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|genre| genre.as_str() == value)
    }

    /// Wire name of the genre.
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Classics => "Classics",
            Genre::Throwbacks => "Throwbacks",
            Genre::Pop => "Pop",
            Genre::HipHop => "HipHop",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a requested genre filter is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenreFilterError {
    /// At least one genre must stay selected.
    #[error("select at least one genre")]
    Empty,
    /// More entries than there are genres.
    #[error("at most {max} genres can be selected", max = Genre::ALL.len())]
    TooMany,
    /// The name is not part of the fixed genre set.
    #[error("unknown genre `{0}`")]
    Unknown(String),
    /// The same genre was listed twice.
    #[error("genre `{0}` listed more than once")]
    Duplicate(Genre),
}

/// Non-empty subset of [`Genre::ALL`] used when picking the next song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreFilter(BTreeSet<Genre>);

impl GenreFilter {
    /// Filter allowing every genre.
    pub fn all() -> Self {
        Self(Genre::ALL.into_iter().collect())
    }

    /// Build a filter from already-typed genres, rejecting empty sets and duplicates.
    pub fn from_genres(genres: &[Genre]) -> Result<Self, GenreFilterError> {
        if genres.is_empty() {
            return Err(GenreFilterError::Empty);
        }
        if genres.len() > Genre::ALL.len() {
            return Err(GenreFilterError::TooMany);
        }

        let mut set = BTreeSet::new();
        for genre in genres {
            if !set.insert(*genre) {
                return Err(GenreFilterError::Duplicate(*genre));
            }
        }
        Ok(Self(set))
    }

    /// Build a filter from the wire names sent by a client.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, GenreFilterError> {
        if names.len() > Genre::ALL.len() {
            return Err(GenreFilterError::TooMany);
        }
        let genres = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                Genre::parse(name).ok_or_else(|| GenreFilterError::Unknown(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_genres(&genres)
    }

    /// Whether songs of `genre` may be picked.
    pub fn contains(&self, genre: Genre) -> bool {
        self.0.contains(&genre)
    }

    /// Selected genres in display order.
    pub fn to_vec(&self) -> Vec<Genre> {
        self.0.iter().copied().collect()
    }
}

impl Default for GenreFilter {
    fn default() -> Self {
        Self::all()
    }
}
