//! Catalog backed by a curated JSON song list.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
    sync::Arc,
};

use futures::future::BoxFuture;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info, warn};

#[cfg(feature = "itunes-preview")]
use super::itunes::ItunesPreviewLookup;
use super::{
    Genre, GenreFilter, Song, SongCatalog,
    error::{CatalogError, CatalogResult},
};
use crate::{config::AppConfig, state::judge::{self, GuessVerdict}};

/// One entry of the song list file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Stable identifier, unique within the list.
    pub id: String,
    /// Song title.
    pub name: String,
    /// Artist field; several artists are separated by commas.
    pub artist: String,
    /// Category used by room genre filters.
    pub genre: Genre,
    /// Known preview clip; resolved on demand when absent.
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// In-memory song list with optional on-demand preview resolution.
#[derive(Clone)]
pub struct SongListCatalog {
    songs: Arc<[CatalogEntry]>,
    by_id: Arc<HashMap<String, usize>>,
    attempts: usize,
    #[cfg(feature = "itunes-preview")]
    previews: Option<ItunesPreviewLookup>,
}

impl SongListCatalog {
    /// Build a catalog from explicit entries; only entries carrying a preview URL are playable.
    pub fn from_entries(entries: Vec<CatalogEntry>, attempts: usize) -> Self {
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.id.clone(), index))
            .collect();
        Self {
            songs: entries.into(),
            by_id: Arc::new(by_id),
            attempts: attempts.max(1),
            #[cfg(feature = "itunes-preview")]
            previews: None,
        }
    }

    /// Load the song list named in the configuration and wire the preview lookup.
    pub fn load(config: &AppConfig) -> CatalogResult<Self> {
        let entries = read_entries(&config.catalog_path)?;
        info!(
            path = %config.catalog_path.display(),
            count = entries.len(),
            "loaded song list"
        );

        #[allow(unused_mut)]
        let mut catalog = Self::from_entries(entries, config.fetch_attempts);
        #[cfg(feature = "itunes-preview")]
        if config.preview_lookup {
            catalog.previews = Some(ItunesPreviewLookup::new()?);
        }
        Ok(catalog)
    }

    /// Number of entries in the list.
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    /// Whether the list holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    fn entry(&self, song_id: &str) -> Option<&CatalogEntry> {
        self.by_id.get(song_id).map(|index| &self.songs[*index])
    }

    async fn resolve_preview(&self, entry: &CatalogEntry) -> CatalogResult<Option<String>> {
        if let Some(url) = entry.preview_url.as_ref() {
            return Ok(Some(url.clone()));
        }

        #[cfg(feature = "itunes-preview")]
        if let Some(previews) = self.previews.as_ref() {
            return previews.find_preview(&entry.name, &entry.artist).await;
        }

        Ok(None)
    }
}

impl SongCatalog for SongListCatalog {
    fn fetch_random_song(
        &self,
        exclude: HashSet<String>,
        genres: GenreFilter,
    ) -> BoxFuture<'static, CatalogResult<Song>> {
        let catalog = self.clone();
        Box::pin(async move {
            let mut pool: Vec<usize> = catalog
                .songs
                .iter()
                .enumerate()
                .filter(|(_, entry)| genres.contains(entry.genre) && !exclude.contains(&entry.id))
                .map(|(index, _)| index)
                .collect();

            for _ in 0..catalog.attempts {
                if pool.is_empty() {
                    break;
                }
                let pick = {
                    let mut rng = rand::rng();
                    rng.random_range(0..pool.len())
                };
                let entry = &catalog.songs[pool.swap_remove(pick)];
                debug!(song_id = %entry.id, name = %entry.name, artist = %entry.artist, "picked candidate");

                match catalog.resolve_preview(entry).await {
                    Ok(Some(preview_url)) => {
                        return Ok(Song {
                            id: entry.id.clone(),
                            name: entry.name.clone(),
                            artist: entry.artist.clone(),
                            preview_url,
                        });
                    }
                    Ok(None) => debug!(song_id = %entry.id, "candidate has no preview; skipping"),
                    Err(err) => warn!(song_id = %entry.id, error = %err, "preview lookup failed"),
                }
            }

            Err(CatalogError::Exhausted)
        })
    }

    fn match_guess(
        &self,
        song_id: &str,
        guess_name: &str,
        guess_artist: &str,
    ) -> CatalogResult<GuessVerdict> {
        let entry = self
            .entry(song_id)
            .ok_or_else(|| CatalogError::UnknownSong(song_id.to_string()))?;
        Ok(judge::match_guess(
            &entry.name,
            &entry.artist,
            guess_name,
            guess_artist,
        ))
    }
}

fn read_entries(path: &Path) -> CatalogResult<Vec<CatalogEntry>> {
    let contents = fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
