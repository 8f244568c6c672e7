//! Preview URL lookup through the public iTunes search API.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::error::{CatalogError, CatalogResult};

const DEFAULT_SEARCH_URL: &str = "https://itunes.apple.com/search";

/// Resolves a playable preview clip for a song name and artist.
#[derive(Clone)]
pub struct ItunesPreviewLookup {
    client: Client,
    search_url: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "previewUrl")]
    preview_url: Option<String>,
}

impl ItunesPreviewLookup {
    /// Build a lookup against the public search endpoint.
    pub fn new() -> CatalogResult<Self> {
        Self::with_search_url(DEFAULT_SEARCH_URL)
    }

    /// Build a lookup against an alternative search endpoint.
    pub fn with_search_url(search_url: impl Into<String>) -> CatalogResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CatalogError::ClientBuilder { source })?;
        Ok(Self {
            client,
            search_url: Arc::from(search_url.into()),
        })
    }

    /// Return the preview URL of the best match, or `None` when the top hit has no clip.
    pub async fn find_preview(&self, name: &str, artist: &str) -> CatalogResult<Option<String>> {
        let term = format!("{name} {artist}");
        let response = self
            .client
            .get(self.search_url.as_ref())
            .query(&[("term", term.as_str()), ("media", "music"), ("limit", "1")])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| CatalogError::Lookup {
                term: term.clone(),
                source,
            })?;

        let body: SearchResponse =
            response
                .json()
                .await
                .map_err(|source| CatalogError::Lookup {
                    term: term.clone(),
                    source,
                })?;

        let preview = body
            .results
            .into_iter()
            .next()
            .and_then(|result| result.preview_url);
        if preview.is_none() {
            debug!(%term, "no preview available");
        }
        Ok(preview)
    }
}
