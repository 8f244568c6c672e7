//! Error types shared by song catalog implementations.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias returning [`CatalogError`] failures.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Failures that can occur while picking or resolving songs.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The song list could not be read from disk.
    #[error("failed to read song list `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The song list is not valid JSON for the expected shape.
    #[error("failed to parse song list `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// No eligible song with a playable preview could be found.
    #[error("no playable song left for the selected genres")]
    Exhausted,
    /// The requested song id is not part of the catalog.
    #[error("unknown song `{0}`")]
    UnknownSong(String),
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[cfg(feature = "itunes-preview")]
    #[error("failed to build preview lookup client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The preview lookup request failed or returned an unreadable body.
    #[cfg(feature = "itunes-preview")]
    #[error("preview lookup failed for `{term}`")]
    Lookup {
        term: String,
        #[source]
        source: reqwest::Error,
    },
}
