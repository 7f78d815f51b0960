//! Error types for each stage of the feed.
//!
//! Every stage owns its error enum so the poll loop can tell a failed fetch
//! from a failed write when it logs a cycle, and startup can report which
//! step of the initial load broke.

use thiserror::Error;

/// Failure while retrieving or parsing one listing page.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Page number outside the range the listing serves.
    #[error("page number must be between 1 and 20, got {0}")]
    InvalidPage(u32),

    /// The HTTP request itself failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The listing answered with a non-success status.
    #[error("page {page} returned HTTP {status}")]
    Status {
        page: u32,
        status: reqwest::StatusCode,
    },

    /// Listing URL could not be built from the configured base.
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// The body did not contain the listing table at all.
    #[error("page {0} has no listing markup")]
    MissingMarkup(u32),
}

/// Failure against the article table.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Anything that can go wrong inside one poll cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),

    #[error("could not serialize broadcast: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure writing a page archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Failure during the sequential initial load. Always fatal to startup.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("page count must be between 1 and 20, got {0}")]
    InvalidPageCount(u32),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),

    #[error("archive failed: {0}")]
    Archive(#[from] ArchiveError),
}
