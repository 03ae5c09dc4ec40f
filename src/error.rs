//! Error types for each stage of the ingestion pipeline.
//!
//! | Error | Raised by | Scope of failure |
//! |-------|-----------|------------------|
//! | [`FetchError`] | fetcher | current cycle |
//! | [`StoreError`] | store backends | per item (writer) or current cycle (selection) |
//! | [`CycleError`] | scheduler | current cycle, never the loop |
//! | [`SchedulerError`] | scheduler construction | startup |
//! | [`ConfigError`] | config loading | startup |

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Failure to obtain a parsed feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid feed URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed feed document: {0}")]
    MalformedDocument(String),

    #[error("fetch cancelled by shutdown")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        FetchError::Network(error.to_string())
    }
}

impl From<quick_xml::Error> for FetchError {
    fn from(error: quick_xml::Error) -> Self {
        FetchError::MalformedDocument(error.to_string())
    }
}

/// Failure reported by a [`crate::store::FeedStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A post with the same `(feed_id, url)` already exists.
    #[error("duplicate post {url:?} for feed {feed_id}")]
    DuplicateKey { feed_id: Uuid, url: String },

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

/// Why a single scheduler cycle did not complete.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("could not select a feed to fetch: {0}")]
    Select(#[source] StoreError),

    #[error("could not mark feed {feed_id} as fetched: {source}")]
    MarkFetched {
        feed_id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("could not fetch feed {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
}

impl CycleError {
    /// True when there was simply nothing registered to fetch.
    pub fn is_no_feeds(&self) -> bool {
        matches!(self, CycleError::Select(StoreError::NotFound(_)))
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("interval {requested:?} is shorter than the minimum of {minimum:?}")]
    IntervalTooShort {
        requested: Duration,
        minimum: Duration,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no database URL configured (set db_url, --database-url or DATABASE_URL)")]
    MissingDatabaseUrl,
}
