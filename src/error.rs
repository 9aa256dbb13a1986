//! Error taxonomy for the ingestion pipeline.
//!
//! [`LoadError`] is fatal at startup; everything else is recoverable and is
//! converted into an empty snapshot plus a user-visible warning at the
//! board boundary.

use thiserror::Error;

/// A static GTFS table could not be loaded. Raised once, at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row in {file}: {source}")]
    Malformed {
        file: String,
        #[source]
        source: csv::Error,
    },
}

/// A single feed fetch attempt failed. No retries are made here; the
/// caller decides whether to surface or re-trigger.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed endpoint returned HTTP {0}")]
    Status(u16),

    #[error("feed request timed out")]
    Timeout,

    #[error("feed request failed: {0}")]
    Transport(reqwest::Error),

    #[error("invalid feed url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e)
        }
    }
}

/// The fetched payload is not a well-formed GTFS-realtime message.
#[derive(Debug, Error)]
#[error("invalid GTFS-realtime payload: {0}")]
pub struct DecodeError(#[from] pub prost::DecodeError);

/// A user-supplied selector matched nothing in the reference data.
#[derive(Debug, Error)]
#[error("no route with short name {short_name:?}")]
pub struct NotFoundError {
    pub short_name: String,
}
