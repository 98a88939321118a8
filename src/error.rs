//! Error types.
//!
//! Engine outcomes that users are expected to hit (bad input, duplicates,
//! an expired selection) are plain enum values in their engines. What lives
//! here are real failures: storage, media io, notification delivery.

use thiserror::Error;

/// Failures of the catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection
    #[error("catalog lock poisoned")]
    Poisoned,

    /// A stored row failed to decode
    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    /// Export/import payload
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the media collaborator.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("media payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("empty media payload")]
    Empty,
}

/// Errors that can occur when sending notifications.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote answered with a non-success status
    #[error("webhook answered {0}")]
    Status(reqwest::StatusCode),
}

/// Everything a turn handler can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Media(#[from] MediaError),

    /// Blocking catalog work panicked or was cancelled
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;
