//! Error types

use thiserror::Error;

/// Errors raised by the notification channel
#[derive(Debug, Error)]
pub enum Error {
    /// Listener registered under a name outside the event enumeration
    #[error("unknown event name: {0}")]
    UnknownEvent(String),

    /// Connection target is not a usable WebSocket URL
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Transport could not open a link or accept a frame
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON encoding or decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for channel operations
pub type Result<T> = std::result::Result<T, Error>;
