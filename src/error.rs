//! Error types for irisbot.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Unexpected failures. These are logged by the router and never shown in chat.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(String),

    #[error("{0}")]
    Other(String),
}
