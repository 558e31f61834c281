//! Error types for keeper-panes

use thiserror::Error;

/// Pane worker error type
#[derive(Debug, Error)]
pub enum Error {
    /// Text completion provider error
    #[error("completion error: {0}")]
    Completion(String),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed response from an external service
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Filesystem error while saving an illustration
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
