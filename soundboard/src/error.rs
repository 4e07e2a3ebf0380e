//! Error types for the soundboard service
//!
//! Every failure inside a playback consumer loop maps to one of these
//! variants; the loops log them and keep going.

use thiserror::Error;

/// Main error type for the soundboard
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing audio file
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device failure
    #[error("Audio sink error: {0}")]
    Sink(String),

    /// Background music player or remote TTS unreachable
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Remote TTS answered with a non-success response
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Unparseable trigger payload
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Errors from the common library
    #[error(transparent)]
    Common(#[from] soundboard_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the soundboard Error
pub type Result<T> = std::result::Result<T, Error>;
