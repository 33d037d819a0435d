//! Error types for Voicegate

use thiserror::Error;

/// Result type alias for Voicegate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Voicegate
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error (capture or playback)
    #[error("audio error: {0}")]
    Audio(String),

    /// Session lifecycle error (start/cancel/complete failed)
    #[error("session error: {0}")]
    Session(String),

    /// Channel error (peer hung up, queue closed)
    #[error("channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
