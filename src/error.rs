//! Error types for Lingo

use thiserror::Error;

use crate::llm::LlmError;

/// Result type alias for Lingo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Lingo
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (invalid option, missing key, unsupported voice)
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Language model provider error
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Embedding error
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
