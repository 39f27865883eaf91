//! Error types for the streaming client.

use thiserror::Error;

/// Errors that can occur during a streaming session.
#[derive(Debug, Error)]
pub enum StreamingError {
    /// Invalid client or session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A streaming session was already started on this client
    #[error("Session already started")]
    AlreadyStarted,

    /// The connection could not be established
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// WebSocket transport error after the handshake
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The audio stream was written to after it had been ended
    #[error("Write after end: the audio stream has already been ended")]
    WriteAfterEnd,
}

/// Result type for streaming operations.
pub type StreamingResult<T> = Result<T, StreamingError>;
