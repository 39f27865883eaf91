//! Realtime streaming speech-to-text client for the Rev AI WebSocket API.

pub mod error;
pub mod streaming;

// Re-export commonly used items for convenience
pub use error::{StreamingError, StreamingResult};
pub use streaming::{
    AudioConfig, ConnectedMessage, ElementType, Hypothesis, HypothesisElement, HypothesisKind,
    RevAiMessage, RevAiStreamingClient, RevAiStreamingConfig, SessionConfig, SessionDuplex,
    SessionEvent, SessionEvents,
};
