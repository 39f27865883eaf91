//! Rev AI realtime streaming speech-to-text integration.
//!
//! This module provides a streaming client for the Rev AI realtime
//! transcription WebSocket API with support for:
//!
//! - Real-time streaming transcription over a single WebSocket session
//! - Partial and final hypotheses with element-level timing and confidence
//! - Binary audio streaming (raw chunks, no base64 encoding overhead)
//! - Custom vocabularies, profanity filtering, disfluency removal and the
//!   other per-session options the service accepts as connection parameters
//! - Graceful (`end`) and abrupt (`abort`) session termination
//!
//! # Architecture
//!
//! The module is organized into focused submodules:
//!
//! - [`config`]: Configuration types (`RevAiStreamingConfig`, `AudioConfig`,
//!   `SessionConfig`) and connection URL construction
//! - [`messages`]: WebSocket message types for API communication
//! - [`duplex`]: The caller-facing duplex bridging the outbound audio queue
//!   and the inbound hypothesis queue
//! - [`client`]: The main `RevAiStreamingClient` session controller
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use revai_streaming::{
//!     AudioConfig, RevAiStreamingClient, RevAiStreamingConfig, SessionConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RevAiStreamingConfig::new("your-access-token");
//!     let mut client = RevAiStreamingClient::new(config)?;
//!
//!     let audio = AudioConfig::raw(Some("interleaved"), Some(16000), Some("S16LE"), Some(1));
//!     let (mut duplex, _events) = client.start(&audio, &SessionConfig::default())?;
//!
//!     duplex.write(Bytes::from_static(&[0u8; 3200])).await?;
//!     client.end().await?;
//!
//!     while let Some(hypothesis) = duplex.read().await {
//!         println!("{:?}", hypothesis.transcript);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod duplex;
mod messages;

#[cfg(test)]
mod tests;

// Re-export public types
pub use client::{RevAiStreamingClient, SessionEvent, SessionEvents};
pub use config::{AudioConfig, REVAI_STREAMING_URL, RevAiStreamingConfig, SessionConfig};
pub use duplex::SessionDuplex;
pub use messages::{
    ConnectedMessage, END_OF_STREAM, ElementType, Hypothesis, HypothesisElement, HypothesisKind,
    RevAiMessage,
};
