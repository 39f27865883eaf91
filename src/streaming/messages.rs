//! WebSocket message types for the Rev AI streaming API.
//!
//! This module contains the message types exchanged with the service:
//!
//! - **Incoming messages**: JSON text frames from the server
//!   - [`ConnectedMessage`]: handshake acknowledgment carrying the session id
//!   - [`Hypothesis`]: a partial or final transcript fragment
//!
//! - **Outgoing frames**: binary audio chunks (sent directly, no JSON
//!   wrapper) and the [`END_OF_STREAM`] sentinel text frame

use serde::Deserialize;

/// Sentinel value sent as a text frame to tell the service that no more
/// audio will follow.
pub const END_OF_STREAM: &str = "EOS";

// =============================================================================
// Incoming Messages (Server to Client)
// =============================================================================

/// Handshake acknowledgment received once the session is live.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectedMessage {
    /// Message type identifier ("connected")
    #[serde(rename = "type")]
    pub message_type: String,
    /// Unique session identifier assigned by the service
    pub id: String,
}

/// Whether a hypothesis is provisional or settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisKind {
    /// Provisional transcript, may still change
    Partial,
    /// Settled transcript with timing and confidence metadata
    Final,
}

/// Element type tag within a hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// A transcribed word
    Text,
    /// A punctuation mark
    Punct,
}

/// One element of a hypothesis: a word or a punctuation mark.
///
/// Timing and confidence are only populated on final hypotheses.
#[derive(Debug, Clone, Deserialize)]
pub struct HypothesisElement {
    /// Element type tag
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// The transcribed word or punctuation mark
    pub value: String,
    /// Start time in seconds from the beginning of the audio stream
    #[serde(default)]
    pub ts: Option<f64>,
    /// End time in seconds from the beginning of the audio stream
    #[serde(default)]
    pub end_ts: Option<f64>,
    /// Confidence score for this element (0.0 to 1.0)
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A transcript fragment, either partial (provisional) or final (settled).
#[derive(Debug, Clone, Deserialize)]
pub struct Hypothesis {
    /// Whether this hypothesis is partial or final
    #[serde(rename = "type")]
    pub kind: HypothesisKind,
    /// Plain-text rendering of the hypothesis, when provided
    #[serde(default)]
    pub transcript: Option<String>,
    /// Start time of the fragment in seconds
    #[serde(default)]
    pub ts: Option<f64>,
    /// End time of the fragment in seconds
    #[serde(default)]
    pub end_ts: Option<f64>,
    /// Word and punctuation elements making up the fragment
    #[serde(default)]
    pub elements: Vec<HypothesisElement>,
}

impl Hypothesis {
    /// Check whether this hypothesis is final.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.kind == HypothesisKind::Final
    }
}

// =============================================================================
// Message Enum and Parsing
// =============================================================================

/// Enum for all possible text messages from the service.
///
/// Use `RevAiMessage::parse()` to deserialize incoming WebSocket text frames.
#[derive(Debug)]
pub enum RevAiMessage {
    /// Handshake acknowledgment
    Connected(ConnectedMessage),
    /// Transcription result
    Hypothesis(Hypothesis),
    /// Unknown message type (for forward compatibility)
    Unknown(String),
}

impl RevAiMessage {
    /// Parse a WebSocket text frame into the appropriate type.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        // First, peek at the type field
        #[derive(Deserialize)]
        struct TypePeek {
            #[serde(rename = "type")]
            message_type: String,
        }

        let peek: TypePeek = serde_json::from_str(text)?;

        match peek.message_type.as_str() {
            "connected" => {
                let msg: ConnectedMessage = serde_json::from_str(text)?;
                Ok(RevAiMessage::Connected(msg))
            }
            "partial" | "final" => {
                let msg: Hypothesis = serde_json::from_str(text)?;
                Ok(RevAiMessage::Hypothesis(msg))
            }
            _ => Ok(RevAiMessage::Unknown(text.to_string())),
        }
    }

    /// Check if this message is the handshake acknowledgment.
    #[inline]
    pub fn is_connected_ack(&self) -> bool {
        matches!(self, RevAiMessage::Connected(_))
    }
}
