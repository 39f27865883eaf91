//! Configuration types for the Rev AI streaming API.
//!
//! This module contains all configuration-related types:
//! - Audio format description and its content-type serialization
//! - Per-session transcription options
//! - The client configuration and connection URL construction

use url::form_urlencoded;

// =============================================================================
// Constants
// =============================================================================

/// Base endpoint of the Rev AI realtime streaming API.
pub const REVAI_STREAMING_URL: &str = "wss://api.rev.ai/speechtotext/v1/stream";

/// Fixed client identifier sent with every connection.
const USER_AGENT: &str = concat!("revai-rust/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Audio Format
// =============================================================================

/// Description of the audio pushed into a streaming session.
///
/// Serializes to a single content-type value such as
/// `audio/x-raw;layout=interleaved;rate=16000;format=S16LE;channels=1`.
/// Fields that were not supplied are omitted from the serialization.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Base content type (e.g. `audio/x-raw`, `audio/x-flac`)
    pub content_type: String,
    /// Channel interleaving layout (raw audio only)
    pub layout: Option<String>,
    /// Sample rate in Hz
    pub rate: Option<u32>,
    /// Sample format (e.g. `S16LE`)
    pub format: Option<String>,
    /// Number of audio channels
    pub channels: Option<u32>,
}

impl AudioConfig {
    /// Create a configuration for a self-describing container format.
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            layout: None,
            rate: None,
            format: None,
            channels: None,
        }
    }

    /// Create a configuration for raw audio (`audio/x-raw`) with the
    /// supplied parameters.
    pub fn raw(
        layout: Option<&str>,
        rate: Option<u32>,
        format: Option<&str>,
        channels: Option<u32>,
    ) -> Self {
        Self {
            content_type: "audio/x-raw".to_string(),
            layout: layout.map(Into::into),
            rate,
            format: format.map(Into::into),
            channels,
        }
    }

    /// Serialize to the content-type value the service expects.
    ///
    /// Supplied fields appear in the order layout, rate, format, channels;
    /// absent fields are omitted entirely, never emitted as empty segments.
    pub fn to_content_type_string(&self) -> String {
        let mut value = String::with_capacity(64);
        value.push_str(&self.content_type);

        if let Some(layout) = &self.layout {
            value.push_str(";layout=");
            value.push_str(layout);
        }
        if let Some(rate) = self.rate {
            value.push_str(";rate=");
            value.push_str(&rate.to_string());
        }
        if let Some(format) = &self.format {
            value.push_str(";format=");
            value.push_str(format);
        }
        if let Some(channels) = self.channels {
            value.push_str(";channels=");
            value.push_str(&channels.to_string());
        }

        value
    }
}

// =============================================================================
// Session Options
// =============================================================================

/// Per-session transcription options.
///
/// All fields are optional; absent fields do not appear in the connection
/// parameters at all, and boolean flags are emitted only when set.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Free-form metadata attached to the session
    pub metadata: Option<String>,
    /// Identifier of a previously submitted custom vocabulary
    pub custom_vocabulary_id: Option<String>,
    /// Mask profanity in the transcript
    pub filter_profanity: bool,
    /// Remove filler words from the transcript
    pub remove_disfluencies: bool,
    /// Seconds after which the service deletes the session data
    pub delete_after_seconds: Option<u32>,
    /// Include element details in partial hypotheses
    pub detailed_partials: bool,
    /// Offset added to all returned timestamps, in seconds
    pub start_ts: Option<f64>,
    /// Transcriber selection
    pub transcriber: Option<String>,
    /// Language code for the session
    pub language: Option<String>,
    /// Skip post-processing (punctuation, casing) on final hypotheses
    pub skip_postprocessing: bool,
    /// Detect and mark speaker switches
    pub enable_speaker_switch: bool,
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for [`RevAiStreamingClient`](super::RevAiStreamingClient).
#[derive(Debug, Clone)]
pub struct RevAiStreamingConfig {
    /// Rev AI access token
    pub access_token: String,
    /// Streaming endpoint base URL
    pub base_url: String,
}

impl RevAiStreamingConfig {
    /// Create a configuration for the production streaming endpoint.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: REVAI_STREAMING_URL.to_string(),
        }
    }

    /// Override the endpoint base URL (e.g. for a local test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the WebSocket URL with all connection parameters.
    ///
    /// The required parameters (`access_token`, `content_type`,
    /// `user_agent`) always come first; optional session fields follow, each
    /// only when present, boolean flags only when set. All values are
    /// percent-encoded.
    pub fn build_websocket_url(&self, audio: &AudioConfig, session: &SessionConfig) -> String {
        // URL-encode helper using form_urlencoded
        fn encode(s: &str) -> String {
            form_urlencoded::byte_serialize(s.as_bytes()).collect()
        }

        let mut params = vec![
            format!("access_token={}", encode(&self.access_token)),
            format!("content_type={}", encode(&audio.to_content_type_string())),
            format!("user_agent={}", encode(USER_AGENT)),
        ];

        if let Some(metadata) = &session.metadata {
            params.push(format!("metadata={}", encode(metadata)));
        }
        if let Some(id) = &session.custom_vocabulary_id {
            params.push(format!("custom_vocabulary_id={}", encode(id)));
        }
        if session.filter_profanity {
            params.push("filter_profanity=true".to_string());
        }
        if session.remove_disfluencies {
            params.push("remove_disfluencies=true".to_string());
        }
        if let Some(seconds) = session.delete_after_seconds {
            params.push(format!("delete_after_seconds={seconds}"));
        }
        if session.detailed_partials {
            params.push("detailed_partials=true".to_string());
        }
        if let Some(start_ts) = session.start_ts {
            params.push(format!("start_ts={start_ts}"));
        }
        if let Some(transcriber) = &session.transcriber {
            params.push(format!("transcriber={}", encode(transcriber)));
        }
        if let Some(language) = &session.language {
            params.push(format!("language={}", encode(language)));
        }
        if session.skip_postprocessing {
            params.push("skip_postprocessing=true".to_string());
        }
        if session.enable_speaker_switch {
            params.push("enable_speaker_switch=true".to_string());
        }

        format!("{}?{}", self.base_url, params.join("&"))
    }
}
