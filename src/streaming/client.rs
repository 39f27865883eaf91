//! Rev AI streaming WebSocket client implementation.
//!
//! This module contains the `RevAiStreamingClient` session controller. It
//! owns the connection lifecycle for one streaming session: building the
//! connection URL, opening the WebSocket, pumping queued audio to the wire,
//! demultiplexing inbound frames into lifecycle events and transcription
//! hypotheses, and coordinating graceful versus abrupt termination with the
//! session duplex.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌───────────────────┐      ┌─────────────────┐
//! │  duplex.write()  │─────▶│ outbound (mpsc 32)│─────▶│                 │
//! └──────────────────┘      └───────────────────┘      │                 │
//!                                                      │  Session Task   │──▶ WebSocket
//! ┌──────────────────┐      ┌───────────────────┐      │ (tokio::select) │
//! │  duplex.read()   │◀─────│  inbound (mpsc)   │◀─────│                 │
//! └──────────────────┘      └───────────────────┘      └────────┬────────┘
//!                                                               │
//!                           ┌───────────────────┐               │
//!                           │ SessionEvents     │◀──────────────┘
//!                           └───────────────────┘
//! ```
//!
//! All state transitions happen on the single session task, on delivery of
//! discrete events: a queued outbound chunk, an inbound frame, or the abort
//! signal.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{AudioConfig, RevAiStreamingConfig, SessionConfig};
use super::duplex::{OutboundChunk, SessionDuplex, SessionState, TransportEnds};
use super::messages::{END_OF_STREAM, Hypothesis, RevAiMessage};
use crate::error::{StreamingError, StreamingResult};

// =============================================================================
// Constants
// =============================================================================

/// Capacity of the outbound audio queue.
///
/// Bounded so that writers are backpressured instead of buffering
/// unboundedly when the connection is slower than the audio source.
const OUTBOUND_CHANNEL_CAPACITY: usize = 32;

/// Close code reported when the peer goes away without a close frame.
const CLOSE_CODE_ABNORMAL: u16 = 1006;

/// Close code reported when the peer sends a close frame with no payload.
const CLOSE_CODE_NO_STATUS: u16 = 1005;

// =============================================================================
// Session Events
// =============================================================================

/// Lifecycle notifications emitted by a streaming session.
///
/// Exactly one event is emitted per distinct failure cause; racing close
/// triggers never duplicate an event. A caller-initiated
/// [`abort`](RevAiStreamingClient::abort) emits nothing.
#[derive(Debug)]
pub enum SessionEvent {
    /// The server answered the upgrade request with a plain HTTP response
    /// instead of completing the WebSocket handshake
    HttpResponse {
        /// HTTP status code of the rejection
        status: u16,
    },
    /// The connection could not be established at all
    ConnectFailed {
        /// The underlying connection error
        error: StreamingError,
    },
    /// Handshake acknowledgment received; the session is live
    Connected {
        /// Session identifier assigned by the service
        session_id: String,
    },
    /// The server closed the connection
    Closed {
        /// WebSocket close code
        code: u16,
        /// Close reason supplied by the server
        reason: String,
    },
    /// The connection failed after the handshake
    Error {
        /// The underlying transport error
        error: StreamingError,
    },
}

/// Receiving side of a session's lifecycle events.
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    /// Next lifecycle event; `None` once the session task has finished.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }
}

// =============================================================================
// RevAiStreamingClient
// =============================================================================

/// Rev AI realtime streaming client.
///
/// One client drives exactly one streaming session: [`start`](Self::start)
/// opens the connection and returns the session duplex plus its lifecycle
/// events; [`end`](Self::end) terminates the audio input gracefully;
/// [`abort`](Self::abort) tears the session down immediately.
pub struct RevAiStreamingClient {
    config: RevAiStreamingConfig,
    outbound_tx: Option<mpsc::Sender<OutboundChunk>>,
    abort_token: Option<CancellationToken>,
    state: Option<Arc<SessionState>>,
}

impl RevAiStreamingClient {
    /// Create a new streaming client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the access token is empty.
    pub fn new(config: RevAiStreamingConfig) -> StreamingResult<Self> {
        if config.access_token.is_empty() {
            return Err(StreamingError::InvalidConfiguration(
                "access token is required".to_string(),
            ));
        }

        Ok(Self {
            config,
            outbound_tx: None,
            abort_token: None,
            state: None,
        })
    }

    /// Start a streaming session.
    ///
    /// Returns immediately with the session duplex and its lifecycle events;
    /// the connection outcome (connected, HTTP rejection, connect failure)
    /// arrives as a [`SessionEvent`]. Audio written to the duplex before the
    /// connection opens is queued and transmitted in write order once it
    /// does.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyStarted` if a session was already started on this
    /// client.
    pub fn start(
        &mut self,
        audio: &AudioConfig,
        session: &SessionConfig,
    ) -> StreamingResult<(SessionDuplex, SessionEvents)> {
        if self.state.is_some() {
            return Err(StreamingError::AlreadyStarted);
        }

        let url = self.config.build_websocket_url(audio, session);

        let state = Arc::new(SessionState::new());
        let (duplex, ends) = SessionDuplex::channel(OUTBOUND_CHANNEL_CAPACITY, state.clone());
        let TransportEnds {
            outbound_rx,
            inbound_tx,
        } = ends;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let abort_token = CancellationToken::new();

        self.outbound_tx = Some(duplex.outbound_sender());
        self.abort_token = Some(abort_token.clone());
        self.state = Some(state.clone());

        let task = SessionTask {
            outbound_rx,
            inbound_tx,
            events_tx,
            abort_token,
            state,
        };
        tokio::spawn(task.run(url));

        Ok((duplex, SessionEvents { rx: events_rx }))
    }

    /// End the audio input gracefully.
    ///
    /// Queues the end-of-stream marker behind any audio already written and
    /// ends the outbound side; inbound hypotheses continue to flow until the
    /// server reacts and closes the connection. The marker is sent at most
    /// once per session; calling `end` again, or after the session has
    /// already closed, is a no-op.
    pub async fn end(&self) -> StreamingResult<()> {
        let (Some(state), Some(outbound_tx)) = (&self.state, &self.outbound_tx) else {
            return Ok(());
        };

        if state.close_write() {
            debug!("audio input ending");
            if outbound_tx.send(OutboundChunk::EndOfStream).await.is_err() {
                debug!("session closed before the end-of-stream marker could be queued");
            }
        }

        Ok(())
    }

    /// Abort the session immediately.
    ///
    /// Drops the connection without a close handshake and forces both sides
    /// of the duplex closed: writes fail, and the reader yields `None` even
    /// for hypotheses already queued. Safe to call from any state, any
    /// number of times; emits no [`SessionEvent`].
    pub fn abort(&self) {
        if let Some(state) = &self.state {
            state.abort();
        }
        if let Some(token) = &self.abort_token {
            token.cancel();
        }
    }

    /// Handle one inbound WebSocket frame.
    ///
    /// Text frames are parsed as structured messages: the `connected`
    /// acknowledgment becomes a [`SessionEvent::Connected`] and is never
    /// forwarded to the duplex; hypotheses are forwarded to the inbound
    /// queue unless the streams have been closed; a frame that fails to
    /// parse is logged and skipped without ending the session.
    pub(crate) fn handle_frame(
        message: Message,
        inbound_tx: &mpsc::UnboundedSender<Hypothesis>,
        events_tx: &mpsc::UnboundedSender<SessionEvent>,
        state: &SessionState,
    ) -> FrameOutcome {
        match message {
            Message::Text(text) => {
                debug!("received message: {}", text);

                match RevAiMessage::parse(text.as_str()) {
                    Ok(RevAiMessage::Connected(connected)) => {
                        info!("streaming session connected: {}", connected.id);
                        let _ = events_tx.send(SessionEvent::Connected {
                            session_id: connected.id,
                        });
                    }
                    Ok(RevAiMessage::Hypothesis(hypothesis)) => {
                        if state.streams_closed() {
                            debug!("discarding hypothesis received after close");
                        } else if inbound_tx.send(hypothesis).is_err() {
                            warn!("failed to deliver hypothesis - reader dropped");
                        }
                    }
                    Ok(RevAiMessage::Unknown(raw)) => {
                        debug!("received unknown message type: {}", raw);
                    }
                    Err(e) => {
                        warn!("failed to parse server message: {}", e);
                    }
                }
            }

            Message::Close(frame) => {
                let (code, reason) = match frame {
                    Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_string()),
                    None => (CLOSE_CODE_NO_STATUS, String::new()),
                };
                return FrameOutcome::Closed { code, reason };
            }

            Message::Ping(_) | Message::Pong(_) => {}

            Message::Binary(_) => {
                debug!("received unexpected binary message");
            }

            _ => {
                debug!("received unexpected message type");
            }
        }

        FrameOutcome::Continue
    }
}

impl Drop for RevAiStreamingClient {
    fn drop(&mut self) {
        // A gracefully ended session is left to drain; anything else is
        // aborted so the session task never outlives its client.
        if let (Some(state), Some(token)) = (&self.state, &self.abort_token)
            && !state.write_closed()
        {
            state.abort();
            token.cancel();
        }
    }
}

// =============================================================================
// Session Task
// =============================================================================

/// Outcome of handling one inbound frame.
#[derive(Debug)]
pub(crate) enum FrameOutcome {
    /// Keep processing frames
    Continue,
    /// The server closed the connection
    Closed { code: u16, reason: String },
}

/// The spawned task driving one streaming session from connection request
/// through termination.
struct SessionTask {
    outbound_rx: mpsc::Receiver<OutboundChunk>,
    inbound_tx: mpsc::UnboundedSender<Hypothesis>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    abort_token: CancellationToken,
    state: Arc<SessionState>,
}

impl SessionTask {
    async fn run(mut self, url: String) {
        let connect = connect_async(url.as_str());
        tokio::pin!(connect);

        let ws_stream = tokio::select! {
            result = &mut connect => match result {
                Ok((ws_stream, _response)) => ws_stream,
                Err(WsError::Http(response)) => {
                    let status = response.status().as_u16();
                    warn!("server rejected the websocket upgrade with HTTP {}", status);
                    let _ = self.events_tx.send(SessionEvent::HttpResponse { status });
                    self.close_streams();
                    return;
                }
                Err(e) => {
                    error!("failed to connect: {}", e);
                    let _ = self.events_tx.send(SessionEvent::ConnectFailed {
                        error: StreamingError::ConnectFailed(e.to_string()),
                    });
                    self.close_streams();
                    return;
                }
            },
            _ = self.abort_token.cancelled() => {
                debug!("session aborted before the connection was established");
                self.close_streams();
                return;
            }
        };

        info!("websocket connection established");

        let (mut ws_sink, mut ws_source) = ws_stream.split();
        let mut outbound_open = true;

        // Main event loop: one task, one select, so every transition is
        // serialized against the others.
        loop {
            tokio::select! {
                // Send pump: drain queued audio while the write side is open
                chunk = self.outbound_rx.recv(), if outbound_open => match chunk {
                    Some(OutboundChunk::Audio(data)) => {
                        let data_len = data.len();
                        if let Err(e) = ws_sink.send(Message::Binary(data)).await {
                            error!("failed to send audio: {}", e);
                            let _ = self.events_tx.send(SessionEvent::Error {
                                error: StreamingError::WebSocket(e.to_string()),
                            });
                            break;
                        }
                        debug!("sent {} bytes of audio", data_len);
                    }
                    Some(OutboundChunk::EndOfStream) => {
                        if let Err(e) = ws_sink.send(Message::Text(END_OF_STREAM.into())).await {
                            error!("failed to send end-of-stream marker: {}", e);
                            let _ = self.events_tx.send(SessionEvent::Error {
                                error: StreamingError::WebSocket(e.to_string()),
                            });
                            break;
                        }
                        debug!("sent end-of-stream marker");
                        outbound_open = false;
                    }
                    None => {
                        outbound_open = false;
                    }
                },

                // Receive demux
                message = ws_source.next() => match message {
                    Some(Ok(message)) => {
                        match RevAiStreamingClient::handle_frame(
                            message,
                            &self.inbound_tx,
                            &self.events_tx,
                            &self.state,
                        ) {
                            FrameOutcome::Continue => {}
                            FrameOutcome::Closed { code, reason } => {
                                info!("server closed the connection: {} {}", code, reason);
                                let _ = self.events_tx.send(SessionEvent::Closed { code, reason });
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("websocket error: {}", e);
                        let _ = self.events_tx.send(SessionEvent::Error {
                            error: StreamingError::WebSocket(e.to_string()),
                        });
                        break;
                    }
                    None => {
                        info!("websocket stream ended without a close frame");
                        let _ = self.events_tx.send(SessionEvent::Closed {
                            code: CLOSE_CODE_ABNORMAL,
                            reason: String::new(),
                        });
                        break;
                    }
                },

                // Abrupt termination: drop the socket, no close handshake,
                // no event
                _ = self.abort_token.cancelled() => {
                    debug!("session aborted");
                    break;
                }
            }
        }

        self.close_streams();
        debug!("streaming session task finished");
    }

    /// Close both bridge channels, exactly once per session.
    ///
    /// The inbound sender is dropped with the task itself, which ends the
    /// reader side of the duplex.
    fn close_streams(&mut self) {
        if !self.state.close_streams() {
            return;
        }

        self.outbound_rx.close();
        debug!("bridge channels closed");
    }
}
