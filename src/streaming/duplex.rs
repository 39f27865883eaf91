//! Bridged duplex buffer for a streaming session.
//!
//! This module adapts the session's two unidirectional queues — the outbound
//! audio queue drained by the send pump and the inbound hypothesis queue fed
//! by the receive demux — into a single caller-facing object offering both a
//! write side (audio in) and a read side (hypotheses out). The duplex has no
//! knowledge of the network; it only owns its two channel handles and the
//! shared session state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;

use super::messages::Hypothesis;
use crate::error::{StreamingError, StreamingResult};

// =============================================================================
// Session State
// =============================================================================

/// Shared state of one streaming session's bridge channels.
///
/// Shared between the client handle, the duplex, and the session task. The
/// `closed` flag guards the channel-closing side effects so that racing
/// close triggers (a remote close and a caller abort, for example) converge
/// on a single closed state without re-running them.
pub(crate) struct SessionState {
    /// Channel-closing side effects have run
    closed: AtomicBool,
    /// The write side has ended (graceful end, abort, or channel closure)
    write_ended: AtomicBool,
    /// The session was abruptly aborted; queued inbound data is discarded
    aborted: AtomicBool,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            write_ended: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
        }
    }

    /// Mark the streams closed. Returns true only for the first caller, so
    /// closing side effects execute exactly once per session.
    pub(crate) fn close_streams(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn streams_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the write side ended. Returns true only for the first caller.
    pub(crate) fn close_write(&self) -> bool {
        !self.write_ended.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn write_closed(&self) -> bool {
        self.write_ended.load(Ordering::Acquire)
    }

    /// Abrupt termination: ends the write side, closes the streams and marks
    /// queued inbound data for discard. Safe to call any number of times.
    pub(crate) fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.write_ended.store(true, Ordering::Release);
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

// =============================================================================
// Outbound Queue Items
// =============================================================================

/// Items carried by the outbound queue.
///
/// The send pump maps `Audio` to a binary frame and `EndOfStream` to the
/// sentinel text frame, after which the pump stops draining.
#[derive(Debug)]
pub(crate) enum OutboundChunk {
    /// Raw audio bytes
    Audio(Bytes),
    /// End-of-input marker queued by a graceful end
    EndOfStream,
}

/// Transport-facing ends of the bridge, moved into the session task exactly
/// once when the session starts.
pub(crate) struct TransportEnds {
    /// Drained by the send pump
    pub(crate) outbound_rx: mpsc::Receiver<OutboundChunk>,
    /// Fed by the receive demux
    pub(crate) inbound_tx: mpsc::UnboundedSender<Hypothesis>,
}

// =============================================================================
// Session Duplex
// =============================================================================

/// Caller-facing duplex of a streaming session: write audio in, read
/// hypotheses out.
pub struct SessionDuplex {
    outbound_tx: mpsc::Sender<OutboundChunk>,
    inbound_rx: mpsc::UnboundedReceiver<Hypothesis>,
    state: Arc<SessionState>,
}

impl SessionDuplex {
    /// Create the duplex and its transport-facing ends.
    ///
    /// `capacity` bounds the outbound queue; awaiting [`write`](Self::write)
    /// when the queue is full is the backpressure signal.
    pub(crate) fn channel(capacity: usize, state: Arc<SessionState>) -> (Self, TransportEnds) {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        (
            Self {
                outbound_tx,
                inbound_rx,
                state,
            },
            TransportEnds {
                outbound_rx,
                inbound_tx,
            },
        )
    }

    /// Clone of the outbound sender, used by the controller to queue the
    /// end-of-stream marker behind any audio already written.
    pub(crate) fn outbound_sender(&self) -> mpsc::Sender<OutboundChunk> {
        self.outbound_tx.clone()
    }

    /// Queue an audio chunk for transmission.
    ///
    /// The returned future resolves once the outbound queue has accepted the
    /// chunk; awaiting it is the backpressure signal, delegated directly to
    /// the queue itself. Fails with [`StreamingError::WriteAfterEnd`] once
    /// the write side has ended.
    pub async fn write(&self, chunk: Bytes) -> StreamingResult<()> {
        if self.state.write_closed() {
            return Err(StreamingError::WriteAfterEnd);
        }

        self.outbound_tx
            .send(OutboundChunk::Audio(chunk))
            .await
            .map_err(|_| StreamingError::WriteAfterEnd)
    }

    /// Next transcription hypothesis.
    ///
    /// Returns `None` exactly once when the inbound side ends. After an
    /// abort, returns `None` immediately and discards anything still queued.
    pub async fn read(&mut self) -> Option<Hypothesis> {
        if self.state.aborted() {
            self.inbound_rx.close();
            return None;
        }

        self.inbound_rx.recv().await
    }
}
