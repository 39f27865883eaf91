//! Lifecycle tests for the streaming session controller.
//!
//! These tests drive full sessions against in-process WebSocket servers:
//! handshake acknowledgment interception, hypothesis delivery, write
//! ordering, graceful and abrupt termination, and the connection failure
//! paths.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};

use super::*;
use crate::error::StreamingError;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Bind a local listener and build a client pointed at it.
async fn local_client() -> (TcpListener, RevAiStreamingClient) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = RevAiStreamingConfig::new("test_token").with_base_url(format!("ws://{addr}/"));
    (listener, RevAiStreamingClient::new(config).unwrap())
}

async fn next_event(events: &mut SessionEvents) -> SessionEvent {
    timeout(TEST_TIMEOUT, events.next())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel ended unexpectedly")
}

fn raw_audio() -> AudioConfig {
    AudioConfig::raw(Some("interleaved"), Some(16000), Some("S16LE"), Some(1))
}

#[tokio::test]
async fn test_connected_ack_intercepted_and_hypotheses_delivered() {
    init_tracing();
    let (listener, mut client) = local_client().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        ws.send(Message::Text(r#"{"type":"connected","id":"abc123"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"type":"final","transcript":"Hello.","ts":0.0,"end_ts":1.4,"elements":[{"type":"text","value":"Hello","ts":0.0,"end_ts":0.7,"confidence":0.92},{"type":"punct","value":"."}]}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "Normal".into(),
        })))
        .await
        .unwrap();

        // Drain until the peer goes away
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (mut duplex, mut events) = client.start(&raw_audio(), &SessionConfig::default()).unwrap();

    // Exactly one Connected event, carrying the session id
    match next_event(&mut events).await {
        SessionEvent::Connected { session_id } => assert_eq!(session_id, "abc123"),
        other => panic!("Expected Connected event, got {:?}", other),
    }

    // The final hypothesis arrives on the duplex, structurally intact; the
    // connected ack never does
    let hypothesis = timeout(TEST_TIMEOUT, duplex.read())
        .await
        .unwrap()
        .expect("expected a hypothesis");
    assert!(hypothesis.is_final());
    assert_eq!(hypothesis.transcript.as_deref(), Some("Hello."));
    assert_eq!(hypothesis.ts, Some(0.0));
    assert_eq!(hypothesis.end_ts, Some(1.4));
    assert_eq!(hypothesis.elements.len(), 2);
    assert_eq!(hypothesis.elements[0].element_type, ElementType::Text);
    assert_eq!(hypothesis.elements[0].value, "Hello");
    assert_eq!(hypothesis.elements[0].ts, Some(0.0));
    assert_eq!(hypothesis.elements[0].end_ts, Some(0.7));
    assert_eq!(hypothesis.elements[0].confidence, Some(0.92));
    assert_eq!(hypothesis.elements[1].element_type, ElementType::Punct);
    assert_eq!(hypothesis.elements[1].value, ".");
    assert!(hypothesis.elements[1].confidence.is_none());

    // Server close is reported with its code and reason
    match next_event(&mut events).await {
        SessionEvent::Closed { code, reason } => {
            assert_eq!(code, 1000);
            assert_eq!(reason, "Normal");
        }
        other => panic!("Expected Closed event, got {:?}", other),
    }

    // End of the inbound stream is signalled exactly once
    assert!(timeout(TEST_TIMEOUT, duplex.read()).await.unwrap().is_none());

    server.await.unwrap();
}

#[tokio::test]
async fn test_audio_written_before_connect_is_sent_in_order() {
    init_tracing();
    let (listener, mut client) = local_client().await;

    let server = tokio::spawn(async move {
        // Delay the accept so the client writes while the handshake is
        // still pending
        tokio::time::sleep(Duration::from_millis(100)).await;

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let mut frames = Vec::new();
        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Binary(data) => frames.push(data.to_vec()),
                Message::Text(text) => {
                    assert_eq!(text.as_str(), "EOS");
                    break;
                }
                _ => {}
            }
        }
        frames
    });

    let (duplex, _events) = client.start(&raw_audio(), &SessionConfig::default()).unwrap();

    duplex.write(Bytes::from_static(&[1, 1, 1])).await.unwrap();
    duplex.write(Bytes::from_static(&[2, 2, 2])).await.unwrap();
    client.end().await.unwrap();

    let frames = timeout(TEST_TIMEOUT, server).await.unwrap().unwrap();
    assert_eq!(frames, vec![vec![1, 1, 1], vec![2, 2, 2]]);

    // The write side ended with the session
    let err = duplex.write(Bytes::from_static(&[3])).await.unwrap_err();
    assert!(matches!(err, StreamingError::WriteAfterEnd));
}

#[tokio::test]
async fn test_end_is_idempotent_and_sends_one_eos() {
    init_tracing();
    let (listener, mut client) = local_client().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let mut eos_count = 0;
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                if text.as_str() == "EOS" {
                    eos_count += 1;
                    // React the way the service does: close the session
                    let _ = ws
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "EOS received".into(),
                        })))
                        .await;
                }
            }
        }
        eos_count
    });

    let (duplex, mut events) = client.start(&raw_audio(), &SessionConfig::default()).unwrap();

    client.end().await.unwrap();
    client.end().await.unwrap();

    match next_event(&mut events).await {
        SessionEvent::Closed { code, .. } => assert_eq!(code, 1000),
        other => panic!("Expected Closed event, got {:?}", other),
    }

    let eos_count = timeout(TEST_TIMEOUT, server).await.unwrap().unwrap();
    assert_eq!(eos_count, 1);

    let err = duplex.write(Bytes::from_static(&[0])).await.unwrap_err();
    assert!(matches!(err, StreamingError::WriteAfterEnd));
}

#[tokio::test]
async fn test_abort_before_connect_is_safe() {
    init_tracing();
    // The listener never accepts, so the handshake stays pending
    let (_listener, mut client) = local_client().await;

    let (mut duplex, mut events) = client.start(&raw_audio(), &SessionConfig::default()).unwrap();

    client.abort();
    client.abort();

    let err = duplex.write(Bytes::from_static(&[0])).await.unwrap_err();
    assert!(matches!(err, StreamingError::WriteAfterEnd));
    assert!(timeout(TEST_TIMEOUT, duplex.read()).await.unwrap().is_none());

    // A caller-initiated abort emits no events; the channel just ends
    assert!(timeout(TEST_TIMEOUT, events.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_abort_drops_queued_hypotheses() {
    init_tracing();
    let (listener, mut client) = local_client().await;

    let (sent_tx, sent_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        ws.send(Message::Text(r#"{"type":"connected","id":"abc123"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"type":"partial","elements":[{"type":"text","value":"one"}]}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"type":"partial","elements":[{"type":"text","value":"two"}]}"#.into(),
        ))
        .await
        .unwrap();
        let _ = sent_tx.send(());

        while let Some(Ok(_)) = ws.next().await {}
    });

    let (mut duplex, mut events) = client.start(&raw_audio(), &SessionConfig::default()).unwrap();

    match next_event(&mut events).await {
        SessionEvent::Connected { .. } => {}
        other => panic!("Expected Connected event, got {:?}", other),
    }

    // Let the already-sent hypotheses land in the inbound queue, then abort
    timeout(TEST_TIMEOUT, sent_rx).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.abort();

    // Queued hypotheses are dropped, not delivered
    assert!(timeout(TEST_TIMEOUT, duplex.read()).await.unwrap().is_none());

    server.await.unwrap();
}

#[tokio::test]
async fn test_plain_http_response_surfaces_status() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await.unwrap();
        stream
            .write_all(b"HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\n\r\n")
            .await
            .unwrap();
        stream.flush().await.unwrap();
        let _ = stream.shutdown().await;
    });

    let config = RevAiStreamingConfig::new("bad_token").with_base_url(format!("ws://{addr}"));
    let mut client = RevAiStreamingClient::new(config).unwrap();
    let (mut duplex, mut events) = client.start(&raw_audio(), &SessionConfig::default()).unwrap();

    match next_event(&mut events).await {
        SessionEvent::HttpResponse { status } => assert_eq!(status, 401),
        other => panic!("Expected HttpResponse event, got {:?}", other),
    }

    // Both channels are closed
    assert!(timeout(TEST_TIMEOUT, duplex.read()).await.unwrap().is_none());
    let err = duplex.write(Bytes::from_static(&[0])).await.unwrap_err();
    assert!(matches!(err, StreamingError::WriteAfterEnd));

    server.await.unwrap();
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Free the port so the connection is refused
    drop(listener);

    let config = RevAiStreamingConfig::new("test_token").with_base_url(format!("ws://{addr}"));
    let mut client = RevAiStreamingClient::new(config).unwrap();
    let (mut duplex, mut events) = client.start(&raw_audio(), &SessionConfig::default()).unwrap();

    match next_event(&mut events).await {
        SessionEvent::ConnectFailed { error } => {
            assert!(matches!(error, StreamingError::ConnectFailed(_)));
        }
        other => panic!("Expected ConnectFailed event, got {:?}", other),
    }

    assert!(timeout(TEST_TIMEOUT, duplex.read()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_partial_hypotheses_arrive_in_order() {
    init_tracing();
    let (listener, mut client) = local_client().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        ws.send(Message::Text(r#"{"type":"connected","id":"s1"}"#.into()))
            .await
            .unwrap();
        for value in ["hello", "hello world", "hello world again"] {
            let frame =
                format!(r#"{{"type":"partial","elements":[{{"type":"text","value":"{value}"}}]}}"#);
            ws.send(Message::Text(frame.into())).await.unwrap();
        }
        ws.send(Message::Close(None)).await.unwrap();

        while let Some(Ok(_)) = ws.next().await {}
    });

    let (mut duplex, mut events) = client.start(&raw_audio(), &SessionConfig::default()).unwrap();

    match next_event(&mut events).await {
        SessionEvent::Connected { .. } => {}
        other => panic!("Expected Connected event, got {:?}", other),
    }

    for expected in ["hello", "hello world", "hello world again"] {
        let hypothesis = timeout(TEST_TIMEOUT, duplex.read())
            .await
            .unwrap()
            .expect("expected a hypothesis");
        assert_eq!(hypothesis.elements[0].value, expected);
    }
    assert!(timeout(TEST_TIMEOUT, duplex.read()).await.unwrap().is_none());

    // A close frame without payload is reported as 1005 with no reason
    match next_event(&mut events).await {
        SessionEvent::Closed { code, reason } => {
            assert_eq!(code, 1005);
            assert!(reason.is_empty());
        }
        other => panic!("Expected Closed event, got {:?}", other),
    }

    server.await.unwrap();
}
