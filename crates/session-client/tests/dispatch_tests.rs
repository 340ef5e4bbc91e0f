//! Envelope dispatch tests: per-type routing, arrival order, and
//! tolerance of malformed or unknown frames.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use common::types::MeetingId;
use intel_protocol::{ClientCommand, ConnectionStatus};
use session_client::config::TransportConfig;
use session_client::transport::{Frame, SessionTransport};
use session_test_utils::{fixtures, MockConnector, ServerEnd};
use std::sync::{Arc, Mutex};

async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

async fn connected_transport() -> (SessionTransport, ServerEnd) {
    let (connector, mut servers) = MockConnector::new();
    let transport = SessionTransport::new(TransportConfig::default(), connector);
    transport.connect(&MeetingId::new("m-1")).await.unwrap();
    let server = servers.recv().await.unwrap();
    (transport, server)
}

#[tokio::test(start_paused = true)]
async fn transcripts_arrive_in_order() {
    let (transport, server) = connected_transport().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    transport.on_transcript(move |payload| sink.lock().unwrap().push(payload.text));

    server.send_text(&fixtures::transcript("first", Some("alice")));
    server.send_text(&fixtures::transcript("second", Some("bob")));
    settle().await;

    assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test(start_paused = true)]
async fn each_type_reaches_its_own_handler() {
    let (transport, server) = connected_transport().await;

    let summaries = Arc::new(Mutex::new(Vec::new()));
    let sentiments = Arc::new(Mutex::new(Vec::new()));
    let insights = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let statuses = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&summaries);
    transport.on_summary(move |p| sink.lock().unwrap().push(p.summary));
    let sink = Arc::clone(&sentiments);
    transport.on_sentiment(move |p| sink.lock().unwrap().push((p.label, p.confidence)));
    let sink = Arc::clone(&insights);
    transport.on_contextual_insight(move |p| sink.lock().unwrap().push(p.enhanced_summary));
    let sink = Arc::clone(&errors);
    transport.on_error(move |message| sink.lock().unwrap().push(message));
    let sink = Arc::clone(&statuses);
    transport.on_connection_status(move |status| sink.lock().unwrap().push(status));

    server.send_text(&fixtures::summary("decisions so far", &["follow up"]));
    server.send_text(&fixtures::sentiment("positive", 0.7));
    server.send_text(&fixtures::contextual_insight("enriched", &["wiki"]));
    server.send_text(&fixtures::error_message("transcriber overloaded"));
    server.send_text(&fixtures::connection_status("reconnecting"));
    settle().await;

    assert_eq!(*summaries.lock().unwrap(), vec!["decisions so far"]);
    assert_eq!(
        *sentiments.lock().unwrap(),
        vec![("positive".to_string(), Some("high".to_string()))]
    );
    assert_eq!(*insights.lock().unwrap(), vec!["enriched"]);
    assert_eq!(*errors.lock().unwrap(), vec!["transcriber overloaded"]);
    assert_eq!(*statuses.lock().unwrap(), vec![ConnectionStatus::Reconnecting]);
}

#[tokio::test(start_paused = true)]
async fn registering_a_handler_replaces_the_previous_one() {
    let (transport, server) = connected_transport().await;
    let first = Arc::new(Mutex::new(0u32));
    let second = Arc::new(Mutex::new(0u32));

    let sink = Arc::clone(&first);
    transport.on_transcript(move |_| *sink.lock().unwrap() += 1);
    let sink = Arc::clone(&second);
    transport.on_transcript(move |_| *sink.lock().unwrap() += 1);

    server.send_text(&fixtures::transcript("hello", None));
    settle().await;

    assert_eq!(*first.lock().unwrap(), 0);
    assert_eq!(*second.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_and_malformed_frames_are_dropped_silently() {
    let (transport, server) = connected_transport().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    transport.on_transcript(move |payload| sink.lock().unwrap().push(payload.text));

    server.send_text(&fixtures::unrecognized("telemetry"));
    server.send_text("this is not json");
    server.send_text(&fixtures::transcript("still alive", None));
    settle().await;

    assert!(transport.is_connected());
    assert_eq!(*seen.lock().unwrap(), vec!["still alive"]);
}

#[tokio::test(start_paused = true)]
async fn outbound_frames_reach_the_wire() {
    let (transport, mut server) = connected_transport().await;

    transport.send_command(&ClientCommand::new("start_recording"));
    transport.send_audio(bytes::Bytes::from_static(b"\x00\x01\x02"));
    settle().await;

    match server.try_next_frame() {
        Some(Frame::Text(text)) => assert!(text.contains("start_recording")),
        other => panic!("expected text frame, got {other:?}"),
    }
    match server.try_next_frame() {
        Some(Frame::Binary(data)) => assert_eq!(data.as_ref(), b"\x00\x01\x02"),
        other => panic!("expected binary frame, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn sending_while_disconnected_is_a_quiet_noop() {
    let (connector, _servers) = MockConnector::new();
    let transport = SessionTransport::new(TransportConfig::default(), connector);

    transport.send_audio(bytes::Bytes::from_static(b"ignored"));
    transport.send_command(&ClientCommand::new("noop"));
    assert!(!transport.is_connected());
}
