//! Fail-stop behavior tests for the notes channel.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use common::types::MeetingId;
use intel_protocol::{NotesUpdate, ACTION_SAVE};
use session_client::config::TransportConfig;
use session_client::transport::{Frame, NotesTransport};
use session_test_utils::MockConnector;
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn connects_and_sends_updates() {
    let (connector, mut servers) = MockConnector::new();
    let transport = NotesTransport::new(TransportConfig::default(), connector.clone());

    transport.connect(&MeetingId::new("m-7")).await.unwrap();
    let mut server = servers.recv().await.unwrap();
    assert!(transport.is_connected());
    assert_eq!(connector.last_url().unwrap().path(), "/ws/notes/m-7");

    transport.send_update(&NotesUpdate::save("final agenda"));
    settle().await;

    match server.try_next_frame() {
        Some(Frame::Text(text)) => {
            let update: NotesUpdate = serde_json::from_str(&text).unwrap();
            assert_eq!(update.action, ACTION_SAVE);
            assert_eq!(update.content.as_deref(), Some("final agenda"));
        }
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn inbound_updates_reach_the_handler() {
    let (connector, mut servers) = MockConnector::new();
    let transport = NotesTransport::new(TransportConfig::default(), connector);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    transport.on_update(move |update| sink.lock().unwrap().push(update.action));

    transport.connect(&MeetingId::new("m-7")).await.unwrap();
    let server = servers.recv().await.unwrap();

    server.send_text(r#"{"type": "update", "content": "hello", "editor": "carol"}"#);
    settle().await;

    assert_eq!(*seen.lock().unwrap(), vec!["update"]);
}

#[tokio::test(start_paused = true)]
async fn closure_is_fail_stop_regardless_of_code() {
    let (connector, mut servers) = MockConnector::new();
    let transport = NotesTransport::new(TransportConfig::default(), connector.clone());

    transport.connect(&MeetingId::new("m-7")).await.unwrap();
    let server = servers.recv().await.unwrap();

    server.close(1006);
    settle().await;
    assert!(!transport.is_connected());

    // No reconnect, ever
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.connect_count(), 1);

    // Updates after closure are dropped, not queued
    transport.send_update(&NotesUpdate::update("typed into the void"));
}

#[tokio::test(start_paused = true)]
async fn malformed_inbound_updates_surface_on_the_error_handler() {
    let (connector, mut servers) = MockConnector::new();
    let transport = NotesTransport::new(TransportConfig::default(), connector);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    transport.on_error(move |message| sink.lock().unwrap().push(message));

    transport.connect(&MeetingId::new("m-7")).await.unwrap();
    let server = servers.recv().await.unwrap();

    server.send_text("{{ not json");
    settle().await;

    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(transport.is_connected());
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_idempotent() {
    let (connector, mut servers) = MockConnector::new();
    let transport = NotesTransport::new(TransportConfig::default(), connector);

    transport.connect(&MeetingId::new("m-7")).await.unwrap();
    let _server = servers.recv().await.unwrap();

    transport.disconnect();
    transport.disconnect();
    assert!(!transport.is_connected());
}
