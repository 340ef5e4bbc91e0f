//! Conference join-negotiation tests: identity rotation under
//! rejection, bounded retry budgets, terminal failures, and lifecycle
//! event fan-out, all against a scripted provider.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

use common::types::{MeetingId, ParticipantId};
use session_client::conference::{
    ConferenceSession, ConferenceState, ProviderEvent, ProviderLibrary, RoomCommand,
};
use session_client::config::ConferenceConfig;
use session_client::ClientError;
use session_test_utils::{CountingLoader, MockProvider, RoomBehavior};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MEMBERS_ONLY: &str = "conference.connectionError.membersOnly";

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("condition not reached");
}

fn scripted_session() -> (ConferenceSession, Arc<MockProvider>, Arc<CountingLoader>) {
    let provider = MockProvider::new();
    let loader = CountingLoader::new(Arc::clone(&provider));
    let library = ProviderLibrary::isolated(loader.clone());
    let session = ConferenceSession::new(ConferenceConfig::default(), library);
    (session, provider, loader)
}

fn members_only_rejection() -> RoomBehavior {
    RoomBehavior::FailsWith {
        code: Some(MEMBERS_ONLY.to_string()),
        message: "room requires membership".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn join_goes_active_and_emits_joined() {
    let (session, provider, _loader) = scripted_session();
    let joined = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&joined);
    session.on_joined(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    session.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    wait_for(|| session.state() == ConferenceState::Active).await;

    assert_eq!(joined.load(Ordering::SeqCst), 1);
    let rooms = provider.rooms_requested();
    assert_eq!(rooms.len(), 1);
    assert!(rooms[0].starts_with("room"));
}

#[tokio::test(start_paused = true)]
async fn repeated_rejections_rotate_identities_until_the_budget_runs_out() {
    let (session, provider, _loader) = scripted_session();
    let fatal = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&fatal);
    session.on_fatal_error(move |message| {
        *sink.lock().unwrap() = Some(message);
    });

    for _ in 0..4 {
        provider.script(members_only_rejection());
    }
    session.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    wait_for(|| session.state() == ConferenceState::Failed).await;

    // Initial join plus the full retry budget of three
    assert_eq!(provider.create_count(), 4);
    let rooms = provider.rooms_requested();
    let distinct: HashSet<_> = rooms.iter().collect();
    assert_eq!(distinct.len(), 4);
    assert!(rooms[0].starts_with("room"));
    for room in &rooms[1..] {
        assert!(room.starts_with("retry"));
    }

    // Each retry disposed the previous widget first
    assert_eq!(provider.dispose_count(), 3);
    assert!(fatal.lock().unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn a_successful_join_resets_the_retry_budget() {
    let (session, provider, _loader) = scripted_session();

    provider.script(members_only_rejection());
    provider.script(RoomBehavior::JoinSucceeds);
    session.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    wait_for(|| session.state() == ConferenceState::Active).await;
    assert_eq!(provider.create_count(), 2);

    // A later rejection on the live room gets a full budget again
    provider.script(RoomBehavior::JoinSucceeds);
    provider.emit(ProviderEvent::ErrorOccurred {
        code: Some(MEMBERS_ONLY.to_string()),
        message: "room requires membership".to_string(),
    });
    wait_for(|| provider.create_count() == 3).await;
    wait_for(|| session.state() == ConferenceState::Active).await;
}

#[tokio::test(start_paused = true)]
async fn terminal_errors_fail_immediately_without_retry() {
    let (session, provider, _loader) = scripted_session();
    let fatal = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&fatal);
    session.on_fatal_error(move |message| {
        *sink.lock().unwrap() = Some(message);
    });

    provider.script(RoomBehavior::FailsWith {
        code: Some("conference.authError".to_string()),
        message: "not allowed".to_string(),
    });
    session.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    wait_for(|| session.state() == ConferenceState::Failed).await;

    assert_eq!(provider.create_count(), 1);
    assert_eq!(fatal.lock().unwrap().as_deref(), Some("not allowed"));
}

#[tokio::test(start_paused = true)]
async fn initial_creation_failure_surfaces_as_an_error() {
    let (session, provider, _loader) = scripted_session();
    provider.script(RoomBehavior::CreateFails);

    let result = session.join(&MeetingId::new("standup"), "Alice").await;
    assert!(matches!(result, Err(ClientError::JoinFailed(_))));
    assert_eq!(session.state(), ConferenceState::Idle);
}

#[tokio::test(start_paused = true)]
async fn creation_failures_during_retry_consume_the_budget() {
    let (session, provider, _loader) = scripted_session();

    provider.script(members_only_rejection());
    for _ in 0..3 {
        provider.script(RoomBehavior::CreateFails);
    }
    session.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    wait_for(|| session.state() == ConferenceState::Failed).await;

    assert_eq!(provider.create_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn provider_library_loads_at_most_once() {
    let provider = MockProvider::new();
    let loader = CountingLoader::new(Arc::clone(&provider));
    let library = ProviderLibrary::isolated(loader.clone());

    let first = ConferenceSession::new(ConferenceConfig::default(), library.clone());
    let second = ConferenceSession::new(ConferenceConfig::default(), library);

    first.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    second.join(&MeetingId::new("retro"), "Bob").await.unwrap();
    wait_for(|| provider.create_count() == 2).await;

    assert_eq!(loader.load_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn leave_disposes_the_widget_and_emits_left_once() {
    let (session, provider, _loader) = scripted_session();
    let left = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&left);
    session.on_left(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    session.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    wait_for(|| session.state() == ConferenceState::Active).await;

    session.leave().await;
    assert_eq!(session.state(), ConferenceState::Idle);
    assert_eq!(provider.dispose_count(), 1);
    assert_eq!(left.load(Ordering::SeqCst), 1);

    // Leaving again is a no-op
    session.leave().await;
    assert_eq!(provider.dispose_count(), 1);
    assert_eq!(left.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn a_provider_left_event_ends_the_session() {
    let (session, provider, _loader) = scripted_session();
    let left = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&left);
    session.on_left(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    session.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    wait_for(|| session.state() == ConferenceState::Active).await;

    provider.emit(ProviderEvent::Left);
    wait_for(|| session.state() == ConferenceState::Idle).await;
    assert_eq!(left.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn commands_and_participants_pass_through_to_the_room() {
    let (session, provider, _loader) = scripted_session();
    let roster = vec![ParticipantId::new("alice"), ParticipantId::new("bob")];
    provider.set_participants(roster.clone());

    session.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    wait_for(|| session.state() == ConferenceState::Active).await;

    session.toggle_audio().await;
    session.toggle_video().await;
    session.hang_up().await;
    assert_eq!(
        provider.commands(),
        vec![
            RoomCommand::ToggleAudio,
            RoomCommand::ToggleVideo,
            RoomCommand::HangUp,
        ]
    );
    assert_eq!(session.participants().await, roster);
}

#[tokio::test(start_paused = true)]
async fn participant_events_fan_out() {
    let (session, provider, _loader) = scripted_session();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session.on_participant_joined(move |id| sink.lock().unwrap().push(format!("+{id}")));
    let sink = Arc::clone(&seen);
    session.on_participant_left(move |id| sink.lock().unwrap().push(format!("-{id}")));

    session.join(&MeetingId::new("standup"), "Alice").await.unwrap();
    wait_for(|| session.state() == ConferenceState::Active).await;

    provider.emit(ProviderEvent::ParticipantJoined(ParticipantId::new("carol")));
    provider.emit(ProviderEvent::ParticipantLeft(ParticipantId::new("carol")));
    wait_for(|| seen.lock().unwrap().len() == 2).await;

    assert_eq!(*seen.lock().unwrap(), vec!["+carol", "-carol"]);
}
