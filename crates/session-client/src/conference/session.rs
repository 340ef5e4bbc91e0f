//! Conference session state machine.
//!
//! Owns one widget instance end-to-end: `idle -> joining -> active`,
//! with a `retrying` sub-state entered from either on a classified
//! retryable provider error. Retries are an explicit bounded loop
//! guarded by the retry budget, never recursion: each pass disposes
//! the current widget, waits a fixed delay, and rejoins under a fresh
//! room identity with the incremented attempt number. Exhausting the
//! budget, or any terminal error, leaves the widget failed and inert
//! until the surrounding view is fully reloaded.

use crate::config::ConferenceConfig;
use crate::errors::ClientError;
use crate::sync::lock;
use common::types::{MeetingId, ParticipantId};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::classify::classify;
use super::provider::{
    ConferenceProvider, ProviderEvent, ProviderLibrary, RoomCommand, RoomControls, RoomOptions,
};
use super::room::RoomIdentity;

/// User-facing message when the retry budget runs out.
const RETRIES_EXHAUSTED_MESSAGE: &str =
    "Could not join the conference after several attempts. Please reload and try again.";

/// Conference session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConferenceState {
    /// No widget instance
    Idle,
    /// Widget created, waiting for the joined event
    Joining,
    /// In the conference
    Active,
    /// Rejoining under a fresh identity after a retryable error
    Retrying,
    /// Tearing down
    Leaving,
    /// Terminal failure; requires a full external reload
    Failed,
}

type EventHandler = Arc<dyn Fn() + Send + Sync>;
type ParticipantHandler = Arc<dyn Fn(ParticipantId) + Send + Sync>;
type FatalHandler = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Default)]
struct ConferenceHandlers {
    joined: Mutex<Option<EventHandler>>,
    left: Mutex<Option<EventHandler>>,
    participant_joined: Mutex<Option<ParticipantHandler>>,
    participant_left: Mutex<Option<ParticipantHandler>>,
    fatal_error: Mutex<Option<FatalHandler>>,
}

struct ConferenceInner {
    config: ConferenceConfig,
    library: ProviderLibrary,
    handlers: ConferenceHandlers,
    state: Mutex<ConferenceState>,
    /// Control surface of the current widget instance, if any.
    /// Async mutex: disposal and command execution await the provider.
    controls: tokio::sync::Mutex<Option<Box<dyn RoomControls>>>,
    /// Cancellation scope for the current join; replaced by `join()`,
    /// cancelled by `leave()`.
    cancel: Mutex<CancellationToken>,
}

/// Outcome of one pass through the rejoin loop.
enum RejoinOutcome {
    Rejoined(mpsc::UnboundedReceiver<ProviderEvent>),
    Cancelled,
    Exhausted,
}

/// Manages one embedded conferencing widget instance.
pub struct ConferenceSession {
    inner: Arc<ConferenceInner>,
}

impl ConferenceSession {
    /// Create a session over a provider library handle.
    #[must_use]
    pub fn new(config: ConferenceConfig, library: ProviderLibrary) -> Self {
        Self {
            inner: Arc::new(ConferenceInner {
                config,
                library,
                handlers: ConferenceHandlers::default(),
                state: Mutex::new(ConferenceState::Idle),
                controls: tokio::sync::Mutex::new(None),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Join the conference for a meeting.
    ///
    /// Loads the provider library (at most once per process), disposes
    /// any prior widget instance tied to this session, and instantiates
    /// a widget under a fresh attempt-0 room identity.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ProviderLoad` if the library cannot be
    /// loaded, or `ClientError::JoinFailed` if the initial widget
    /// creation fails. Provider errors raised after creation surface
    /// through the event handlers, not here.
    pub async fn join(&self, meeting_id: &MeetingId, display_name: &str) -> Result<(), ClientError> {
        let inner = &self.inner;
        let provider = inner.library.obtain().await?;

        // Fresh cancellation scope; kill any stale pump from a
        // previous join on this session
        let token = {
            let mut guard = lock(&inner.cancel);
            guard.cancel();
            *guard = CancellationToken::new();
            guard.clone()
        };

        inner.set_state(ConferenceState::Joining);
        inner.dispose_current().await;

        let identity = RoomIdentity::generate(meeting_id, 0);
        info!(
            target: "conference.session",
            meeting_id = %meeting_id,
            room = %identity,
            "joining conference"
        );
        let options = RoomOptions {
            domain: inner.config.domain.clone(),
            room: identity,
            display_name: display_name.to_string(),
        };

        let active = match provider.create_room(options).await {
            Ok(active) => active,
            Err(e) => {
                inner.set_state(ConferenceState::Idle);
                return Err(e);
            }
        };

        let events = {
            let mut controls = inner.controls.lock().await;
            *controls = Some(active.controls);
            active.events
        };

        let pump = Arc::clone(inner);
        let meeting_id = meeting_id.clone();
        let display_name = display_name.to_string();
        tokio::spawn(async move {
            pump.event_pump(provider, meeting_id, display_name, events, token)
                .await;
        });

        Ok(())
    }

    /// Leave the conference and dispose the widget.
    ///
    /// Safe to call multiple times; disposal errors are swallowed by
    /// the provider contract. Cancels any in-flight retry.
    pub async fn leave(&self) {
        let inner = &self.inner;
        lock(&inner.cancel).cancel();

        let was_live = matches!(
            *lock(&inner.state),
            ConferenceState::Joining | ConferenceState::Active | ConferenceState::Retrying
        );
        inner.set_state(ConferenceState::Leaving);
        inner.dispose_current().await;
        inner.set_state(ConferenceState::Idle);

        if was_live {
            inner.emit_left();
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> ConferenceState {
        *lock(&self.inner.state)
    }

    /// Mute or unmute the microphone. Best effort; a failure is logged.
    pub async fn toggle_audio(&self) {
        self.inner.command(RoomCommand::ToggleAudio).await;
    }

    /// Start or stop the camera. Best effort; a failure is logged.
    pub async fn toggle_video(&self) {
        self.inner.command(RoomCommand::ToggleVideo).await;
    }

    /// Hang up via the widget. Best effort; a failure is logged.
    pub async fn hang_up(&self) {
        self.inner.command(RoomCommand::HangUp).await;
    }

    /// Current participants; empty when there is no room or the
    /// provider cannot report them.
    pub async fn participants(&self) -> Vec<ParticipantId> {
        let controls = self.inner.controls.lock().await;
        match controls.as_ref() {
            Some(room) => room.participants().await.unwrap_or_else(|e| {
                warn!(target: "conference.session", error = %e, "could not fetch participants");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    /// Register the joined handler (replaces any previous one).
    pub fn on_joined(&self, handler: impl Fn() + Send + Sync + 'static) {
        *lock(&self.inner.handlers.joined) = Some(Arc::new(handler));
    }

    /// Register the left handler (replaces any previous one).
    pub fn on_left(&self, handler: impl Fn() + Send + Sync + 'static) {
        *lock(&self.inner.handlers.left) = Some(Arc::new(handler));
    }

    /// Register the participant-joined handler (replaces any previous
    /// one).
    pub fn on_participant_joined(&self, handler: impl Fn(ParticipantId) + Send + Sync + 'static) {
        *lock(&self.inner.handlers.participant_joined) = Some(Arc::new(handler));
    }

    /// Register the participant-left handler (replaces any previous
    /// one).
    pub fn on_participant_left(&self, handler: impl Fn(ParticipantId) + Send + Sync + 'static) {
        *lock(&self.inner.handlers.participant_left) = Some(Arc::new(handler));
    }

    /// Register the fatal-error handler (replaces any previous one).
    pub fn on_fatal_error(&self, handler: impl Fn(String) + Send + Sync + 'static) {
        *lock(&self.inner.handlers.fatal_error) = Some(Arc::new(handler));
    }
}

impl ConferenceInner {
    fn set_state(&self, state: ConferenceState) {
        debug!(target: "conference.session", ?state, "state transition");
        *lock(&self.state) = state;
    }

    /// Drive one room's events; on retryable errors, rejoin under
    /// fresh identities until the budget runs out.
    async fn event_pump(
        self: Arc<Self>,
        provider: Arc<dyn ConferenceProvider>,
        meeting_id: MeetingId,
        display_name: String,
        mut events: mpsc::UnboundedReceiver<ProviderEvent>,
        token: CancellationToken,
    ) {
        // Retry budget for this join; reset on every successful join
        let mut attempts: u32 = 0;

        loop {
            let event = tokio::select! {
                () = token.cancelled() => return,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!(target: "conference.session", "provider event stream ended");
                        return;
                    }
                }
            };

            match event {
                ProviderEvent::Joined => {
                    attempts = 0;
                    self.set_state(ConferenceState::Active);
                    if let Some(handler) = lock(&self.handlers.joined).clone() {
                        handler();
                    }
                }
                ProviderEvent::ParticipantJoined(id) => {
                    if let Some(handler) = lock(&self.handlers.participant_joined).clone() {
                        handler(id);
                    }
                }
                ProviderEvent::ParticipantLeft(id) => {
                    if let Some(handler) = lock(&self.handlers.participant_left).clone() {
                        handler(id);
                    }
                }
                ProviderEvent::Left | ProviderEvent::ReadyToClose => {
                    self.set_state(ConferenceState::Idle);
                    self.emit_left();
                    return;
                }
                ProviderEvent::ErrorOccurred { code, message } => {
                    let class = classify(code.as_deref(), &message);
                    if !class.is_retryable() {
                        self.fail(&message);
                        return;
                    }
                    warn!(
                        target: "conference.session",
                        ?class,
                        message,
                        "retryable provider error, rejoining under a new identity"
                    );
                    match self
                        .rejoin_loop(&provider, &meeting_id, &display_name, &mut attempts, &token)
                        .await
                    {
                        RejoinOutcome::Rejoined(new_events) => events = new_events,
                        RejoinOutcome::Cancelled => return,
                        RejoinOutcome::Exhausted => {
                            self.fail(RETRIES_EXHAUSTED_MESSAGE);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Bounded rejoin loop: each pass consumes one attempt, whether the
    /// provider rejected the room or creation itself failed.
    async fn rejoin_loop(
        &self,
        provider: &Arc<dyn ConferenceProvider>,
        meeting_id: &MeetingId,
        display_name: &str,
        attempts: &mut u32,
        token: &CancellationToken,
    ) -> RejoinOutcome {
        loop {
            *attempts += 1;
            if *attempts > self.config.max_join_attempts {
                return RejoinOutcome::Exhausted;
            }

            self.set_state(ConferenceState::Retrying);
            self.dispose_current().await;

            // Fixed delay: a fresh identity, not more patience, is
            // what clears a room rejection
            tokio::select! {
                () = token.cancelled() => return RejoinOutcome::Cancelled,
                () = tokio::time::sleep(self.config.retry_delay) => {}
            }

            let identity = RoomIdentity::generate(meeting_id, *attempts);
            info!(
                target: "conference.session",
                attempt = *attempts,
                room = %identity,
                "rejoining under fresh identity"
            );
            let options = RoomOptions {
                domain: self.config.domain.clone(),
                room: identity,
                display_name: display_name.to_string(),
            };

            match provider.create_room(options).await {
                Ok(active) => {
                    *self.controls.lock().await = Some(active.controls);
                    self.set_state(ConferenceState::Joining);
                    return RejoinOutcome::Rejoined(active.events);
                }
                Err(e) => {
                    warn!(
                        target: "conference.session",
                        attempt = *attempts,
                        error = %e,
                        "room creation failed during retry"
                    );
                }
            }
        }
    }

    /// Terminal failure: the widget stays inert until a full reload.
    fn fail(&self, message: &str) {
        error!(target: "conference.session", message, "conference entered terminal failure");
        self.set_state(ConferenceState::Failed);
        if let Some(handler) = lock(&self.handlers.fatal_error).clone() {
            handler(message.to_string());
        }
    }

    async fn dispose_current(&self) {
        let controls = self.controls.lock().await.take();
        if let Some(room) = controls {
            room.dispose().await;
            debug!(target: "conference.session", "disposed widget instance");
        }
    }

    fn emit_left(&self) {
        if let Some(handler) = lock(&self.handlers.left).clone() {
            handler();
        }
    }

    async fn command(&self, command: RoomCommand) {
        let controls = self.controls.lock().await;
        match controls.as_ref() {
            Some(room) => {
                if let Err(e) = room.execute_command(command).await {
                    warn!(
                        target: "conference.session",
                        command = command.as_str(),
                        error = %e,
                        "room command failed"
                    );
                }
            }
            None => debug!(
                target: "conference.session",
                command = command.as_str(),
                "no active room, ignoring command"
            ),
        }
    }
}
