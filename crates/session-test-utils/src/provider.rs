//! Scriptable conferencing provider.
//!
//! [`MockProvider`] records every room the session asks for and plays
//! back scripted behaviors, so tests can drive the whole
//! rejoin-under-new-identity flow: reject a room, count the fresh
//! identities, emit a late `Joined`, or fail room creation outright.

use async_trait::async_trait;
use common::types::ParticipantId;
use session_client::conference::{
    ActiveRoom, ConferenceProvider, ProviderEvent, ProviderLoader, RoomCommand, RoomControls,
    RoomOptions,
};
use session_client::errors::ClientError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Scripted behavior for one `create_room` call.
#[derive(Debug, Clone)]
pub enum RoomBehavior {
    /// Room comes up and immediately emits `Joined`
    JoinSucceeds,
    /// Room comes up and immediately emits the given error
    FailsWith {
        /// Provider error code
        code: Option<String>,
        /// Provider error message
        message: String,
    },
    /// `create_room` itself fails
    CreateFails,
}

#[derive(Default)]
struct SharedCounters {
    disposals: AtomicU32,
    commands: Mutex<Vec<RoomCommand>>,
}

/// Provider whose rooms are scripted by the test.
///
/// Unscripted `create_room` calls behave like
/// [`RoomBehavior::JoinSucceeds`].
#[derive(Default)]
pub struct MockProvider {
    script: Mutex<VecDeque<RoomBehavior>>,
    rooms: Mutex<Vec<String>>,
    creates: AtomicU32,
    counters: Arc<SharedCounters>,
    participants: Mutex<Vec<ParticipantId>>,
    last_events: Mutex<Option<mpsc::UnboundedSender<ProviderEvent>>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a behavior for the next unscripted `create_room` call.
    pub fn script(&self, behavior: RoomBehavior) {
        self.script.lock().unwrap().push_back(behavior);
    }

    /// Room identities requested so far, in order.
    pub fn rooms_requested(&self) -> Vec<String> {
        self.rooms.lock().unwrap().clone()
    }

    /// How many times `create_room` was called.
    pub fn create_count(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    /// How many rooms were disposed.
    pub fn dispose_count(&self) -> u32 {
        self.counters.disposals.load(Ordering::SeqCst)
    }

    /// Every command executed against any room, in order.
    pub fn commands(&self) -> Vec<RoomCommand> {
        self.counters.commands.lock().unwrap().clone()
    }

    /// Set the roster reported by `participants`.
    pub fn set_participants(&self, roster: Vec<ParticipantId>) {
        *self.participants.lock().unwrap() = roster;
    }

    /// Emit an event on the most recently created room.
    pub fn emit(&self, event: ProviderEvent) {
        self.last_events
            .lock()
            .unwrap()
            .as_ref()
            .expect("no room created yet")
            .send(event)
            .expect("session dropped its event receiver");
    }
}

#[async_trait]
impl ConferenceProvider for MockProvider {
    async fn create_room(&self, options: RoomOptions) -> Result<ActiveRoom, ClientError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.rooms
            .lock()
            .unwrap()
            .push(options.room.as_str().to_string());

        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RoomBehavior::JoinSucceeds);

        if matches!(behavior, RoomBehavior::CreateFails) {
            return Err(ClientError::JoinFailed("scripted creation failure".to_string()));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        match behavior {
            RoomBehavior::JoinSucceeds => {
                event_tx.send(ProviderEvent::Joined).unwrap();
            }
            RoomBehavior::FailsWith { code, message } => {
                event_tx
                    .send(ProviderEvent::ErrorOccurred { code, message })
                    .unwrap();
            }
            RoomBehavior::CreateFails => unreachable!(),
        }
        *self.last_events.lock().unwrap() = Some(event_tx);

        Ok(ActiveRoom {
            controls: Box::new(MockRoom {
                counters: Arc::clone(&self.counters),
                participants: self.participants.lock().unwrap().clone(),
            }),
            events: event_rx,
        })
    }
}

struct MockRoom {
    counters: Arc<SharedCounters>,
    participants: Vec<ParticipantId>,
}

#[async_trait]
impl RoomControls for MockRoom {
    async fn execute_command(&self, command: RoomCommand) -> Result<(), ClientError> {
        self.counters.commands.lock().unwrap().push(command);
        Ok(())
    }

    async fn participants(&self) -> Result<Vec<ParticipantId>, ClientError> {
        Ok(self.participants.clone())
    }

    async fn dispose(&self) {
        self.counters.disposals.fetch_add(1, Ordering::SeqCst);
    }
}

/// Loader that counts how many times it ran. For verifying the
/// load-at-most-once guarantee.
pub struct CountingLoader {
    provider: Arc<MockProvider>,
    loads: AtomicU32,
}

impl CountingLoader {
    pub fn new(provider: Arc<MockProvider>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            loads: AtomicU32::new(0),
        })
    }

    /// How many times `load` was called.
    pub fn load_count(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderLoader for CountingLoader {
    async fn load(&self) -> Result<Arc<dyn ConferenceProvider>, ClientError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.provider) as Arc<dyn ConferenceProvider>)
    }
}
