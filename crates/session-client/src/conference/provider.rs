//! Conferencing provider capability traits.
//!
//! The provider's client library is treated strictly as an opaque
//! capability: it can create a room bound to a mount point, emit named
//! events, execute commands, report participants, and be disposed.
//! Loading the library is expensive and process-wide, so
//! [`ProviderLibrary`] wraps the loader in an init-once cell shared by
//! every session in the process.

use crate::errors::ClientError;
use async_trait::async_trait;
use common::types::ParticipantId;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell};
use tracing::debug;

use super::room::RoomIdentity;

/// Event emitted by an active room.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// The local participant joined the conference
    Joined,
    /// The local participant left the conference
    Left,
    /// A remote participant joined
    ParticipantJoined(ParticipantId),
    /// A remote participant left
    ParticipantLeft(ParticipantId),
    /// The provider raised an error
    ErrorOccurred {
        /// Provider-declared error code, when available
        code: Option<String>,
        /// Human-readable error message
        message: String,
    },
    /// The widget is ready to be torn down
    ReadyToClose,
}

/// Options for creating a room.
#[derive(Debug, Clone)]
pub struct RoomOptions {
    /// Provider domain to join through
    pub domain: String,
    /// Provider-safe room identity
    pub room: RoomIdentity,
    /// Display name for the local participant
    pub display_name: String,
}

/// Command executed against an active room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomCommand {
    /// Mute or unmute the microphone
    ToggleAudio,
    /// Start or stop the camera
    ToggleVideo,
    /// Leave the conference
    HangUp,
}

impl RoomCommand {
    /// Provider-facing command name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToggleAudio => "toggleAudio",
            Self::ToggleVideo => "toggleVideo",
            Self::HangUp => "hangup",
        }
    }
}

/// Control surface of an active room.
#[async_trait]
pub trait RoomControls: Send + Sync {
    /// Execute a named command against the room.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::JoinFailed`/`ClientError::Internal` if the
    /// provider rejects the command.
    async fn execute_command(&self, command: RoomCommand) -> Result<(), ClientError>;

    /// Current participants, best effort.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; callers treat failures as an
    /// empty roster.
    async fn participants(&self) -> Result<Vec<ParticipantId>, ClientError>;

    /// Tear down the widget instance.
    ///
    /// Infallible and idempotent by contract: implementations swallow
    /// and log disposal errors, and must tolerate an already-disposed
    /// instance.
    async fn dispose(&self);
}

/// An active room: its control surface and its event stream.
pub struct ActiveRoom {
    /// Control surface
    pub controls: Box<dyn RoomControls>,
    /// Named provider events, in emission order
    pub events: mpsc::UnboundedReceiver<ProviderEvent>,
}

/// The loaded provider client library.
#[async_trait]
pub trait ConferenceProvider: Send + Sync {
    /// Instantiate a widget bound to a room.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::JoinFailed` if the widget cannot be
    /// created.
    async fn create_room(&self, options: RoomOptions) -> Result<ActiveRoom, ClientError>;
}

/// Loads the provider client library.
#[async_trait]
pub trait ProviderLoader: Send + Sync {
    /// Load the library.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ProviderLoad` if the library cannot be
    /// loaded.
    async fn load(&self) -> Result<Arc<dyn ConferenceProvider>, ClientError>;
}

type ProviderCell = Arc<OnceCell<Arc<dyn ConferenceProvider>>>;

/// One cell for the whole process: the library is loaded at most once
/// and shared by every session, none of which owns it exclusively.
static PROCESS_CELL: Lazy<ProviderCell> = Lazy::new(|| Arc::new(OnceCell::new()));

/// Guarded lazy handle to the provider client library.
#[derive(Clone)]
pub struct ProviderLibrary {
    cell: ProviderCell,
    loader: Arc<dyn ProviderLoader>,
}

impl ProviderLibrary {
    /// Library handle backed by the process-wide cell.
    #[must_use]
    pub fn process_wide(loader: Arc<dyn ProviderLoader>) -> Self {
        Self {
            cell: Arc::clone(&PROCESS_CELL),
            loader,
        }
    }

    /// Library handle with a private cell. For tests and embedders
    /// that need isolation.
    #[must_use]
    pub fn isolated(loader: Arc<dyn ProviderLoader>) -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
            loader,
        }
    }

    /// Obtain the loaded library, running the loader at most once per
    /// cell. Concurrent callers share the same load.
    ///
    /// # Errors
    ///
    /// Returns the loader's error; a failed load is not cached, so a
    /// later call retries.
    pub async fn obtain(&self) -> Result<Arc<dyn ConferenceProvider>, ClientError> {
        let provider = self
            .cell
            .get_or_try_init(|| async {
                debug!(target: "conference.room", "loading provider client library");
                self.loader.load().await
            })
            .await?;
        Ok(Arc::clone(provider))
    }
}
