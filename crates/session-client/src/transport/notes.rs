//! Fail-stop transport for collaborative note synchronization.
//!
//! A structurally simpler sibling of the session transport: one channel
//! per meeting, one generic update handler, and no reconnection policy.
//! When the channel closes, for any reason, it stays closed and notes
//! degrade to local-only editing; the surrounding UI detects this via
//! `is_connected()`.

use crate::config::TransportConfig;
use crate::errors::ClientError;
use crate::sync::lock;
use crate::transport::socket::{Frame, SocketConnector, SocketEvent, WsConnector, NORMAL_CLOSE_CODE};
use crate::transport::ConnectionState;
use common::types::MeetingId;
use intel_protocol::NotesUpdate;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

struct NotesInner {
    config: TransportConfig,
    connector: Arc<dyn SocketConnector>,
    state: Mutex<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    on_update: Mutex<Option<Handler<NotesUpdate>>>,
    on_error: Mutex<Option<Handler<String>>>,
    cancel: Mutex<CancellationToken>,
}

/// Fail-stop channel for collaborative note deltas.
pub struct NotesTransport {
    inner: Arc<NotesInner>,
}

impl NotesTransport {
    /// Create a notes transport over the given socket connector.
    #[must_use]
    pub fn new(config: TransportConfig, connector: Arc<dyn SocketConnector>) -> Self {
        Self {
            inner: Arc::new(NotesInner {
                config,
                connector,
                state: Mutex::new(ConnectionState::Disconnected),
                outbound: Mutex::new(None),
                on_update: Mutex::new(None),
                on_error: Mutex::new(None),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Create a notes transport using the production WebSocket
    /// connector.
    #[must_use]
    pub fn with_default_connector(config: TransportConfig) -> Self {
        Self::new(config, Arc::new(WsConnector))
    }

    /// Open the notes channel for a meeting.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if the connection cannot be
    /// established. There is no automatic retry at any point.
    pub async fn connect(&self, meeting_id: &MeetingId) -> Result<(), ClientError> {
        let inner = &self.inner;
        let url = inner.config.notes_url(meeting_id)?;

        inner.teardown();
        *lock(&inner.state) = ConnectionState::Connecting;

        let handle = match inner.connector.connect(&url).await {
            Ok(handle) => handle,
            Err(e) => {
                *lock(&inner.state) = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        debug!(target: "session.notes", meeting_id = %meeting_id, "notes channel open");
        *lock(&inner.outbound) = Some(handle.outbound);
        *lock(&inner.state) = ConnectionState::Connected;

        let pump = Arc::clone(inner);
        let token = lock(&inner.cancel).clone();
        let mut events = handle.events;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => return,
                    event = events.recv() => match event {
                        Some(SocketEvent::Frame(Frame::Text(text))) => pump.dispatch(&text),
                        Some(SocketEvent::Frame(_)) => {
                            debug!(target: "session.notes", "ignoring non-text inbound frame");
                        }
                        Some(SocketEvent::Closed { code }) => {
                            // Fail-stop: a closed channel stays closed
                            debug!(target: "session.notes", code, "notes channel closed");
                            pump.mark_closed();
                            return;
                        }
                        None => {
                            pump.mark_closed();
                            return;
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Close the channel. Idempotent.
    pub fn disconnect(&self) {
        self.inner.teardown();
        *lock(&self.inner.state) = ConnectionState::Disconnected;
    }

    /// Send a note update.
    ///
    /// Dropped with a logged warning if the channel is not connected.
    pub fn send_update(&self, update: &NotesUpdate) {
        if *lock(&self.inner.state) != ConnectionState::Connected {
            warn!(target: "session.notes", "not connected, dropping note update");
            return;
        }
        let text = match serde_json::to_string(update) {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "session.notes", error = %e, "could not serialize note update");
                return;
            }
        };
        let sender = lock(&self.inner.outbound).clone();
        if let Some(tx) = sender {
            if tx.send(Frame::Text(text)).is_err() {
                warn!(target: "session.notes", "socket task gone, dropping note update");
            }
        }
    }

    /// Whether the channel is currently open. `false` means notes have
    /// degraded to local-only editing.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *lock(&self.inner.state) == ConnectionState::Connected
    }

    /// Register the generic update handler (replaces any previous one).
    pub fn on_update(&self, handler: impl Fn(NotesUpdate) + Send + Sync + 'static) {
        *lock(&self.inner.on_update) = Some(Arc::new(handler));
    }

    /// Register the error handler (replaces any previous one).
    pub fn on_error(&self, handler: impl Fn(String) + Send + Sync + 'static) {
        *lock(&self.inner.on_error) = Some(Arc::new(handler));
    }
}

impl NotesInner {
    fn teardown(&self) {
        lock(&self.cancel).cancel();
        if let Some(tx) = lock(&self.outbound).take() {
            let _ = tx.send(Frame::Close {
                code: NORMAL_CLOSE_CODE,
            });
        }
        *lock(&self.cancel) = CancellationToken::new();
    }

    fn mark_closed(&self) {
        *lock(&self.outbound) = None;
        *lock(&self.state) = ConnectionState::Disconnected;
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<NotesUpdate>(text) {
            Ok(update) => {
                if let Some(handler) = lock(&self.on_update).clone() {
                    handler(update);
                }
            }
            Err(e) => {
                warn!(target: "session.notes", error = %e, "dropping malformed note update");
                if let Some(handler) = lock(&self.on_error).clone() {
                    handler(format!("malformed note update: {e}"));
                }
            }
        }
    }
}
