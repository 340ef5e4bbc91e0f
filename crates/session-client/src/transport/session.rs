//! Reconnecting transport for the meeting-intelligence stream.
//!
//! One `SessionTransport` owns one channel per meeting. Inbound
//! envelopes are multiplexed by declared type to registered handlers,
//! in arrival order, from the single reader task that also owns the
//! connection state (single-writer). Abnormal closure triggers a
//! bounded, exponentially backed-off reconnect loop; `disconnect()` is
//! the only path that suppresses it.
//!
//! # Reconnection policy
//!
//! - trigger: closure code other than [`NORMAL_CLOSE_CODE`] while a
//!   meeting id is set and the session was not cancelled
//! - at most one reconnect in flight (atomic reentrancy guard)
//! - delay starts at `backoff_base`, doubles per failure, capped at
//!   `backoff_max`; after `max_reconnect_attempts` consecutive
//!   failures the transport settles at `disconnected`
//! - success resets the attempt counter and delay to initial values

use crate::config::TransportConfig;
use crate::errors::ClientError;
use crate::sync::lock;
use crate::transport::socket::{
    Frame, SocketConnector, SocketEvent, SocketHandle, WsConnector, ABNORMAL_CLOSE_CODE,
    NORMAL_CLOSE_CODE,
};
use bytes::Bytes;
use common::types::MeetingId;
use intel_protocol::{
    ClientCommand, ConnectionStatus, ContextualInsightPayload, Envelope, MessageType,
    SentimentPayload, SummaryPayload, TranscriptPayload,
};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Transport connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel, no reconnect pending
    Disconnected,
    /// Initial handshake in flight
    Connecting,
    /// Channel open
    Connected,
    /// Channel dropped, reconnect loop running
    Reconnecting,
    /// Normal closure requested
    Closing,
}

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// One settable handler per inbound message type. Registration
/// replaces; at most one handler fires per envelope.
#[derive(Default)]
struct Handlers {
    transcript: Mutex<Option<Handler<TranscriptPayload>>>,
    summary: Mutex<Option<Handler<SummaryPayload>>>,
    sentiment: Mutex<Option<Handler<SentimentPayload>>>,
    contextual_insight: Mutex<Option<Handler<ContextualInsightPayload>>>,
    error: Mutex<Option<Handler<String>>>,
    connection_status: Mutex<Option<Handler<ConnectionStatus>>>,
}

/// Retry budget: attempts consumed and the current backoff delay.
struct RetryState {
    attempts: u32,
    delay: Duration,
}

struct Inner {
    config: TransportConfig,
    connector: Arc<dyn SocketConnector>,
    handlers: Handlers,
    state: Mutex<ConnectionState>,
    meeting_id: Mutex<Option<MeetingId>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    retry: Mutex<RetryState>,
    /// Reentrancy guard: never two reconnect loops for one transport.
    reconnecting: AtomicBool,
    /// Cancellation scope for the current logical session; replaced on
    /// every `connect()`, cancelled by `disconnect()`.
    cancel: Mutex<CancellationToken>,
}

/// Reconnecting channel to the backend intelligence stream.
pub struct SessionTransport {
    inner: Arc<Inner>,
}

impl SessionTransport {
    /// Create a transport over the given socket connector.
    #[must_use]
    pub fn new(config: TransportConfig, connector: Arc<dyn SocketConnector>) -> Self {
        let backoff_base = config.backoff_base;
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                handlers: Handlers::default(),
                state: Mutex::new(ConnectionState::Disconnected),
                meeting_id: Mutex::new(None),
                outbound: Mutex::new(None),
                retry: Mutex::new(RetryState {
                    attempts: 0,
                    delay: backoff_base,
                }),
                reconnecting: AtomicBool::new(false),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Create a transport using the production WebSocket connector.
    #[must_use]
    pub fn with_default_connector(config: TransportConfig) -> Self {
        Self::new(config, Arc::new(WsConnector))
    }

    /// Open the channel for a meeting.
    ///
    /// Resolves once the handshake completes. Any previously open
    /// channel (including a pending reconnect) is torn down first.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ConnectTimeout` if the handshake does not
    /// complete within the configured timeout, or the connector's error
    /// if the initial attempt fails. Initial failures are not retried.
    pub async fn connect(&self, meeting_id: &MeetingId) -> Result<(), ClientError> {
        let inner = &self.inner;
        let url = inner.config.meeting_url(meeting_id)?;

        // Tear down any previous session so a stale retry never races
        // this connection.
        inner.teardown();
        *lock(&inner.meeting_id) = Some(meeting_id.clone());
        inner.set_state(ConnectionState::Connecting);
        let token = lock(&inner.cancel).clone();

        match inner.open(&url).await {
            Ok(handle) => {
                info!(target: "session.transport", meeting_id = %meeting_id, "connected");
                inner.install(handle, token);
                Ok(())
            }
            Err(e) => {
                inner.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Close the channel with a normal-closure code.
    ///
    /// Cancels any pending reconnect timer and clears retry state.
    /// Idempotent. This is the only path that suppresses automatic
    /// reconnection.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        inner.set_state(ConnectionState::Closing);
        inner.teardown();
        *lock(&inner.meeting_id) = None;
        inner.set_state(ConnectionState::Disconnected);
        debug!(target: "session.transport", "disconnected");
    }

    /// Send a raw binary audio chunk.
    ///
    /// No-op with a logged warning if the channel is not connected;
    /// never errors, never queues.
    pub fn send_audio(&self, data: Bytes) {
        self.inner.send_frame(Frame::Binary(data), "audio chunk");
    }

    /// Send a JSON command object.
    ///
    /// No-op with a logged warning if the channel is not connected;
    /// never errors, never queues.
    pub fn send_command(&self, command: &ClientCommand) {
        match serde_json::to_string(command) {
            Ok(text) => self.inner.send_frame(Frame::Text(text), "command"),
            Err(e) => warn!(target: "session.transport", error = %e, "could not serialize command"),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *lock(&self.inner.state)
    }

    /// Whether the channel is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Register the transcript handler (replaces any previous one).
    pub fn on_transcript(&self, handler: impl Fn(TranscriptPayload) + Send + Sync + 'static) {
        *lock(&self.inner.handlers.transcript) = Some(Arc::new(handler));
    }

    /// Register the summary handler (replaces any previous one).
    pub fn on_summary(&self, handler: impl Fn(SummaryPayload) + Send + Sync + 'static) {
        *lock(&self.inner.handlers.summary) = Some(Arc::new(handler));
    }

    /// Register the sentiment handler (replaces any previous one).
    pub fn on_sentiment(&self, handler: impl Fn(SentimentPayload) + Send + Sync + 'static) {
        *lock(&self.inner.handlers.sentiment) = Some(Arc::new(handler));
    }

    /// Register the contextual-insight handler (replaces any previous
    /// one).
    pub fn on_contextual_insight(
        &self,
        handler: impl Fn(ContextualInsightPayload) + Send + Sync + 'static,
    ) {
        *lock(&self.inner.handlers.contextual_insight) = Some(Arc::new(handler));
    }

    /// Register the backend-error handler (replaces any previous one).
    pub fn on_error(&self, handler: impl Fn(String) + Send + Sync + 'static) {
        *lock(&self.inner.handlers.error) = Some(Arc::new(handler));
    }

    /// Register the connection-status handler (replaces any previous
    /// one). Receives both backend `connection_status` envelopes and
    /// the transport's own lifecycle transitions.
    pub fn on_connection_status(&self, handler: impl Fn(ConnectionStatus) + Send + Sync + 'static) {
        *lock(&self.inner.handlers.connection_status) = Some(Arc::new(handler));
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    /// Cancel the current session scope and close any open socket.
    fn teardown(&self) {
        lock(&self.cancel).cancel();
        if let Some(tx) = lock(&self.outbound).take() {
            let _ = tx.send(Frame::Close {
                code: NORMAL_CLOSE_CODE,
            });
        }
        {
            let mut retry = lock(&self.retry);
            retry.attempts = 0;
            retry.delay = self.config.backoff_base;
        }
        self.reconnecting.store(false, Ordering::SeqCst);
        // Fresh scope for whatever comes next
        *lock(&self.cancel) = CancellationToken::new();
    }

    /// Open a socket with the handshake timeout applied.
    async fn open(&self, url: &Url) -> Result<SocketHandle, ClientError> {
        tokio::time::timeout(self.config.connect_timeout, self.connector.connect(url))
            .await
            .map_err(|_| ClientError::ConnectTimeout(self.config.connect_timeout))?
    }

    /// Install an open socket: reset the retry budget, flip to
    /// connected, spawn the reader task.
    ///
    /// `token` is the session scope that authorized this socket; a
    /// stale attempt must not pick up a newer session's token.
    fn install(self: &Arc<Self>, handle: SocketHandle, token: CancellationToken) {
        *lock(&self.outbound) = Some(handle.outbound);
        {
            let mut retry = lock(&self.retry);
            retry.attempts = 0;
            retry.delay = self.config.backoff_base;
        }
        self.set_state(ConnectionState::Connected);
        self.emit_status(ConnectionStatus::Connected);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.read_loop(handle.events, token).await;
        });
    }

    /// Reader task: dispatch envelopes until the socket closes, then
    /// decide between settling disconnected and reconnecting.
    async fn read_loop(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<SocketEvent>,
        token: CancellationToken,
    ) {
        let close_code = loop {
            tokio::select! {
                () = token.cancelled() => return,
                event = events.recv() => match event {
                    Some(SocketEvent::Frame(Frame::Text(text))) => self.dispatch(&text),
                    Some(SocketEvent::Frame(_)) => {
                        debug!(target: "session.transport", "ignoring non-text inbound frame");
                    }
                    Some(SocketEvent::Closed { code }) => break code,
                    None => break ABNORMAL_CLOSE_CODE,
                }
            }
        };

        *lock(&self.outbound) = None;

        let should_retry = close_code != NORMAL_CLOSE_CODE
            && lock(&self.meeting_id).is_some()
            && !token.is_cancelled();

        if !should_retry {
            debug!(target: "session.transport", close_code, "channel closed");
            self.set_state(ConnectionState::Disconnected);
            self.emit_status(ConnectionStatus::Disconnected);
            return;
        }

        // At most one reconnect loop in flight per transport
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        warn!(target: "session.transport", close_code, "abnormal closure, reconnecting");
        self.reconnect_loop(token).await;
        self.reconnecting.store(false, Ordering::SeqCst);
    }

    /// Bounded reconnect loop. Runs inside the reader task that
    /// observed the closure, so attempts are strictly sequential.
    async fn reconnect_loop(self: &Arc<Self>, token: CancellationToken) {
        loop {
            let attempt = {
                let mut retry = lock(&self.retry);
                if retry.attempts >= self.config.max_reconnect_attempts {
                    drop(retry);
                    warn!(
                        target: "session.transport",
                        max_attempts = self.config.max_reconnect_attempts,
                        "reconnect budget exhausted, giving up"
                    );
                    self.set_state(ConnectionState::Disconnected);
                    self.emit_status(ConnectionStatus::Disconnected);
                    return;
                }
                retry.attempts += 1;
                retry.attempts
            };

            self.set_state(ConnectionState::Reconnecting);
            self.emit_status(ConnectionStatus::Reconnecting);
            let delay = lock(&self.retry).delay;
            debug!(
                target: "session.transport",
                attempt,
                max_attempts = self.config.max_reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );

            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }

            let url = {
                let meeting_id = lock(&self.meeting_id).clone();
                let Some(meeting_id) = meeting_id else { return };
                match self.config.meeting_url(&meeting_id) {
                    Ok(url) => url,
                    // The URL was valid when connect() derived it
                    Err(e) => {
                        warn!(target: "session.transport", error = %e, "cannot derive endpoint URL");
                        self.set_state(ConnectionState::Disconnected);
                        self.emit_status(ConnectionStatus::Disconnected);
                        return;
                    }
                }
            };

            // The handshake itself must honor cancellation: a
            // disconnect() or fresh connect() during the open would
            // otherwise resurrect the session when it resolves
            let opened = tokio::select! {
                () = token.cancelled() => return,
                opened = self.open(&url) => opened,
            };

            match opened {
                Ok(handle) => {
                    if token.is_cancelled() {
                        return;
                    }
                    info!(target: "session.transport", attempt, "reconnected");
                    self.install(handle, token);
                    return;
                }
                Err(e) => {
                    warn!(target: "session.transport", attempt, error = %e, "reconnect attempt failed");
                    let mut retry = lock(&self.retry);
                    retry.delay = (retry.delay * 2).min(self.config.backoff_max);
                }
            }
        }
    }

    /// Decode one text frame and invoke exactly one handler category.
    fn dispatch(&self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(target: "session.transport", error = %e, "dropping malformed envelope");
                return;
            }
        };

        match envelope.message_type {
            MessageType::Transcript => {
                self.dispatch_payload(&envelope, &self.handlers.transcript);
            }
            MessageType::Summary => {
                self.dispatch_payload(&envelope, &self.handlers.summary);
            }
            MessageType::Sentiment => {
                self.dispatch_payload(&envelope, &self.handlers.sentiment);
            }
            MessageType::ContextualInsight => {
                self.dispatch_payload(&envelope, &self.handlers.contextual_insight);
            }
            MessageType::Error => {
                // Error payloads are plain strings on the wire; anything
                // else is passed through as its JSON rendering
                let message = envelope
                    .data
                    .as_str()
                    .map_or_else(|| envelope.data.to_string(), str::to_string);
                if let Some(handler) = lock(&self.handlers.error).clone() {
                    handler(message);
                }
            }
            MessageType::ConnectionStatus => match envelope.payload::<ConnectionStatus>() {
                Ok(status) => self.emit_status(status),
                Err(e) => {
                    warn!(target: "session.transport", error = %e, "dropping undecodable connection status");
                }
            },
            MessageType::Unknown => {
                debug!(target: "session.transport", "dropping envelope with unknown type");
            }
        }
    }

    fn dispatch_payload<T: DeserializeOwned>(
        &self,
        envelope: &Envelope,
        slot: &Mutex<Option<Handler<T>>>,
    ) {
        let Some(handler) = lock(slot).clone() else {
            return;
        };
        match envelope.payload::<T>() {
            Ok(payload) => handler(payload),
            Err(e) => warn!(
                target: "session.transport",
                message_type = %envelope.message_type,
                error = %e,
                "dropping undecodable payload"
            ),
        }
    }

    fn emit_status(&self, status: ConnectionStatus) {
        if let Some(handler) = lock(&self.handlers.connection_status).clone() {
            handler(status);
        }
    }

    fn send_frame(&self, frame: Frame, what: &str) {
        if *lock(&self.state) != ConnectionState::Connected {
            warn!(target: "session.transport", "not connected, dropping {what}");
            return;
        }
        let sender = lock(&self.outbound).clone();
        match sender {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    warn!(target: "session.transport", "socket task gone, dropping {what}");
                }
            }
            None => warn!(target: "session.transport", "no open socket, dropping {what}"),
        }
    }
}
