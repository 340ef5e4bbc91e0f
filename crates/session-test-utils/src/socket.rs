//! Scriptable socket connector.
//!
//! Each accepted connection hands the test a [`ServerEnd`] through the
//! receiver returned by [`MockConnector::new`], so the test plays the
//! backend: it reads the frames the transport sent and injects inbound
//! events, including the close that triggers reconnection.

use async_trait::async_trait;
use session_client::errors::ClientError;
use session_client::transport::{Frame, SocketConnector, SocketEvent, SocketHandle};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

/// Scripted outcome for one `connect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Accept and hand the test a [`ServerEnd`]
    Accept,
    /// Accept after the given handshake duration
    AcceptAfter(Duration),
    /// Fail immediately
    Reject,
    /// Never resolve; exercises the connect timeout
    Hang,
}

/// The backend's side of one accepted connection.
pub struct ServerEnd {
    /// Events delivered to the transport
    pub inbound: mpsc::UnboundedSender<SocketEvent>,
    /// Frames the transport sent
    pub outbound: mpsc::UnboundedReceiver<Frame>,
}

impl ServerEnd {
    /// Deliver a text frame to the transport.
    pub fn send_text(&self, text: &str) {
        self.inbound
            .send(SocketEvent::Frame(Frame::Text(text.to_string())))
            .expect("transport dropped its event receiver");
    }

    /// Close the connection with the given code.
    pub fn close(&self, code: u16) {
        self.inbound
            .send(SocketEvent::Closed { code })
            .expect("transport dropped its event receiver");
    }

    /// Next frame the transport sent, if any is already queued.
    pub fn try_next_frame(&mut self) -> Option<Frame> {
        self.outbound.try_recv().ok()
    }

    /// Next frame the transport sent, waiting for it.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }
}

/// Connector whose connections are scripted by the test.
///
/// Unscripted `connect` calls accept. Every call is counted and its
/// URL recorded.
pub struct MockConnector {
    script: Mutex<VecDeque<ConnectOutcome>>,
    server_tx: mpsc::UnboundedSender<ServerEnd>,
    connects: AtomicU32,
    last_url: Mutex<Option<Url>>,
}

impl MockConnector {
    /// Create a connector and the channel on which accepted
    /// connections' server ends arrive.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            server_tx,
            connects: AtomicU32::new(0),
            last_url: Mutex::new(None),
        });
        (connector, server_rx)
    }

    /// Queue an outcome for the next unscripted `connect` call.
    pub fn script(&self, outcome: ConnectOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// How many times `connect` was called.
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// URL of the most recent `connect` call.
    pub fn last_url(&self) -> Option<Url> {
        self.last_url.lock().unwrap().clone()
    }
}

#[async_trait]
impl SocketConnector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<SocketHandle, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(url.clone());

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectOutcome::Accept);

        match outcome {
            ConnectOutcome::Reject => Err(ClientError::Socket("scripted rejection".to_string())),
            ConnectOutcome::Hang => std::future::pending().await,
            ConnectOutcome::Accept | ConnectOutcome::AcceptAfter(_) => {
                if let ConnectOutcome::AcceptAfter(handshake) = outcome {
                    tokio::time::sleep(handshake).await;
                }
                let (frame_tx, frame_rx) = mpsc::unbounded_channel();
                let (event_tx, event_rx) = mpsc::unbounded_channel();
                self.server_tx
                    .send(ServerEnd {
                        inbound: event_tx,
                        outbound: frame_rx,
                    })
                    .expect("test dropped the server-end receiver");
                Ok(SocketHandle {
                    outbound: frame_tx,
                    events: event_rx,
                })
            }
        }
    }
}
