//! Socket abstraction over the backend's bidirectional channel.
//!
//! The transports are written against [`SocketConnector`] so the
//! reconnect and dispatch logic can be exercised without a network.
//! [`WsConnector`] is the production implementation: it opens a
//! WebSocket, splits the stream, and bridges both halves to channels
//! with a sender pump and a receiver pump.

use crate::errors::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

/// Normal-closure code. The only code that suppresses reconnection.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Abnormal-closure code reported when the stream ends without a close
/// frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// An outbound frame.
#[derive(Debug, Clone)]
pub enum Frame {
    /// JSON text frame
    Text(String),
    /// Raw binary frame (audio)
    Binary(Bytes),
    /// Close the channel with the given code; no frames follow
    Close {
        /// Closure code to send
        code: u16,
    },
}

/// An inbound socket event.
#[derive(Debug)]
pub enum SocketEvent {
    /// A frame arrived
    Frame(Frame),
    /// The channel closed
    Closed {
        /// Closure code; [`ABNORMAL_CLOSE_CODE`] if none was received
        code: u16,
    },
}

/// Handle to one open socket: an outbound frame sender and an inbound
/// event receiver. Dropping either half tears the bridge down.
pub struct SocketHandle {
    /// Outbound frames
    pub outbound: mpsc::UnboundedSender<Frame>,
    /// Inbound events, ending with exactly one `Closed`
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

/// Opens sockets to the backend. The seam the transports are tested
/// through.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    /// Open a socket to `url`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Socket` if the connection cannot be
    /// established.
    async fn connect(&self, url: &Url) -> Result<SocketHandle, ClientError>;
}

/// Production WebSocket connector.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl SocketConnector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<SocketHandle, ClientError> {
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Socket(format!("connect to {url} failed: {e}")))?;
        debug!(target: "transport.socket", %url, "websocket open");

        let (mut write, mut read) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<SocketEvent>();

        // Sender pump: channel -> websocket. Ends on a Close frame or
        // when the transport drops its sender.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let message = match frame {
                    Frame::Text(text) => Message::Text(text),
                    Frame::Binary(data) => Message::Binary(data.to_vec()),
                    Frame::Close { code } => {
                        let close = CloseFrame {
                            code: code.into(),
                            reason: "".into(),
                        };
                        let _ = write.send(Message::Close(Some(close))).await;
                        break;
                    }
                };
                if let Err(e) = write.send(message).await {
                    debug!(target: "transport.socket", error = %e, "send failed, stopping sender pump");
                    break;
                }
            }
        });

        // Receiver pump: websocket -> channel. Always emits exactly one
        // Closed event at the end.
        tokio::spawn(async move {
            let mut close_code = ABNORMAL_CLOSE_CODE;
            while let Some(item) = read.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        if event_tx.send(SocketEvent::Frame(Frame::Text(text))).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Binary(data)) => {
                        let frame = Frame::Binary(Bytes::from(data));
                        if event_tx.send(SocketEvent::Frame(frame)).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        close_code = frame.map_or(NORMAL_CLOSE_CODE, |f| f.code.into());
                        break;
                    }
                    // Ping/pong are answered by tungstenite itself
                    Ok(_) => {}
                    Err(e) => {
                        warn!(target: "transport.socket", error = %e, "websocket read error");
                        break;
                    }
                }
            }
            let _ = event_tx.send(SocketEvent::Closed { code: close_code });
        });

        Ok(SocketHandle {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}
