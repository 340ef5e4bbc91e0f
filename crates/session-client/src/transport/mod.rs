//! Backend streaming transports.
//!
//! One reconnecting channel per meeting for the intelligence stream
//! ([`SessionTransport`]), one fail-stop channel for collaborative
//! notes ([`NotesTransport`]). Both share the socket seam in
//! [`socket`], which is what tests mock.

/// Module for the fail-stop notes channel
pub mod notes;

/// Module for the reconnecting intelligence channel
pub mod session;

/// Module for the socket abstraction and production WebSocket connector
pub mod socket;

pub use notes::NotesTransport;
pub use session::{ConnectionState, SessionTransport};
pub use socket::{
    Frame, SocketConnector, SocketEvent, SocketHandle, WsConnector, ABNORMAL_CLOSE_CODE,
    NORMAL_CLOSE_CODE,
};
