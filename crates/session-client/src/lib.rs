//! Client-side core for the meeting companion.
//!
//! Two independent failure domains per meeting:
//!
//! - [`transport::SessionTransport`] keeps one reconnecting channel to
//!   the backend intelligence stream and multiplexes inbound envelopes
//!   to per-type handlers; [`transport::NotesTransport`] is its
//!   fail-stop sibling for collaborative notes.
//! - [`conference::ConferenceSession`] drives one embedded conferencing
//!   widget, classifying provider errors and rejoining under fresh
//!   collision-safe room identities when the provider rejects a room.
//!
//! A transport disconnect never tears down the conference, and vice
//! versa. Both are driven by the same logical [`common::types::MeetingId`].

#![warn(clippy::pedantic)]

/// Module for client configuration
pub mod config;

/// Module for conference join negotiation
pub mod conference;

/// Module for client error types
pub mod errors;

/// Module for backend streaming transports
pub mod transport;

pub(crate) mod sync;

pub use conference::{ConferenceSession, ConferenceState};
pub use config::{ConferenceConfig, TransportConfig};
pub use errors::ClientError;
pub use transport::{ConnectionState, NotesTransport, SessionTransport};
