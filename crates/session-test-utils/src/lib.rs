//! # Session Test Utilities
//!
//! Shared test utilities for the meeting companion session client.
//!
//! This crate provides mock implementations and test fixtures for
//! testing the transports and the conference session without a network
//! or a real conferencing provider.
//!
//! ## Modules
//!
//! - `socket` - Scriptable connector standing in for the backend socket
//! - `provider` - Scriptable conferencing provider and room
//! - `fixtures` - Pre-built intelligence envelopes as wire JSON
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let (connector, mut servers) = MockConnector::new();
//!     let transport = SessionTransport::new(TransportConfig::default(), connector);
//!
//!     transport.connect(&MeetingId::new("meeting-1")).await.unwrap();
//!     let mut server = servers.recv().await.unwrap();
//!     server.send_text(&fixtures::transcript("hello", Some("alice")));
//! }
//! ```

pub mod fixtures;
pub mod provider;
pub mod socket;

pub use provider::{CountingLoader, MockProvider, RoomBehavior};
pub use socket::{ConnectOutcome, MockConnector, ServerEnd};
