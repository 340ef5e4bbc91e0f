//! Conference join negotiation.
//!
//! Owns one embedded conferencing widget instance per meeting view:
//! collision-safe room identities ([`room`]), provider error
//! classification ([`classify`]), and retry-with-new-identity driving
//! ([`session`]). The provider itself is an opaque capability behind
//! the traits in [`provider`].

/// Module for provider error classification
pub mod classify;

/// Module for the provider capability traits and init-once library
pub mod provider;

/// Module for room identity generation
pub mod room;

/// Module for the conference session state machine
pub mod session;

pub use classify::ErrorClass;
pub use provider::{
    ActiveRoom, ConferenceProvider, ProviderEvent, ProviderLibrary, ProviderLoader, RoomCommand,
    RoomControls, RoomOptions,
};
pub use room::RoomIdentity;
pub use session::{ConferenceSession, ConferenceState};
