//! Common data types for Meeting Companion components.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical meeting identifier.
///
/// An opaque string naming a meeting session, stable for the meeting's
/// lifetime. It addresses the backend streaming endpoints and seeds the
/// room-identity fingerprint; it is never handed to the conferencing
/// provider verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(String);

impl MeetingId {
    /// Create a meeting ID from any string. Constraints are enforced on
    /// derived values (endpoint paths, room identities), not on input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MeetingId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Provider-scoped participant identifier carried on participant events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a participant ID from a provider-supplied string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn meeting_id_serializes_transparently() {
        let id = MeetingId::new("meeting_1700000000");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"meeting_1700000000\"");
    }

    #[test]
    fn meeting_id_accepts_arbitrary_input() {
        // Empty and unsafe characters are allowed on input
        let empty = MeetingId::new("");
        assert_eq!(empty.as_str(), "");
        let odd = MeetingId::new("räum/../#42");
        assert_eq!(odd.as_str(), "räum/../#42");
    }
}
