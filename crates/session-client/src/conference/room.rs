//! Collision-safe room identity generation.
//!
//! The conferencing provider rejects very short room names and may
//! reserve or access-restrict human-guessable ones, so identities are
//! never derived from human-chosen text directly: attempt 0 folds a
//! numeric fingerprint of the logical meeting id into a timestamp and
//! random suffix; every retry drops the fingerprint entirely and goes
//! fully random, so a rejected name is never reproduced.

use common::types::MeetingId;
use std::fmt;
use uuid::Uuid;

/// Minimum identity length accepted by the provider.
pub const MIN_IDENTITY_LENGTH: usize = 8;

/// Maximum identity length produced; purely cosmetic.
const MAX_IDENTITY_LENGTH: usize = 32;

/// Random suffix length folded into every identity.
const SUFFIX_LENGTH: usize = 8;

/// A provider-safe room identity.
///
/// Invariants: non-empty, lowercase alphanumeric only, at least
/// [`MIN_IDENTITY_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomIdentity(String);

impl RoomIdentity {
    /// Generate an identity for a meeting and retry attempt.
    ///
    /// Infallible: input constraints are not enforced, output
    /// invariants always hold. Distinct attempt numbers (and repeated
    /// calls) produce distinct identities with overwhelming
    /// probability.
    #[must_use]
    pub fn generate(meeting_id: &MeetingId, attempt: u32) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis().unsigned_abs();
        let suffix = random_suffix();

        let raw = if attempt == 0 {
            // Numeric fingerprint keeps a stable trace of the logical
            // id without exposing any of its text to the provider
            let fingerprint = meeting_id
                .as_str()
                .chars()
                .fold(0u32, |acc, c| acc.wrapping_add(c as u32));
            format!("room{fingerprint:x}{timestamp:x}{suffix}")
        } else {
            // A rejected name must never come back: no fingerprint,
            // attempt index and fresh randomness only
            format!("retry{timestamp:x}{attempt:x}{suffix}")
        };

        Self(normalize(&raw))
    }

    /// The identity string handed to the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn random_suffix() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SUFFIX_LENGTH)
        .collect()
}

/// Lowercase, strip everything non-alphanumeric, enforce the length
/// window.
fn normalize(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    while out.len() < MIN_IDENTITY_LENGTH {
        out.push_str(&random_suffix());
    }
    out.truncate(MAX_IDENTITY_LENGTH);
    out
}
