//! Provider error classification.
//!
//! Two error classes are retryable under a fresh room identity:
//! membership rejection (the room requires prior authorization, which
//! happens when a generated name collides with an access-restricted
//! room) and connection failure to the provider's signaling service.
//! Everything else is terminal.
//!
//! Classification checks the provider's declared error code first. The
//! message-substring matching below is a stopgap for providers that
//! only supply message text; the matched substrings are load-bearing
//! for compatibility and must not change.

/// Provider code for a room that requires prior authorization.
pub const CODE_MEMBERS_ONLY: &str = "conference.connectionError.membersOnly";

/// Provider code for a dropped signaling connection.
pub const CODE_CONNECTION_DROPPED: &str = "connection.droppedError";

/// Provider code for other signaling connection failures.
pub const CODE_CONNECTION_OTHER: &str = "connection.otherError";

const SUBSTR_MEMBERS_ONLY: &str = "membersOnly";
const SUBSTR_CONNECTION: &str = "connection";

/// Classification of a provider-raised error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Room requires prior authorization; retry under a new identity
    MembershipRejected,
    /// Transport-level failure to the provider's signaling service
    ConnectionFailed,
    /// Not retryable; surface as fatal
    Terminal,
}

impl ErrorClass {
    /// Whether a retry under a fresh identity is warranted.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Terminal)
    }
}

/// Classify a provider error from its declared code and message.
#[must_use]
pub fn classify(code: Option<&str>, message: &str) -> ErrorClass {
    if let Some(code) = code {
        if code == CODE_MEMBERS_ONLY {
            return ErrorClass::MembershipRejected;
        }
        if code == CODE_CONNECTION_DROPPED || code == CODE_CONNECTION_OTHER {
            return ErrorClass::ConnectionFailed;
        }
    }
    if message.contains(SUBSTR_MEMBERS_ONLY) {
        return ErrorClass::MembershipRejected;
    }
    if message.contains(SUBSTR_CONNECTION) {
        return ErrorClass::ConnectionFailed;
    }
    ErrorClass::Terminal
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_declared_code_first() {
        assert_eq!(
            classify(Some(CODE_MEMBERS_ONLY), "whatever"),
            ErrorClass::MembershipRejected
        );
        assert_eq!(
            classify(Some(CODE_CONNECTION_DROPPED), "whatever"),
            ErrorClass::ConnectionFailed
        );
        assert_eq!(
            classify(Some(CODE_CONNECTION_OTHER), ""),
            ErrorClass::ConnectionFailed
        );
    }

    #[test]
    fn falls_back_to_message_substrings() {
        assert_eq!(
            classify(None, "conference failed: membersOnly"),
            ErrorClass::MembershipRejected
        );
        assert_eq!(
            classify(None, "connection interrupted"),
            ErrorClass::ConnectionFailed
        );
    }

    #[test]
    fn unknown_code_still_consults_the_message() {
        assert_eq!(
            classify(Some("conference.videobridgeDown"), "membersOnly"),
            ErrorClass::MembershipRejected
        );
    }

    #[test]
    fn everything_else_is_terminal() {
        assert_eq!(classify(None, "not allowed"), ErrorClass::Terminal);
        assert_eq!(
            classify(Some("conference.authError"), "forbidden"),
            ErrorClass::Terminal
        );
    }
}
