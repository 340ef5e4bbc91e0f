//! Inbound message envelope and per-type payloads.
//!
//! Every frame the backend streams over the meeting channel is a JSON
//! envelope: a declared type, an opaque per-type payload, and a
//! timestamp. The transport multiplexes envelopes to registered
//! handlers by type; exactly one handler category fires per envelope.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of an inbound envelope.
///
/// Unknown values decode to [`MessageType::Unknown`] so a newer backend
/// never breaks envelope parsing; the transport drops such envelopes
/// with a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Live transcript fragment
    Transcript,
    /// Rolling meeting summary
    Summary,
    /// Sentiment reading over recent speech
    Sentiment,
    /// Context-enhanced insight derived from prior meetings
    ContextualInsight,
    /// Backend-reported error
    Error,
    /// Connection status notification
    ConnectionStatus,
    /// Any type this client does not recognize
    #[serde(other)]
    Unknown,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transcript => "transcript",
            Self::Summary => "summary",
            Self::Sentiment => "sentiment",
            Self::ContextualInsight => "contextual_insight",
            Self::Error => "error",
            Self::ConnectionStatus => "connection_status",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A typed, timestamped unit of inbound streamed data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Declared payload type
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Opaque per-type payload
    pub data: serde_json::Value,
    /// Backend timestamp for the envelope
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Decode an envelope from a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error if the frame is not a valid
    /// envelope. The transport logs and drops such frames.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Decode the payload into its concrete per-type struct.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error if the payload does not match
    /// the expected shape for its declared type.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Transcript fragment payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptPayload {
    /// Transcribed text
    pub text: String,
    /// Speaker label, when diarization is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Recognition confidence in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Detected language tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Rolling summary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryPayload {
    /// Summary text
    pub summary: String,
    /// Extracted action items
    #[serde(default)]
    pub action_items: Vec<String>,
    /// Word count of the summarized span
    #[serde(default)]
    pub word_count: u64,
    /// Compression ratio of summary to source
    #[serde(default)]
    pub summary_ratio: f64,
}

/// Sentiment reading payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentPayload {
    /// Sentiment label (e.g. "positive")
    pub label: String,
    /// Model score for the label
    pub score: f64,
    /// Qualitative confidence bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

/// Contextual-insight payload enriched from prior meeting context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextualInsightPayload {
    /// Summary enhanced with retrieved context
    pub enhanced_summary: String,
    /// Relevant context snippets
    #[serde(default)]
    pub relevant_context: Vec<String>,
    /// Source descriptors for the retrieved context
    #[serde(default)]
    pub context_sources: Vec<serde_json::Value>,
}

/// Connection status carried on `connection_status` envelopes and
/// surfaced by the transport's own lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Channel is open
    Connected,
    /// Channel dropped; a reconnect attempt is in flight
    Reconnecting,
    /// Channel is closed and no reconnect is pending
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_transcript_envelope() {
        let frame = json!({
            "type": "transcript",
            "data": {"text": "hello there", "speaker": "alice", "confidence": 0.92},
            "timestamp": "2025-01-15T10:30:00Z"
        })
        .to_string();

        let envelope = Envelope::decode(&frame).unwrap();
        assert_eq!(envelope.message_type, MessageType::Transcript);

        let payload: TranscriptPayload = envelope.payload().unwrap();
        assert_eq!(payload.text, "hello there");
        assert_eq!(payload.speaker.as_deref(), Some("alice"));
        assert!(payload.language.is_none());
    }

    #[test]
    fn decodes_summary_with_defaults() {
        let frame = json!({
            "type": "summary",
            "data": {"summary": "short recap"},
            "timestamp": "2025-01-15T10:31:00Z"
        })
        .to_string();

        let envelope = Envelope::decode(&frame).unwrap();
        let payload: SummaryPayload = envelope.payload().unwrap();
        assert_eq!(payload.summary, "short recap");
        assert!(payload.action_items.is_empty());
        assert_eq!(payload.word_count, 0);
    }

    #[test]
    fn unknown_type_is_not_fatal() {
        let frame = json!({
            "type": "telemetry_v2",
            "data": {"anything": true},
            "timestamp": "2025-01-15T10:32:00Z"
        })
        .to_string();

        let envelope = Envelope::decode(&frame).unwrap();
        assert_eq!(envelope.message_type, MessageType::Unknown);
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(Envelope::decode("not json").is_err());
        assert!(Envelope::decode("{\"type\": \"transcript\"}").is_err());
    }

    #[test]
    fn contextual_insight_round_trips() {
        let frame = json!({
            "type": "contextual_insight",
            "data": {
                "enhanced_summary": "builds on last week's decision",
                "relevant_context": ["decision from 2025-01-08"],
                "context_sources": [{"meeting_id": "m-41"}]
            },
            "timestamp": "2025-01-15T10:33:00Z"
        })
        .to_string();

        let envelope = Envelope::decode(&frame).unwrap();
        assert_eq!(envelope.message_type, MessageType::ContextualInsight);
        let payload: ContextualInsightPayload = envelope.payload().unwrap();
        assert_eq!(payload.relevant_context.len(), 1);
        assert_eq!(payload.context_sources.len(), 1);
    }

    #[test]
    fn connection_status_uses_snake_case() {
        let status: ConnectionStatus = serde_json::from_value(json!("reconnecting")).unwrap();
        assert_eq!(status, ConnectionStatus::Reconnecting);
        assert_eq!(status.to_string(), "reconnecting");
    }
}
