//! Pre-built intelligence envelopes as wire JSON.
//!
//! Every builder returns the exact text frame the backend would send,
//! timestamp included, so tests feed them straight into a
//! [`crate::ServerEnd`].

use chrono::Utc;
use serde_json::json;

fn envelope(message_type: &str, data: serde_json::Value) -> String {
    json!({
        "type": message_type,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string()
}

/// A transcript segment.
pub fn transcript(text: &str, speaker: Option<&str>) -> String {
    envelope(
        "transcript",
        json!({
            "text": text,
            "speaker": speaker,
            "confidence": 0.92,
            "language": "en",
        }),
    )
}

/// A rolling summary.
pub fn summary(text: &str, action_items: &[&str]) -> String {
    envelope(
        "summary",
        json!({
            "summary": text,
            "action_items": action_items,
            "word_count": text.split_whitespace().count(),
            "summary_ratio": 0.2,
        }),
    )
}

/// A sentiment reading. `confidence` is a qualitative bucket on the
/// wire (`"high"`, `"medium"`, `"low"`), not a number.
pub fn sentiment(label: &str, score: f64) -> String {
    envelope(
        "sentiment",
        json!({
            "label": label,
            "score": score,
            "confidence": "high",
        }),
    )
}

/// A context-enriched insight.
pub fn contextual_insight(enhanced_summary: &str, sources: &[&str]) -> String {
    envelope(
        "contextual_insight",
        json!({
            "enhanced_summary": enhanced_summary,
            "relevant_context": [],
            "context_sources": sources,
        }),
    )
}

/// A backend-reported error.
pub fn error_message(message: &str) -> String {
    envelope("error", json!(message))
}

/// A backend-reported connection status.
pub fn connection_status(status: &str) -> String {
    envelope("connection_status", json!(status))
}

/// An envelope of a type this client does not know.
pub fn unrecognized(message_type: &str) -> String {
    envelope(message_type, json!({"anything": true}))
}
