//! Outbound command objects.
//!
//! The meeting channel carries two outbound shapes: raw binary audio
//! chunks (passed through untouched as binary frames by the transport)
//! and JSON command objects with a declared `type` field.

use serde::{Deserialize, Serialize};

/// A JSON command object sent to the backend over the meeting channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCommand {
    /// Command discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Any additional command fields
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl ClientCommand {
    /// Create a command with no extra fields.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            body: serde_json::Map::new(),
        }
    }

    /// Attach a field to the command body.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_flattens_body_fields() {
        let command = ClientCommand::new("set_language").with("language", json!("de"));
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value, json!({"type": "set_language", "language": "de"}));
    }
}
