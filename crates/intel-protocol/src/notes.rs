//! Collaborative note updates.
//!
//! The notes channel carries small JSON deltas in both directions. The
//! backend acts on `"save"` updates and rebroadcasts everything else to
//! the other editors, so unknown fields must survive a round trip.

use serde::{Deserialize, Serialize};

/// Update action that asks the backend to persist the current content.
pub const ACTION_SAVE: &str = "save";

/// Update action carrying an in-progress edit.
pub const ACTION_UPDATE: &str = "update";

/// A collaborative note update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesUpdate {
    /// Update action (`"save"`, `"update"`, ...)
    #[serde(rename = "type")]
    pub action: String,
    /// Note content for actions that carry it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Fields this client does not interpret, preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NotesUpdate {
    /// An in-progress edit carrying the full note content.
    #[must_use]
    pub fn update(content: impl Into<String>) -> Self {
        Self {
            action: ACTION_UPDATE.to_string(),
            content: Some(content.into()),
            extra: serde_json::Map::new(),
        }
    }

    /// A save request for the given content.
    #[must_use]
    pub fn save(content: impl Into<String>) -> Self {
        Self {
            action: ACTION_SAVE.to_string(),
            content: Some(content.into()),
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_round_trip() {
        let wire = json!({
            "type": "update",
            "content": "agenda item 3",
            "cursor": {"line": 4, "col": 12},
            "editor": "bob"
        });

        let update: NotesUpdate = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(update.action, ACTION_UPDATE);
        assert_eq!(update.content.as_deref(), Some("agenda item 3"));

        let back = serde_json::to_value(&update).unwrap();
        assert_eq!(back, wire);
    }

    #[test]
    fn save_constructor_sets_action() {
        let update = NotesUpdate::save("final notes");
        assert_eq!(update.action, ACTION_SAVE);
    }
}
