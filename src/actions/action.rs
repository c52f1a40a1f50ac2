use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One input sequence of a `POST /actions` body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionSequence {
    pub id: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub actions: Vec<ActionItem>,
}

/// One tick of an input sequence
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    #[serde(rename = "type")]
    pub subtype: String,
    pub duration: Option<u64>,
    pub value: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub button: Option<i64>,
    pub origin: Option<Origin>,
    pub delta_x: Option<i64>,
    pub delta_y: Option<i64>,
}

/// Pointer move origin: `"viewport"`, `"pointer"` or an element reference
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Origin {
    Named(String),
    Element(HashMap<String, String>),
}

/// A sequence's metadata paired with one of its items, ready to dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: String,
    pub source_type: String,
    pub subtype: String,
    pub value: Option<String>,
    pub duration: Option<u64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub button: Option<i64>,
    pub origin: Option<Origin>,
    pub delta_x: Option<i64>,
    pub delta_y: Option<i64>,
}

impl Action {
    pub fn new(sequence: &ActionSequence, item: &ActionItem) -> Self {
        Self {
            id: sequence.id.clone(),
            source_type: sequence.source_type.clone(),
            subtype: item.subtype.clone(),
            value: item.value.clone(),
            duration: item.duration,
            x: item.x,
            y: item.y,
            button: item.button,
            origin: item.origin.clone(),
            delta_x: item.delta_x,
            delta_y: item.delta_y,
        }
    }

    /// A `keyDown`/`keyUp` for `value` on input `id`
    pub fn key(id: &str, subtype: &str, value: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            source_type: "key".to_string(),
            subtype: subtype.to_string(),
            value: Some(value.into()),
            duration: None,
            x: None,
            y: None,
            button: None,
            origin: None,
            delta_x: None,
            delta_y: None,
        }
    }

    /// Same action with a different subtype, used to build inverse actions.
    pub fn with_subtype(&self, subtype: &str) -> Self {
        Self {
            subtype: subtype.to_string(),
            ..self.clone()
        }
    }

    /// True when `self` is the pending inverse that `other` releases.
    pub fn is_released_by(&self, other: &Action) -> bool {
        self.id == other.id
            && self.source_type == other.source_type
            && self.subtype == other.subtype
            && self.value == other.value
            && self.button == other.button
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequence_deserialization() {
        let sequence: ActionSequence = serde_json::from_value(json!({
            "id": "mouse",
            "type": "pointer",
            "parameters": {"pointerType": "mouse"},
            "actions": [
                {"type": "pointerMove", "x": 10, "y": 20.5, "duration": 100,
                 "origin": {"element-6066-11e4-a52e-4f735466cecf": "abc"}},
                {"type": "pointerDown", "button": 0},
                {"type": "scroll", "deltaX": -3, "deltaY": 5, "origin": "viewport"}
            ]
        }))
        .unwrap();

        assert_eq!(sequence.actions.len(), 3);
        let moved = Action::new(&sequence, &sequence.actions[0]);
        assert_eq!(moved.source_type, "pointer");
        assert_eq!(moved.y, Some(20.5));
        assert_eq!(moved.duration, Some(100));
        assert!(matches!(moved.origin, Some(Origin::Element(_))));

        let scroll = Action::new(&sequence, &sequence.actions[2]);
        assert_eq!(scroll.delta_x, Some(-3));
        assert_eq!(scroll.origin, Some(Origin::Named("viewport".to_string())));
    }

    #[test]
    fn test_inverse_matching() {
        let down = Action::key("kb", "keyDown", "\u{E009}");
        let cancel = down.with_subtype("keyUp");
        assert!(cancel.is_released_by(&Action::key("kb", "keyUp", "\u{E009}")));
        assert!(!cancel.is_released_by(&Action::key("kb", "keyUp", "a")));
        assert!(!cancel.is_released_by(&Action::key("other", "keyUp", "\u{E009}")));
    }
}
