use std::collections::HashSet;

use crate::error::{Result, WebDriverError};

/// Keyboard device state: raw key values currently held and modifier flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInputSource {
    pub pressed: HashSet<String>,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyInputSource {
    /// Update modifier flags for a normalized key name
    pub fn set_modifier(&mut self, key: &str, down: bool) {
        match key {
            "Alt" => self.alt = down,
            "Shift" => self.shift = down,
            "Control" => self.ctrl = down,
            "Meta" => self.meta = down,
            _ => {}
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Virtual input device, keyed by a client-chosen input id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Key(KeyInputSource),
    Pointer,
    Wheel,
    None,
}

impl InputSource {
    /// Create a fresh source for an action sequence type.
    ///
    /// Only keyboards hold state; the other device types are not implemented.
    pub fn create(source_type: &str) -> Result<Self> {
        match source_type {
            "key" => Ok(Self::Key(KeyInputSource::default())),
            "pointer" | "wheel" | "none" => Err(WebDriverError::UnsupportedOperation(format!(
                "{}{} input source is not implemented yet",
                source_type[..1].to_ascii_uppercase(),
                &source_type[1..]
            ))),
            other => Err(WebDriverError::InvalidArgument(format!(
                "Unknown input source type: {}",
                other
            ))),
        }
    }

    pub fn source_type(&self) -> &'static str {
        match self {
            Self::Key(_) => "key",
            Self::Pointer => "pointer",
            Self::Wheel => "wheel",
            Self::None => "none",
        }
    }

    pub fn as_key(&self) -> Option<&KeyInputSource> {
        match self {
            Self::Key(source) => Some(source),
            _ => None,
        }
    }

    pub fn as_key_mut(&mut self) -> Option<&mut KeyInputSource> {
        match self {
            Self::Key(source) => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create() {
        let source = InputSource::create("key").unwrap();
        assert_eq!(source.source_type(), "key");
        assert_eq!(source.as_key(), Some(&KeyInputSource::default()));

        let err = InputSource::create("pointer").unwrap_err();
        assert_eq!(err.code(), "unsupported operation");
        assert_eq!(err.to_string(), "Pointer input source is not implemented yet");

        let err = InputSource::create("pen").unwrap_err();
        assert_eq!(err.code(), "invalid argument");
        assert_eq!(err.to_string(), "Unknown input source type: pen");
    }

    #[test]
    fn test_modifier_flags() {
        let mut source = KeyInputSource::default();
        source.set_modifier("Shift", true);
        source.set_modifier("Control", true);
        source.set_modifier("a", true);
        assert!(source.shift && source.ctrl && !source.alt && !source.meta);

        source.pressed.insert("a".to_string());
        source.reset();
        assert_eq!(source, KeyInputSource::default());
    }
}
