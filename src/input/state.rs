use std::collections::HashMap;

use super::source::{InputSource, KeyInputSource};
use crate::actions::Action;
use crate::error::{Result, WebDriverError};

/// Per-session input devices plus the list of pending inverse actions.
///
/// Every undoable "down" dispatch pushes exactly one inverse onto the cancel
/// list; releasing that inverse removes it again.
#[derive(Debug, Default)]
pub struct InputState {
    sources: HashMap<String, InputSource>,
    cancel_list: Vec<Action>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_input_source(&self, id: &str) -> Option<&InputSource> {
        self.sources.get(id)
    }

    /// Look up the source for `id`, registering a new one of `source_type`
    /// when absent.
    pub fn get_or_create_input_source(
        &mut self,
        source_type: &str,
        id: &str,
    ) -> Result<&mut InputSource> {
        if let Some(existing) = self.sources.get(id) {
            if existing.source_type() != source_type {
                return Err(WebDriverError::InvalidArgument(format!(
                    "Input source with id '{}' already exists and has a different type: {}",
                    id,
                    existing.source_type()
                )));
            }
        } else {
            let source = InputSource::create(source_type)?;
            self.sources.insert(id.to_string(), source);
        }

        self.sources
            .get_mut(id)
            .ok_or_else(|| WebDriverError::UnknownError(format!("Input source '{}' vanished", id)))
    }

    pub fn add_input_source(&mut self, id: &str, source: InputSource) {
        self.sources.insert(id.to_string(), source);
    }

    pub fn remove_input_source(&mut self, id: &str) {
        let pending = self.cancel_list.iter().filter(|a| a.id == id).count();
        debug_assert_eq!(pending, 0, "input source '{}' removed with pending releases", id);
        if pending > 0 {
            tracing::warn!(
                "Removing input source '{}' with {} pending release action(s)",
                id,
                pending
            );
        }
        self.sources.remove(id);
    }

    /// The key source registered under `id`, if any. A source of another
    /// type is an argument error.
    pub fn key_source_mut(&mut self, id: &str) -> Result<Option<&mut KeyInputSource>> {
        match self.sources.get_mut(id) {
            None => Ok(None),
            Some(source) => {
                let source_type = source.source_type();
                source.as_key_mut().map(Some).ok_or_else(|| {
                    WebDriverError::InvalidArgument(format!(
                        "Input source with id '{}' is not of the expected type: key (found {})",
                        id, source_type
                    ))
                })
            }
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn push_cancel(&mut self, action: Action) {
        self.cancel_list.push(action);
    }

    /// Drop the most recent pending inverse that `release` satisfies.
    pub fn remove_matching_cancel(&mut self, release: &Action) -> bool {
        match self
            .cancel_list
            .iter()
            .rposition(|pending| pending.is_released_by(release))
        {
            Some(index) => {
                self.cancel_list.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove and return the most recent pending inverse for input `id`
    pub fn take_last_cancel_for(&mut self, id: &str) -> Option<Action> {
        let index = self.cancel_list.iter().rposition(|a| a.id == id)?;
        Some(self.cancel_list.remove(index))
    }

    pub fn pop_cancel(&mut self) -> Option<Action> {
        self.cancel_list.pop()
    }

    pub fn cancel_list(&self) -> &[Action] {
        &self.cancel_list
    }

    /// Back to the initial input state: no sources, nothing pending.
    pub fn reset(&mut self) {
        self.cancel_list.clear();
        self.sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_registers_source() {
        let mut state = InputState::new();
        state.get_or_create_input_source("key", "kb").unwrap();
        assert_eq!(state.source_count(), 1);

        // second call returns the same source
        state
            .get_or_create_input_source("key", "kb")
            .unwrap()
            .as_key_mut()
            .unwrap()
            .shift = true;
        assert!(state.key_source_mut("kb").unwrap().unwrap().shift);
        assert_eq!(state.source_count(), 1);
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut state = InputState::new();
        state.add_input_source("dev", InputSource::Pointer);

        let err = state.get_or_create_input_source("key", "dev").unwrap_err();
        assert_eq!(err.code(), "invalid argument");
        assert_eq!(
            err.to_string(),
            "Input source with id 'dev' already exists and has a different type: pointer"
        );
        assert!(state.key_source_mut("dev").is_err());
        assert!(state.key_source_mut("missing").unwrap().is_none());
    }

    #[test]
    fn test_cancel_list_order() {
        let mut state = InputState::new();
        state.push_cancel(Action::key("a", "keyUp", "\u{E009}"));
        state.push_cancel(Action::key("b", "keyUp", "x"));
        state.push_cancel(Action::key("a", "keyUp", "\u{E008}"));

        let last = state.take_last_cancel_for("a").unwrap();
        assert_eq!(last.value.as_deref(), Some("\u{E008}"));

        assert!(state.remove_matching_cancel(&Action::key("b", "keyUp", "x")));
        assert!(!state.remove_matching_cancel(&Action::key("b", "keyUp", "x")));

        assert_eq!(state.pop_cancel().unwrap().id, "a");
        assert!(state.pop_cancel().is_none());
    }

    #[test]
    fn test_reset_clears_sources_and_cancel_list() {
        let mut state = InputState::new();
        state.get_or_create_input_source("key", "kb").unwrap();
        state.push_cancel(Action::key("kb", "keyUp", "a"));

        state.reset();
        assert_eq!(state.source_count(), 0);
        assert!(state.cancel_list().is_empty());
    }
}
