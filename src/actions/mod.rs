//! Input action dispatch: action sequences, tick scheduling and send keys.

pub mod action;
pub mod dispatcher;
pub mod sequence;
pub mod typing;

pub use action::{Action, ActionItem, ActionSequence, Origin};
pub use dispatcher::{
    dispatch_action, dispatch_release_actions, mouse_button, ELEMENT_KEY, KEY_SETTLE_DELAY,
};
pub use sequence::{extract_action_sequence, perform_actions, release_actions};
pub use typing::dispatch_actions_for_string;
