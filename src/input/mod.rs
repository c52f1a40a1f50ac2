//! Input sources, the per-session input state and key tables.

pub mod keys;
pub mod source;
pub mod state;

pub use source::{InputSource, KeyInputSource};
pub use state::InputState;
