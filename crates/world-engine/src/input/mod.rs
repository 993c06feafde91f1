//! Input subsystem.
//!
//! Public types are platform-agnostic; `platform` translates winit events.

pub(crate) mod platform;
mod state;
mod types;

pub use platform::translate_window_event;
pub use state::InputState;
pub use types::{ButtonState, CursorPosition, InputEvent, Key, Modifiers, MouseButton};
