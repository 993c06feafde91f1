use std::collections::HashSet;

use super::types::{ButtonState, CursorPosition, InputEvent, Key, Modifiers, MouseButton};

/// Last known input state of the window.
///
/// Written by the event thread through [`apply_event`](Self::apply_event) and
/// read by the render thread as a cloned snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub modifiers: Modifiers,
    pub focused: bool,
    /// `None` while the cursor is outside the window.
    pub cursor: Option<CursorPosition>,
    pub keys_down: HashSet<Key>,
    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    pub fn apply_event(&mut self, ev: &InputEvent) {
        match ev {
            InputEvent::ModifiersChanged(m) => self.modifiers = *m,

            InputEvent::Focused(focused) => {
                self.focused = *focused;
                if !*focused {
                    // Releases are not delivered to an unfocused window.
                    self.keys_down.clear();
                    self.buttons_down.clear();
                }
            }

            InputEvent::CursorMoved(pos) => self.cursor = Some(*pos),
            InputEvent::CursorLeft => self.cursor = None,

            InputEvent::Key { key, state, .. } => match state {
                ButtonState::Pressed => {
                    self.keys_down.insert(*key);
                }
                ButtonState::Released => {
                    self.keys_down.remove(key);
                }
            },

            InputEvent::MouseButton { button, state } => match state {
                ButtonState::Pressed => {
                    self.buttons_down.insert(*button);
                }
                ButtonState::Released => {
                    self.buttons_down.remove(button);
                }
            },
        }
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// Normalized cursor position, if the cursor is inside the window.
    pub fn cursor_normalized(&self) -> Option<(f32, f32)> {
        self.cursor.map(|c| c.normalized)
    }
}
