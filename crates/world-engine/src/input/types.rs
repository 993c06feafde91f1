use std::fmt;

/// Keyboard key identifier.
///
/// Keys without a dedicated variant map to `Key::Unknown` carrying the
/// platform key code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    Shift,
    Control,
    Alt,
    Meta,

    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    Unknown(u32),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Pressed or released; key repeats arrive as `Pressed`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Cursor position.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CursorPosition {
    /// Physical pixels, origin top-left.
    pub x: f32,
    pub y: f32,
    /// Position over the framebuffer in `[0, 1]`, origin top-left.
    pub normalized: (f32, f32),
}

/// Platform-agnostic input events.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    ModifiersChanged(Modifiers),

    Key {
        key: Key,
        state: ButtonState,
        /// True for auto-repeat presses.
        repeat: bool,
    },

    CursorMoved(CursorPosition),

    /// Cursor left the window surface.
    CursorLeft,

    MouseButton {
        button: MouseButton,
        state: ButtonState,
    },

    Focused(bool),
}

impl InputEvent {
    /// Releasing Escape asks the window to close.
    pub fn requests_close(&self) -> bool {
        matches!(
            self,
            InputEvent::Key {
                key: Key::Escape,
                state: ButtonState::Released,
                ..
            }
        )
    }
}
