//! Key constants

use bitflags::bitflags;

bitflags! {
    /// Modifier keys accompanying a key press.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const NONE = 0;
        const CTRL = 1 << 0;
        const ALT = 1 << 1;
        const SHIFT = 1 << 2;
    }
}

/// #[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Backspace, // 0x08 or 0x7F
    BackTab,   // Shift-Tab
    Char(char),
    Down,
    End,
    Enter, // CR; with CTRL, LF
    Home,
    Left,
    Null,
    PageDown,
    PageUp,
    Right,
    Tab,
    UnknownEscSeq,
    Up,
}

/// A single decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent(pub KeyCode, pub Modifiers);

impl KeyEvent {
    pub fn plain(code: KeyCode) -> Self {
        Self(code, Modifiers::NONE)
    }

    /// Ctrl + letter, as decoded from control bytes `0x01..=0x1A`.
    pub fn ctrl(c: char) -> Self {
        Self(KeyCode::Char(c.to_ascii_uppercase()), Modifiers::CTRL)
    }

    pub fn alt(c: char) -> Self {
        Self(KeyCode::Char(c), Modifiers::ALT)
    }
}

impl From<char> for KeyEvent {
    fn from(c: char) -> Self {
        Self(KeyCode::Char(c), Modifiers::NONE)
    }
}
