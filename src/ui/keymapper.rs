//! Key mapping for terminal input
//!
//! Converts the handful of special keys the session understands into the
//! bytes written to the shell. Printable characters are not handled here;
//! hosts send them as text.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result.insert(Modifiers::SHIFT);
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result.insert(Modifiers::CTRL);
        }
        if mods.contains(KeyModifiers::ALT) {
            result.insert(Modifiers::ALT);
        }
        result
    }
}

/// Fixed key table
pub struct KeyMapper;

impl KeyMapper {
    /// Bytes for a key, or `None` if the key is not in the table.
    /// Modifiers are accepted but do not change the result yet.
    pub fn map(code: KeyCode, _mods: Modifiers) -> Option<&'static [u8]> {
        match code {
            KeyCode::Enter => Some(b"\r"),
            KeyCode::Backspace => Some(b"\x08"),
            KeyCode::Tab => Some(b"\t"),

            // Arrow keys
            KeyCode::Up => Some(b"\x1b[A"),
            KeyCode::Down => Some(b"\x1b[B"),
            KeyCode::Right => Some(b"\x1b[C"),
            KeyCode::Left => Some(b"\x1b[D"),

            _ => None,
        }
    }

    /// Ctrl + letter as a control character (Ctrl+C = 0x03)
    pub fn control_char(ch: char) -> Option<u8> {
        if ch.is_ascii_alphabetic() {
            Some(ch.to_ascii_lowercase() as u8 - b'a' + 1)
        } else {
            match ch {
                '@' | ' ' => Some(0x00),
                '[' => Some(0x1B),
                '\\' => Some(0x1C),
                ']' => Some(0x1D),
                _ => None,
            }
        }
    }

    /// Map a crossterm KeyEvent
    pub fn map_event(event: &KeyEvent) -> Option<&'static [u8]> {
        Self::map(event.code, Modifiers::from(event.modifiers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_keys() {
        let none = Modifiers::empty();
        assert_eq!(KeyMapper::map(KeyCode::Enter, none), Some(&b"\r"[..]));
        assert_eq!(KeyMapper::map(KeyCode::Backspace, none), Some(&b"\x08"[..]));
        assert_eq!(KeyMapper::map(KeyCode::Tab, none), Some(&b"\t"[..]));
    }

    #[test]
    fn test_arrow_keys() {
        let none = Modifiers::empty();
        assert_eq!(KeyMapper::map(KeyCode::Up, none), Some(&b"\x1b[A"[..]));
        assert_eq!(KeyMapper::map(KeyCode::Down, none), Some(&b"\x1b[B"[..]));
        assert_eq!(KeyMapper::map(KeyCode::Right, none), Some(&b"\x1b[C"[..]));
        assert_eq!(KeyMapper::map(KeyCode::Left, none), Some(&b"\x1b[D"[..]));
    }

    #[test]
    fn test_modifiers_ignored() {
        let ctrl_shift = Modifiers::CTRL | Modifiers::SHIFT;
        assert_eq!(KeyMapper::map(KeyCode::Up, ctrl_shift), Some(&b"\x1b[A"[..]));
        assert_eq!(KeyMapper::map(KeyCode::Enter, Modifiers::ALT), Some(&b"\r"[..]));
    }

    #[test]
    fn test_unmapped_keys() {
        let none = Modifiers::empty();
        assert_eq!(KeyMapper::map(KeyCode::Char('a'), none), None);
        assert_eq!(KeyMapper::map(KeyCode::F(1), none), None);
        assert_eq!(KeyMapper::map(KeyCode::Esc, none), None);
        assert_eq!(KeyMapper::map(KeyCode::Home, none), None);
    }

    #[test]
    fn test_control_chars() {
        assert_eq!(KeyMapper::control_char('c'), Some(0x03));
        assert_eq!(KeyMapper::control_char('D'), Some(0x04));
        assert_eq!(KeyMapper::control_char('z'), Some(0x1A));
        assert_eq!(KeyMapper::control_char('['), Some(0x1B));
        assert_eq!(KeyMapper::control_char('1'), None);
    }

    #[test]
    fn test_modifier_conversion() {
        let mods = Modifiers::from(KeyModifiers::CONTROL | KeyModifiers::ALT);
        assert_eq!(mods, Modifiers::CTRL | Modifiers::ALT);

        let event = KeyEvent::new(KeyCode::Left, KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map_event(&event), Some(&b"\x1b[D"[..]));
    }
}
