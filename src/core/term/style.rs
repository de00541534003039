//! Cell styling
//!
//! `Style` is a small `Copy` value. SGR handling never edits a style in place;
//! every change produces a new value, so cells written earlier keep the style
//! they were written with.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AttrFlags: u8 {
        const BOLD          = 0b0000_0001;
        const ITALIC        = 0b0000_0010;
        const UNDERLINE     = 0b0000_0100;
        const BLINK         = 0b0000_1000;
        const INVERSE       = 0b0001_0000;
        const STRIKETHROUGH = 0b0010_0000;
    }
}

/// Color reference stored in a cell
///
/// Only palette indices are stored. 24-bit SGR colors are parsed but not kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Color {
    /// Theme default (index -1)
    #[default]
    Default,
    Indexed(u8),
}

impl Color {
    /// Build from a raw SGR index; anything outside the 256-color palette
    /// falls back to the theme default.
    pub fn from_index(index: i32) -> Self {
        u8::try_from(index).map(Color::Indexed).unwrap_or(Color::Default)
    }

    /// Palette index, or -1 for the theme default
    pub fn index(&self) -> i32 {
        match self {
            Color::Default => -1,
            Color::Indexed(n) => i32::from(*n),
        }
    }
}

/// Text attributes and colors of a cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl Style {
    pub const DEFAULT: Style = Style {
        fg: Color::Default,
        bg: Color::Default,
        flags: AttrFlags::empty(),
    };

    pub fn with_flag(self, flag: AttrFlags) -> Self {
        Self {
            flags: self.flags.union(flag),
            ..self
        }
    }

    pub fn without_flag(self, flag: AttrFlags) -> Self {
        Self {
            flags: self.flags.difference(flag),
            ..self
        }
    }

    pub fn with_foreground(self, fg: Color) -> Self {
        Self { fg, ..self }
    }

    pub fn with_background(self, bg: Color) -> Self {
        Self { bg, ..self }
    }

    pub fn foreground_index(&self) -> i32 {
        self.fg.index()
    }

    pub fn background_index(&self) -> i32 {
        self.bg.index()
    }

    pub fn bold(&self) -> bool {
        self.flags.contains(AttrFlags::BOLD)
    }

    pub fn italic(&self) -> bool {
        self.flags.contains(AttrFlags::ITALIC)
    }

    pub fn underline(&self) -> bool {
        self.flags.contains(AttrFlags::UNDERLINE)
    }

    pub fn strikethrough(&self) -> bool {
        self.flags.contains(AttrFlags::STRIKETHROUGH)
    }

    pub fn blink(&self) -> bool {
        self.flags.contains(AttrFlags::BLINK)
    }

    pub fn inverse(&self) -> bool {
        self.flags.contains(AttrFlags::INVERSE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_functional_update_leaves_original() {
        let base = Style::DEFAULT;
        let bold = base.with_flag(AttrFlags::BOLD);

        assert!(bold.bold());
        assert!(!base.bold());
        assert!(!bold.without_flag(AttrFlags::BOLD).bold());
    }

    #[test]
    fn test_color_index_bounds() {
        assert_eq!(Color::from_index(1), Color::Indexed(1));
        assert_eq!(Color::from_index(255), Color::Indexed(255));
        assert_eq!(Color::from_index(256), Color::Default);
        assert_eq!(Color::from_index(-3), Color::Default);
        assert_eq!(Style::DEFAULT.foreground_index(), -1);
    }
}
