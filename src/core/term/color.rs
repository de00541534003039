//! Palette resolution
//!
//! Maps 256-color palette indices to RGB using the standard xterm defaults.

use serde::{Deserialize, Serialize};

use super::style::{Color, Style};

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(level: u8) -> Self {
        Self::new(level, level, level)
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// xterm default colors for indices 0-15 (8 normal + 8 bright)
const ANSI_COLORS: [Rgb; 16] = [
    Rgb::new(0x00, 0x00, 0x00),
    Rgb::new(0xCD, 0x00, 0x00),
    Rgb::new(0x00, 0xCD, 0x00),
    Rgb::new(0xCD, 0xCD, 0x00),
    Rgb::new(0x00, 0x00, 0xEE),
    Rgb::new(0xCD, 0x00, 0xCD),
    Rgb::new(0x00, 0xCD, 0xCD),
    Rgb::new(0xE5, 0xE5, 0xE5),
    Rgb::new(0x7F, 0x7F, 0x7F),
    Rgb::new(0xFF, 0x00, 0x00),
    Rgb::new(0x00, 0xFF, 0x00),
    Rgb::new(0xFF, 0xFF, 0x00),
    Rgb::new(0x5C, 0x5C, 0xFF),
    Rgb::new(0xFF, 0x00, 0xFF),
    Rgb::new(0x00, 0xFF, 0xFF),
    Rgb::new(0xFF, 0xFF, 0xFF),
];

/// Resolves palette indices against the theme defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorResolver {
    pub default_foreground: Rgb,
    pub default_background: Rgb,
}

impl Default for ColorResolver {
    fn default() -> Self {
        Self {
            default_foreground: Rgb::new(255, 255, 255),
            default_background: Rgb::new(0, 0, 0),
        }
    }
}

impl ColorResolver {
    pub fn new(default_foreground: Rgb, default_background: Rgb) -> Self {
        Self {
            default_foreground,
            default_background,
        }
    }

    /// Color for a palette index. Negative and out-of-palette indices yield
    /// the default foreground.
    pub fn get_color(&self, index: i32) -> Rgb {
        match index {
            0..=15 => ANSI_COLORS[index as usize],
            16..=231 => {
                // 6x6x6 cube
                let i = index - 16;
                let r = (i / 36) * 51;
                let g = ((i % 36) / 6) * 51;
                let b = (i % 6) * 51;
                Rgb::new(r as u8, g as u8, b as u8)
            }
            232..=255 => Rgb::gray((8 + (index - 232) * 10) as u8),
            _ => self.default_foreground,
        }
    }

    pub fn get_true_color(&self, r: u8, g: u8, b: u8) -> Rgb {
        Rgb::new(r, g, b)
    }

    /// Foreground-context resolution of a stored color
    pub fn resolve(&self, color: Color) -> Rgb {
        self.get_color(color.index())
    }

    /// Foreground actually painted for a style, honoring INVERSE
    pub fn effective_foreground(&self, style: &Style) -> Rgb {
        if style.inverse() {
            self.background_or_default(style.bg)
        } else {
            self.foreground_or_default(style.fg)
        }
    }

    /// Background actually painted for a style, honoring INVERSE
    pub fn effective_background(&self, style: &Style) -> Rgb {
        if style.inverse() {
            self.foreground_or_default(style.fg)
        } else {
            self.background_or_default(style.bg)
        }
    }

    fn foreground_or_default(&self, color: Color) -> Rgb {
        match color {
            Color::Default => self.default_foreground,
            Color::Indexed(n) => self.get_color(i32::from(n)),
        }
    }

    fn background_or_default(&self, color: Color) -> Rgb {
        match color {
            Color::Default => self.default_background,
            Color::Indexed(n) => self.get_color(i32::from(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::style::AttrFlags;

    #[test]
    fn test_palette_ranges() {
        let resolver = ColorResolver::default();

        assert_eq!(resolver.get_color(1), Rgb::new(0xCD, 0, 0));
        assert_eq!(resolver.get_color(12), Rgb::new(0x5C, 0x5C, 0xFF));
        assert_eq!(resolver.get_color(16), Rgb::new(0, 0, 0));
        assert_eq!(resolver.get_color(196), Rgb::new(255, 0, 0));
        assert_eq!(resolver.get_color(231), Rgb::new(255, 255, 255));
        assert_eq!(resolver.get_color(232), Rgb::new(8, 8, 8));
        assert_eq!(resolver.get_color(255), Rgb::new(238, 238, 238));
    }

    #[test]
    fn test_out_of_range_uses_default_foreground() {
        let resolver = ColorResolver::new(Rgb::new(1, 2, 3), Rgb::new(4, 5, 6));

        assert_eq!(resolver.get_color(-1), Rgb::new(1, 2, 3));
        assert_eq!(resolver.get_color(256), Rgb::new(1, 2, 3));
        assert_eq!(resolver.get_true_color(9, 8, 7), Rgb::new(9, 8, 7));
    }

    #[test]
    fn test_inverse_swaps_with_defaults() {
        let resolver = ColorResolver::default();
        let style = Style::DEFAULT
            .with_foreground(Color::Indexed(1))
            .with_flag(AttrFlags::INVERSE);

        assert_eq!(resolver.effective_foreground(&style), resolver.default_background);
        assert_eq!(resolver.effective_background(&style), Rgb::new(0xCD, 0, 0));

        let plain = Style::DEFAULT;
        assert_eq!(resolver.effective_foreground(&plain), resolver.default_foreground);
        assert_eq!(resolver.effective_background(&plain), resolver.default_background);
    }
}
