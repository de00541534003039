//! VT100/ANSI terminal model
//!
//! - **style**: cell attributes and palette colors
//! - **color**: palette index to RGB resolution
//! - **screen**: fixed-geometry cell grid and cursor
//! - **parser**: escape sequence state machine
//! - **emulator**: UTF-8 decoding front end

pub mod color;
pub mod emulator;
pub mod parser;
pub mod screen;
pub mod style;

pub use color::{ColorResolver, Rgb};
pub use emulator::Emulator;
pub use parser::{EscapeParser, ParseError, DEFAULT_MAX_SEQUENCE_LEN};
pub use screen::{Cell, Cursor, ScreenBuffer};
pub use style::{AttrFlags, Color, Style};
