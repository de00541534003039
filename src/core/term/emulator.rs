//! Byte-level front end of the terminal
//!
//! Decodes shell output as UTF-8 and drives the escape parser over the
//! screen buffer. An emulator must only be touched from the dispatch
//! context; it is not synchronized.

use std::char::REPLACEMENT_CHARACTER;

use super::parser::EscapeParser;
use super::screen::ScreenBuffer;
use crate::core::event::TerminalListener;

/// Screen state plus the parser feeding it
pub struct Emulator {
    screen: ScreenBuffer,
    parser: EscapeParser,
    /// Tail of a multi-byte character cut off by the previous read
    utf8_carry: Vec<u8>,
}

impl Emulator {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_parser(cols, rows, EscapeParser::new())
    }

    pub fn with_parser(cols: u16, rows: u16, parser: EscapeParser) -> Self {
        Self {
            screen: ScreenBuffer::new(cols, rows),
            parser,
            utf8_carry: Vec::with_capacity(4),
        }
    }

    pub fn screen(&self) -> &ScreenBuffer {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut ScreenBuffer {
        &mut self.screen
    }

    pub fn parser(&self) -> &EscapeParser {
        &self.parser
    }

    /// Process one chunk of shell output. Events are delivered to `listener`
    /// in order, followed by a single `on_screen_updated`.
    pub fn process_input(&mut self, bytes: &[u8], listener: &mut dyn TerminalListener) {
        let text = self.decode(bytes);
        for ch in text.chars() {
            if let Some(event) = self.parser.advance(ch, &mut self.screen) {
                listener.dispatch(event);
            }
        }
        listener.on_screen_updated();
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.screen.resize(cols, rows);
    }

    /// Decode a chunk as UTF-8. Invalid bytes become U+FFFD; an incomplete
    /// trailing sequence is held back for the next chunk.
    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.utf8_carry);
        input.extend_from_slice(bytes);

        let mut text = String::with_capacity(input.len());
        let mut rest = input.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    if let Ok(valid) = std::str::from_utf8(valid) {
                        text.push_str(valid);
                    }
                    match e.error_len() {
                        Some(len) => {
                            text.push(REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.utf8_carry.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::NoopListener;
    use crate::core::term::screen::Cursor;

    #[derive(Default)]
    struct Recorder {
        bells: usize,
        titles: Vec<String>,
        updates: usize,
    }

    impl TerminalListener for Recorder {
        fn on_bell(&mut self) {
            self.bells += 1;
        }

        fn on_title_changed(&mut self, title: &str) {
            self.titles.push(title.to_string());
        }

        fn on_screen_updated(&mut self) {
            self.updates += 1;
        }
    }

    #[test]
    fn test_title_fires_once_without_output() {
        let mut emulator = Emulator::new(80, 24);
        let mut recorder = Recorder::default();

        emulator.process_input(b"\x1b]0;MyTitle\x07", &mut recorder);

        assert_eq!(recorder.titles, vec!["MyTitle".to_string()]);
        assert_eq!(recorder.updates, 1);
        assert_eq!(emulator.screen().text().trim(), "");
        assert_eq!(emulator.screen().cursor(), Cursor::default());
    }

    #[test]
    fn test_screen_updated_per_chunk() {
        let mut emulator = Emulator::new(80, 24);
        let mut recorder = Recorder::default();

        emulator.process_input(b"a\x07", &mut recorder);
        emulator.process_input(b"b", &mut recorder);

        assert_eq!(recorder.bells, 1);
        assert_eq!(recorder.updates, 2);
        assert_eq!(emulator.screen().get_line(0), "ab");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut emulator = Emulator::new(80, 24);
        let bytes = "é€".as_bytes();

        emulator.process_input(&bytes[..1], &mut NoopListener);
        assert_eq!(emulator.screen().get_line(0), "");

        emulator.process_input(&bytes[1..3], &mut NoopListener);
        emulator.process_input(&bytes[3..], &mut NoopListener);
        assert_eq!(emulator.screen().get_line(0), "é€");
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut emulator = Emulator::new(80, 24);
        emulator.process_input(b"a\xffb\xc3(", &mut NoopListener);

        assert_eq!(emulator.screen().get_line(0), "a\u{fffd}b\u{fffd}(");
    }

    #[test]
    fn test_csi_split_across_chunks() {
        let mut emulator = Emulator::new(80, 24);
        emulator.process_input(b"\x1b[1;3", &mut NoopListener);
        emulator.process_input(b"1mX", &mut NoopListener);

        let cell = emulator.screen().cell(0, 0).copied().unwrap_or_default();
        assert_eq!(cell.ch, 'X');
        assert!(cell.style.bold());
        assert_eq!(cell.style.foreground_index(), 1);
    }
}
