//! Escape sequence parser
//!
//! Scans decoded text, applies printable characters and control actions to
//! the screen buffer, and reports side effects (bell, title) as events.
//! Parser state survives between calls, so a sequence split across two
//! reads is completed by the second one.

use thiserror::Error;
use tracing::{debug, warn};

use super::screen::ScreenBuffer;
use super::style::{AttrFlags, Color, Style};
use crate::core::event::TerminalEvent;

const ESC: char = '\u{1b}';
const BEL: char = '\u{7}';

/// Longest escape sequence buffered before it is dropped
pub const DEFAULT_MAX_SEQUENCE_LEN: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unterminated escape sequence exceeded {limit} characters and was discarded")]
    SequenceTooLong { limit: usize },
}

/// Parser state machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    /// Unsupported escape, swallowed up to the next final character
    EscapeIgnore,
    CsiCollect,
    OscCollect,
    /// ESC received within OSC, waiting for backslash
    OscEscape,
}

pub struct EscapeParser {
    state: ParserState,
    /// Buffered sequence, starting at the ESC
    sequence: String,
    sequence_chars: usize,
    max_sequence_len: usize,
}

impl Default for EscapeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EscapeParser {
    pub fn new() -> Self {
        Self::with_max_sequence_len(DEFAULT_MAX_SEQUENCE_LEN)
    }

    pub fn with_max_sequence_len(max_sequence_len: usize) -> Self {
        Self {
            state: ParserState::Ground,
            sequence: String::with_capacity(32),
            sequence_chars: 0,
            max_sequence_len: max_sequence_len.max(2),
        }
    }

    /// True when no escape sequence is buffered
    pub fn is_ground(&self) -> bool {
        self.state == ParserState::Ground
    }

    /// The partially received escape sequence, if any
    pub fn pending(&self) -> &str {
        &self.sequence
    }

    /// Feed a string, collecting the events it raises
    pub fn feed_str(&mut self, text: &str, screen: &mut ScreenBuffer) -> Vec<TerminalEvent> {
        text.chars()
            .filter_map(|ch| self.advance(ch, screen))
            .collect()
    }

    /// Feed a single character to the parser
    pub fn advance(&mut self, ch: char, screen: &mut ScreenBuffer) -> Option<TerminalEvent> {
        if self.state == ParserState::Ground {
            return match ch {
                ESC => {
                    self.enter_escape();
                    None
                }
                BEL => Some(TerminalEvent::Bell),
                _ => {
                    screen.append_char(ch);
                    None
                }
            };
        }

        self.sequence.push(ch);
        self.sequence_chars += 1;

        let event = match self.state {
            ParserState::Ground => None,
            ParserState::Escape => self.escape(ch, screen),
            ParserState::EscapeIgnore => self.escape_ignore(ch),
            ParserState::CsiCollect => self.csi_collect(ch, screen),
            ParserState::OscCollect => self.osc_collect(ch),
            ParserState::OscEscape => self.osc_escape(ch),
        };

        if self.state != ParserState::Ground && self.sequence_chars > self.max_sequence_len {
            let limit = self.max_sequence_len;
            warn!("Discarding unterminated escape sequence longer than {} characters", limit);
            self.reset();
            return Some(TerminalEvent::ParseError(ParseError::SequenceTooLong { limit }));
        }

        event
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.sequence.clear();
        self.sequence.push(ESC);
        self.sequence_chars = 1;
    }

    fn reset(&mut self) {
        self.state = ParserState::Ground;
        self.sequence.clear();
        self.sequence_chars = 0;
    }

    fn escape(&mut self, ch: char, screen: &mut ScreenBuffer) -> Option<TerminalEvent> {
        match ch {
            '[' => self.state = ParserState::CsiCollect,
            ']' => self.state = ParserState::OscCollect,
            '7' | '8' | 'D' | 'E' | 'H' | 'M' | '=' | '>' | 'c' => {
                self.execute_simple(ch, screen);
                self.reset();
            }
            '\\' => {
                // ST outside a string, e.g. closing a DCS or APC block
                debug!("Stray string terminator");
                self.reset();
            }
            c if is_final(c) => {
                debug!("Unsupported escape: {:?}", self.sequence);
                self.reset();
            }
            _ => self.state = ParserState::EscapeIgnore,
        }
        None
    }

    fn escape_ignore(&mut self, ch: char) -> Option<TerminalEvent> {
        if is_final(ch) || ch == BEL {
            debug!("Unsupported escape: {:?}", self.sequence);
            self.reset();
        }
        None
    }

    fn csi_collect(&mut self, ch: char, screen: &mut ScreenBuffer) -> Option<TerminalEvent> {
        if is_final(ch) {
            execute_csi(&self.sequence[2..], screen);
            self.reset();
        }
        None
    }

    fn osc_collect(&mut self, ch: char) -> Option<TerminalEvent> {
        match ch {
            BEL => self.finish_osc(),
            ESC => {
                self.state = ParserState::OscEscape;
                None
            }
            _ => None,
        }
    }

    fn osc_escape(&mut self, ch: char) -> Option<TerminalEvent> {
        match ch {
            '\\' => self.finish_osc(),
            ESC => None,
            _ => {
                self.state = ParserState::OscCollect;
                None
            }
        }
    }

    fn finish_osc(&mut self) -> Option<TerminalEvent> {
        let body = &self.sequence[2..];
        let body = body
            .strip_suffix("\u{1b}\\")
            .or_else(|| body.strip_suffix(BEL))
            .unwrap_or(body);
        let event = execute_osc(body);
        self.reset();
        event
    }

    fn execute_simple(&mut self, ch: char, screen: &mut ScreenBuffer) {
        match ch {
            'c' => {
                // RIS - Full reset
                screen.reset();
            }
            // DECSC/DECRC, RI, IND, NEL, HTS, keypad modes: recognized, no effect
            _ => {}
        }
    }
}

/// Final character of a CSI sequence
fn is_final(ch: char) -> bool {
    ch.is_alphabetic() || matches!(ch, '@' | '`' | '~')
}

/// Parameters separated by `;`; tokens that are not integers are dropped
fn parse_params(params: &str) -> Vec<i32> {
    params
        .split(';')
        .filter_map(|token| token.parse::<i32>().ok())
        .collect()
}

/// Execute a CSI sequence. `body` is everything after `ESC [`, final
/// character included.
fn execute_csi(body: &str, screen: &mut ScreenBuffer) {
    let Some(command) = body.chars().last() else {
        return;
    };
    let params = parse_params(&body[..body.len() - command.len_utf8()]);
    let first = params.first().copied();

    match command {
        'H' | 'f' => {
            // CUP - Cursor Position
            let row = first.unwrap_or(1).saturating_sub(1);
            let col = params.get(1).copied().unwrap_or(1).saturating_sub(1);
            screen.set_cursor(row, col);
        }
        'A' => screen.move_cursor(first.unwrap_or(1).saturating_neg(), 0),
        'B' => screen.move_cursor(first.unwrap_or(1), 0),
        'C' => screen.move_cursor(0, first.unwrap_or(1)),
        'D' => screen.move_cursor(0, first.unwrap_or(1).saturating_neg()),
        'J' => {
            // Only a full clear is supported
            if first.unwrap_or(0) == 2 {
                screen.clear();
            }
        }
        'K' => {
            // Erase in line: not supported
        }
        'm' => execute_sgr(&params, screen),
        _ => {
            debug!("Unknown CSI: params={:?}, final={:?}", params, command);
        }
    }
}

/// SGR - Select Graphic Rendition
/// An empty parameter list leaves the style unchanged.
fn execute_sgr(params: &[i32], screen: &mut ScreenBuffer) {
    let mut style = screen.pending_style;
    let mut i = 0;

    while i < params.len() {
        let param = params[i];
        style = match param {
            0 => Style::DEFAULT,
            1 => style.with_flag(AttrFlags::BOLD),
            3 => style.with_flag(AttrFlags::ITALIC),
            4 => style.with_flag(AttrFlags::UNDERLINE),
            5 | 6 => style.with_flag(AttrFlags::BLINK),
            7 => style.with_flag(AttrFlags::INVERSE),
            9 => style.with_flag(AttrFlags::STRIKETHROUGH),

            22 => style.without_flag(AttrFlags::BOLD),
            23 => style.without_flag(AttrFlags::ITALIC),
            24 => style.without_flag(AttrFlags::UNDERLINE),
            25 => style.without_flag(AttrFlags::BLINK),
            27 => style.without_flag(AttrFlags::INVERSE),
            29 => style.without_flag(AttrFlags::STRIKETHROUGH),

            30..=37 => style.with_foreground(Color::from_index(param - 30)),
            90..=97 => style.with_foreground(Color::from_index(param - 90 + 8)),
            40..=47 => style.with_background(Color::from_index(param - 40)),
            100..=107 => style.with_background(Color::from_index(param - 100 + 8)),

            38 | 48 => match params.get(i + 1) {
                Some(5) if i + 2 < params.len() => {
                    // 256 color
                    let color = Color::from_index(params[i + 2]);
                    i += 2;
                    if param == 38 {
                        style.with_foreground(color)
                    } else {
                        style.with_background(color)
                    }
                }
                Some(2) if i + 4 < params.len() => {
                    // RGB is recognized but cannot be stored
                    i += 4;
                    style
                }
                _ => style,
            },

            39 => style.with_foreground(Color::Default),
            49 => style.with_background(Color::Default),

            _ => style,
        };
        i += 1;
    }

    screen.pending_style = style;
}

/// Execute an OSC body of the form `code;text`
fn execute_osc(body: &str) -> Option<TerminalEvent> {
    let (code, text) = body.split_once(';')?;
    match code.parse::<i32>() {
        Ok(0..=2) => Some(TerminalEvent::TitleChanged(text.to_string())),
        _ => None,
    }
}
