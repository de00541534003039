//! Terminal renderer using crossterm
//!
//! Renders a screen buffer to the console.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use tracing::debug;

use crate::core::term::{Cell, ColorResolver, ScreenBuffer, Style};

/// Terminal renderer
pub struct Renderer {
    colors: ColorResolver,
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl Renderer {
    pub fn new(colors: ColorResolver) -> Self {
        Self {
            colors,
            initialized: false,
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;

        stdout.flush()?;
        self.initialized = true;
        debug!("Renderer initialized");
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();

        // Reset all attributes first
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show, EnableLineWrap, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()?;

        println!();
        Ok(())
    }

    /// Render the screen to stdout
    pub fn render(&mut self, screen: &ScreenBuffer) -> io::Result<()> {
        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());
        self.render_to(&mut stdout, screen)?;
        stdout.flush()
    }

    /// Render the screen to any writer. Only dirty lines are drawn unless
    /// the screen asks for a full redraw.
    pub fn render_to<W: Write>(&mut self, out: &mut W, screen: &ScreenBuffer) -> io::Result<()> {
        // Begin synchronized update (reduces flicker)
        write!(out, "\x1b[?2026h")?;
        queue!(out, Hide)?;

        let lines: Vec<usize> = if screen.needs_full_redraw() {
            (0..screen.rows() as usize).collect()
        } else {
            screen.dirty_lines()
        };
        for row in lines {
            self.render_line(out, screen, row)?;
        }

        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;

        let cursor = screen.cursor();
        queue!(out, MoveTo(cursor.col, cursor.row), Show)?;

        // End synchronized update
        write!(out, "\x1b[?2026l")?;
        Ok(())
    }

    /// Redraw one row, batching runs of equally styled cells
    fn render_line<W: Write>(&self, out: &mut W, screen: &ScreenBuffer, row: usize) -> io::Result<()> {
        queue!(out, MoveTo(0, row as u16))?;
        queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        write!(out, "\x1b[K")?; // Clear to end of line

        let mut current = Style::DEFAULT;
        let mut line_buffer = String::with_capacity(screen.cols() as usize);

        for cell in screen.get_styled_line(row) {
            if cell.style != current && !line_buffer.is_empty() {
                self.apply_style(out, &current)?;
                write!(out, "{}", line_buffer)?;
                line_buffer.clear();
            }
            current = cell.style;
            line_buffer.push(display_char(cell));
        }

        if !line_buffer.is_empty() {
            self.apply_style(out, &current)?;
            write!(out, "{}", line_buffer)?;
        }

        Ok(())
    }

    /// Apply cell attributes. Colors are resolved here, so INVERSE needs no
    /// terminal attribute.
    fn apply_style<W: Write>(&self, out: &mut W, style: &Style) -> io::Result<()> {
        queue!(out, SetAttribute(Attribute::Reset))?;

        if style.bold() {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        if style.italic() {
            queue!(out, SetAttribute(Attribute::Italic))?;
        }
        if style.underline() {
            queue!(out, SetAttribute(Attribute::Underlined))?;
        }
        if style.blink() {
            queue!(out, SetAttribute(Attribute::SlowBlink))?;
        }
        if style.strikethrough() {
            queue!(out, SetAttribute(Attribute::CrossedOut))?;
        }

        let fg = self.colors.effective_foreground(style);
        let bg = self.colors.effective_background(style);
        queue!(
            out,
            SetForegroundColor(fg.to_crossterm()),
            SetBackgroundColor(bg.to_crossterm())
        )?;

        Ok(())
    }

    /// Get terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn display_char(cell: &Cell) -> char {
    if cell.ch.is_control() {
        ' '
    } else {
        cell.ch
    }
}

/// Simple debug renderer that outputs to a string
pub struct DebugRenderer;

impl DebugRenderer {
    /// Render the screen to a string, marking the cursor row and cell
    pub fn render(screen: &ScreenBuffer) -> String {
        let cursor = screen.cursor();
        let mut output = String::new();

        output.push_str(&format!("=== Terminal {}x{} ===\n", screen.cols(), screen.rows()));
        output.push_str(&format!("Cursor: ({}, {})\n", cursor.col, cursor.row));
        output.push_str("─".repeat(screen.cols() as usize).as_str());
        output.push('\n');

        for row in 0..screen.rows() as usize {
            let on_cursor_row = row == cursor.row as usize;
            output.push(if on_cursor_row { '>' } else { ' ' });

            let cells = screen.get_styled_line(row);
            let width = if on_cursor_row {
                cells.len().max(cursor.col as usize + 1)
            } else {
                cells.len()
            };

            for col in 0..width {
                if on_cursor_row && col == cursor.col as usize {
                    output.push('█');
                } else {
                    output.push(cells.get(col).map(display_char).unwrap_or(' '));
                }
            }

            output.push('\n');
        }

        output.push_str("─".repeat(screen.cols() as usize).as_str());
        output.push('\n');

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::{Color, Rgb};

    #[test]
    fn test_render_dirty_lines_only() {
        let mut screen = ScreenBuffer::new(10, 3);
        screen.clear_dirty();
        screen.append_text("\n\nlast");

        let mut renderer = Renderer::new(ColorResolver::default());
        let mut out = Vec::new();
        renderer.render_to(&mut out, &screen).expect("render");

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("last"));
        // Row 2 is redrawn, row 0 is not
        assert!(text.contains("\x1b[3;1H"));
        assert!(!text.contains("\x1b[1;1H"));
    }

    #[test]
    fn test_render_resolves_colors() {
        let mut screen = ScreenBuffer::new(10, 2);
        screen.pending_style = Style::DEFAULT.with_foreground(Color::Indexed(196));
        screen.append_text("x");

        let colors = ColorResolver::new(Rgb::new(1, 2, 3), Rgb::new(4, 5, 6));
        let mut renderer = Renderer::new(colors);
        let mut out = Vec::new();
        renderer.render_to(&mut out, &screen).expect("render");

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("38;2;255;0;0"));
        assert!(text.contains("48;2;4;5;6"));
    }

    #[test]
    fn test_debug_renderer() {
        let mut screen = ScreenBuffer::new(4, 2);
        screen.append_text("ab");

        let dump = DebugRenderer::render(&screen);
        let lines: Vec<&str> = dump.lines().collect();

        assert_eq!(lines[0], "=== Terminal 4x2 ===");
        assert_eq!(lines[1], "Cursor: (2, 0)");
        assert_eq!(lines[3], ">ab█");
        assert_eq!(lines[4], " ");
    }
}
