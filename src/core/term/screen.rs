//! Screen buffer
//!
//! Fixed-geometry grid of styled cells plus cursor state. Rows are stored
//! ragged: a row only holds cells up to the last column written, so a fresh
//! row is empty rather than `cols` blank cells.

use std::collections::HashSet;

use super::style::Style;

/// Tab stops every 8 columns
const TAB_WIDTH: u16 = 8;

/// A single cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::DEFAULT,
        }
    }
}

impl Cell {
    pub fn new(ch: char, style: Style) -> Self {
        Self { ch, style }
    }
}

/// Cursor position (0-indexed)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
}

/// Screen buffer holding the visible rows
pub struct ScreenBuffer {
    cols: u16,
    rows: u16,
    lines: Vec<Vec<Cell>>,
    cursor: Cursor,
    /// Style applied to the next inserted cell
    pub pending_style: Style,
    dirty_lines: HashSet<usize>,
    full_redraw: bool,
}

impl ScreenBuffer {
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            lines: (0..rows).map(|_| Vec::new()).collect(),
            cursor: Cursor::default(),
            pending_style: Style::DEFAULT,
            dirty_lines: HashSet::new(),
            full_redraw: true,
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn cursor_row(&self) -> u16 {
        self.cursor.row
    }

    pub fn cursor_col(&self) -> u16 {
        self.cursor.col
    }

    /// Feed decoded text, one character at a time
    pub fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            self.append_char(ch);
        }
    }

    pub fn append_char(&mut self, ch: char) {
        match ch {
            '\n' => self.linefeed(),
            '\r' => self.cursor.col = 0,
            '\u{8}' => self.backspace(),
            '\t' => self.horizontal_tab(),
            c if c.is_control() => {}
            c => self.put_char(c),
        }
    }

    /// Write a printable character at the cursor and advance, wrapping at the
    /// right edge
    fn put_char(&mut self, ch: char) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        let style = self.pending_style;

        let line = &mut self.lines[row];
        if line.len() < col {
            line.resize(col, Cell::new(' ', style));
        }
        let cell = Cell::new(ch, style);
        if col < line.len() {
            line[col] = cell;
        } else {
            line.push(cell);
        }
        self.mark_dirty(row);

        self.cursor.col += 1;
        if self.cursor.col >= self.cols {
            self.linefeed();
        }
    }

    /// Move to column 0 of the next row, scrolling the screen up at the bottom
    pub fn linefeed(&mut self) {
        self.cursor.col = 0;
        if self.cursor.row + 1 >= self.rows {
            self.scroll_up();
            self.cursor.row = self.rows - 1;
        } else {
            self.cursor.row += 1;
        }
    }

    /// Drop the top row and append an empty one at the bottom
    fn scroll_up(&mut self) {
        self.lines.remove(0);
        self.lines.push(Vec::new());
        self.mark_all_dirty();
    }

    /// Destructive backspace: the cell under the new cursor position is
    /// removed and the rest of the row shifts left
    pub fn backspace(&mut self) {
        if self.cursor.col == 0 {
            return;
        }
        self.cursor.col -= 1;
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        if col < self.lines[row].len() {
            self.lines[row].remove(col);
            self.mark_dirty(row);
        }
    }

    pub fn horizontal_tab(&mut self) {
        let next = (self.cursor.col / TAB_WIDTH + 1).saturating_mul(TAB_WIDTH);
        self.cursor.col = next.min(self.cols - 1);
    }

    /// Set the cursor, clamping both axes into the screen
    pub fn set_cursor(&mut self, row: i32, col: i32) {
        let max_row = i32::from(self.rows) - 1;
        let max_col = i32::from(self.cols) - 1;
        // Clamped into u16 range by the geometry bounds
        self.cursor.row = row.clamp(0, max_row) as u16;
        self.cursor.col = col.clamp(0, max_col) as u16;
    }

    /// Relative cursor movement, clamped like `set_cursor`
    pub fn move_cursor(&mut self, rows: i32, cols: i32) {
        let row = i32::from(self.cursor.row).saturating_add(rows);
        let col = i32::from(self.cursor.col).saturating_add(cols);
        self.set_cursor(row, col);
    }

    /// Change geometry. Rows are added or removed at the bottom; existing
    /// rows are neither reflowed nor truncated.
    pub fn resize(&mut self, new_cols: u16, new_rows: u16) {
        let new_cols = new_cols.max(1);
        let new_rows = new_rows.max(1);
        if new_cols == self.cols && new_rows == self.rows {
            return;
        }

        self.cols = new_cols;
        self.rows = new_rows;
        self.lines.resize_with(new_rows as usize, Vec::new);

        self.cursor.row = self.cursor.row.min(new_rows - 1);
        self.cursor.col = self.cursor.col.min(new_cols - 1);
        self.mark_all_dirty();
    }

    /// Blank every row and home the cursor. The pending style is kept.
    pub fn clear(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.cursor = Cursor::default();
        self.mark_all_dirty();
    }

    /// Full reset: clear and drop the pending style
    pub fn reset(&mut self) {
        self.clear();
        self.pending_style = Style::DEFAULT;
    }

    /// Text of a row; empty for an out-of-range row
    pub fn get_line(&self, row: usize) -> String {
        self.get_styled_line(row).iter().map(|cell| cell.ch).collect()
    }

    /// Cells of a row, limited to the current width; empty for an
    /// out-of-range row
    pub fn get_styled_line(&self, row: usize) -> &[Cell] {
        match self.lines.get(row) {
            Some(line) => &line[..line.len().min(self.cols as usize)],
            None => &[],
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.get_styled_line(row).get(col)
    }

    /// All rows joined with newlines
    pub fn text(&self) -> String {
        (0..self.rows as usize)
            .map(|row| self.get_line(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn mark_dirty(&mut self, line: usize) {
        self.dirty_lines.insert(line);
    }

    pub fn mark_all_dirty(&mut self) {
        self.full_redraw = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty_lines.clear();
        self.full_redraw = false;
    }

    pub fn needs_full_redraw(&self) -> bool {
        self.full_redraw
    }

    /// Rows changed since the last `clear_dirty`, in ascending order
    pub fn dirty_lines(&self) -> Vec<usize> {
        let mut lines: Vec<_> = self.dirty_lines.iter().copied().collect();
        lines.sort_unstable();
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::style::{AttrFlags, Color};

    #[test]
    fn test_printable_line() {
        let mut screen = ScreenBuffer::new(10, 3);
        screen.append_text("hello");

        assert_eq!(screen.get_line(0), "hello");
        assert_eq!(screen.cursor(), Cursor { row: 0, col: 5 });
    }

    #[test]
    fn test_full_width_line_fits() {
        let mut screen = ScreenBuffer::new(10, 3);
        screen.append_text("0123456789");

        assert_eq!(screen.get_line(0), "0123456789");
        assert_eq!(screen.cursor(), Cursor { row: 1, col: 0 });
    }

    #[test]
    fn test_wrap_splits_contiguously() {
        let mut screen = ScreenBuffer::new(10, 3);
        screen.append_text("0123456789abc");

        assert_eq!(screen.get_line(0), "0123456789");
        assert_eq!(screen.get_line(1), "abc");
        assert_eq!(screen.cursor(), Cursor { row: 1, col: 3 });
    }

    #[test]
    fn test_scroll_drops_oldest_line() {
        let mut screen = ScreenBuffer::new(10, 3);
        screen.append_text("one\ntwo\nthree\nfour\n");

        assert_eq!(screen.get_line(0), "three");
        assert_eq!(screen.get_line(1), "four");
        assert_eq!(screen.get_line(2), "");
        assert_eq!(screen.cursor(), Cursor { row: 2, col: 0 });
    }

    #[test]
    fn test_carriage_return_overwrites() {
        let mut screen = ScreenBuffer::new(10, 3);
        screen.append_text("abcd\rxy");

        assert_eq!(screen.get_line(0), "xycd");
        assert_eq!(screen.cursor_col(), 2);
    }

    #[test]
    fn test_backspace_deletes_cell() {
        let mut screen = ScreenBuffer::new(10, 3);
        screen.append_text("abc\u{8}");

        assert_eq!(screen.get_line(0), "ab");
        assert_eq!(screen.cursor_col(), 2);

        screen.append_text("\r\u{8}");
        assert_eq!(screen.cursor_col(), 0);
        assert_eq!(screen.get_line(0), "ab");
    }

    #[test]
    fn test_backspace_in_middle_shifts_row() {
        let mut screen = ScreenBuffer::new(10, 3);
        screen.append_text("abcd");
        screen.set_cursor(0, 2);
        screen.append_text("\u{8}");

        assert_eq!(screen.get_line(0), "acd");
        assert_eq!(screen.cursor_col(), 1);
    }

    #[test]
    fn test_tab_stops_and_clamp() {
        let mut screen = ScreenBuffer::new(12, 2);
        screen.append_text("\t");
        assert_eq!(screen.cursor_col(), 8);

        screen.append_text("\t");
        assert_eq!(screen.cursor_col(), 11);

        screen.append_text("\rab\t");
        assert_eq!(screen.cursor_col(), 8);
    }

    #[test]
    fn test_tab_at_widest_geometry() {
        let mut screen = ScreenBuffer::new(u16::MAX, 1);
        screen.set_cursor(0, 65530);
        screen.append_text("\t");
        assert_eq!(screen.cursor_col(), u16::MAX - 1);
    }

    #[test]
    fn test_padding_uses_pending_style() {
        let mut screen = ScreenBuffer::new(10, 2);
        screen.pending_style = Style::DEFAULT.with_background(Color::Indexed(4));
        screen.set_cursor(0, 3);
        screen.append_text("x");

        let line = screen.get_styled_line(0);
        assert_eq!(line.len(), 4);
        assert_eq!(line[0].ch, ' ');
        assert_eq!(line[0].style.bg, Color::Indexed(4));
        assert_eq!(line[3].ch, 'x');
    }

    #[test]
    fn test_control_characters_skipped() {
        let mut screen = ScreenBuffer::new(10, 2);
        screen.append_text("a\u{1}\u{7f}b\u{85}c");

        assert_eq!(screen.get_line(0), "abc");
    }

    #[test]
    fn test_set_cursor_clamps() {
        let mut screen = ScreenBuffer::new(80, 24);
        screen.set_cursor(100, 200);
        assert_eq!(screen.cursor(), Cursor { row: 23, col: 79 });

        screen.set_cursor(-5, -1);
        assert_eq!(screen.cursor(), Cursor { row: 0, col: 0 });

        screen.move_cursor(i32::MIN, i32::MAX);
        assert_eq!(screen.cursor(), Cursor { row: 0, col: 79 });
    }

    #[test]
    fn test_resize_shrink_drops_tail_and_clamps() {
        let mut screen = ScreenBuffer::new(10, 4);
        screen.append_text("a\nb\nc\nd");
        assert_eq!(screen.cursor(), Cursor { row: 3, col: 1 });

        screen.resize(10, 2);
        assert_eq!(screen.rows(), 2);
        assert_eq!(screen.get_line(0), "a");
        assert_eq!(screen.get_line(1), "b");
        assert_eq!(screen.get_line(2), "");
        assert_eq!(screen.cursor(), Cursor { row: 1, col: 1 });
    }

    #[test]
    fn test_resize_grow_keeps_content() {
        let mut screen = ScreenBuffer::new(10, 2);
        screen.append_text("a\nb");
        screen.resize(12, 4);

        assert_eq!(screen.get_line(0), "a");
        assert_eq!(screen.get_line(1), "b");
        assert_eq!(screen.get_line(2), "");
        assert_eq!(screen.get_line(3), "");
        assert_eq!(screen.text(), "a\nb\n\n");
    }

    #[test]
    fn test_narrowing_guards_reads() {
        let mut screen = ScreenBuffer::new(10, 2);
        screen.append_text("0123456789");
        screen.resize(4, 2);

        assert_eq!(screen.get_line(0), "0123");
        assert!(screen.cell(0, 5).is_none());

        screen.resize(10, 2);
        assert_eq!(screen.get_line(0), "0123456789");
    }

    #[test]
    fn test_out_of_range_row_is_empty() {
        let screen = ScreenBuffer::new(10, 2);
        assert_eq!(screen.get_line(7), "");
        assert!(screen.get_styled_line(7).is_empty());
    }

    #[test]
    fn test_reset_clears_style() {
        let mut screen = ScreenBuffer::new(10, 2);
        screen.pending_style = Style::DEFAULT.with_flag(AttrFlags::BOLD);
        screen.append_text("ab\ncd");

        screen.clear();
        assert_eq!(screen.text(), "\n");
        assert_eq!(screen.cursor(), Cursor::default());
        assert!(screen.pending_style.bold());

        screen.reset();
        assert_eq!(screen.pending_style, Style::DEFAULT);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut screen = ScreenBuffer::new(10, 3);
        screen.clear_dirty();
        screen.append_text("x\n\ny");

        assert_eq!(screen.dirty_lines(), vec![0, 2]);
        assert!(!screen.needs_full_redraw());

        screen.clear_dirty();
        screen.resize(20, 3);
        assert!(screen.needs_full_redraw());
    }
}
