//! Line buffer with derived grapheme and line indexes, cursor and selection.
//!
//! The buffer is a `String`; `graphemes` and `lines` are parallel arrays of
//! byte offsets rebuilt after every mutation. Both carry a trailing sentinel
//! equal to the buffer length, so the byte range of grapheme `i` is always
//! `graphemes[i]..graphemes[i + 1]` and the last line needs no special case.
//! Cursor and selection anchor are grapheme indices.

use crate::grapheme::Graphemes;

#[derive(Debug)]
pub struct LineBuffer {
    buf: String,
    graphemes: Vec<usize>,
    lines: Vec<usize>,
    cursor: usize,
    selection: Option<usize>,
    hooks: Graphemes,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(Graphemes::default())
    }
}

impl LineBuffer {
    pub fn new(hooks: Graphemes) -> Self {
        let mut lb = Self {
            buf: String::new(),
            graphemes: Vec::new(),
            lines: Vec::new(),
            cursor: 0,
            selection: None,
            hooks,
        };
        lb.recompute();
        lb
    }

    #[cfg(test)]
    pub fn init(line: &str, cursor: usize) -> Self {
        let mut lb = Self::default();
        lb.insert(line);
        lb.set_cursor(cursor);
        lb
    }

    /// Extracts a string slice containing the entire buffer.
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Returns the length of this buffer, in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn grapheme_count(&self) -> usize {
        self.graphemes.len() - 1
    }

    /// Number of logical lines; at least 1, even for an empty buffer.
    pub fn line_count(&self) -> usize {
        self.lines.len() - 1
    }

    /// Byte offset of the start of line `row`.
    pub fn line_start(&self, row: usize) -> usize {
        self.lines[row]
    }

    pub fn hooks(&self) -> &Graphemes {
        &self.hooks
    }

    /// Swap in new grapheme hooks and rebuild the derived indexes.
    pub fn set_hooks(&mut self, hooks: Graphemes) {
        self.hooks = hooks;
        self.recompute();
        self.cursor = self.cursor.min(self.grapheme_count());
    }

    /// Byte range of grapheme `i`; degenerate `(len, len)` past the end.
    pub fn grapheme_range(&self, i: usize) -> (usize, usize) {
        if i >= self.grapheme_count() {
            return (self.buf.len(), self.buf.len());
        }
        (self.graphemes[i], self.graphemes[i + 1])
    }

    pub fn grapheme_str(&self, i: usize) -> &str {
        let (start, end) = self.grapheme_range(i);
        &self.buf[start..end]
    }

    /// First grapheme index whose start byte is >= `byte`.
    pub fn find_grapheme_index(&self, byte: usize) -> usize {
        let count = self.grapheme_count();
        self.graphemes[..count].partition_point(|&off| off < byte)
    }

    /// Display width of the grapheme range `[g_start, g_end)`.
    pub fn grapheme_range_width(&self, g_start: usize, g_end: usize) -> usize {
        (g_start..g_end)
            .map(|g| self.hooks.grapheme_width(self.grapheme_str(g)))
            .sum()
    }

    fn recompute(&mut self) {
        self.graphemes.clear();
        let mut off = 0;
        while off < self.buf.len() {
            self.graphemes.push(off);
            let mut len = self.hooks.next_grapheme(&self.buf[off..]);
            if len == 0 || off + len > self.buf.len() {
                len = self.buf[off..].chars().next().map_or(1, char::len_utf8);
            }
            off += len;
        }
        self.graphemes.push(self.buf.len());

        // Line starts sit one byte past each newline. A newline always heads
        // its own grapheme, so a plain byte scan finds exactly the newline
        // graphemes.
        self.lines.clear();
        self.lines.push(0);
        for nl in memchr::memchr_iter(b'\n', self.buf.as_bytes()) {
            self.lines.push(nl + 1);
        }
        self.lines.push(self.buf.len());
    }

    // -- cursor ------------------------------------------------------------

    /// Current cursor position in grapheme units.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Byte offset of the cursor.
    pub fn cursor_byte(&self) -> usize {
        self.graphemes[self.cursor]
    }

    /// Move the cursor, clamping to the valid range.
    /// Returns `true` if the position changed.
    pub fn set_cursor(&mut self, posn: usize) -> bool {
        let posn = posn.min(self.grapheme_count());
        if posn == self.cursor {
            return false;
        }
        self.cursor = posn;
        true
    }

    pub fn is_cursor_at_end(&self) -> bool {
        self.cursor == self.grapheme_count()
    }

    /// Logical row of the cursor and its column in grapheme units.
    pub fn cursor_row_col(&self) -> (usize, usize) {
        let byte = self.cursor_byte();
        let count = self.line_count();
        let row = self.lines[..count].partition_point(|&s| s <= byte) - 1;
        let col = self.cursor - self.find_grapheme_index(self.lines[row]);
        (row, col)
    }

    /// Terminal column of the cursor within its logical line.
    pub fn cursor_term_col(&self) -> usize {
        let (row, _) = self.cursor_row_col();
        let line_start = self.find_grapheme_index(self.lines[row]);
        self.grapheme_range_width(line_start, self.cursor)
    }

    // -- selection ---------------------------------------------------------

    /// Anchor a selection at the cursor unless one is already active.
    pub fn begin_selection(&mut self) {
        if self.selection.is_none() {
            self.selection = Some(self.cursor);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn has_selection(&self) -> bool {
        self.selection.is_some()
    }

    #[cfg(test)]
    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    /// Normalized selection range `[min, max)` in grapheme units.
    pub fn selection_range(&self) -> Option<(usize, usize)> {
        let anchor = self.selection?;
        Some((anchor.min(self.cursor), anchor.max(self.cursor)))
    }

    /// Normalized selection range in bytes.
    pub fn selection_byte_range(&self) -> Option<(usize, usize)> {
        let (l, r) = self.selection_range()?;
        Some((self.grapheme_range(l).0, self.grapheme_range(r).0))
    }

    // -- mutation ----------------------------------------------------------

    /// Insert `text` at the cursor and move the cursor past it.
    /// Returns `false`, leaving the buffer unchanged, if the allocation
    /// fails; the caller drops the keystroke.
    pub fn insert(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        if self.buf.try_reserve(text.len()).is_err() {
            return false;
        }
        let offset = self.cursor_byte();
        self.buf.insert_str(offset, text);
        self.recompute();
        self.cursor = self.find_grapheme_index(offset + text.len());
        true
    }

    /// Delete the byte range `[start, end)` and rebuild the indexes.
    /// The cursor is clamped; callers reposition it when they need more.
    pub fn delete_range(&mut self, start: usize, end: usize) {
        if start >= end || end > self.buf.len() {
            return;
        }
        self.buf.drain(start..end);
        self.recompute();
        self.cursor = self.cursor.min(self.grapheme_count());
        if let Some(sel) = self.selection {
            self.selection = Some(sel.min(self.grapheme_count()));
        }
    }

    pub fn delete_grapheme(&mut self, i: usize) {
        if i >= self.grapheme_count() {
            return;
        }
        let (start, end) = self.grapheme_range(i);
        self.delete_range(start, end);
    }

    /// Delete the selected graphemes; the cursor lands on the left edge.
    pub fn delete_selection(&mut self) {
        let Some((sel_l, _)) = self.selection_range() else {
            return;
        };
        let Some((start, end)) = self.selection_byte_range() else {
            return;
        };
        self.delete_range(start, end);
        self.selection = None;
        self.cursor = sel_l.min(self.grapheme_count());
    }

    /// Delete the grapheme under the cursor (the "Delete" key, Ctrl-D).
    pub fn delete_at_cursor(&mut self) {
        if self.cursor < self.grapheme_count() {
            self.delete_grapheme(self.cursor);
        }
    }

    /// Delete the selection, or the grapheme before the cursor.
    /// A bare cursor at position 0 is a no-op.
    pub fn backspace(&mut self) {
        if self.selection.is_some() {
            self.delete_selection();
        } else if self.cursor > 0 {
            let target = self.cursor - 1;
            self.delete_grapheme(target);
            self.cursor = target;
        }
    }

    /// Reset the buffer, indexes and cursor.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.recompute();
        self.cursor = 0;
        self.selection = None;
    }

    /// Exchange two adjacent graphemes around the cursor; at the end of the
    /// buffer the last two are swapped, otherwise the one before the cursor
    /// swaps with the one at the cursor and the cursor advances.
    pub fn transpose(&mut self) -> bool {
        let n = self.grapheme_count();
        let cur = self.cursor;
        if n < 2 || cur == 0 {
            return false;
        }
        let a = if cur >= n { n - 2 } else { cur - 1 };
        let (a_start, a_end) = self.grapheme_range(a);
        let (b_start, b_end) = self.grapheme_range(a + 1);

        let swapped = format!("{}{}", &self.buf[b_start..b_end], &self.buf[a_start..a_end]);
        self.buf.replace_range(a_start..b_end, &swapped);
        self.recompute();
        if cur < n {
            self.cursor = (cur + 1).min(self.grapheme_count());
        }
        true
    }

    /// Assert the structural invariants; test support.
    #[cfg(test)]
    pub fn check_invariants(&self) {
        let len = self.buf.len();
        let count = self.grapheme_count();
        assert_eq!(Some(&len), self.graphemes.last());
        let mut concat = String::new();
        for i in 0..count {
            assert!(self.graphemes[i] < self.graphemes[i + 1]);
            concat.push_str(self.grapheme_str(i));
            assert_eq!(i, self.find_grapheme_index(self.graphemes[i]));
        }
        assert_eq!(self.buf, concat);

        assert_eq!(0, self.lines[0]);
        assert_eq!(Some(&len), self.lines.last());
        assert!(self.line_count() >= 1);
        for &start in &self.lines[1..self.line_count()] {
            assert_eq!(Some(&b'\n'), self.buf.as_bytes().get(start - 1));
        }

        assert!(self.cursor <= count);
        if let Some(sel) = self.selection {
            assert!(sel <= count);
        }
    }
}
