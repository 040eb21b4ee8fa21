//! Cursor-relative, multi-row redraw.
//!
//! A redraw walks every logical line: prompt (primary or continuation),
//! horizontally clipped graphemes with syntax coloring and selection
//! inverse-video, then a faint ghost suggestion on the last line. Previously
//! drawn excess rows are erased and the physical cursor is repositioned
//! relative to where the last redraw left it; `term_cursor_row` and
//! `term_lines_drawn` carry that state between calls.

use std::fmt::Write;

use crate::grapheme::TAB_WIDTH;
use crate::highlight::{palette_lookup, push_color, Highlighter};
use crate::layout::Viewport;
use crate::line_buffer::LineBuffer;

const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";
const RESET_COLOR: &str = "\x1b[0m";
const CLEAR_TO_EOL: &str = "\x1b[K";
const FAINT: &str = "\x1b[2m";
const INVERSE_VIDEO: &str = "\x1b[7m";

/// Everything a redraw needs to see, borrowed from the editor.
pub struct Frame<'a> {
    pub line: &'a LineBuffer,
    pub prompt: &'a str,
    pub continuation_prompt: &'a str,
    pub viewport: &'a Viewport,
    pub highlighter: Option<&'a dyn Highlighter>,
    pub palette: &'a [i32],
    pub ghost: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct Renderer {
    out: String,
    term_cursor_row: usize,
    term_lines_drawn: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any previously drawn rows (start of a fresh session).
    pub fn reset(&mut self) {
        self.term_cursor_row = 0;
        self.term_lines_drawn = 0;
    }

    /// The escape stream produced by the last [`redraw`](Self::redraw).
    pub fn output(&self) -> &str {
        &self.out
    }

    /// Repaint the whole edit area into the output buffer.
    /// Returns whether the ghost suggestion was actually drawn.
    pub fn redraw(&mut self, frame: &Frame<'_>) -> bool {
        self.out.clear();
        self.out.push_str(HIDE_CURSOR); // prevent flickering

        // back to the origin row
        self.out.push('\r');
        if self.term_cursor_row > 0 {
            let _ = write!(self.out, "\x1b[{}A", self.term_cursor_row);
        }

        let (cursor_row, cursor_col) = frame.line.cursor_row_col();
        let line_count = frame.line.line_count();
        let mut rendered_cursor_col = None;
        let mut suggestion_shown = false;

        for i in 0..line_count {
            let byte_start = frame.line.line_start(i);
            let byte_end = frame.line.line_start(i + 1);
            let is_last = i + 1 == line_count;

            self.out.push('\r');
            let shown = self.render_line(
                frame,
                if i == 0 {
                    frame.prompt
                } else {
                    frame.continuation_prompt
                },
                byte_start,
                byte_end,
                (cursor_row == i).then_some(cursor_col),
                is_last,
                &mut rendered_cursor_col,
            );
            if is_last {
                suggestion_shown = shown;
            }
            if !is_last {
                self.out.push('\n');
            }
        }

        // erase rows left over from a taller previous frame
        let extra = self.term_lines_drawn.saturating_sub(line_count);
        for _ in 0..extra {
            self.out.push_str("\n\r");
            self.out.push_str(CLEAR_TO_EOL);
        }

        self.out.push('\r');
        let dy = cursor_row as isize - line_count as isize - extra as isize + 1;
        self.move_by(rendered_cursor_col.unwrap_or(0) as isize, dy);
        self.term_cursor_row = cursor_row;
        self.term_lines_drawn = line_count;
        self.out.push_str(SHOW_CURSOR);
        suggestion_shown
    }

    /// Move the cursor by a delta; down is positive `dy` and is emitted as
    /// line feeds so the terminal scrolls if it has to.
    fn move_by(&mut self, dx: isize, dy: isize) {
        if dy < 0 {
            let _ = write!(self.out, "\x1b[{}A", -dy);
        } else {
            for _ in 0..dy {
                self.out.push('\n');
            }
        }
        if dx != 0 {
            let dir = if dx < 0 { 'D' } else { 'C' };
            let _ = write!(self.out, "\x1b[{}{}", dx.abs(), dir);
        }
    }

    /// Clip the grapheme range `[g_start, g_end)` to the columns visible in
    /// the viewport; a trailing newline grapheme is excluded.
    fn clip_range(
        frame: &Frame<'_>,
        line_start: usize,
        g_start: &mut usize,
        g_end: &mut usize,
    ) {
        let start_col = frame.viewport.first_visible_col;
        let end_col = start_col + frame.viewport.screen_cols;

        let mut col = frame.line.grapheme_range_width(line_start, *g_start);
        let mut start = None;
        let mut end = *g_start;

        for i in *g_start..*g_end {
            let w = frame
                .line
                .hooks()
                .grapheme_width(frame.line.grapheme_str(i));
            if col >= start_col && col < end_col {
                if start.is_none() {
                    start = Some(i); // first visible grapheme
                }
                end = i + 1;
            }
            if col + w > end_col {
                break;
            }
            col += w;
        }

        // clamp if the line is empty or the viewport is past its end
        let start = start.unwrap_or(*g_end);
        let mut end = end.max(start);
        if end > start && frame.line.grapheme_str(end - 1) == "\n" {
            end -= 1;
        }
        *g_start = start;
        *g_end = end;
    }

    #[allow(clippy::too_many_arguments)]
    fn render_line(
        &mut self,
        frame: &Frame<'_>,
        prompt: &str,
        byte_start: usize,
        byte_end: usize,
        logical_cursor_col: Option<usize>,
        is_last: bool,
        rendered_cursor_col: &mut Option<usize>,
    ) -> bool {
        let hooks = *frame.line.hooks();
        self.out.push_str(prompt);
        let mut rendered_width = hooks.str_width(prompt);
        let mut rendered_cursor_posn = None;

        let selection = frame.line.selection_range();

        let line_start = frame.line.find_grapheme_index(byte_start);
        let mut g_start = line_start;
        let mut g_end = frame.line.find_grapheme_index(byte_end);
        Self::clip_range(frame, line_start, &mut g_start, &mut g_end);

        let syntax = if frame.palette.is_empty() {
            None
        } else {
            frame.highlighter
        };

        let mut current_color = -1;
        let mut selection_on = false;
        let mut g = g_start;
        let mut off = frame.line.grapheme_range(g_start).0;

        while g < g_end && off < byte_end {
            // next color span from the current byte offset
            let span = syntax
                .and_then(|hl| hl.next_span(frame.line.as_str(), off))
                .filter(|s| s.byte_end > off);
            let (span_end, span_color) = match span {
                Some(s) => (s.byte_end, palette_lookup(frame.palette, s.color)),
                // rest of the line renders uncolored
                None => (byte_end, -1),
            };

            if span_color != current_color {
                if current_color != -1 {
                    self.out.push_str(RESET_COLOR);
                    selection_on = false;
                }
                push_color(&mut self.out, span_color);
                current_color = span_color;
            }

            while g < g_end {
                let (gs, _) = frame.line.grapheme_range(g);
                if gs >= span_end {
                    break;
                }

                let in_selection = selection.is_some_and(|(l, r)| g >= l && g < r);
                if in_selection != selection_on {
                    if in_selection {
                        self.out.push_str(INVERSE_VIDEO);
                    } else {
                        self.out.push_str(RESET_COLOR);
                        push_color(&mut self.out, current_color);
                    }
                    selection_on = in_selection;
                }

                let grapheme = frame.line.grapheme_str(g);
                if grapheme == "\n" {
                    break;
                }
                if logical_cursor_col == Some(g - line_start) {
                    rendered_cursor_posn = Some(rendered_width);
                }
                if grapheme == "\t" {
                    for _ in 0..TAB_WIDTH {
                        self.out.push(' ');
                    }
                } else {
                    self.out.push_str(grapheme);
                }
                rendered_width += hooks.grapheme_width(grapheme);
                g += 1;
            }

            off = span_end;
        }

        if selection_on || current_color != -1 {
            self.out.push_str(RESET_COLOR);
        }

        // ghosted suggestion suffix, last line only, and only when it fits
        let mut shown = false;
        if is_last && g_end == frame.line.grapheme_count() && logical_cursor_col.is_some() {
            if let Some(suffix) = frame.ghost.filter(|s| !s.is_empty()) {
                let remaining = frame.viewport.screen_cols.saturating_sub(rendered_width);
                let ghost_width = hooks.str_width(suffix);
                if ghost_width <= remaining {
                    shown = true;
                    self.out.push_str(FAINT);
                    self.out.push_str(suffix);
                    self.out.push_str(RESET_COLOR);
                }
            }
        }

        if logical_cursor_col.is_some() {
            *rendered_cursor_col = Some(rendered_cursor_posn.unwrap_or(rendered_width));
        }

        if rendered_width < frame.viewport.screen_cols {
            self.out.push_str(CLEAR_TO_EOL);
        }
        shown
    }
}
