//! Viewport: the window of terminal columns available for buffer content.

/// Horizontal scroll state and screen geometry. The prompt is not part of
/// the viewport; `screen_cols` already excludes it, along with one reserved
/// trailing column that keeps the terminal out of its pending-wrap state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Viewport {
    /// Horizontal scroll offset in terminal cells.
    pub first_visible_col: usize,
    /// Visible width for buffer content.
    pub screen_cols: usize,
    /// Reserved for vertical scrolling.
    pub screen_rows: usize,
    /// Reserved for vertical scrolling.
    pub first_visible_line: usize,
}

impl Viewport {
    /// Reset scroll state and recompute the width for a fresh session.
    pub fn init(&mut self, term_cols: usize, prompt_width: usize) {
        self.first_visible_line = 0;
        self.first_visible_col = 0;
        self.screen_rows = 1;
        self.update_width(term_cols, prompt_width);
    }

    /// Recompute the visible width, preserving the scroll position.
    pub fn update_width(&mut self, term_cols: usize, prompt_width: usize) {
        self.screen_cols = term_cols.saturating_sub(prompt_width + 1);
    }

    /// Scroll horizontally so that a cursor at terminal column `cursor_col`
    /// (within its logical line) falls inside the window; when scrolling
    /// right the cursor lands on the right edge.
    pub fn ensure_visible(&mut self, cursor_col: usize) {
        if cursor_col < self.first_visible_col {
            self.first_visible_col = cursor_col;
        } else if cursor_col >= self.first_visible_col + self.screen_cols {
            self.first_visible_col = cursor_col + 1 - self.screen_cols;
        }
    }
}

#[cfg(test)]
mod test {
    use super::Viewport;

    fn viewport(cols: usize) -> Viewport {
        let mut vp = Viewport::default();
        vp.init(cols + 3, 2); // prompt "> " plus the reserved column
        assert_eq!(cols, vp.screen_cols);
        vp
    }

    #[test]
    fn init_reserves_prompt_and_wrap_column() {
        let mut vp = Viewport::default();
        vp.init(80, 2);
        assert_eq!(77, vp.screen_cols);
        assert_eq!(0, vp.first_visible_col);
    }

    #[test]
    fn cursor_inside_window_does_not_scroll() {
        let mut vp = viewport(10);
        vp.ensure_visible(5);
        assert_eq!(0, vp.first_visible_col);
    }

    #[test]
    fn scrolls_right_to_keep_cursor_on_edge() {
        let mut vp = viewport(10);
        vp.ensure_visible(14);
        assert_eq!(5, vp.first_visible_col);
        // cursor is now on the last visible column
        assert!(14 >= vp.first_visible_col);
        assert!(14 < vp.first_visible_col + vp.screen_cols);
    }

    #[test]
    fn scrolls_left_to_cursor() {
        let mut vp = viewport(10);
        vp.ensure_visible(14);
        vp.ensure_visible(2);
        assert_eq!(2, vp.first_visible_col);
    }

    #[test]
    fn narrow_terminal_clamps_to_zero() {
        let mut vp = Viewport::default();
        vp.init(2, 4);
        assert_eq!(0, vp.screen_cols);
    }
}
