//! Command processor

use log::debug;

use crate::keys::{KeyCode as K, KeyEvent, Modifiers as M};
use crate::Editor;

/// What the dispatcher decided about the read loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Status {
    /// Keep reading keys.
    Continue,
    /// Return the buffer and record it in the history.
    Commit,
    /// Return the buffer without touching the history (Ctrl-C, Ctrl-G).
    Cancel,
}

impl Editor {
    /// Map one key press onto the text model, selection, history and
    /// suggestion state.
    ///
    /// After a handled key, unless the handler opted out: history browsing
    /// ends, the selection is cleared and suggestions are regenerated.
    /// Ctrl and Alt shortcuts maintain those invariants themselves.
    pub(crate) fn dispatch(&mut self, key: KeyEvent) -> Status {
        let mut generate_suggestions = true;
        let mut clear_selection = true;
        let mut end_browsing = true;

        match key {
            KeyEvent(K::Char(c), m) if m.contains(M::CTRL) => return self.ctrl_shortcut(c),
            KeyEvent(K::Char(c), m) if m.contains(M::ALT) => return self.alt_shortcut(c),

            KeyEvent(K::Enter, m) if m.contains(M::CTRL) => {
                // Ctrl-Return inserts a newline unconditionally
                self.line.insert("\n");
                generate_suggestions = false;
            }
            KeyEvent(K::Enter, _) => {
                let wants_more = self
                    .multiline
                    .as_ref()
                    .is_some_and(|m| m.wants_more(self.line.as_str()));
                if !wants_more {
                    return Status::Commit;
                }
                self.line.insert("\n");
                generate_suggestions = false;
            }

            KeyEvent(K::Left, m) if m.contains(M::SHIFT) => {
                self.line.begin_selection();
                self.move_left();
                clear_selection = false;
            }
            KeyEvent(K::Right, m) if m.contains(M::SHIFT) => {
                self.line.begin_selection();
                self.move_right();
                clear_selection = false;
            }
            KeyEvent(K::Left, _) => self.move_left(),
            KeyEvent(K::Right, _) => {
                if self.suggestion_shown {
                    self.apply_suggestion();
                    generate_suggestions = false;
                } else {
                    self.move_right();
                }
            }

            KeyEvent(K::Up, _) => {
                self.history_key(-1);
                end_browsing = false;
            }
            KeyEvent(K::Down, _) => {
                self.history_key(1);
                end_browsing = false;
            }

            KeyEvent(K::Home, _) => self.move_home(),
            KeyEvent(K::End, _) => self.move_end(),
            KeyEvent(K::PageUp, _) => {
                self.line.set_cursor(0);
            }
            KeyEvent(K::PageDown, _) => {
                let end = self.line.grapheme_count();
                self.line.set_cursor(end);
            }

            KeyEvent(K::Backspace, _) => self.line.backspace(),

            KeyEvent(K::Tab, _) => {
                if !self.suggestions.is_empty() {
                    self.suggestions.advance(1);
                    generate_suggestions = false;
                } else {
                    self.line.insert("\t");
                }
            }
            KeyEvent(K::BackTab, _) => {
                if !self.suggestions.is_empty() {
                    self.suggestions.advance(-1);
                    generate_suggestions = false;
                }
            }

            KeyEvent(K::Char(c), _) => self.insert_char(c),
            KeyEvent(K::Null | K::UnknownEscSeq, _) => {}
        }

        if clear_selection {
            self.line.clear_selection();
        }
        if generate_suggestions {
            self.generate_suggestions();
        }
        if end_browsing {
            self.history.end_browsing();
        }
        self.after_key();
        Status::Continue
    }

    fn ctrl_shortcut(&mut self, c: char) -> Status {
        debug!(target: "rawline", "ctrl shortcut: {c}");
        match c {
            'A' => self.move_home(),
            'B' => self.move_left(),
            'C' => {
                // clear, then leave without committing anything
                self.clear_buffer();
                return Status::Cancel;
            }
            'D' => {
                self.line.clear_selection();
                self.line.delete_at_cursor();
            }
            'E' => self.move_end(),
            'F' => self.move_right(),
            'G' => return Status::Cancel,
            'K' => self.cut_line(false), // cut to end of line
            'L' => self.clear_buffer(),
            'N' => self.history_key(1),
            'O' => self.copy_selection(),
            'P' => self.history_key(-1),
            'T' => self.transpose(),
            'U' => self.cut_line(true), // cut to start of line
            'V' | 'Y' => self.paste(),
            'X' => self.cut_selection(),
            _ => {}
        }
        self.after_key();
        Status::Continue
    }

    /// Upper case characters indicate Shift + Alt + key.
    fn alt_shortcut(&mut self, c: char) -> Status {
        match c {
            'w' | 'W' => self.copy_selection(),
            _ => {}
        }
        self.after_key();
        Status::Continue
    }

    /// Scroll the viewport after a handled key and schedule a repaint.
    fn after_key(&mut self) {
        self.viewport.ensure_visible(self.line.cursor_term_col());
        self.refresh = true;
    }

    // -- cursor motion -----------------------------------------------------

    fn move_left(&mut self) {
        let cursor = self.line.cursor();
        if cursor > 0 {
            self.line.set_cursor(cursor - 1);
        }
    }

    fn move_right(&mut self) {
        let cursor = self.line.cursor();
        self.line.set_cursor(cursor + 1);
    }

    fn move_home(&mut self) {
        let (row, _) = self.line.cursor_row_col();
        let start = self.line.line_start(row);
        let posn = self.line.find_grapheme_index(start);
        self.line.set_cursor(posn);
    }

    fn move_end(&mut self) {
        let (row, _) = self.line.cursor_row_col();
        let bound = self.line.line_start(row + 1);
        let posn = self.line.find_grapheme_index(bound);
        self.line.set_cursor(posn);
    }

    // -- editing -----------------------------------------------------------

    fn insert_char(&mut self, c: char) {
        let mut buf = [0; 4];
        // a failed insert leaves the buffer untouched; drop the keystroke
        self.line.insert(c.encode_utf8(&mut buf));
    }

    pub(crate) fn clear_buffer(&mut self) {
        self.line.clear();
        self.suggestion_shown = false;
    }

    fn transpose(&mut self) {
        self.line.transpose();
    }

    // -- clipboard ---------------------------------------------------------

    fn copy_selection(&mut self) {
        if let Some((start, end)) = self.line.selection_byte_range() {
            let text = self.line.as_str()[start..end].to_owned();
            self.clipboard.copy(&text);
        }
    }

    fn cut_selection(&mut self) {
        self.copy_selection();
        self.line.delete_selection();
    }

    /// Cut between the cursor and the line boundary before (`Ctrl-U`) or
    /// after it (`Ctrl-K`); the newline itself stays when cutting forward.
    fn cut_line(&mut self, before: bool) {
        let (row, _) = self.line.cursor_row_col();
        let b_line = self.line.line_start(row + usize::from(!before));
        let b_cursor = self.line.cursor_byte();

        let b_start = b_line.min(b_cursor);
        let mut b_end = b_line.max(b_cursor);
        if !before && b_end > 0 && self.line.as_str().as_bytes()[b_end - 1] == b'\n' {
            b_end -= 1;
        }
        if b_start == b_end {
            return; // nothing to copy
        }

        let text = self.line.as_str()[b_start..b_end].to_owned();
        self.clipboard.copy(&text);
        self.line.delete_range(b_start, b_end);
        let posn = self.line.find_grapheme_index(b_start);
        self.line.set_cursor(posn);
    }

    fn paste(&mut self) {
        if self.clipboard.is_empty() {
            return;
        }
        if self.line.has_selection() {
            self.line.delete_selection();
        }
        let text = self.clipboard.as_str().to_owned();
        self.line.insert(&text);
    }

    // -- history -----------------------------------------------------------

    /// Browse the history by `delta`, replacing the live buffer with the
    /// selected entry and parking the cursor at its end.
    fn history_key(&mut self, delta: isize) {
        let Some(entry) = self.history.browse(delta).map(str::to_owned) else {
            return;
        };
        self.clear_buffer();
        self.line.insert(&entry);
        self.line.clear_selection();
        self.suggestions.clear();
    }

    // -- suggestions -------------------------------------------------------

    /// Rebuild the suggestion list; only meaningful with the cursor at the
    /// end of the buffer and no active selection.
    pub(crate) fn generate_suggestions(&mut self) {
        let Some(completer) = &self.completer else {
            return;
        };
        self.suggestions.clear();
        if self.line.has_selection() {
            return;
        }
        if self.line.is_cursor_at_end() {
            self.suggestions.generate(completer.as_ref(), self.line.as_str());
        }
    }

    /// Insert the current ghost suffix at the cursor.
    fn apply_suggestion(&mut self) {
        if let Some(suffix) = self.suggestions.current().map(str::to_owned) {
            if !suffix.is_empty() {
                self.line.insert(&suffix);
            }
        }
        self.suggestions.clear();
    }
}

#[cfg(test)]
mod test {
    use super::Status;
    use crate::keys::{KeyCode as K, KeyEvent, Modifiers as M};
    use crate::Editor;

    fn editor_with(text: &str) -> Editor {
        let mut editor = Editor::new("> ");
        editor.begin_test_session(80);
        for c in text.chars() {
            editor.dispatch(KeyEvent::from(c));
        }
        editor
    }

    #[test]
    fn characters_insert() {
        let editor = editor_with("héllo");
        assert_eq!("héllo", editor.line.as_str());
    }

    #[test]
    fn arrows_and_insert() {
        let mut editor = editor_with("ab");
        editor.dispatch(KeyEvent::plain(K::Left));
        editor.dispatch(KeyEvent::from('x'));
        assert_eq!("axb", editor.line.as_str());
        assert_eq!(2, editor.line.cursor());
    }

    #[test]
    fn plain_arrow_clears_selection() {
        let mut editor = editor_with("abc");
        editor.dispatch(KeyEvent(K::Left, M::SHIFT));
        assert!(editor.line.has_selection());
        editor.dispatch(KeyEvent::plain(K::Left));
        assert!(!editor.line.has_selection());
    }

    #[test]
    fn shift_arrows_extend_selection() {
        let mut editor = editor_with("abcd");
        editor.dispatch(KeyEvent(K::Left, M::SHIFT));
        editor.dispatch(KeyEvent(K::Left, M::SHIFT));
        assert_eq!(Some((2, 4)), editor.line.selection_range());
    }

    #[test]
    fn home_and_end() {
        let mut editor = editor_with("hello");
        editor.dispatch(KeyEvent::plain(K::Home));
        assert_eq!(0, editor.line.cursor());
        editor.dispatch(KeyEvent::plain(K::End));
        assert_eq!(5, editor.line.cursor());
    }

    #[test]
    fn page_keys_jump_to_buffer_edges() {
        let mut editor = Editor::new("> ");
        editor.begin_test_session(80);
        editor.set_multiline(|_: &str| false, None);
        for c in "ab\ncd".chars() {
            if c == '\n' {
                editor.dispatch(KeyEvent(K::Enter, M::CTRL));
            } else {
                editor.dispatch(KeyEvent::from(c));
            }
        }
        editor.dispatch(KeyEvent::plain(K::PageUp));
        assert_eq!(0, editor.line.cursor());
        editor.dispatch(KeyEvent::plain(K::PageDown));
        assert_eq!(5, editor.line.cursor());
    }

    #[test]
    fn return_commits_without_multiline() {
        let mut editor = editor_with("hi");
        assert_eq!(Status::Commit, editor.dispatch(KeyEvent::plain(K::Enter)));
        assert_eq!("hi", editor.line.as_str());
    }

    #[test]
    fn return_continues_while_predicate_wants_more() {
        let mut editor = Editor::new("> ");
        editor.begin_test_session(80);
        editor.set_multiline(crate::validate::MatchingBrackets, None);
        for c in "f(x".chars() {
            editor.dispatch(KeyEvent::from(c));
        }
        assert_eq!(Status::Continue, editor.dispatch(KeyEvent::plain(K::Enter)));
        assert_eq!("f(x\n", editor.line.as_str());
        editor.dispatch(KeyEvent::from(')'));
        assert_eq!(Status::Commit, editor.dispatch(KeyEvent::plain(K::Enter)));
        assert_eq!("f(x\n)", editor.line.as_str());
    }

    #[test]
    fn ctrl_return_always_inserts_newline() {
        let mut editor = editor_with("hi");
        assert_eq!(
            Status::Continue,
            editor.dispatch(KeyEvent(K::Enter, M::CTRL))
        );
        assert_eq!("hi\n", editor.line.as_str());
    }

    #[test]
    fn ctrl_c_clears_and_cancels() {
        let mut editor = editor_with("secret");
        assert_eq!(Status::Cancel, editor.dispatch(KeyEvent::ctrl('C')));
        assert!(editor.line.is_empty());
    }

    #[test]
    fn ctrl_g_cancels_keeping_buffer() {
        let mut editor = editor_with("draft");
        assert_eq!(Status::Cancel, editor.dispatch(KeyEvent::ctrl('G')));
        assert_eq!("draft", editor.line.as_str());
    }

    #[test]
    fn ctrl_l_clears_and_continues() {
        let mut editor = editor_with("stuff");
        assert_eq!(Status::Continue, editor.dispatch(KeyEvent::ctrl('L')));
        assert!(editor.line.is_empty());
    }

    #[test]
    fn cut_and_paste_round_trip() {
        let mut editor = editor_with("hello");
        // select "llo" backwards from the end
        for _ in 0..3 {
            editor.dispatch(KeyEvent(K::Left, M::SHIFT));
        }
        editor.dispatch(KeyEvent::ctrl('X'));
        assert_eq!("he", editor.line.as_str());
        editor.dispatch(KeyEvent::ctrl('V'));
        assert_eq!("hello", editor.line.as_str());
        assert_eq!(5, editor.line.cursor());
    }

    #[test]
    fn copy_then_paste_preserves_buffer_and_advances_cursor() {
        let mut editor = editor_with("abc");
        for _ in 0..2 {
            editor.dispatch(KeyEvent(K::Left, M::SHIFT));
        }
        editor.dispatch(KeyEvent::ctrl('O'));
        // paste replaces the still-active selection with its own contents
        editor.dispatch(KeyEvent::ctrl('V'));
        assert_eq!("abc", editor.line.as_str());
        assert_eq!(3, editor.line.cursor());
    }

    #[test]
    fn alt_w_copies_selection() {
        let mut editor = editor_with("abc");
        for _ in 0..2 {
            editor.dispatch(KeyEvent(K::Left, M::SHIFT));
        }
        editor.dispatch(KeyEvent::alt('w'));
        assert_eq!("bc", editor.clipboard.as_str());
    }

    #[test]
    fn ctrl_k_cuts_to_end_of_line() {
        let mut editor = editor_with("hello");
        editor.dispatch(KeyEvent::plain(K::Home));
        editor.dispatch(KeyEvent::plain(K::Right));
        editor.dispatch(KeyEvent::ctrl('K'));
        assert_eq!("h", editor.line.as_str());
        assert_eq!("ello", editor.clipboard.as_str());
    }

    #[test]
    fn ctrl_u_cuts_to_start_of_line() {
        let mut editor = editor_with("hello");
        editor.dispatch(KeyEvent::plain(K::Left));
        editor.dispatch(KeyEvent::ctrl('U'));
        assert_eq!("o", editor.line.as_str());
        assert_eq!("hell", editor.clipboard.as_str());
        assert_eq!(0, editor.line.cursor());
    }

    #[test]
    fn ctrl_k_excludes_the_newline() {
        let mut editor = editor_with("ab");
        editor.dispatch(KeyEvent(K::Enter, M::CTRL));
        for c in "cd".chars() {
            editor.dispatch(KeyEvent::from(c));
        }
        editor.dispatch(KeyEvent::plain(K::PageUp));
        editor.dispatch(KeyEvent::ctrl('K'));
        assert_eq!("\ncd", editor.line.as_str());
        assert_eq!("ab", editor.clipboard.as_str());
    }

    #[test]
    fn ctrl_d_deletes_under_cursor() {
        let mut editor = editor_with("abc");
        editor.dispatch(KeyEvent::plain(K::Home));
        editor.dispatch(KeyEvent::ctrl('D'));
        assert_eq!("bc", editor.line.as_str());
        assert_eq!(0, editor.line.cursor());
    }

    #[test]
    fn ctrl_t_transposes() {
        let mut editor = editor_with("ab");
        assert_eq!(Status::Continue, editor.dispatch(KeyEvent::ctrl('T')));
        assert_eq!("ba", editor.line.as_str());
    }

    #[test]
    fn backspace_key() {
        let mut editor = editor_with("abc");
        editor.dispatch(KeyEvent::plain(K::Backspace));
        assert_eq!("ab", editor.line.as_str());
    }

    #[test]
    fn up_down_browse_history() {
        let mut editor = Editor::new("> ");
        editor.begin_test_session(80);
        editor.add_history("one");
        editor.add_history("two");
        editor.dispatch(KeyEvent::plain(K::Up));
        assert_eq!("two", editor.line.as_str());
        assert!(editor.history.is_browsing());
        editor.dispatch(KeyEvent::plain(K::Up));
        assert_eq!("one", editor.line.as_str());
        editor.dispatch(KeyEvent::plain(K::Down));
        assert_eq!("two", editor.line.as_str());
        // a non-history key ends browsing
        editor.dispatch(KeyEvent::from('!'));
        assert!(!editor.history.is_browsing());
        assert_eq!("two!", editor.line.as_str());
    }

    #[test]
    fn ctrl_p_and_n_browse_without_ending() {
        let mut editor = Editor::new("> ");
        editor.begin_test_session(80);
        editor.add_history("one");
        editor.add_history("two");
        editor.dispatch(KeyEvent::ctrl('P'));
        assert_eq!("two", editor.line.as_str());
        assert!(editor.history.is_browsing());
        editor.dispatch(KeyEvent::ctrl('P'));
        assert_eq!("one", editor.line.as_str());
        editor.dispatch(KeyEvent::ctrl('N'));
        assert_eq!("two", editor.line.as_str());
        assert!(editor.history.is_browsing());
    }

    #[test]
    fn tab_inserts_literal_tab_without_suggestions() {
        let mut editor = editor_with("a");
        editor.dispatch(KeyEvent::plain(K::Tab));
        assert_eq!("a\t", editor.line.as_str());
    }

    #[test]
    fn tab_cycles_suggestions_when_present() {
        let mut editor = Editor::new("> ");
        editor.begin_test_session(80);
        editor.set_completer(|line: &str, index: &mut usize| -> Option<String> {
            const WORDS: [&str; 2] = ["print", "proto"];
            while *index < WORDS.len() {
                let w = WORDS[*index];
                *index += 1;
                if w.starts_with(line) && w.len() > line.len() {
                    return Some(w[line.len()..].to_owned());
                }
            }
            None
        });
        for c in "pr".chars() {
            editor.dispatch(KeyEvent::from(c));
        }
        assert_eq!(Some("int"), editor.suggestions.current());
        editor.dispatch(KeyEvent::plain(K::Tab));
        assert_eq!(Some("oto"), editor.suggestions.current());
        assert_eq!("pr", editor.line.as_str()); // no literal tab inserted
        editor.dispatch(KeyEvent::plain(K::BackTab));
        assert_eq!(Some("int"), editor.suggestions.current());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut editor = editor_with("ok");
        assert_eq!(
            Status::Continue,
            editor.dispatch(KeyEvent::plain(K::UnknownEscSeq))
        );
        assert_eq!(Status::Continue, editor.dispatch(KeyEvent::plain(K::Null)));
        assert_eq!("ok", editor.line.as_str());
    }
}
