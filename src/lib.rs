//! Rawline, a grapheme aware line editor with history, completion, multiline
//! editing and syntax highlighting.
//!
//! The editor owns the terminal for the duration of a [`Editor::read_line`]
//! call: it enters raw mode, decodes the incoming byte stream into key
//! events, edits an in-memory buffer with full grapheme awareness, repaints
//! after every change and restores the terminal on every exit path,
//! including crashes.
//!
//! # Example
//!
//! ```no_run
//! let mut editor = rawline::Editor::new("> ");
//! loop {
//!     let line = editor.read_line().unwrap();
//!     if line == "quit" {
//!         break;
//!     }
//!     println!("entered: {line}");
//! }
//! ```
//!
//! Completion, syntax coloring and multiline continuation are host
//! callbacks; see [`Completer`], [`Highlighter`] and [`Multiline`].

use std::io::{self, BufRead};

use log::debug;

mod clipboard;
mod edit;
pub mod error;
pub mod grapheme;
pub mod highlight;
pub mod history;
pub mod keys;
pub mod layout;
pub mod line_buffer;
mod parse;
mod render;
mod string_list;
pub mod suggest;
mod tty;
pub mod validate;

pub use crate::error::{Error, Result};
pub use crate::grapheme::{Graphemes, SplitFn, WidthFn, TAB_WIDTH};
pub use crate::highlight::{ColorSpan, Highlighter};
pub use crate::history::HistoryLimit;
pub use crate::keys::{KeyCode, KeyEvent, Modifiers};
pub use crate::suggest::Completer;
pub use crate::tty::{is_supported, is_tty, set_utf8, terminal_width};
pub use crate::validate::{MatchingBrackets, Multiline};

use crate::clipboard::Clipboard;
use crate::edit::Status;
use crate::history::History;
use crate::layout::Viewport;
use crate::line_buffer::LineBuffer;
use crate::render::{Frame, Renderer};
use crate::suggest::Suggestions;
use crate::tty::ByteRead;

/// Write `s` to stdout.
pub fn emit(s: &str) -> Result<()> {
    tty::write_and_flush(s.as_bytes())
}

/// Write the escape sequence selecting `color` to stdout; the encoding is
/// the one used by [`Editor::set_palette`].
pub fn emit_color(color: i32) -> Result<()> {
    let mut seq = String::new();
    highlight::push_color(&mut seq, color);
    tty::write_and_flush(seq.as_bytes())
}

/// Interactive line editor.
///
/// One editor is reused across many [`read_line`](Self::read_line) calls;
/// history persists between calls, everything else is transient per call.
pub struct Editor {
    pub(crate) prompt: String,
    pub(crate) continuation_prompt: String,
    pub(crate) highlighter: Option<Box<dyn Highlighter>>,
    pub(crate) palette: Vec<i32>,
    pub(crate) completer: Option<Box<dyn Completer>>,
    pub(crate) multiline: Option<Box<dyn Multiline>>,
    pub(crate) hooks: Graphemes,
    pub(crate) history: History,

    pub(crate) line: LineBuffer,
    pub(crate) clipboard: Clipboard,
    pub(crate) suggestions: Suggestions,
    pub(crate) viewport: Viewport,
    pub(crate) renderer: Renderer,
    pub(crate) ncols: usize,
    pub(crate) refresh: bool,
    pub(crate) suggestion_shown: bool,
}

impl Editor {
    /// Create an editor displaying `prompt`. The prompt is copied; the
    /// continuation prompt defaults to it until
    /// [`set_multiline`](Self::set_multiline) overrides it.
    pub fn new(prompt: &str) -> Self {
        let hooks = Graphemes::default();
        Self {
            prompt: prompt.to_owned(),
            continuation_prompt: prompt.to_owned(),
            highlighter: None,
            palette: Vec::new(),
            completer: None,
            multiline: None,
            hooks,
            history: History::new(),
            line: LineBuffer::new(hooks),
            clipboard: Clipboard::new(),
            suggestions: Suggestions::new(),
            viewport: Viewport::default(),
            renderer: Renderer::new(),
            ncols: 0,
            refresh: false,
            suggestion_shown: false,
        }
    }

    // -- configuration -----------------------------------------------------

    /// Bound the history length.
    pub fn set_history_length(&mut self, limit: HistoryLimit) {
        self.history.set_limit(limit);
    }

    /// Append an entry to the history; see [`History::add`] for the cases
    /// that are skipped.
    pub fn add_history(&mut self, entry: &str) -> bool {
        self.history.add(entry)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Install the palette mapping semantic color indices (as reported by
    /// the highlighter) to color values; see [`highlight`] for the
    /// encoding. An empty palette disables coloring and returns `false`.
    pub fn set_palette(&mut self, palette: &[i32]) -> bool {
        self.palette.clear();
        if palette.is_empty() {
            return false;
        }
        self.palette.extend_from_slice(palette);
        true
    }

    /// Enable syntax coloring.
    pub fn set_highlighter(&mut self, highlighter: impl Highlighter + 'static) {
        self.highlighter = Some(Box::new(highlighter));
    }

    /// Enable autocomplete.
    pub fn set_completer(&mut self, completer: impl Completer + 'static) {
        self.completer = Some(Box::new(completer));
    }

    /// Enable multiline editing: while `predicate` wants more input, Return
    /// inserts a newline instead of committing. Continuation rows display
    /// `continuation_prompt`, or the primary prompt when `None`.
    pub fn set_multiline(
        &mut self,
        predicate: impl Multiline + 'static,
        continuation_prompt: Option<&str>,
    ) {
        self.multiline = Some(Box::new(predicate));
        self.continuation_prompt = continuation_prompt.unwrap_or(&self.prompt).to_owned();
    }

    /// Substitute the heuristic grapheme splitter.
    pub fn set_grapheme_splitter(&mut self, split: SplitFn) {
        self.hooks.split = split;
        self.line.set_hooks(self.hooks);
    }

    /// Substitute the heuristic width predictor.
    pub fn set_grapheme_width(&mut self, width: WidthFn) {
        self.hooks.width = width;
        self.line.set_hooks(self.hooks);
    }

    // -- reading -----------------------------------------------------------

    /// Read one line from the user.
    ///
    /// Interactive editing requires stdin and stdout to be a supported
    /// terminal; otherwise the call degrades to a plain buffered read
    /// (after printing the prompt when at least a terminal is attached).
    /// The returned string is owned by the caller. EOF on an empty buffer
    /// yields an empty string.
    pub fn read_line(&mut self) -> Result<String> {
        if !tty::is_tty() {
            let mut stdin = io::stdin().lock();
            Self::read_plain(&mut stdin)
        } else if !tty::is_supported() {
            self.read_unsupported()
        } else {
            self.read_interactive()
        }
    }

    /// Pipe-style read: everything up to a line feed or EOF.
    fn read_plain<R: BufRead>(input: &mut R) -> Result<String> {
        let mut bytes = Vec::new();
        input.read_until(b'\n', &mut bytes)?;
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Unsupported terminal: prompt, then read a line with the trailing
    /// control characters stripped.
    fn read_unsupported(&mut self) -> Result<String> {
        tty::write_and_flush(self.prompt.as_bytes())?;
        let mut stdin = io::stdin().lock();
        let mut line = Self::read_plain(&mut stdin)?;
        strip_trailing_controls(&mut line);
        Ok(line)
    }

    fn read_interactive(&mut self) -> Result<String> {
        self.reset();
        tty::set_utf8();
        let raw = match tty::enable_raw_mode() {
            Ok(raw) => raw,
            Err(e) => {
                debug!(target: "rawline", "cannot enter raw mode: {e}");
                return self.read_unsupported();
            }
        };

        let mut reader = tty::stdin_reader();
        let outcome = self.edit_loop(&mut reader);

        // the exit path runs even when the loop failed: the terminal must
        // come back in one piece before the error propagates
        self.line.clear_selection();
        self.suggestions.clear();
        let _ = self.redraw_now();
        let _ = raw.disable_raw_mode();

        let result = self.finish(outcome?);
        tty::write_and_flush(b"\r\n")?;
        Ok(result)
    }

    /// Reset the per-call state; history and configuration survive.
    fn reset(&mut self) {
        self.clear_buffer();
        self.line.clear_selection();
        self.history.end_browsing();
        self.suggestions.clear();
        self.renderer.reset();
        self.refresh = false;
    }

    fn begin_session(&mut self) {
        self.ncols = tty::terminal_width().unwrap_or(80);
        let prompt_width = self.hooks.str_width(&self.prompt);
        self.viewport.init(self.ncols, prompt_width);
    }

    /// Decode, dispatch and repaint until a commit, a cancel or EOF.
    fn edit_loop<R: ByteRead>(&mut self, reader: &mut R) -> Result<Status> {
        self.begin_session();
        self.redraw_now()?;

        loop {
            let Some(key) = parse::next_key(reader)? else {
                return Ok(Status::Commit); // EOF: the buffer as it stands
            };
            let status = self.dispatch(key);
            if status != Status::Continue {
                return Ok(status);
            }

            if tty::take_resize_pending() {
                self.ncols = tty::terminal_width().unwrap_or(80);
                let prompt_width = self.hooks.str_width(&self.prompt);
                self.viewport.update_width(self.ncols, prompt_width);
                self.refresh = true;
            }

            if self.refresh {
                self.redraw_now()?;
                self.refresh = false;
            }
        }
    }

    /// Commits (and EOF) reach the history; cancels never do.
    fn finish(&mut self, status: Status) -> String {
        if status != Status::Cancel && !self.line.is_empty() {
            self.history.add(self.line.as_str());
        }
        self.line.as_str().to_owned()
    }

    /// Repaint the edit area and flush it to the terminal.
    fn redraw_now(&mut self) -> Result<()> {
        let frame = Frame {
            line: &self.line,
            prompt: &self.prompt,
            continuation_prompt: &self.continuation_prompt,
            viewport: &self.viewport,
            highlighter: self.highlighter.as_deref(),
            palette: &self.palette,
            ghost: self.suggestions.current(),
        };
        self.suggestion_shown = self.renderer.redraw(&frame);
        tty::write_and_flush(self.renderer.output().as_bytes())
    }

    /// Print `string` through the installed highlighter and palette without
    /// touching the editor state; for echoing committed lines.
    pub fn display_with_syntax_coloring(&self, string: &str) -> Result<()> {
        let mut out = String::new();
        match &self.highlighter {
            Some(highlighter) if !self.palette.is_empty() => {
                highlight::paint(&mut out, string, highlighter.as_ref(), &self.palette);
            }
            _ => out.push_str(string),
        }
        tty::write_and_flush(out.as_bytes())
    }

    #[cfg(test)]
    pub(crate) fn begin_test_session(&mut self, cols: usize) {
        self.reset();
        self.ncols = cols;
        let prompt_width = self.hooks.str_width(&self.prompt);
        self.viewport.init(cols, prompt_width);
    }
}

fn strip_trailing_controls(line: &mut String) {
    while line.ends_with(|c: char| c.is_ascii_control()) {
        line.pop();
    }
}

#[cfg(test)]
mod test {
    use super::{strip_trailing_controls, Editor};
    use crate::edit::Status;
    use crate::highlight::ColorSpan;
    use crate::tty::test::SliceReader;

    /// Run one interactive session against scripted bytes, with the same
    /// exit path as a real read (minus the terminal).
    fn drive(editor: &mut Editor, bytes: &[u8]) -> String {
        editor.reset();
        let mut reader = SliceReader::new(bytes);
        let status = editor.edit_loop(&mut reader).unwrap();
        editor.line.clear_selection();
        editor.suggestions.clear();
        editor.finish(status)
    }

    #[test]
    fn commit_plain_line() {
        let mut editor = Editor::new("> ");
        assert_eq!("hi", drive(&mut editor, b"hi\r"));
        assert_eq!(1, editor.history().len());
        assert_eq!(Some("hi"), editor.history().get(0));
    }

    #[test]
    fn arrow_navigation_and_insert() {
        let mut editor = Editor::new("> ");
        assert_eq!("axb", drive(&mut editor, b"ab\x1b[Dx\r"));
        // cursor sat just after the inserted grapheme when the line committed
        assert_eq!(2, editor.line.cursor());
    }

    #[test]
    fn backspace_byte_deletes() {
        let mut editor = Editor::new("> ");
        assert_eq!("ab", drive(&mut editor, b"abc\x08\r"));
    }

    #[test]
    fn right_arrow_applies_visible_ghost() {
        let mut editor = Editor::new("> ");
        editor.set_completer(|line: &str, index: &mut usize| -> Option<String> {
            if *index == 0 && line == "pr" {
                *index = 1;
                Some("int".to_owned())
            } else {
                None
            }
        });
        assert_eq!("print", drive(&mut editor, b"pr\x1b[C\r"));
    }

    #[test]
    fn right_arrow_moves_without_ghost() {
        let mut editor = Editor::new("> ");
        // no completer: Right at the end of the buffer is clipped
        assert_eq!("ab", drive(&mut editor, b"ab\x1b[C\r"));
        assert_eq!(2, editor.line.cursor());
    }

    #[test]
    fn bracket_driven_multiline() {
        let mut editor = Editor::new("> ");
        editor.set_multiline(crate::validate::MatchingBrackets, Some(". "));
        assert_eq!("f(x\ny)", drive(&mut editor, b"f(x\ry)\r"));
    }

    #[test]
    fn history_browse_and_commit() {
        let mut editor = Editor::new("> ");
        editor.add_history("one");
        editor.add_history("two");
        assert_eq!("one", drive(&mut editor, b"\x1b[A\x1b[A\r"));
        // the next call starts from a clean, non-browsing state
        assert_eq!("", drive(&mut editor, b"\r"));
        assert!(!editor.history.is_browsing());
    }

    #[test]
    fn eof_returns_buffer_so_far() {
        let mut editor = Editor::new("> ");
        assert_eq!("partial", drive(&mut editor, b"partial"));
        assert_eq!(Some("partial"), editor.history().get(0));
    }

    #[test]
    fn eof_on_empty_buffer_returns_empty_string() {
        let mut editor = Editor::new("> ");
        assert_eq!("", drive(&mut editor, b""));
        assert_eq!(0, editor.history().len());
    }

    #[test]
    fn ctrl_c_returns_empty_without_history() {
        let mut editor = Editor::new("> ");
        assert_eq!("", drive(&mut editor, b"secret\x03"));
        assert_eq!(0, editor.history().len());
    }

    #[test]
    fn ctrl_g_keeps_buffer_out_of_history() {
        let mut editor = Editor::new("> ");
        assert_eq!("draft", drive(&mut editor, b"draft\x07"));
        assert_eq!(0, editor.history().len());
    }

    #[test]
    fn ctrl_return_inserts_newline_unconditionally() {
        let mut editor = Editor::new("> ");
        assert_eq!("a\nb", drive(&mut editor, b"a\nb\r"));
    }

    #[test]
    fn committed_lines_deduplicate_in_history() {
        let mut editor = Editor::new("> ");
        drive(&mut editor, b"same\r");
        drive(&mut editor, b"same\r");
        assert_eq!(1, editor.history().len());
    }

    #[test]
    fn unicode_input_round_trips() {
        let mut editor = Editor::new("> ");
        let input = "héllo 中 👩🏽‍🚀".as_bytes();
        let mut bytes = input.to_vec();
        bytes.push(b'\r');
        assert_eq!("héllo 中 👩🏽‍🚀", drive(&mut editor, &bytes));
    }

    #[test]
    fn scenario_status_plumbing() {
        let mut editor = Editor::new("> ");
        editor.reset();
        let mut reader = SliceReader::new(b"x\r");
        assert_eq!(Status::Commit, editor.edit_loop(&mut reader).unwrap());
    }

    #[test]
    fn read_plain_stops_at_line_feed() {
        let mut input = std::io::Cursor::new(b"abc\nrest".to_vec());
        assert_eq!("abc", Editor::read_plain(&mut input).unwrap());
        // and reports everything up to EOF otherwise
        let mut input = std::io::Cursor::new(b"tail".to_vec());
        assert_eq!("tail", Editor::read_plain(&mut input).unwrap());
    }

    #[test]
    fn trailing_controls_are_stripped() {
        let mut line = String::from("value\r\x1b");
        strip_trailing_controls(&mut line);
        assert_eq!("value", line);
    }

    #[test]
    fn display_with_syntax_coloring_needs_palette() {
        let mut editor = Editor::new("> ");
        editor.set_highlighter(|_: &str, _: usize| -> Option<ColorSpan> {
            Some(ColorSpan {
                byte_end: usize::MAX,
                color: 0,
            })
        });
        // no palette: plain output, no panic, nothing colored
        editor.display_with_syntax_coloring("text").unwrap();
    }
}
