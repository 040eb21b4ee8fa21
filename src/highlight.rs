//! Syntax coloring spans and terminal color emission.
//!
//! A [`Highlighter`] reports colored spans over the buffer; span colors are
//! indices into the editor's palette, and palette entries use one packed
//! `i32` encoding:
//!
//! - `-1` (or any negative value): the terminal's default color
//! - `0..=7`: basic ANSI colors, `8..=15` their bright variants
//! - `16..=255`: the xterm 256-color palette
//! - `>= 0x0100_0000`: truecolor packed as `0x01RRGGBB` (see [`rgb`])

use std::fmt::Write;

pub const BLACK: i32 = 0;
pub const RED: i32 = 1;
pub const GREEN: i32 = 2;
pub const YELLOW: i32 = 3;
pub const BLUE: i32 = 4;
pub const MAGENTA: i32 = 5;
pub const CYAN: i32 = 6;
pub const WHITE: i32 = 7;

/// Marker bit for packed truecolor values.
pub const COLOR_RGB: i32 = 0x0100_0000;

/// An xterm-256 cube color; `r`, `g`, `b` are each in `0..=5`.
pub const fn ansi216(r: i32, g: i32, b: i32) -> i32 {
    16 + 36 * r + 6 * g + b
}

/// An xterm-256 gray level; `n` is in `0..=23`.
pub const fn gray(n: i32) -> i32 {
    232 + n
}

/// Pack an RGB triple as `0x01RRGGBB`.
pub const fn rgb(r: u8, g: u8, b: u8) -> i32 {
    COLOR_RGB | ((r as i32) << 16) | ((g as i32) << 8) | b as i32
}

/// A single colored span of text. `byte_end` is the exclusive end of the
/// span; `color` indexes the palette (out of range means default).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorSpan {
    pub byte_end: usize,
    pub color: i32,
}

/// Syntax colorer, called repeatedly by the renderer to obtain the next
/// colored span starting at `offset`.
///
/// A well-behaved implementation returns a span with `byte_end > offset`.
/// Returning `None` or a non-advancing span makes the renderer draw the
/// remainder of the line uncolored.
pub trait Highlighter {
    fn next_span(&self, line: &str, offset: usize) -> Option<ColorSpan>;
}

impl<F> Highlighter for F
where
    F: Fn(&str, usize) -> Option<ColorSpan>,
{
    fn next_span(&self, line: &str, offset: usize) -> Option<ColorSpan> {
        self(line, offset)
    }
}

/// Translate a span color through the palette. Negative and out-of-range
/// indices mean the default color.
pub(crate) fn palette_lookup(palette: &[i32], color: i32) -> i32 {
    if color >= 0 && (color as usize) < palette.len() {
        palette[color as usize]
    } else {
        -1
    }
}

/// Append the escape sequence selecting `color` to `out`.
/// Negative values (the default color) emit nothing.
pub(crate) fn push_color(out: &mut String, color: i32) {
    if color < 0 {
        return;
    }
    if color < 16 {
        // ANSI 8 or bright 8
        let base = if color < 8 { 30 } else { 90 };
        let _ = write!(out, "\x1b[{}m", base + (color & 7));
    } else if color <= 255 {
        let _ = write!(out, "\x1b[38;5;{color}m");
    } else {
        // packed 0x01RRGGBB
        let r = (color >> 16) & 0xFF;
        let g = (color >> 8) & 0xFF;
        let b = color & 0xFF;
        let _ = write!(out, "\x1b[38;2;{r};{g};{b}m");
    }
}

/// Render `line` with syntax coloring into `out`, without touching any
/// editor state. Tabs expand to spaces; a misbehaving colorer (no span, or a
/// span that fails to advance) leaves the remainder uncolored.
pub(crate) fn paint(
    out: &mut String,
    line: &str,
    highlighter: &dyn Highlighter,
    palette: &[i32],
) {
    let mut offset = 0;
    while offset < line.len() {
        let span = highlighter.next_span(line, offset);
        let Some(span) = span.filter(|s| s.byte_end > offset && s.byte_end <= line.len()) else {
            push_expanded(out, &line[offset..]);
            return;
        };
        let color = palette_lookup(palette, span.color);
        push_color(out, color);
        push_expanded(out, &line[offset..span.byte_end]);
        out.push_str("\x1b[39m");
        offset = span.byte_end;
    }
}

fn push_expanded(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '\t' {
            for _ in 0..crate::grapheme::TAB_WIDTH {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}
