//! Arithmetic REPL exercising coloring, completion and multiline editing.

use rawline::highlight::{self, ColorSpan};
use rawline::{Editor, HistoryLimit, MatchingBrackets};

const NUMBER: i32 = 0;
const OPERATOR: i32 = 1;
const BRACKET: i32 = 2;
const PLAIN: i32 = 3;

fn classify(b: u8) -> i32 {
    match b {
        b'0'..=b'9' | b'.' => NUMBER,
        b'+' | b'-' | b'*' | b'/' => OPERATOR,
        b'(' | b')' => BRACKET,
        _ => PLAIN,
    }
}

/// One span per run of same-class bytes.
fn color_spans(line: &str, offset: usize) -> Option<ColorSpan> {
    let bytes = line.as_bytes();
    let first = *bytes.get(offset)?;
    let class = classify(first);
    let mut end = offset + 1;
    while end < bytes.len() && classify(bytes[end]) == class {
        end += 1;
    }
    Some(ColorSpan {
        byte_end: end,
        color: class,
    })
}

const FUNCTIONS: [&str; 4] = ["sqrt(", "sin(", "cos(", "exp("];

/// Suggest function names for the trailing word.
fn complete(line: &str, index: &mut usize) -> Option<String> {
    let word_start = line
        .rfind(|c: char| !c.is_ascii_alphabetic())
        .map_or(0, |i| i + 1);
    let word = &line[word_start..];
    if word.is_empty() {
        return None;
    }
    while *index < FUNCTIONS.len() {
        let f = FUNCTIONS[*index];
        *index += 1;
        if f.starts_with(word) && f.len() > word.len() {
            return Some(f[word.len()..].to_owned());
        }
    }
    None
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_space(&mut self) {
        while self
            .input
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            self.skip_space();
            match self.input.get(self.pos) {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        loop {
            self.skip_space();
            match self.input.get(self.pos) {
                Some(b'*') => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    value /= self.factor()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64, String> {
        self.skip_space();
        match self.input.get(self.pos) {
            Some(b'(') => {
                self.pos += 1;
                let value = self.expr()?;
                self.skip_space();
                if self.input.get(self.pos) == Some(&b')') {
                    self.pos += 1;
                    Ok(value)
                } else {
                    Err("expected ')'".to_owned())
                }
            }
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(b) if b.is_ascii_digit() || *b == b'.' => {
                let start = self.pos;
                while self
                    .input
                    .get(self.pos)
                    .is_some_and(|b| b.is_ascii_digit() || *b == b'.')
                {
                    self.pos += 1;
                }
                std::str::from_utf8(&self.input[start..self.pos])
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| "bad number".to_owned())
            }
            Some(b) if b.is_ascii_alphabetic() => {
                let start = self.pos;
                while self
                    .input
                    .get(self.pos)
                    .is_some_and(|b| b.is_ascii_alphabetic())
                {
                    self.pos += 1;
                }
                let name = std::str::from_utf8(&self.input[start..self.pos]).unwrap();
                self.skip_space();
                if self.input.get(self.pos) != Some(&b'(') {
                    return Err(format!("unknown symbol '{name}'"));
                }
                let arg = self.factor()?;
                match name {
                    "sqrt" => Ok(arg.sqrt()),
                    "sin" => Ok(arg.sin()),
                    "cos" => Ok(arg.cos()),
                    "exp" => Ok(arg.exp()),
                    _ => Err(format!("unknown function '{name}'")),
                }
            }
            _ => Err("expected a value".to_owned()),
        }
    }
}

fn eval(input: &str) -> Result<f64, String> {
    let mut parser = Parser {
        input: input.as_bytes(),
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_space();
    if parser.pos != parser.input.len() {
        return Err("trailing input".to_owned());
    }
    Ok(value)
}

fn main() -> rawline::Result<()> {
    env_logger::init();

    let mut editor = Editor::new("calc> ");
    editor.set_history_length(HistoryLimit::Capped(100));
    editor.set_palette(&[
        highlight::YELLOW,
        highlight::CYAN,
        highlight::GREEN,
        -1, // plain text keeps the default color
    ]);
    editor.set_highlighter(color_spans);
    editor.set_completer(complete);
    editor.set_multiline(MatchingBrackets, Some("....> "));

    println!("arithmetic calculator; 'quit' to leave");
    loop {
        let line = editor.read_line()?;
        if line == "quit" {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        // echo the committed expression with the same colors
        editor.display_with_syntax_coloring(&line)?;
        match eval(&line.replace('\n', " ")) {
            Ok(value) => println!(" = {value}"),
            Err(e) => println!(" error: {e}"),
        }
    }
    Ok(())
}
