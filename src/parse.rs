//! Byte stream to key event decoding.
//!
//! The decoder consumes the POSIX-style byte stream produced by the terminal
//! (or by the Windows input translation layer) one byte at a time: control
//! codes, bounded CSI escape sequences, Alt-prefixed characters and UTF-8
//! continuations all come through here.

use log::debug;
use utf8parse::{Parser, Receiver};

use crate::error::Result;
use crate::keys::{KeyCode as K, KeyEvent, Modifiers as M};
use crate::tty::ByteRead;

/// Escape sequences tend to be small; anything longer than this is not one
/// we recognize.
const ESC_SEQ_MAX: usize = 12;

/// Fixed CSI table; the byte strings omit the leading ESC.
static ESC_TABLE: [(&[u8], KeyEvent); 11] = [
    (b"[A", KeyEvent(K::Up, M::NONE)),
    (b"[B", KeyEvent(K::Down, M::NONE)),
    (b"[C", KeyEvent(K::Right, M::NONE)),
    (b"[D", KeyEvent(K::Left, M::NONE)),
    (b"[H", KeyEvent(K::Home, M::NONE)),
    (b"[F", KeyEvent(K::End, M::NONE)),
    (b"[Z", KeyEvent(K::BackTab, M::NONE)),
    (b"[5~", KeyEvent(K::PageUp, M::NONE)),
    (b"[6~", KeyEvent(K::PageDown, M::NONE)),
    (b"[1;2C", KeyEvent(K::Right, M::SHIFT)),
    (b"[1;2D", KeyEvent(K::Left, M::SHIFT)),
];

struct Utf8 {
    c: Option<char>,
    valid: bool,
}

impl Receiver for Utf8 {
    fn codepoint(&mut self, c: char) {
        self.c = Some(c);
    }

    fn invalid_sequence(&mut self) {
        self.c = None;
        self.valid = false;
    }
}

/// Finish decoding one UTF-8 character whose first byte has been read.
/// Returns `None` on EOF or an invalid sequence.
fn next_char<R: ByteRead>(rdr: &mut R, first: u8) -> Result<Option<char>> {
    let mut parser = Parser::new();
    let mut receiver = Utf8 {
        c: None,
        valid: true,
    };
    parser.advance(&mut receiver, first);
    loop {
        if !receiver.valid {
            return Ok(None);
        }
        if let Some(c) = receiver.c.take() {
            return Ok(Some(c));
        }
        let Some(b) = rdr.read_byte()? else {
            return Ok(None);
        };
        parser.advance(&mut receiver, b);
    }
}

fn escape_sequence<R: ByteRead>(rdr: &mut R) -> Result<KeyEvent> {
    let Some(b) = rdr.read_byte()? else {
        return Ok(KeyEvent::plain(K::Null));
    };
    if b != b'[' {
        // Alt + character
        return Ok(match next_char(rdr, b)? {
            Some(c) => KeyEvent::alt(c),
            None => KeyEvent::plain(K::Null),
        });
    }

    let mut seq = [0u8; ESC_SEQ_MAX];
    seq[0] = b'[';
    let mut len = 1;
    while len < ESC_SEQ_MAX {
        let Some(b) = rdr.read_byte()? else { break };
        seq[len] = b;
        len += 1;
        if b.is_ascii_alphabetic() || b == b'~' {
            break;
        }
    }

    for (bytes, key) in &ESC_TABLE {
        if *bytes == &seq[..len] {
            return Ok(*key);
        }
    }
    debug!(target: "rawline", "unsupported esc sequence: {:?}", &seq[..len]);
    Ok(KeyEvent::plain(K::UnknownEscSeq))
}

/// Blocking read of the next key press; `None` on end of input.
pub fn next_key<R: ByteRead>(rdr: &mut R) -> Result<Option<KeyEvent>> {
    let Some(b) = rdr.read_byte()? else {
        return Ok(None);
    };
    let key = match b {
        0x09 => KeyEvent::plain(K::Tab),
        0x0A => KeyEvent(K::Enter, M::CTRL), // Ctrl-Return inserts a newline
        0x0D => KeyEvent::plain(K::Enter),
        0x08 | 0x7F => KeyEvent::plain(K::Backspace),
        0x1B => escape_sequence(rdr)?,
        0x01..=0x1A => KeyEvent::ctrl((b'A' + (b - 1)) as char),
        0x00..=0x1F => KeyEvent::plain(K::Null),
        0x20..=0x7F => KeyEvent::from(b as char),
        _ => match next_char(rdr, b)? {
            Some(c) => KeyEvent::from(c),
            None => KeyEvent::plain(K::Null),
        },
    };
    debug!(target: "rawline", "key: {key:?}");
    Ok(Some(key))
}

#[cfg(test)]
mod test {
    use super::next_key;
    use crate::keys::{KeyCode as K, KeyEvent, Modifiers as M};
    use crate::tty::test::SliceReader;

    fn keys(bytes: &[u8]) -> Vec<KeyEvent> {
        let mut rdr = SliceReader::new(bytes);
        let mut out = Vec::new();
        while let Some(key) = next_key(&mut rdr).unwrap() {
            out.push(key);
        }
        out
    }

    #[test]
    fn eof_yields_none() {
        assert!(keys(b"").is_empty());
    }

    #[test]
    fn plain_characters() {
        assert_eq!(vec![KeyEvent::from('a'), KeyEvent::from(' ')], keys(b"a "));
    }

    #[test]
    fn control_bytes() {
        assert_eq!(vec![KeyEvent::plain(K::Tab)], keys(b"\t"));
        assert_eq!(vec![KeyEvent::plain(K::Enter)], keys(b"\r"));
        assert_eq!(vec![KeyEvent(K::Enter, M::CTRL)], keys(b"\n"));
        assert_eq!(vec![KeyEvent::plain(K::Backspace)], keys(b"\x08"));
        assert_eq!(vec![KeyEvent::plain(K::Backspace)], keys(b"\x7f"));
        assert_eq!(vec![KeyEvent::ctrl('A')], keys(b"\x01"));
        assert_eq!(vec![KeyEvent::ctrl('Z')], keys(b"\x1a"));
        assert_eq!(vec![KeyEvent::plain(K::Null)], keys(b"\x1c"));
    }

    #[test]
    fn csi_sequences() {
        assert_eq!(vec![KeyEvent::plain(K::Up)], keys(b"\x1b[A"));
        assert_eq!(vec![KeyEvent::plain(K::Down)], keys(b"\x1b[B"));
        assert_eq!(vec![KeyEvent::plain(K::Right)], keys(b"\x1b[C"));
        assert_eq!(vec![KeyEvent::plain(K::Left)], keys(b"\x1b[D"));
        assert_eq!(vec![KeyEvent::plain(K::Home)], keys(b"\x1b[H"));
        assert_eq!(vec![KeyEvent::plain(K::End)], keys(b"\x1b[F"));
        assert_eq!(vec![KeyEvent::plain(K::BackTab)], keys(b"\x1b[Z"));
        assert_eq!(vec![KeyEvent::plain(K::PageUp)], keys(b"\x1b[5~"));
        assert_eq!(vec![KeyEvent::plain(K::PageDown)], keys(b"\x1b[6~"));
        assert_eq!(vec![KeyEvent(K::Right, M::SHIFT)], keys(b"\x1b[1;2C"));
        assert_eq!(vec![KeyEvent(K::Left, M::SHIFT)], keys(b"\x1b[1;2D"));
    }

    #[test]
    fn unknown_csi() {
        use assert_matches::assert_matches;
        assert_matches!(keys(b"\x1b[9~").as_slice(), [KeyEvent(K::UnknownEscSeq, _)]);
        assert_matches!(keys(b"\x1b[1;5C").as_slice(), [KeyEvent(K::UnknownEscSeq, _)]);
    }

    #[test]
    fn alt_characters() {
        assert_eq!(vec![KeyEvent::alt('w')], keys(b"\x1bw"));
        assert_eq!(vec![KeyEvent::alt('é')], keys("\x1bé".as_bytes()));
    }

    #[test]
    fn utf8_characters() {
        assert_eq!(vec![KeyEvent::from('α')], keys("α".as_bytes()));
        assert_eq!(vec![KeyEvent::from('👍')], keys("👍".as_bytes()));
        assert_eq!(
            vec![KeyEvent::from('中'), KeyEvent::from('x')],
            keys("中x".as_bytes())
        );
    }

    #[test]
    fn invalid_utf8_is_null() {
        assert_eq!(vec![KeyEvent::plain(K::Null)], keys(b"\xC3\x28"));
    }

    #[test]
    fn truncated_escape_at_eof() {
        assert_eq!(vec![KeyEvent::plain(K::Null)], keys(b"\x1b"));
        assert_eq!(vec![KeyEvent::plain(K::UnknownEscSeq)], keys(b"\x1b["));
    }
}
