//! This module implements and describes common TTY methods & traits

use crate::error::Result;

/// Byte-at-a-time input source feeding the key decoder.
///
/// Terminals deliver a POSIX-style byte stream; the Windows implementation
/// translates console key events into the same stream so the decoder only
/// ever sees one format.
pub trait ByteRead {
    /// Blocking read of a single byte; `None` on end of input.
    fn read_byte(&mut self) -> Result<Option<u8>>;
}

/// Unsupported terminals that don't support RAW mode
#[cfg(unix)]
const UNSUPPORTED_TERM: [&str; 3] = ["dumb", "cons25", "emacs"];

/// Check TERM environment variable to see if current term is in our
/// unsupported list
#[cfg(unix)]
fn is_unsupported_term() -> bool {
    match std::env::var("TERM") {
        Ok(term) => UNSUPPORTED_TERM
            .iter()
            .any(|iter| iter.eq_ignore_ascii_case(&term)),
        Err(_) => true,
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use self::unix::*;
    } else if #[cfg(windows)] {
        mod windows;
        pub use self::windows::*;
    }
}

#[cfg(test)]
pub mod test;

#[cfg(test)]
mod test_ {
    #[cfg(unix)]
    #[test]
    fn unsupported_term() {
        std::env::set_var("TERM", "xterm");
        assert!(!super::is_unsupported_term());

        std::env::set_var("TERM", "dumb");
        assert!(super::is_unsupported_term());
    }
}
