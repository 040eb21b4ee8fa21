//! Scripted input for tests.

use super::ByteRead;
use crate::error::Result;

/// Replays a fixed byte sequence, then reports end of input.
pub struct SliceReader {
    bytes: Vec<u8>,
    pos: usize,
}

impl SliceReader {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            pos: 0,
        }
    }
}

impl ByteRead for SliceReader {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let b = self.bytes.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        Ok(b)
    }
}
