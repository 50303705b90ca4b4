//! Counting byte source for decoder input.
//!
//! The LZMA range coder consumes its input strictly one byte at a time, with
//! no lookahead. [`ByteSource`] wraps any [`Read`] implementor with exactly
//! that contract and keeps a running count of consumed bytes so a truncation
//! can be reported with a precise offset.

use crate::error::{LzmaVizError, Result};
use std::io::{self, Read};

/// One-byte-at-a-time pull source over an underlying reader.
#[derive(Debug)]
pub struct ByteSource<R> {
    inner: R,
    processed: u64,
}

impl<R: Read> ByteSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            processed: 0,
        }
    }

    /// Read the next byte.
    ///
    /// Exhaustion of the underlying reader is an error: a well-formed LZMA
    /// stream always terminates from within (end marker or declared size),
    /// never by running out of input.
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => {
                self.processed += 1;
                Ok(buf[0])
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(LzmaVizError::unexpected_eof(1))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Total number of bytes consumed so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_and_count() {
        let mut src = ByteSource::new(Cursor::new(vec![0xAB, 0xCD]));
        assert_eq!(src.processed(), 0);
        assert_eq!(src.read_byte().unwrap(), 0xAB);
        assert_eq!(src.read_byte().unwrap(), 0xCD);
        assert_eq!(src.processed(), 2);
    }

    #[test]
    fn test_eof_is_an_error() {
        let mut src = ByteSource::new(Cursor::new(vec![0x01]));
        assert_eq!(src.read_byte().unwrap(), 0x01);
        assert!(matches!(
            src.read_byte(),
            Err(LzmaVizError::UnexpectedEof { expected: 1 })
        ));
        // The failed read does not count as consumed.
        assert_eq!(src.processed(), 1);
    }
}
