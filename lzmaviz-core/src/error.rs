//! Error types for lzmaviz operations.
//!
//! Every failure the decoder can hit is represented here. Errors are always
//! propagated to the caller; the decoder never recovers internally. Stream
//! corruption detected by the range coder is *not* an error; it is a soft
//! warning carried on the decode result, because a corrupted stream may
//! still decode up to a legitimate end marker.

use std::io;
use thiserror::Error;

/// The main error type for lzmaviz operations.
#[derive(Debug, Error)]
pub enum LzmaVizError {
    /// I/O error from the underlying reader.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input stream ended in the middle of a read.
    #[error("Unexpected end of stream: expected {expected} more byte(s)")]
    UnexpectedEof {
        /// Number of bytes that were expected but not available.
        expected: usize,
    },

    /// Properties byte does not encode a valid (lc, lp, pb) triple.
    #[error("Invalid LZMA properties byte: {byte:#04x}")]
    InvalidProperties {
        /// The offending properties byte.
        byte: u8,
    },

    /// The mandatory zero byte opening the range-coded payload is non-zero.
    #[error("Invalid range coder start byte: {byte:#04x} (expected 0x00)")]
    InvalidStreamStart {
        /// The byte found where 0x00 was required.
        byte: u8,
    },

    /// The stream encodes more bytes than the declared unpacked size.
    #[error("Output overflow: stream encodes more than the declared {declared} byte(s)")]
    OutputOverflow {
        /// Unpacked size declared in the stream header.
        declared: u64,
    },

    /// Back-reference distance outside the decoded history.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    InvalidDistance {
        /// The invalid distance value (1-based byte distance).
        distance: u64,
        /// Number of bytes available to reference.
        history_size: u64,
    },

    /// A repeat match was issued before any byte was decoded.
    #[error("Repeat match before any output byte")]
    MatchBeforeOutput,

    /// End marker reached while the range coder still holds undecoded state.
    #[error("End marker reached with nonzero range coder state")]
    EndMarkerCorrupted,
}

/// Result type alias for lzmaviz operations.
pub type Result<T> = std::result::Result<T, LzmaVizError>;

impl LzmaVizError {
    /// Create an unexpected EOF error.
    pub fn unexpected_eof(expected: usize) -> Self {
        Self::UnexpectedEof { expected }
    }

    /// Create an invalid properties error.
    pub fn invalid_properties(byte: u8) -> Self {
        Self::InvalidProperties { byte }
    }

    /// Create an invalid stream start error.
    pub fn invalid_stream_start(byte: u8) -> Self {
        Self::InvalidStreamStart { byte }
    }

    /// Create an output overflow error.
    pub fn output_overflow(declared: u64) -> Self {
        Self::OutputOverflow { declared }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: u64, history_size: u64) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LzmaVizError::invalid_properties(0xE1);
        assert!(err.to_string().contains("0xe1"));

        let err = LzmaVizError::invalid_distance(5000, 12);
        assert!(err.to_string().contains("5000"));
        assert!(err.to_string().contains("12"));

        let err = LzmaVizError::unexpected_eof(4);
        assert!(err.to_string().contains("4 more byte"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: LzmaVizError = io_err.into();
        assert!(matches!(err, LzmaVizError::Io(_)));
    }
}
