//! # lzmaviz LZMA
//!
//! An LZMA decoder that measures, for every byte it emits, how many bits of
//! range-coder information were spent producing it.
//!
//! Ordinary LZMA decoders throw this information away; here it is the whole
//! point. Alongside the decoded bytes the decoder returns a parallel "heat"
//! trace (bits of information per byte) and a literal/copy flag per byte,
//! which the lzmaviz CLI renders as a coloured map of where the entropy in
//! a compressed file actually lives.
//!
//! ## Usage
//!
//! ```ignore
//! let decoded = lzmaviz_lzma::decode_bytes(&stream)?;
//! for (byte, heat) in decoded.data.iter().zip(&decoded.heat) {
//!     println!("{byte:02x} cost {heat:.3} bits");
//! }
//! ```
//!
//! ## Stream format
//!
//! The input is a standalone LZMA1 (".lzma") stream:
//! 1. Properties byte (lc, lp, pb packed)
//! 2. Dictionary size (4 bytes, little-endian, raised to 4096)
//! 3. Unpacked size (8 bytes, little-endian; all ones = unknown, in which
//!    case the stream must end with the end marker)
//! 4. Range-coded payload (leading zero byte + 4 big-endian code bytes)
//!
//! Decoding either ends at the declared size with a clean range coder
//! ([`Termination::WithoutMarker`]), at the end marker
//! ([`Termination::WithMarker`]), or fails with an error. A corrupted-but-
//! decodable stream sets [`DecodedStream::corrupted`] instead of failing.
//!
//! The [`encoder`] module holds a greedy reference encoder used by the test
//! suite to generate streams; compression quality is explicitly not a goal.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod encoder;
pub mod model;
pub mod range_coder;

// Re-exports
pub use decoder::{DICT_SIZE_MIN, DecodedStream, LzmaDecoder, Termination};
pub use encoder::{LzmaEncoder, compress_sized, compress_with_marker};
pub use model::{LzmaModel, LzmaProperties, State};
pub use range_coder::{RangeDecoder, RangeEncoder};

use lzmaviz_core::{ByteSource, Result};
use std::io::Read;

/// Decode a full LZMA stream (header + payload) with heat tracing.
pub fn decode<R: Read>(reader: R) -> Result<DecodedStream> {
    LzmaDecoder::from_header(ByteSource::new(reader))?.decode()
}

/// Decode an in-memory LZMA stream.
///
/// Convenience wrapper around [`decode`].
pub fn decode_bytes(data: &[u8]) -> Result<DecodedStream> {
    decode(std::io::Cursor::new(data))
}
