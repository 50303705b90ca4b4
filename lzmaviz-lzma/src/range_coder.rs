//! Range coder for LZMA streams.
//!
//! The range coder is an entropy coder in the arithmetic-coding family,
//! using:
//! - 32-bit `range`/`code` registers
//! - renormalisation whenever `range` drops below 2^24
//! - an 11-bit adaptive probability model (1024 = 50%)
//!
//! The decoder additionally meters the information content of everything it
//! decodes: each modelled bit contributes `-log2(P(bit))` bits and each
//! direct bit contributes exactly 1 bit to a running accumulator, which the
//! LZMA decoder drains at packet boundaries to attribute a cost to every
//! output byte.

use lzmaviz_core::{ByteSource, LzmaVizError, Result};
use std::io::Read;

/// Number of bits in the probability model.
pub const PROB_BITS: u32 = 11;

/// Initial probability (50%).
pub const PROB_INIT: u16 = 1 << (PROB_BITS - 1);

/// Probability denominator.
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Adaptation shift: each update moves a cell 1/32 of the way.
pub const MOVE_BITS: u32 = 5;

/// Renormalisation threshold.
const TOP_VALUE: u32 = 1 << 24;

/// Range decoder with per-bit information-cost metering.
#[derive(Debug)]
pub struct RangeDecoder<R> {
    source: ByteSource<R>,
    range: u32,
    code: u32,
    corrupted: bool,
    perplexity: f32,
}

impl<R: Read> RangeDecoder<R> {
    /// Initialise from a byte source positioned at the range-coded payload.
    ///
    /// Consumes the mandatory zero byte and the four big-endian bytes that
    /// seed `code`. A non-zero first byte means this is not a valid LZMA
    /// payload; `code == range` at this point is the soft corruption
    /// signal.
    pub fn new(mut source: ByteSource<R>) -> Result<Self> {
        let first = source.read_byte()?;
        if first != 0 {
            return Err(LzmaVizError::invalid_stream_start(first));
        }

        let mut code = 0u32;
        for _ in 0..4 {
            code = (code << 8) | u32::from(source.read_byte()?);
        }

        let range = 0xFFFF_FFFF;
        Ok(Self {
            source,
            range,
            code,
            corrupted: code == range,
            perplexity: 0.0,
        })
    }

    /// Refill `code` whenever `range` has lost a byte of precision.
    ///
    /// Called at the end of every bit step, keeping `range >= 2^24`
    /// between operations.
    fn normalize(&mut self) -> Result<()> {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.code = (self.code << 8) | u32::from(self.source.read_byte()?);
        }
        Ok(())
    }

    /// Decode a single bit against an adaptive probability cell.
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        let v = u32::from(*prob);
        let bound = (self.range >> PROB_BITS) * v;

        let bit = if self.code < bound {
            self.perplexity -= (v as f32 / PROB_MAX as f32).log2();
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
            self.range = bound;
            0
        } else {
            self.perplexity -= (1.0 - v as f32 / PROB_MAX as f32).log2();
            *prob -= *prob >> MOVE_BITS;
            self.code -= bound;
            self.range -= bound;
            1
        };

        if self.code == self.range {
            self.corrupted = true;
        }
        self.normalize()?;
        Ok(bit)
    }

    /// Decode `count` bits with fixed 50% probability.
    pub fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        self.perplexity += count as f32;

        let mut result = 0u32;
        for _ in 0..count {
            self.range >>= 1;
            self.code = self.code.wrapping_sub(self.range);
            // t is all-ones when the subtraction went negative (bit = 0).
            let t = 0u32.wrapping_sub(self.code >> 31);
            self.code = self.code.wrapping_add(self.range & t);

            if self.code == self.range {
                self.corrupted = true;
            }
            self.normalize()?;
            result = (result << 1) | t.wrapping_add(1);
        }
        Ok(result)
    }

    /// Decode a bit tree front-to-back. `probs[0]` is unused.
    pub fn decode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32) -> Result<u32> {
        let mut m = 1usize;
        for _ in 0..num_bits {
            let bit = self.decode_bit(&mut probs[m])?;
            m = (m << 1) | bit as usize;
        }
        Ok((m as u32) - (1 << num_bits))
    }

    /// Decode a bit tree in reverse bit order. `probs[0]` is unused.
    ///
    /// Takes a caller-selected slice so runtime-offset tables (the shared
    /// special-distance table) can be decoded without pointer arithmetic.
    pub fn decode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32) -> Result<u32> {
        let mut result = 0u32;
        let mut m = 1usize;
        for i in 0..num_bits {
            let bit = self.decode_bit(&mut probs[m])?;
            m = (m << 1) | bit as usize;
            result |= bit << i;
        }
        Ok(result)
    }

    /// True once a corruption hint has been seen. Decoding continues past
    /// corruption because the stream may still reach a valid end marker.
    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// True iff the coder is in the cleanly-finished state.
    pub fn is_finished_ok(&self) -> bool {
        self.code == 0
    }

    /// Drain the information cost (in bits) accumulated since the last
    /// call.
    pub fn take_perplexity(&mut self) -> f32 {
        std::mem::take(&mut self.perplexity)
    }

    /// Total bytes pulled from the input, including header-free payload.
    pub fn processed(&self) -> u64 {
        self.source.processed()
    }
}

/// Range encoder, the inverse of [`RangeDecoder`].
///
/// Kept as the entropy stage of the reference encoder that the test suite
/// uses to generate well-formed streams.
#[derive(Debug)]
pub struct RangeEncoder {
    buffer: Vec<u8>,
    range: u32,
    low: u64,
    cache: u8,
    cache_size: u64,
}

impl RangeEncoder {
    /// Create a new range encoder.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            range: 0xFFFF_FFFF,
            low: 0,
            cache: 0,
            cache_size: 1,
        }
    }

    /// Emit the top byte of `low`, propagating any pending carry.
    ///
    /// `low` is kept in 40 bits; bit 32 is the carry into the bytes already
    /// cached. The initial cache byte is the leading zero the decoder
    /// expects.
    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let mut tmp = self.cache;
            let carry = (self.low >> 32) as u8;

            loop {
                self.buffer.push(tmp.wrapping_add(carry));
                tmp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }

            self.cache = (self.low >> 24) as u8;
        }

        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    fn normalize(&mut self) {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encode a single bit against an adaptive probability cell.
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * u32::from(*prob);

        if bit == 0 {
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
            self.range = bound;
        } else {
            *prob -= *prob >> MOVE_BITS;
            self.low += u64::from(bound);
            self.range -= bound;
        }

        self.normalize();
    }

    /// Encode a bit with fixed 50% probability.
    pub fn encode_direct_bit(&mut self, bit: u32) {
        self.range >>= 1;
        if bit != 0 {
            self.low += u64::from(self.range);
        }
        self.normalize();
    }

    /// Encode `count` bits of `value` with fixed probability, MSB first.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.encode_direct_bit((value >> i) & 1);
        }
    }

    /// Encode a bit tree front-to-back. `probs[0]` is unused.
    pub fn encode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut m = 1usize;
        for i in (0..num_bits).rev() {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[m], bit);
            m = (m << 1) | bit as usize;
        }
    }

    /// Encode a bit tree in reverse bit order. `probs[0]` is unused.
    pub fn encode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut m = 1usize;
        for i in 0..num_bits {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[m], bit);
            m = (m << 1) | bit as usize;
        }
    }

    /// Flush the remaining 5 bytes of `low` and return the payload.
    ///
    /// Flushing emits the exact code point at the bottom of the final
    /// interval, which is what lets a decoder of a sized (markerless)
    /// stream observe `code == 0` at the final packet boundary.
    pub fn finish(mut self) -> Vec<u8> {
        for _ in 0..5 {
            self.shift_low();
        }
        self.buffer
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decoder_for(data: Vec<u8>) -> RangeDecoder<Cursor<Vec<u8>>> {
        RangeDecoder::new(ByteSource::new(Cursor::new(data))).unwrap()
    }

    #[test]
    fn test_prob_constants() {
        assert_eq!(PROB_INIT, 1024);
        assert_eq!(PROB_MAX, 2048);
    }

    #[test]
    fn test_rejects_nonzero_start_byte() {
        let result = RangeDecoder::new(ByteSource::new(Cursor::new(vec![1, 0, 0, 0, 0])));
        assert!(matches!(
            result,
            Err(LzmaVizError::InvalidStreamStart { byte: 1 })
        ));
    }

    #[test]
    fn test_init_corruption_hint() {
        let dec = decoder_for(vec![0, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(dec.is_corrupted());

        let dec = decoder_for(vec![0, 0, 0, 0, 0]);
        assert!(!dec.is_corrupted());
        assert!(dec.is_finished_ok());
    }

    #[test]
    fn test_encode_decode_bits() {
        let mut enc = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for bit in [0, 1, 0, 1, 1, 0] {
            enc.encode_bit(&mut prob, bit);
        }
        let encoded = enc.finish();

        // The encoder's cache mechanism already emits the leading zero.
        let mut dec = decoder_for(encoded);
        let mut prob = PROB_INIT;
        for expected in [0, 1, 0, 1, 1, 0] {
            assert_eq!(dec.decode_bit(&mut prob).unwrap(), expected);
        }
    }

    #[test]
    fn test_direct_bits_round_trip() {
        let mut enc = RangeEncoder::new();
        enc.encode_direct_bits(0x2A5, 10);
        enc.encode_direct_bits(3, 2);
        let encoded = enc.finish();

        let mut dec = decoder_for(encoded);
        assert_eq!(dec.decode_direct_bits(10).unwrap(), 0x2A5);
        assert_eq!(dec.decode_direct_bits(2).unwrap(), 3);
        // Ten plus two coin flips cost exactly twelve bits.
        assert!((dec.take_perplexity() - 12.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_bit_tree_round_trip() {
        for value in 0..16u32 {
            let mut enc = RangeEncoder::new();
            let mut enc_probs = [PROB_INIT; 16];
            enc.encode_bit_tree(&mut enc_probs, 4, value);
            let encoded = enc.finish();

            let mut dec = decoder_for(encoded);
            let mut dec_probs = [PROB_INIT; 16];
            assert_eq!(dec.decode_bit_tree(&mut dec_probs, 4).unwrap(), value);
            assert_eq!(dec_probs, enc_probs);
        }
    }

    #[test]
    fn test_reverse_bit_tree_round_trip() {
        for value in 0..16u32 {
            let mut enc = RangeEncoder::new();
            let mut enc_probs = [PROB_INIT; 16];
            enc.encode_bit_tree_reverse(&mut enc_probs, 4, value);
            let encoded = enc.finish();

            let mut dec = decoder_for(encoded);
            let mut dec_probs = [PROB_INIT; 16];
            assert_eq!(
                dec.decode_bit_tree_reverse(&mut dec_probs, 4).unwrap(),
                value
            );
        }
    }

    #[test]
    fn test_perplexity_of_even_bit() {
        let mut enc = RangeEncoder::new();
        let mut prob = PROB_INIT;
        enc.encode_bit(&mut prob, 0);
        let encoded = enc.finish();

        let mut dec = decoder_for(encoded);
        let mut prob = PROB_INIT;
        dec.decode_bit(&mut prob).unwrap();
        // A 50% bit carries exactly one bit of information.
        assert!((dec.take_perplexity() - 1.0).abs() < 1e-6);
        // Draining resets the accumulator.
        assert_eq!(dec.take_perplexity(), 0.0);
    }

    #[test]
    fn test_adaptive_update_stays_in_range() {
        // Property: cells never reach 0 or 2048 under the 1/32-move rule.
        let mut p = PROB_INIT;
        for _ in 0..10_000 {
            p += (PROB_MAX - p) >> MOVE_BITS;
            assert!((1..PROB_MAX).contains(&p));
        }
        for _ in 0..10_000 {
            p -= p >> MOVE_BITS;
            assert!((1..PROB_MAX).contains(&p));
        }
    }

    #[test]
    fn test_truncated_stream_reports_eof() {
        let mut enc = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for _ in 0..64 {
            enc.encode_bit(&mut prob, 1);
        }
        let mut encoded = enc.finish();
        encoded.truncate(3);

        let result = RangeDecoder::new(ByteSource::new(Cursor::new(encoded)));
        assert!(matches!(result, Err(LzmaVizError::UnexpectedEof { .. })));
    }
}
