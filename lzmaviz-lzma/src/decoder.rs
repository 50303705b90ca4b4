//! LZMA decoding with per-byte information-cost tracing.
//!
//! The decoder runs the LZMA packet state machine to completion, and for
//! every output byte records how many bits of range-coder information were
//! spent producing it (its "heat") and whether it came from a literal or a
//! match copy. A literal carries its own bit cost; a match packet's total
//! cost (packet-type prefix + length code + distance code) is spread
//! uniformly over the bytes it emits.

use crate::model::{
    DIST_ALIGN_BITS, DIST_SLOT_BITS, DIST_STATES, END_POS_MODEL_INDEX, LEN_HIGH_BITS, LEN_LOW_BITS,
    LEN_MID_BITS, LengthModel, LzmaModel, LzmaProperties, MATCH_LEN_MIN, State,
};
use crate::range_coder::RangeDecoder;
use lzmaviz_core::{ByteSource, LzmaVizError, OutputWindow, Result};
use std::io::Read;

/// Smallest dictionary the format allows; smaller header values are raised.
pub const DICT_SIZE_MIN: u32 = 1 << 12;

/// On-wire distance value that terminates the stream.
const END_MARKER_DIST: u32 = 0xFFFF_FFFF;

/// How a successful decode run reached its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The stream ended with an explicit end marker.
    WithMarker,
    /// The declared unpacked size was reached with a clean range coder.
    WithoutMarker,
}

/// Product of a traced decode run.
///
/// The three vectors are parallel: `heat[i]` and `literals[i]` describe
/// `data[i]`.
#[derive(Debug, Clone)]
pub struct DecodedStream {
    /// The decoded bytes.
    pub data: Vec<u8>,
    /// Bits of range-coder information attributed to each byte.
    pub heat: Vec<f32>,
    /// True where the byte came from a literal packet, false for copies.
    pub literals: Vec<bool>,
    /// How the stream terminated.
    pub termination: Termination,
    /// Soft corruption warning from the range coder; the output is still
    /// complete up to the terminator.
    pub corrupted: bool,
}

impl DecodedStream {
    /// Maximum heat over the trace, for normalising a colour scale.
    pub fn max_heat(&self) -> f32 {
        self.heat.iter().copied().fold(0.0, f32::max)
    }
}

/// Decode a match length. Returns the raw 0..=271 code, i.e. the length
/// minus [`MATCH_LEN_MIN`]; the caller adds the minimum after distance
/// decoding because the distance context is selected by the raw value.
fn decode_length<R: Read>(
    rc: &mut RangeDecoder<R>,
    len_model: &mut LengthModel,
    pos_state: usize,
) -> Result<usize> {
    if rc.decode_bit(&mut len_model.choice)? == 0 {
        Ok(rc.decode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS)? as usize)
    } else if rc.decode_bit(&mut len_model.choice2)? == 0 {
        Ok(8 + rc.decode_bit_tree(&mut len_model.mid[pos_state], LEN_MID_BITS)? as usize)
    } else {
        Ok(16 + rc.decode_bit_tree(&mut len_model.high, LEN_HIGH_BITS)? as usize)
    }
}

/// LZMA decoder with heat tracing.
pub struct LzmaDecoder<R> {
    rc: RangeDecoder<R>,
    model: LzmaModel,
    window: OutputWindow,
    dict_size: u32,
    /// Declared bytes left to produce; `None` when the header size is
    /// undefined (end marker mandatory).
    remaining: Option<u64>,
    declared_size: u64,
    state: State,
    rep: [u32; 4],
    heat: Vec<f32>,
    literals: Vec<bool>,
}

impl<R: Read> LzmaDecoder<R> {
    /// Read the 13-byte header and initialise the range coder.
    ///
    /// Header layout: properties byte, dictionary size (u32 LE, raised to
    /// [`DICT_SIZE_MIN`]), unpacked size (u64 LE, all-ones meaning
    /// undefined).
    pub fn from_header(mut source: ByteSource<R>) -> Result<Self> {
        let props_byte = source.read_byte()?;
        let props = LzmaProperties::from_byte(props_byte)
            .ok_or(LzmaVizError::invalid_properties(props_byte))?;

        let mut dict_size = 0u32;
        for i in 0..4 {
            dict_size |= u32::from(source.read_byte()?) << (8 * i);
        }
        let dict_size = dict_size.max(DICT_SIZE_MIN);

        let mut declared_size = 0u64;
        for i in 0..8 {
            declared_size |= u64::from(source.read_byte()?) << (8 * i);
        }
        let remaining = (declared_size != u64::MAX).then_some(declared_size);

        log::debug!(
            "header: lc={} lp={} pb={} dict_size={} unpacked={:?}",
            props.lc,
            props.lp,
            props.pb,
            dict_size,
            remaining
        );

        let rc = RangeDecoder::new(source)?;

        Ok(Self {
            rc,
            model: LzmaModel::new(props),
            window: OutputWindow::new(dict_size as usize),
            dict_size,
            remaining,
            declared_size,
            state: State::new(),
            rep: [0; 4],
            heat: Vec::new(),
            literals: Vec::new(),
        })
    }

    /// Attribute the cost accumulated since the last packet boundary to
    /// `len` freshly emitted bytes.
    fn push_trace(&mut self, len: usize, literal: bool) {
        let per_byte = self.rc.take_perplexity() / len as f32;
        for _ in 0..len {
            self.heat.push(per_byte);
            self.literals.push(literal);
        }
    }

    fn consume(&mut self, len: usize) {
        if let Some(remaining) = &mut self.remaining {
            *remaining -= len as u64;
        }
    }

    fn overflow(&self) -> LzmaVizError {
        LzmaVizError::output_overflow(self.declared_size)
    }

    fn finish(self, termination: Termination) -> DecodedStream {
        log::debug!(
            "decoded {} byte(s), {:?}, {} input byte(s)",
            self.window.len(),
            termination,
            self.rc.processed()
        );
        DecodedStream {
            corrupted: self.rc.is_corrupted(),
            data: self.window.into_output(),
            heat: self.heat,
            literals: self.literals,
            termination,
        }
    }

    /// Run the packet loop to completion.
    pub fn decode(mut self) -> Result<DecodedStream> {
        loop {
            if self.remaining == Some(0) && self.rc.is_finished_ok() {
                return Ok(self.finish(Termination::WithoutMarker));
            }

            let pos_state =
                (self.window.total_pos() & ((1 << self.model.props.pb) - 1)) as usize;
            let state_idx = self.state.value();

            // Literal
            if self.rc.decode_bit(&mut self.model.is_match[state_idx][pos_state])? == 0 {
                if self.remaining == Some(0) {
                    return Err(self.overflow());
                }
                let byte = self.decode_literal()?;
                self.window.put_byte(byte);
                self.push_trace(1, true);
                self.state.update_literal();
                self.consume(1);
                continue;
            }

            // Raw length code; MATCH_LEN_MIN is added after distance decoding.
            let len;

            if self.rc.decode_bit(&mut self.model.is_rep[state_idx])? != 0 {
                // Repeat one of the last four distances.
                if self.remaining == Some(0) {
                    return Err(self.overflow());
                }
                if self.window.is_empty() {
                    return Err(LzmaVizError::MatchBeforeOutput);
                }

                if self.rc.decode_bit(&mut self.model.is_rep_g0[state_idx])? == 0 {
                    if self
                        .rc
                        .decode_bit(&mut self.model.is_rep0_long[state_idx][pos_state])?
                        == 0
                    {
                        // Short rep: a single byte at the current rep0.
                        self.state.update_short_rep();
                        let byte = self.window.get_byte(self.rep[0] + 1);
                        self.window.put_byte(byte);
                        self.push_trace(1, false);
                        self.consume(1);
                        continue;
                    }
                } else {
                    // Move the chosen older distance to the front.
                    let dist;
                    if self.rc.decode_bit(&mut self.model.is_rep_g1[state_idx])? == 0 {
                        dist = self.rep[1];
                    } else {
                        if self.rc.decode_bit(&mut self.model.is_rep_g2[state_idx])? == 0 {
                            dist = self.rep[2];
                        } else {
                            dist = self.rep[3];
                            self.rep[3] = self.rep[2];
                        }
                        self.rep[2] = self.rep[1];
                    }
                    self.rep[1] = self.rep[0];
                    self.rep[0] = dist;
                }

                len = decode_length(&mut self.rc, &mut self.model.rep_len, pos_state)?;
                self.state.update_long_rep();
            } else {
                // Match with a freshly coded distance.
                self.rep[3] = self.rep[2];
                self.rep[2] = self.rep[1];
                self.rep[1] = self.rep[0];

                len = decode_length(&mut self.rc, &mut self.model.match_len, pos_state)?;
                self.state.update_match();
                self.rep[0] = self.decode_distance(len)?;

                if self.rep[0] == END_MARKER_DIST {
                    return if self.rc.is_finished_ok() {
                        Ok(self.finish(Termination::WithMarker))
                    } else {
                        Err(LzmaVizError::EndMarkerCorrupted)
                    };
                }
                if self.remaining == Some(0) {
                    return Err(self.overflow());
                }
                if self.rep[0] >= self.dict_size || !self.window.check_distance(self.rep[0] + 1)
                {
                    return Err(LzmaVizError::invalid_distance(
                        u64::from(self.rep[0]) + 1,
                        self.window.total_pos().min(u64::from(self.dict_size)),
                    ));
                }
            }

            let mut len = len + MATCH_LEN_MIN;
            let mut overran = false;
            if let Some(remaining) = self.remaining {
                if remaining < len as u64 {
                    // Emit what the declared size still allows, then fail.
                    len = remaining as usize;
                    overran = true;
                }
            }

            self.window.copy_match(self.rep[0] + 1, len);
            self.push_trace(len, false);
            self.consume(len);
            if overran {
                return Err(self.overflow());
            }
        }
    }

    fn decode_literal(&mut self) -> Result<u8> {
        let props = self.model.props;
        let prev_byte = if self.window.is_empty() {
            0
        } else {
            self.window.get_byte(1)
        };
        let lit_state =
            self.model
                .literal
                .context(self.window.total_pos(), prev_byte, props.lc, props.lp);

        let mut symbol = 1usize;
        let with_match_byte = !self.state.is_literal();
        let mut match_byte = if with_match_byte {
            u32::from(self.window.get_byte(self.rep[0] + 1))
        } else {
            0
        };

        let probs = &mut self.model.literal.probs[lit_state];

        if with_match_byte {
            // After a match, the byte at rep0 predicts this one bit by bit
            // until the first mismatch.
            while symbol < 0x100 {
                let match_bit = ((match_byte >> 7) & 1) as usize;
                match_byte <<= 1;
                let bit = self
                    .rc
                    .decode_bit(&mut probs[((1 + match_bit) << 8) + symbol])?
                    as usize;
                symbol = (symbol << 1) | bit;
                if match_bit != bit {
                    break;
                }
            }
        }

        while symbol < 0x100 {
            symbol = (symbol << 1) | self.rc.decode_bit(&mut probs[symbol])? as usize;
        }

        Ok((symbol - 0x100) as u8)
    }

    /// Decode a match distance. `len` is the raw length code (pre-+2).
    fn decode_distance(&mut self, len: usize) -> Result<u32> {
        let len_state = len.min(DIST_STATES - 1);

        let pos_slot = self
            .rc
            .decode_bit_tree(&mut self.model.distance.slot[len_state], DIST_SLOT_BITS)?
            as usize;
        if pos_slot < 4 {
            return Ok(pos_slot as u32);
        }

        let num_direct_bits = (pos_slot as u32 >> 1) - 1;
        let mut dist = (2 | (pos_slot as u32 & 1)) << num_direct_bits;

        if pos_slot < END_POS_MODEL_INDEX {
            // Low slots share one adaptive table, addressed relative to the
            // slot's distance base.
            let offset = dist as usize - pos_slot;
            dist += self.rc.decode_bit_tree_reverse(
                &mut self.model.distance.special[offset..],
                num_direct_bits,
            )?;
        } else {
            dist += self
                .rc
                .decode_direct_bits(num_direct_bits - DIST_ALIGN_BITS)?
                << DIST_ALIGN_BITS;
            dist += self
                .rc
                .decode_bit_tree_reverse(&mut self.model.distance.align, DIST_ALIGN_BITS)?;
        }

        Ok(dist)
    }
}
