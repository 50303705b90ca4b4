//! Reference LZMA encoder.
//!
//! Production-grade compression is out of scope for this project; this
//! greedy encoder exists so the test suite can round-trip arbitrary data
//! through the traced decoder and exercise every packet kind the decoder
//! knows (literals, matched literals, new-distance matches, all four rep
//! slots, short reps, and both termination styles).

use crate::model::{
    DIST_ALIGN_BITS, DIST_SLOT_BITS, DIST_STATES, END_POS_MODEL_INDEX, LEN_HIGH_BITS, LEN_LOW_BITS,
    LEN_MID_BITS, LengthModel, LzmaModel, LzmaProperties, MATCH_LEN_MIN, State,
};
use crate::range_coder::RangeEncoder;

/// Maximum match length expressible by the length code.
const MATCH_LEN_MAX: usize = 273;

/// Hash table size for the match finder (64K entries).
const HASH_SIZE: usize = 1 << 16;

/// How many chain links the greedy matcher follows per position.
const CHAIN_DEPTH: usize = 128;

/// Encode a match length. `len` is the real length (>= MATCH_LEN_MIN).
fn encode_length(rc: &mut RangeEncoder, len_model: &mut LengthModel, len: usize, pos_state: usize) {
    let code = (len - MATCH_LEN_MIN) as u32;

    if code < (1 << LEN_LOW_BITS) {
        rc.encode_bit(&mut len_model.choice, 0);
        rc.encode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS, code);
    } else if code < (1 << LEN_LOW_BITS) + (1 << LEN_MID_BITS) {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 0);
        rc.encode_bit_tree(
            &mut len_model.mid[pos_state],
            LEN_MID_BITS,
            code - (1 << LEN_LOW_BITS),
        );
    } else {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 1);
        rc.encode_bit_tree(
            &mut len_model.high,
            LEN_HIGH_BITS,
            code - (1 << LEN_LOW_BITS) - (1 << LEN_MID_BITS),
        );
    }
}

/// Distance slot for an on-wire distance value.
fn dist_slot(dist: u32) -> u32 {
    if dist < 4 {
        return dist;
    }
    let bits = 32 - dist.leading_zeros();
    ((bits - 1) << 1) | ((dist >> (bits - 2)) & 1)
}

/// Greedy LZMA encoder.
pub struct LzmaEncoder {
    rc: RangeEncoder,
    model: LzmaModel,
    dict_size: u32,
    state: State,
    rep: [u32; 4],
    /// Head of the hash chain per 3-byte hash.
    hash_head: Vec<u32>,
    /// Previous position with the same hash, per position.
    hash_chain: Vec<u32>,
    bytes_encoded: u64,
}

impl LzmaEncoder {
    /// Create an encoder with default properties and the given dictionary.
    pub fn new(dict_size: u32) -> Self {
        Self {
            rc: RangeEncoder::new(),
            model: LzmaModel::new(LzmaProperties::default()),
            dict_size: dict_size.max(crate::decoder::DICT_SIZE_MIN),
            state: State::new(),
            rep: [0; 4],
            hash_head: vec![u32::MAX; HASH_SIZE],
            hash_chain: Vec::new(),
            bytes_encoded: 0,
        }
    }

    /// Properties this encoder writes into headers.
    pub fn properties(&self) -> LzmaProperties {
        self.model.props
    }

    /// Dictionary size after raising to the format minimum.
    pub fn dict_size(&self) -> u32 {
        self.dict_size
    }

    fn hash3(data: &[u8]) -> usize {
        if data.len() < 3 {
            return 0;
        }
        // FNV-1a over the 3-byte prefix.
        let mut h = 2166136261u32;
        for &b in &data[..3] {
            h ^= u32::from(b);
            h = h.wrapping_mul(16777619);
        }
        (h as usize) & (HASH_SIZE - 1)
    }

    fn update_hash(&mut self, data: &[u8], pos: usize) {
        if pos + 3 > data.len() {
            return;
        }
        if pos >= self.hash_chain.len() {
            self.hash_chain.resize(pos + 1, u32::MAX);
        }
        let hash = Self::hash3(&data[pos..]);
        self.hash_chain[pos] = self.hash_head[hash];
        self.hash_head[hash] = pos as u32;
    }

    /// Longest run at `pos` matching the bytes at rep slot `rep_idx`.
    fn rep_match_len(&self, data: &[u8], pos: usize, rep_idx: usize) -> usize {
        let dist = self.rep[rep_idx] as usize;
        if dist >= pos {
            return 0;
        }

        let match_pos = pos - dist - 1;
        let max_len = (data.len() - pos).min(MATCH_LEN_MAX);
        let mut len = 0;
        while len < max_len && data[pos + len] == data[match_pos + len] {
            len += 1;
        }
        len
    }

    /// Best (on-wire distance, length) match at `pos` via the hash chains.
    fn find_match(&self, data: &[u8], pos: usize) -> Option<(u32, usize)> {
        if pos + MATCH_LEN_MIN > data.len() {
            return None;
        }

        let hash = Self::hash3(&data[pos..]);
        let mut match_pos = self.hash_head[hash] as usize;
        if match_pos == u32::MAX as usize {
            return None;
        }

        let max_len = (data.len() - pos).min(MATCH_LEN_MAX);
        let mut best: Option<(u32, usize)> = None;

        for _ in 0..CHAIN_DEPTH {
            if match_pos >= pos {
                break;
            }
            let dist = pos - match_pos;
            if dist > self.dict_size as usize {
                break;
            }

            if data[match_pos..match_pos + 3] == data[pos..pos + 3] {
                let mut len = 3;
                while len < max_len && data[pos + len] == data[match_pos + len] {
                    len += 1;
                }
                if best.is_none_or(|(_, best_len)| len > best_len) {
                    best = Some(((dist - 1) as u32, len));
                    if len >= max_len {
                        break;
                    }
                }
            }

            match self.hash_chain.get(match_pos) {
                Some(&next) if (next as usize) < match_pos => match_pos = next as usize,
                _ => break,
            }
        }

        best
    }

    fn encode_literal(&mut self, data: &[u8], pos: usize) {
        let byte = data[pos];
        let prev_byte = if pos > 0 { data[pos - 1] } else { 0 };
        let lit_state = self.model.literal.context(
            self.bytes_encoded,
            prev_byte,
            self.model.props.lc,
            self.model.props.lp,
        );
        let probs = &mut self.model.literal.probs[lit_state];

        let mut ctx = 1usize;
        if !self.state.is_literal() {
            // Mirror the decoder: predict against the byte at rep0 until
            // the first mismatching bit.
            let mut match_byte = u32::from(data[pos - self.rep[0] as usize - 1]);
            let mut i = 7i32;
            while i >= 0 {
                let match_bit = ((match_byte >> 7) & 1) as usize;
                match_byte <<= 1;
                let bit = usize::from((byte >> i) & 1);
                self.rc
                    .encode_bit(&mut probs[((1 + match_bit) << 8) + ctx], bit as u32);
                ctx = (ctx << 1) | bit;
                i -= 1;
                if match_bit != bit {
                    break;
                }
            }
            while i >= 0 {
                let bit = usize::from((byte >> i) & 1);
                self.rc.encode_bit(&mut probs[ctx], bit as u32);
                ctx = (ctx << 1) | bit;
                i -= 1;
            }
        } else {
            for i in (0..8).rev() {
                let bit = usize::from((byte >> i) & 1);
                self.rc.encode_bit(&mut probs[ctx], bit as u32);
                ctx = (ctx << 1) | bit;
            }
        }
    }

    /// Encode a distance. `len` is the real match length.
    fn encode_distance(&mut self, dist: u32, len: usize) {
        let len_state = (len - MATCH_LEN_MIN).min(DIST_STATES - 1);

        let slot = dist_slot(dist);
        self.rc.encode_bit_tree(
            &mut self.model.distance.slot[len_state],
            DIST_SLOT_BITS,
            slot,
        );

        if slot >= 4 {
            let num_direct_bits = (slot >> 1) - 1;
            let base = (2 | (slot & 1)) << num_direct_bits;
            let reduced = dist - base;

            if (slot as usize) < END_POS_MODEL_INDEX {
                let offset = base as usize - slot as usize;
                self.rc.encode_bit_tree_reverse(
                    &mut self.model.distance.special[offset..],
                    num_direct_bits,
                    reduced,
                );
            } else {
                self.rc
                    .encode_direct_bits(reduced >> DIST_ALIGN_BITS, num_direct_bits - DIST_ALIGN_BITS);
                self.rc.encode_bit_tree_reverse(
                    &mut self.model.distance.align,
                    DIST_ALIGN_BITS,
                    reduced & ((1 << DIST_ALIGN_BITS) - 1),
                );
            }
        }
    }

    /// Encode `data` as a raw payload, optionally terminated by the end
    /// marker, and return the range-coded bytes.
    pub fn encode(mut self, data: &[u8], end_marker: bool) -> Vec<u8> {
        let mut i = 0;

        while i < data.len() {
            let pos_state =
                (self.bytes_encoded as usize) & (self.model.props.num_pos_states() - 1);
            let state_idx = self.state.value();

            // Longest rep-slot run, if any. A one-byte rep0 run is still
            // worth a short-rep packet.
            let mut best_rep: Option<(usize, usize)> = None;
            for rep_idx in 0..4 {
                let len = self.rep_match_len(data, i, rep_idx);
                let usable = len >= MATCH_LEN_MIN || (rep_idx == 0 && len >= 1);
                if usable && best_rep.is_none_or(|(_, best)| len > best) {
                    best_rep = Some((rep_idx, len));
                }
            }

            let normal_match = self.find_match(data, i);

            enum Step {
                Literal,
                Rep(usize, usize),
                Match(u32, usize),
            }

            let step = match (best_rep, normal_match) {
                (Some((rep_idx, rep_len)), Some((_, len)))
                    if rep_len >= len || (rep_idx == 0 && rep_len >= 3) =>
                {
                    Step::Rep(rep_idx, rep_len)
                }
                (_, Some((dist, len))) => Step::Match(dist, len),
                (Some((rep_idx, rep_len)), None) => Step::Rep(rep_idx, rep_len),
                (None, None) => Step::Literal,
            };

            match step {
                Step::Literal => {
                    self.rc
                        .encode_bit(&mut self.model.is_match[state_idx][pos_state], 0);
                    self.encode_literal(data, i);
                    self.state.update_literal();
                    self.bytes_encoded += 1;
                    self.update_hash(data, i);
                    i += 1;
                }
                Step::Rep(rep_idx, len) => {
                    self.rc
                        .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
                    self.rc.encode_bit(&mut self.model.is_rep[state_idx], 1);

                    if rep_idx == 0 {
                        self.rc.encode_bit(&mut self.model.is_rep_g0[state_idx], 0);
                        if len == 1 {
                            self.rc.encode_bit(
                                &mut self.model.is_rep0_long[state_idx][pos_state],
                                0,
                            );
                            self.state.update_short_rep();
                        } else {
                            self.rc.encode_bit(
                                &mut self.model.is_rep0_long[state_idx][pos_state],
                                1,
                            );
                            encode_length(&mut self.rc, &mut self.model.rep_len, len, pos_state);
                            self.state.update_long_rep();
                        }
                    } else {
                        self.rc.encode_bit(&mut self.model.is_rep_g0[state_idx], 1);
                        if rep_idx == 1 {
                            self.rc.encode_bit(&mut self.model.is_rep_g1[state_idx], 0);
                        } else {
                            self.rc.encode_bit(&mut self.model.is_rep_g1[state_idx], 1);
                            self.rc.encode_bit(
                                &mut self.model.is_rep_g2[state_idx],
                                (rep_idx == 3) as u32,
                            );
                        }

                        let dist = self.rep[rep_idx];
                        for j in (1..=rep_idx).rev() {
                            self.rep[j] = self.rep[j - 1];
                        }
                        self.rep[0] = dist;

                        encode_length(&mut self.rc, &mut self.model.rep_len, len, pos_state);
                        self.state.update_long_rep();
                    }

                    self.bytes_encoded += len as u64;
                    for j in 0..len {
                        self.update_hash(data, i + j);
                    }
                    i += len;
                }
                Step::Match(dist, len) => {
                    self.rc
                        .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
                    self.rc.encode_bit(&mut self.model.is_rep[state_idx], 0);

                    encode_length(&mut self.rc, &mut self.model.match_len, len, pos_state);
                    self.encode_distance(dist, len);

                    self.rep[3] = self.rep[2];
                    self.rep[2] = self.rep[1];
                    self.rep[1] = self.rep[0];
                    self.rep[0] = dist;

                    self.state.update_match();
                    self.bytes_encoded += len as u64;
                    for j in 0..len {
                        self.update_hash(data, i + j);
                    }
                    i += len;
                }
            }
        }

        if end_marker {
            let pos_state =
                (self.bytes_encoded as usize) & (self.model.props.num_pos_states() - 1);
            let state_idx = self.state.value();

            self.rc
                .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
            self.rc.encode_bit(&mut self.model.is_rep[state_idx], 0);
            encode_length(&mut self.rc, &mut self.model.match_len, MATCH_LEN_MIN, pos_state);
            self.encode_distance(0xFFFF_FFFF, MATCH_LEN_MIN);
        }

        self.rc.finish()
    }
}

fn assemble(props: LzmaProperties, dict_size: u32, size_field: u64, payload: Vec<u8>) -> Vec<u8> {
    let mut output = Vec::with_capacity(13 + payload.len());
    output.push(props.to_byte());
    output.extend_from_slice(&dict_size.to_le_bytes());
    output.extend_from_slice(&size_field.to_le_bytes());
    output.extend_from_slice(&payload);
    output
}

/// Compress `data` into a stream whose header declares the exact unpacked
/// size. No end marker is written, so the decoder finishes by size with a
/// clean range coder.
pub fn compress_sized(data: &[u8], dict_size: u32) -> Vec<u8> {
    let encoder = LzmaEncoder::new(dict_size);
    let props = encoder.properties();
    let dict_size = encoder.dict_size();
    let payload = encoder.encode(data, false);
    assemble(props, dict_size, data.len() as u64, payload)
}

/// Compress `data` into a stream with an undeclared unpacked size
/// (header size field all ones) and the mandatory end marker.
pub fn compress_with_marker(data: &[u8], dict_size: u32) -> Vec<u8> {
    let encoder = LzmaEncoder::new(dict_size);
    let props = encoder.properties();
    let dict_size = encoder.dict_size();
    let payload = encoder.encode(data, true);
    assemble(props, dict_size, u64::MAX, payload)
}
