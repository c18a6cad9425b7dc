//! MXINT4 quantization and dequantization primitives
//!
//! Weights are stored as signed 4-bit codes, two per byte, addressed by the
//! linear index `k * N + n`: the low nibble holds the even index and the
//! high nibble the odd one. Every run of [`GROUP_SIZE`] linear indices shares
//! a scale code whose low two bits select a left shift of 0, 2, 4 or 6.

use crate::dims::GROUP_SIZE;
use crate::error::{Error, Result};

/// Number of scale codes; only `Sw[1:0]` is significant
pub const NUM_SCALE_CODES: u8 = 4;

/// Signed 4-bit range
pub const NIBBLE_MIN: i8 = -8;
pub const NIBBLE_MAX: i8 = 7;

/// Symmetric int8 range used when quantizing activations
pub const ACTIVATION_SCALE: f32 = 127.0;

/// Shift applied for a scale code: `(code & 0b11) * 2`
#[inline(always)]
pub fn scale_shift(scale_code: u8) -> u32 {
    ((scale_code & 0b11) as u32) * 2
}

/// Unpack one 4-bit weight and apply its group scale.
///
/// The nibble is sign-extended to eight bits and shifted left by the scale's
/// shift amount. Bits pushed past bit 7 are dropped, mirroring a fixed-width
/// register shift, so e.g. `-8` at scale code 3 wraps to `0`.
#[inline(always)]
pub fn dequantize(packed_byte: u8, select_high_nibble: bool, scale_code: u8) -> i8 {
    let nibble = if select_high_nibble { packed_byte >> 4 } else { packed_byte & 0x0F };
    // Move bit 3 into the sign position and shift back arithmetically
    let extended = ((nibble << 4) as i8) >> 4;
    extended.wrapping_shl(scale_shift(scale_code))
}

/// Dequantize the weight at `linear = k * N + n` straight from the packed
/// buffers. Callers guarantee the index is in range.
#[inline(always)]
pub fn dequantize_at(packed: &[u8], scales: &[u8], linear: usize) -> i8 {
    dequantize(packed[linear / 2], linear & 1 == 1, scales[linear / GROUP_SIZE])
}

/// Packed weights plus their scale table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedWeights {
    /// Two 4-bit codes per byte
    pub packed: Vec<u8>,
    /// One scale code per group
    pub scales: Vec<u8>,
    pub k: usize,
    pub n: usize,
}

impl PackedWeights {
    /// Logical element count (K * N)
    pub fn numel(&self) -> usize {
        self.k * self.n
    }

    /// Dequantized weight at logical position (k, n)
    pub fn get(&self, k: usize, n: usize) -> i8 {
        dequantize_at(&self.packed, &self.scales, k * self.n + n)
    }
}

/// Smallest scale code whose shift brings every value of `group` into the
/// signed 4-bit range after rounding. Falls back to the coarsest code.
fn select_scale_code(group: &[f32]) -> u8 {
    (0..NUM_SCALE_CODES)
        .find(|&code| {
            let divisor = (1u32 << scale_shift(code)) as f32;
            group.iter().all(|&w| {
                let q = (w / divisor).round();
                q >= NIBBLE_MIN as f32 && q <= NIBBLE_MAX as f32
            })
        })
        .unwrap_or(NUM_SCALE_CODES - 1)
}

/// Quantize a row-major K x N float32 weight matrix to MXINT4.
///
/// Each group of [`GROUP_SIZE`] consecutive linear indices gets the smallest
/// scale code that fits; values are rounded, clamped to [-8, 7] and packed
/// low-nibble-first.
pub fn quantize_mxint4(weights: &[f32], k: usize, n: usize) -> Result<PackedWeights> {
    let total = k * n;
    if weights.len() != total {
        return Err(Error::InvalidShape(format!(
            "Weight matrix size mismatch: expected {}, got {}",
            total,
            weights.len()
        )));
    }
    if total == 0 || total % GROUP_SIZE != 0 {
        return Err(Error::InvalidShape(format!(
            "Weight count must be a positive multiple of {}, got {}",
            GROUP_SIZE, total
        )));
    }
    if let Some(pos) = weights.iter().position(|w| !w.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "Non-finite weight {} at index {}",
            weights[pos], pos
        )));
    }

    let mut packed = vec![0u8; total / 2];
    let mut scales = vec![0u8; total / GROUP_SIZE];

    for (grp, (group, scale)) in weights.chunks_exact(GROUP_SIZE).zip(scales.iter_mut()).enumerate()
    {
        let code = select_scale_code(group);
        *scale = code;

        let divisor = (1u32 << scale_shift(code)) as f32;
        let base = grp * GROUP_SIZE / 2;
        for (i, pair) in group.chunks_exact(2).enumerate() {
            let lo = quantize_nibble(pair[0], divisor);
            let hi = quantize_nibble(pair[1], divisor);
            packed[base + i] = (lo as u8 & 0x0F) | ((hi as u8 & 0x0F) << 4);
        }
    }

    log::debug!("Quantized {}x{} weights into {} groups", k, n, scales.len());

    Ok(PackedWeights { packed, scales, k, n })
}

#[inline]
fn quantize_nibble(w: f32, divisor: f32) -> i8 {
    (w / divisor).round().clamp(NIBBLE_MIN as f32, NIBBLE_MAX as f32) as i8
}

/// Quantize float activations to int8: `clamp(x * 127, -127, 127)`,
/// truncated toward zero.
pub fn quantize_activations(input: &[f32]) -> Result<Vec<i8>> {
    if let Some(pos) = input.iter().position(|x| !x.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "Non-finite activation {} at index {}",
            input[pos], pos
        )));
    }

    Ok(input
        .iter()
        .map(|&x| (x * ACTIVATION_SCALE).clamp(-ACTIVATION_SCALE, ACTIVATION_SCALE) as i8)
        .collect())
}

/// Expand packed weights into the row-major K x N int8 matrix
pub fn dequantize_matrix(packed: &[u8], scales: &[u8], k: usize, n: usize) -> Result<Vec<i8>> {
    let total = k * n;
    if packed.len() != total.div_ceil(2) {
        return Err(Error::InvalidShape(format!(
            "Packed weight size mismatch: expected {}, got {}",
            total.div_ceil(2),
            packed.len()
        )));
    }
    if scales.len() != total.div_ceil(GROUP_SIZE) {
        return Err(Error::InvalidShape(format!(
            "Scale table size mismatch: expected {}, got {}",
            total.div_ceil(GROUP_SIZE),
            scales.len()
        )));
    }

    Ok((0..total).map(|linear| dequantize_at(packed, scales, linear)).collect())
}
