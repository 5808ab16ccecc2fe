// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `bits` module implements pure arithmetic on the 32-bit image of an IEEE-754 float32: the
//! signed-exponent remap consumed by the [`crate::information`] estimator, and the rounding mask
//! consumed by the [`crate::applier`].

/// Number of mantissa bits in an IEEE-754 binary32 value.
pub const MANTISSA_BITS: u32 = 23;

/// Reinterpret a float32 as its native uint32 image, losslessly.
#[inline]
pub fn word_of_float(v: f32) -> u32 {
    v.to_bits()
}

/// Reinterpret a uint32 image back into a float32, losslessly.
#[inline]
pub fn float_of_word(w: u32) -> f32 {
    f32::from_bits(w)
}

/// Remap the biased exponent of a float32's bit pattern into a sign-magnitude exponent.
///
/// Bits near zero and bits representing large magnitudes both end up with correlated high bits
/// under this remap, which is what lets the [`crate::information`] estimator find structure that
/// a raw IEEE-754 bit-pattern comparison would miss. Zero, infinity, and NaN are not given any
/// special-cased bit pattern here: the Information Estimator never looks at the original float,
/// only at this remapped word.
#[inline]
pub fn signed_exponent(v: f32) -> u32 {
    let word = word_of_float(v);

    let sign = word & 0x8000_0000;
    let fraction = word & 0x007f_ffff;
    let e_biased = (word >> MANTISSA_BITS) & 0xff;
    let e = e_biased as i32 - 127;
    let abs_e = e.unsigned_abs();
    let esign = if e < 0 { 0x4000_0000 } else { 0 };

    sign | fraction | esign | (abs_e << MANTISSA_BITS)
}

/// Compute the rounding mask and half-shift value for a given keep-bits count.
///
/// `nsb` is assumed to already be validated to `1..=23` by the caller (see
/// [`crate::applier::bitround_inplace`]); this function itself never fails, per the Bit
/// Reinterpreter's "pure arithmetic on scalars" contract.
///
/// Returns `(mask, hshv)` such that `(word + hshv) & mask` rounds `word`'s mantissa to `nsb` bits
/// with ties going to the representation with the lower-magnitude mantissa (round-half-up-to-even
/// in the reference codec's sense).
#[inline]
pub fn bitround_mask(nsb: u32) -> (u32, u32) {
    debug_assert!((1..=MANTISSA_BITS).contains(&nsb));

    let discard = MANTISSA_BITS - nsb;
    let mask = !((1u32 << discard) - 1);
    let hshv = (!mask) & (mask >> 1);

    (mask, hshv)
}

/// Apply the rounding mask to a single word. Callers must guarantee `word` is not a NaN, infinity,
/// or fill-value sentinel; see [`crate::applier::bitround_inplace`] for the buffer-level contract
/// that upholds this.
#[inline]
pub fn apply_round(word: u32, nsb: u32) -> u32 {
    let (mask, hshv) = bitround_mask(nsb);
    word.wrapping_add(hshv) & mask
}
