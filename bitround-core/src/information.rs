// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `information` module estimates, bit by bit, how much mutual information adjacent float32
//! values share at that bit position. This is the signal the [`crate::keepbits`] selector turns
//! into a keep-bits count.

use crate::bits::signed_exponent;
use crate::error::{BitroundError, Result};
use crate::stats::free_entropy_floor;

/// Number of bits in a float32 word; also the length of a [`BitInformation`] vector.
pub const WORD_BITS: usize = 32;

/// Confidence level used to derive the free-entropy noise floor.
const FREE_ENTROPY_CONFIDENCE: f64 = 0.99;

/// A 32-entry mutual-information vector, indexed MSB (0) to LSB (31), in bits.
pub type BitInformation = [f64; WORD_BITS];

/// Estimate the mutual information between bit `b` of adjacent signed-exponent words, for every
/// bit position, and zero any estimate that doesn't clear the binomial free-entropy floor.
///
/// `xs` must contain at least two values or this returns [`BitroundError::InsufficientSamples`].
/// The implementation makes a single pass over `xs`, carrying only a `32 x 2 x 2` contingency
/// table and the previous word between iterations, so memory use does not grow with `xs.len()`.
pub fn bitinformation(xs: &[f32]) -> Result<BitInformation> {
    if xs.len() < 2 {
        return Err(BitroundError::InsufficientSamples);
    }

    // counts[b][i][j]: number of adjacent pairs where bit b of word k is i and bit b of word k+1
    // is j, for b indexed 0 (MSB) to 31 (LSB).
    let mut counts = [[[0u64; 2]; 2]; WORD_BITS];

    let mut prev = signed_exponent(xs[0]);

    for &x in &xs[1..] {
        let cur = signed_exponent(x);

        for b in 0..WORD_BITS {
            let shift = (WORD_BITS - 1 - b) as u32;
            let i = ((prev >> shift) & 1) as usize;
            let j = ((cur >> shift) & 1) as usize;
            counts[b][i][j] += 1;
        }

        prev = cur;
    }

    let n_pairs = xs.len() - 1;
    let floor = free_entropy_floor(n_pairs, FREE_ENTROPY_CONFIDENCE);

    let mut m = [0.0f64; WORD_BITS];

    for b in 0..WORD_BITS {
        m[b] = mutual_information_bits(&counts[b], n_pairs);
        if m[b] <= floor {
            m[b] = 0.0;
        }
    }

    Ok(m)
}

/// Mutual information, in bits, of a single bit position's 2x2 contingency table.
fn mutual_information_bits(counts: &[[u64; 2]; 2], n_pairs: usize) -> f64 {
    let n = n_pairs as f64;

    let p = |i: usize, j: usize| counts[i][j] as f64 / n;
    let px = |i: usize| (counts[i][0] + counts[i][1]) as f64 / n;
    let py = |j: usize| (counts[0][j] + counts[1][j]) as f64 / n;

    let mut sum_nats = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            let pij = p(i, j);
            if pij > 0.0 {
                sum_nats += pij * (pij / (px(i) * py(j))).ln();
            }
        }
    }

    sum_nats / std::f64::consts::LN_2
}
