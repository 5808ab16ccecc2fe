// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `keepbits` module turns a [`crate::information::BitInformation`] vector into a single
//! mantissa keep-bits count, by thresholding its cumulative distribution against a target
//! information retention level.

use crate::error::{BitroundError, Result};
use crate::information::{BitInformation, WORD_BITS};

/// Number of bits preceding the mantissa in the signed-exponent word (sign, exponent-sign, and
/// the 7-bit exponent magnitude), used to translate an index into `M` into a mantissa keep-bits
/// count.
const NON_MANTISSA_BITS: usize = 9;

/// Which pre-processing rule is applied to the information vector before its cumulative
/// distribution is thresholded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rule {
    /// Zero out the highest few mantissa-tail entries once they drop below 1.5x the maximum of
    /// the last four entries. This is the default: it discards the long, uninformative tail real
    /// float data tends to have at its least-significant mantissa bits.
    #[default]
    TailFilteredCdf,
    /// Walk the information vector from the sign/exponent bits toward the mantissa tail; the
    /// first entry that is lower than its predecessor, and every entry after it, is zeroed. This
    /// keeps only a single monotonically non-decreasing rise, guarding against a spurious second
    /// peak further down the word (a multi-peak spectrum) contributing to the retained
    /// information total.
    Monotonic,
}

/// Select the number of mantissa bits to keep so that the retained bits carry at least
/// `inflevel` of the total mutual information in `m`.
///
/// `inflevel` must lie in `[0, 1]`. Returns [`BitroundError::InvalidInput`] otherwise.
pub fn get_keepbits(m: &BitInformation, inflevel: f64, rule: Rule) -> Result<u8> {
    if !(0.0..=1.0).contains(&inflevel) {
        return Err(BitroundError::InvalidInput("inflevel must lie in [0, 1]"));
    }

    let cleaned = match rule {
        Rule::TailFilteredCdf => tail_filtered(m),
        Rule::Monotonic => monotonic(m),
    };

    let mut cumsum = [0.0f64; WORD_BITS];
    let mut running = 0.0;
    for (i, &v) in cleaned.iter().enumerate() {
        running += v;
        cumsum[i] = running;
    }

    let total = cumsum[WORD_BITS - 1];
    if total <= 0.0 {
        // No information anywhere in the word: keep full precision.
        return Ok(23);
    }

    let mut threshold_index = WORD_BITS - 1;
    for (i, &c) in cumsum.iter().enumerate() {
        if c / total > inflevel {
            threshold_index = i;
            break;
        }
    }

    let raw_nsb = threshold_index as i32 + 1 - NON_MANTISSA_BITS as i32;
    let nsb = raw_nsb.clamp(1, 23);

    Ok(nsb as u8)
}

/// Tail-filtered pre-processing: zero the trailing entries once they fall under 1.5x the largest
/// of the last four entries of `m`.
fn tail_filtered(m: &BitInformation) -> BitInformation {
    let mut out = *m;

    let tail_max = m[WORD_BITS - 4..].iter().cloned().fold(0.0f64, f64::max);
    let threshold = 1.5 * tail_max;

    for v in out.iter_mut() {
        if *v <= threshold {
            *v = 0.0;
        }
    }

    out
}

/// Monotonic pre-processing: walk `m` from the sign/exponent bits toward the mantissa tail; the
/// first entry lower than its predecessor, and every entry from there on, is zeroed.
fn monotonic(m: &BitInformation) -> BitInformation {
    let mut out = *m;

    for i in 1..WORD_BITS {
        if m[i] < m[i - 1] {
            for later in out.iter_mut().skip(i) {
                *later = 0.0;
            }
            break;
        }
    }

    out
}
