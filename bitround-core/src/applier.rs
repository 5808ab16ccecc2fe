// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `applier` module does the actual bit-rounding: given a keep-bits count, it rewrites a
//! buffer of float32 values in place, leaving NaNs and fill-value sentinels untouched.

use crate::bits::{apply_round, float_of_word, word_of_float};
use crate::error::{BitroundError, Result};

/// Round every element of `buf` to `nsb` mantissa bits, in place.
///
/// `nsb` must lie in `1..=23` or this returns [`BitroundError::InvalidKeepBits`]. Elements that
/// are NaN, or whose bit pattern exactly matches `missing_value` (when given), are left
/// untouched: rounding a fill-value sentinel could turn it into an ordinary data value and
/// corrupt the variable's missing-data mask.
pub fn bitround_inplace(buf: &mut [f32], nsb: u8, missing_value: Option<f32>) -> Result<()> {
    let nsb = nsb as i32;
    if !(1..=23).contains(&nsb) {
        return Err(BitroundError::InvalidKeepBits(nsb));
    }
    let nsb = nsb as u32;

    let missing_word = missing_value.map(word_of_float);

    for v in buf.iter_mut() {
        if v.is_nan() {
            continue;
        }

        let word = word_of_float(*v);
        if let Some(mw) = missing_word {
            if word == mw {
                continue;
            }
        }

        *v = float_of_word(apply_round(word, nsb));
    }

    Ok(())
}
