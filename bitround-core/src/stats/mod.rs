// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Statistical helpers shared by [`crate::information`]: the binomial-confidence free-entropy
//! floor and the base-2 binary entropy function it builds on.

pub mod normal;

/// Base-2 binary entropy, `H2(p) = -p*log2(p) - (1-p)*log2(1-p)`, with the `0 * log2(0) = 0`
/// convention so the floor computation stays well-defined at the boundary.
pub fn binary_entropy2(p: f64) -> f64 {
    let term = |x: f64| if x <= 0.0 { 0.0 } else { -x * x.log2() };
    term(p) + term(1.0 - p)
}

/// The binomial-confidence free-entropy floor for `n_pairs` coin-flip trials at confidence
/// `confidence`: the amount of mutual information a fair-coin null hypothesis would already
/// explain, in bits. Any per-bit mutual information at or below this floor is noise and is zeroed
/// by [`crate::information::bitinformation`].
pub fn free_entropy_floor(n_pairs: usize, confidence: f64) -> f64 {
    let n = n_pairs as f64;
    let q = (0.5 + normal::inverse_cdf(1.0 - (1.0 - confidence) / 2.0) / (2.0 * n.sqrt())).min(1.0);

    1.0 - binary_entropy2(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_entropy_matches_reference_scenario() {
        // n = 1,000,001 values -> n_pairs = 1,000,000.
        let floor = free_entropy_floor(1_000_000, 0.99);
        assert!((floor - 4.78e-6).abs() < 1e-7, "floor={floor}");
    }

    #[test]
    fn binary_entropy_is_one_at_half() {
        assert!((binary_entropy2(0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn binary_entropy_is_zero_at_extremes() {
        assert_eq!(binary_entropy2(0.0), 0.0);
        assert_eq!(binary_entropy2(1.0), 0.0);
    }
}
