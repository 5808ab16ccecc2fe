// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inverse standard normal CDF (the probit function, Φ⁻¹), used by
//! [`crate::information`] to turn a confidence level into a binomial-confidence bound.
//!
//! [`inverse_cdf`] is Peter Acklam's rational approximation, accurate to about 1.15e-9 across the
//! open interval, and is what runs at estimation time. [`inverse_cdf_newton_reference`] refines
//! a crude initial guess with Newton-Raphson steps against the error function; it is only used by
//! tests to cross-check the approximation, the same way the teacher codebase keeps multiple
//! interchangeable dither algorithms around for comparison rather than picking one at runtime.

/// Acklam's rational approximation of the inverse standard normal CDF.
///
/// `p` must lie in the open interval `(0, 1)`; values outside it return `f64::NAN`.
pub fn inverse_cdf(p: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }

    // Coefficients in rational approximations.
    const A: [f64; 6] = [
        -3.969_683_028_665_376e+01,
        2.209_460_984_245_205e+02,
        -2.759_285_104_469_687e+02,
        1.383_577_518_672_690e+02,
        -3.066_479_806_614_716e+01,
        2.506_628_407_773_720e+00,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e+01,
        1.615_858_368_580_409e+02,
        -1.556_989_798_598_866e+02,
        6.680_131_188_771_972e+01,
        -1.328_068_155_288_572e+01,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-03,
        -3.223_964_580_411_365e-01,
        -2.400_758_277_161_838e+00,
        -2.549_732_539_343_734e+00,
        4.374_664_141_464_968e+00,
        2.938_163_982_698_783e+00,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-03,
        3.224_671_290_700_398e-01,
        2.445_134_137_142_996e+00,
        3.754_408_661_907_416e+00,
    ];

    const P_LOW: f64 = 0.024_25;
    const P_HIGH: f64 = 1.0 - P_LOW;

    if p < P_LOW {
        // Rational approximation for the lower region.
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
    else if p <= P_HIGH {
        // Rational approximation for the central region.
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
    else {
        // Rational approximation for the upper region.
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Error function, needed by the Newton-Raphson reference below. Abramowitz & Stegun 7.1.26,
/// accurate to about 1.5e-7, which is more than sufficient as a cross-check for [`inverse_cdf`].
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.3275911;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}

fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn standard_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Reference inverse standard normal CDF via Newton-Raphson, seeded by [`inverse_cdf`] and refined
/// against the error function. Used only for testing; kept deliberately independent of the
/// rational-approximation code path above so the two can disagree.
#[cfg(test)]
pub fn inverse_cdf_newton_reference(p: f64) -> f64 {
    let mut x = inverse_cdf(p);

    for _ in 0..50 {
        let delta = (standard_normal_cdf(x) - p) / standard_normal_pdf(x);
        x -= delta;
        if delta.abs() < 1e-15 {
            break;
        }
    }

    x
}
