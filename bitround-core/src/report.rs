// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Textual report formatting. These formats are load-bearing: fixed column widths, bracket and
//! separator placement, and slice labels are consumed by downstream tooling as well as by people.

use crate::container::{BitPattern, BitPatternReport};

const NAME_WIDTH: usize = 45;
const SHAPE_WIDTH: usize = 20;

/// Render one variable-name/shape/pattern row of a bit-analysis report.
///
/// `name` and `shape` are left-aligned and padded (truncated if they overflow their column, so
/// the table stays aligned even with unusually long names); `pattern` is the bracketed,
/// separator-annotated string produced by [`format_bit_pattern`].
pub fn format_report_row(name: &str, shape: &str, pattern: &str) -> String {
    format!("{:<NAME_WIDTH$}{:<SHAPE_WIDTH$}{}", truncate(name, NAME_WIDTH), truncate(shape, SHAPE_WIDTH), pattern)
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width { s.to_string() } else { s.chars().take(width.saturating_sub(1)).collect() }
}

/// Render a variable's shape as `(d1, d2, ..., dn)`, or `()` for a scalar.
pub fn format_shape(shape: &[u64]) -> String {
    format!("({})", shape.iter().map(u64::to_string).collect::<Vec<_>>().join(", "))
}

/// Render a row-major leading-dimension index tuple as `[i1,...,ir-2,:,:]`.
pub fn format_slice_label(leading_index: &[u64]) -> String {
    let mut parts: Vec<String> = leading_index.iter().map(u64::to_string).collect();
    parts.push(":".to_string());
    parts.push(":".to_string());
    format!("[{}]", parts.join(","))
}

/// Render a [`BitPatternReport`] as the bracketed, grouped-by-8, IEEE-754-separated string the
/// report format specifies: `(MSB) ... (LSB)`, characters drawn from `{0, 1, -}` for
/// `{AllZero, AllOne, Mixed}`, with `|` inserted after bit 31 and bit 23 for a float32-width
/// report (after bits 63 and 52 for float64).
pub fn format_bit_pattern(report: &BitPatternReport) -> String {
    let width = report.bits.len() as u32;
    let separators = ieee754_separator_positions(width);

    let mut body = String::new();
    for (i, bit) in report.bits.iter().enumerate() {
        if i > 0 {
            if separators.contains(&(i as u32)) {
                body.push('|');
            }
            else if i % 8 == 0 {
                body.push(' ');
            }
        }
        body.push(match bit {
            BitPattern::AllZero => '0',
            BitPattern::AllOne => '1',
            BitPattern::Mixed => '-',
        });
    }

    format!("(MSB) {body} (LSB)")
}

/// Bit positions (counted from the MSB, 0-indexed) after which an IEEE-754 sign/exponent/mantissa
/// separator is inserted: after the sign bit, and after the exponent field.
fn ieee754_separator_positions(width: u32) -> [u32; 2] {
    match width {
        64 => [1, 12],
        _ => [1, 9],
    }
}
