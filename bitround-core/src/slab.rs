// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Row-major iteration over the leading dimensions of a `>= 3`-D variable, for slab-wise
//! processing. This is a lazy odometer with explicit carry propagation: it never materialises
//! the full product of leading extents.

/// Iterates every index tuple over a set of leading dimensions, in row-major (last-leading-dim
/// fastest) order, without allocating proportional to the number of tuples produced.
///
/// `leading_extents` are the sizes of every dimension except the trailing two (the ones that
/// make up the 2-D slab itself). An empty `leading_extents` yields exactly one empty tuple, for
/// the case where a "`>= 3`-D variable" input degenerates to exactly rank 2 at the call site.
#[derive(Debug, Clone)]
pub struct SlabIndex {
    extents: Vec<u64>,
    next: Option<Vec<u64>>,
}

impl SlabIndex {
    pub fn new(leading_extents: &[u64]) -> Self {
        let degenerate = leading_extents.iter().any(|&e| e == 0);
        let next = if degenerate { None } else { Some(vec![0u64; leading_extents.len()]) };

        SlabIndex { extents: leading_extents.to_vec(), next }
    }
}

impl Iterator for SlabIndex {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        let mut carry = current.clone();
        let mut pos = carry.len();
        loop {
            if pos == 0 {
                // Every position carried past its extent: the sequence is exhausted.
                self.next = None;
                break;
            }
            pos -= 1;
            carry[pos] += 1;
            if carry[pos] < self.extents[pos] {
                self.next = Some(carry);
                break;
            }
            carry[pos] = 0;
        }

        Some(current)
    }
}
