// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bit-rounding rewrite (`bit-round`): copy a container variable-by-variable into a new file,
//! reducing float32 mantissa precision to the number of bits the Information Estimator and
//! Keep-Bits Selector judge significant, leaving everything else untouched.
//!
//! For a `>= 3`-D variable, each trailing 2-D slab is analysed and rounded independently: a slab
//! that contains a NaN or the declared fill value is passed through unrounded, but that does not
//! stop sibling slabs of the same variable from being rounded normally (only a whole contaminated
//! *variable* is an all-or-nothing decision for Small variables, which have no slabs to be
//! independent between).

use log::{debug, info, warn};

use bitround_core::applier::bitround_inplace;
use bitround_core::container::{classify_var, Buffer, ContainerReader, ContainerWriter, FilterStack, VarClass, VarMeta};
use bitround_core::error::{invalid_input_error, BitroundError};
use bitround_core::information::bitinformation;
use bitround_core::keepbits::{get_keepbits, Rule};
use bitround_core::slab::SlabIndex;
use bitround_core::Result;

use crate::common::{copy_all_attributes, copy_variable_verbatim};

/// Options controlling one `bit-round` pass.
#[derive(Debug, Clone)]
pub struct BitRoundOptions {
    /// Target fraction of per-bit mutual information to retain, in `[0, 1]`.
    pub inflevel: f64,
    /// Requested deflate compression level, in `[1, 9]`. `None` preserves the input's chunking
    /// and filter stack verbatim instead of redefining them.
    pub complevel: Option<u32>,
    /// Which Keep-Bits Selector rule to apply.
    pub rule: Rule,
}

impl Default for BitRoundOptions {
    fn default() -> Self {
        BitRoundOptions { inflevel: 0.99, complevel: None, rule: Rule::default() }
    }
}

/// Per-variable statistics reported after a `bit-round` pass.
#[derive(Debug, Clone, Default)]
pub struct VarRoundStats {
    pub name: String,
    /// `None` when nothing was rounded: the variable was passed through untouched (non-float,
    /// coordinate, scalar), or every chunk-slab was missing-contaminated.
    pub nsb_min: Option<u8>,
    pub nsb_max: Option<u8>,
    /// Number of whole variables (Small) or chunk-slabs (Large) skipped because they contained a
    /// NaN or the declared fill value.
    pub skipped_missing: u32,
}

/// Rewrite every variable of `reader` into `writer`, bit-rounding float32 variables per `opts`
/// and passing everything else through unchanged.
pub fn bit_round(reader: &dyn ContainerReader, writer: &mut dyn ContainerWriter, opts: &BitRoundOptions) -> Result<Vec<VarRoundStats>> {
    if !(0.0..=1.0).contains(&opts.inflevel) {
        return invalid_input_error("inflevel must lie in [0, 1]");
    }
    if let Some(level) = opts.complevel {
        if !(1..=9).contains(&level) {
            return invalid_input_error("complevel must lie in [1, 9]");
        }
    }

    let dims = reader.dimensions()?;
    let mut stats = Vec::new();

    for var in reader.variables()? {
        let class = classify_var(&var, &dims);

        let result = match class {
            VarClass::NonFloat32 | VarClass::Coordinate | VarClass::Scalar => {
                copy_variable_verbatim(reader, writer, &var).map(|_| VarRoundStats { name: var.name.clone(), ..Default::default() })
            }
            VarClass::Small => round_small(reader, writer, &var, opts),
            VarClass::Large => round_large(reader, writer, &var, opts),
        };

        match result {
            Ok(stat) => stats.push(stat),
            Err(err) => warn!("{}: {err}", var.name),
        }
    }

    Ok(stats)
}

fn contains_missing(data: &[f32], fill: Option<f32>) -> bool {
    data.iter().any(|v| v.is_nan() || fill.is_some_and(|f| v.to_bits() == f.to_bits()))
}

/// Chunk shape and filter stack for the output variable: a fresh shuffle+deflate layout if a
/// compression level was requested, otherwise the input's own chunking and filters, verbatim.
fn output_layout(var: &VarMeta, opts: &BitRoundOptions) -> (Option<Vec<u64>>, FilterStack) {
    match opts.complevel {
        Some(level) => {
            let rank = var.rank();
            let mut chunk = vec![1u64; rank];
            if rank >= 2 {
                chunk[rank - 2] = var.shape[rank - 2];
                chunk[rank - 1] = var.shape[rank - 1];
            }
            let elem_size = var.element_type.fixed_size().unwrap_or(4) as u32;
            (Some(chunk), FilterStack::shuffle_then_deflate(elem_size, level))
        }
        None => (var.chunk_shape.clone(), var.filter_stack.clone()),
    }
}

fn round_small(reader: &dyn ContainerReader, writer: &mut dyn ContainerWriter, var: &VarMeta, opts: &BitRoundOptions) -> Result<VarRoundStats> {
    let Buffer::F32(mut data) = reader.read_all(&var.name)?
    else {
        return Err(BitroundError::UnsupportedType("expected F32 buffer for a Small-classified variable".to_string()));
    };

    let fill = var.fill_value.map(|f| f as f32);
    let (chunk_shape, filter_stack) = output_layout(var, opts);
    writer.create_var(var, chunk_shape.as_deref(), &filter_stack)?;

    if contains_missing(&data, fill) {
        info!("{}: contains missing, passing through unrounded", var.name);
        writer.write_all(&var.name, &Buffer::F32(data))?;
        copy_all_attributes(reader, writer, var)?;
        return Ok(VarRoundStats { name: var.name.clone(), skipped_missing: 1, ..Default::default() });
    }

    let m = bitinformation(&data)?;
    let nsb = get_keepbits(&m, opts.inflevel, opts.rule)?;
    bitround_inplace(&mut data, nsb, fill)?;

    writer.write_all(&var.name, &Buffer::F32(data))?;
    copy_all_attributes(reader, writer, var)?;

    debug!("{}: rounded to {nsb} keep-bits", var.name);
    Ok(VarRoundStats { name: var.name.clone(), nsb_min: Some(nsb), nsb_max: Some(nsb), skipped_missing: 0 })
}

fn round_large(reader: &dyn ContainerReader, writer: &mut dyn ContainerWriter, var: &VarMeta, opts: &BitRoundOptions) -> Result<VarRoundStats> {
    let rank = var.rank();
    let leading: Vec<u64> = var.shape[..rank - 2].to_vec();
    let trailing = &var.shape[rank - 2..];

    let fill = var.fill_value.map(|f| f as f32);
    let (chunk_shape, filter_stack) = output_layout(var, opts);
    writer.create_var(var, chunk_shape.as_deref(), &filter_stack)?;

    let mut nsb_min: Option<u8> = None;
    let mut nsb_max: Option<u8> = None;
    let mut skipped = 0u32;

    for index in SlabIndex::new(&leading) {
        let mut start = index.clone();
        start.push(0);
        start.push(0);
        let mut count: Vec<u64> = vec![1; index.len()];
        count.extend_from_slice(trailing);

        let Buffer::F32(mut slab) = reader.read_hyperslab(&var.name, &start, &count)?
        else {
            return Err(BitroundError::UnsupportedType("expected F32 buffer for a Large-classified variable".to_string()));
        };

        if contains_missing(&slab, fill) {
            info!("{}: slab {index:?} contains missing, passing through unrounded", var.name);
            writer.write_hyperslab(&var.name, &start, &count, &Buffer::F32(slab))?;
            skipped += 1;
            continue;
        }

        let m = bitinformation(&slab)?;
        let nsb = get_keepbits(&m, opts.inflevel, opts.rule)?;
        bitround_inplace(&mut slab, nsb, fill)?;
        writer.write_hyperslab(&var.name, &start, &count, &Buffer::F32(slab))?;

        nsb_min = Some(nsb_min.map_or(nsb, |m: u8| m.min(nsb)));
        nsb_max = Some(nsb_max.map_or(nsb, |m: u8| m.max(nsb)));
    }

    copy_all_attributes(reader, writer, var)?;
    debug!("{}: nsb range {:?}..={:?} over {} slabs, {} skipped", var.name, nsb_min, nsb_max, SlabIndex::new(&leading).count(), skipped);

    Ok(VarRoundStats { name: var.name.clone(), nsb_min, nsb_max, skipped_missing: skipped })
}
