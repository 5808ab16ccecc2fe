// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw-chunk concatenation (`concat`): stitch `>= 2` containers sharing a schema along their
//! unlimited/record dimension by moving chunk payloads unchanged, falling back to a decoded
//! hyperslab copy only for the short trailing chunk an uneven record-dimension extent can leave
//! behind.

use std::collections::HashMap;

use chrono::Utc;
use log::debug;

use bitround_core::container::{Attr, AttrScope, AttrValue, ContainerReader, ContainerWriter, Dimension, VarMeta};
use bitround_core::error::{invalid_input_error, schema_mismatch_error};
use bitround_core::Result;

/// Options controlling one `concat` run.
#[derive(Debug, Clone, Default)]
pub struct ConcatOptions {
    /// Emit per-dataset debug traces on stderr, in addition to whatever the global `log` level
    /// already produces (the CLI's `-v` flag sets both).
    pub verbose: bool,
}

/// Concatenate `readers` (in argv order) along their shared unlimited dimension into `writer`.
///
/// `argv` is the original command line, recorded verbatim in the output's `history` attribute.
pub fn concat(readers: &[&dyn ContainerReader], writer: &mut dyn ContainerWriter, argv: &[String], opts: &ConcatOptions) -> Result<()> {
    if readers.len() < 2 {
        return invalid_input_error("concat requires at least two input files");
    }

    let first = readers[0];
    let dims = first.dimensions()?;
    let variables = first.variables()?;
    let record_vars: Vec<&VarMeta> = variables.iter().filter(|v| v.is_record(&dims)).collect();

    // Step 1-2: discover record variables from F1, sum their extents across all inputs.
    let mut final_extent: HashMap<String, u64> = HashMap::new();
    for var in &record_vars {
        let mut total = 0u64;
        for (fi, reader) in readers.iter().enumerate() {
            let other_vars = reader.variables()?;
            let Some(other) = other_vars.iter().find(|v| v.name == var.name)
            else {
                return schema_mismatch_error(format!("record variable {} missing from input #{}", var.name, fi + 1));
            };
            if other.chunk_shape != var.chunk_shape || other.filter_stack != var.filter_stack {
                return schema_mismatch_error(format!("{}: chunk shape or filter stack differs between inputs", var.name));
            }
            total += record_extent(other, &dims);
        }
        final_extent.insert(var.name.clone(), total);
    }

    // Step 3: clone the entire object/attribute tree from F1.
    for var in &variables {
        writer.create_var(var, var.chunk_shape.as_deref(), &var.filter_stack)?;
        for attr in &var.attributes {
            writer.copy_attribute(first, AttrScope::Variable(&var.name), &attr.name)?;
        }
    }
    for attr in first.attributes(AttrScope::Root)? {
        writer.copy_attribute(first, AttrScope::Root, &attr.name)?;
    }

    // Step 4: extend every record variable to its accumulated final length.
    for var in &record_vars {
        let extent = final_extent[&var.name];
        let mut new_shape = var.shape.clone();
        if let Some(pos) = record_dim_position(var, &dims) {
            new_shape[pos] = extent;
        }
        writer.set_extent(&var.name, &new_shape)?;
    }

    // Non-record datasets need no stitching: copy them bit-exact from F1 up front.
    for var in &variables {
        if !var.is_record(&dims) {
            let buffer = first.read_all(&var.name)?;
            writer.write_all(&var.name, &buffer)?;
        }
    }

    // Step 5: for f = 1..k, in order, shift and write every record variable's raw chunks.
    let mut offsets: HashMap<String, u64> = record_vars.iter().map(|v| (v.name.clone(), 0u64)).collect();

    for (fi, reader) in readers.iter().enumerate() {
        let reader_vars = reader.variables()?;

        for var in &record_vars {
            let Some(input_var) = reader_vars.iter().find(|v| v.name == var.name)
            else {
                continue;
            };

            let record_pos = record_dim_position(var, &dims).unwrap_or(0);
            let record_chunk_extent = var.chunk_shape.as_ref().map(|c| c[record_pos]).unwrap_or(1);
            let input_extent = record_extent(input_var, &dims);
            let offset = *offsets.get(&var.name).unwrap_or(&0);

            for chunk in reader.chunk_info(&var.name)? {
                let shifted_value = chunk.coord[record_pos] + offset;
                let is_short_trailing_chunk =
                    input_extent.saturating_sub(chunk.coord[record_pos]) < record_chunk_extent;

                if record_chunk_extent == 0 || shifted_value % record_chunk_extent != 0 || is_short_trailing_chunk {
                    let count: Vec<u64> = match &var.chunk_shape {
                        Some(cs) => cs.iter().zip(&input_var.shape).zip(&chunk.coord).map(|((&c, &extent), &coord)| {
                            c.min(extent - coord)
                        }).collect(),
                        None => input_var.shape.iter().zip(&chunk.coord).map(|(&extent, &coord)| extent - coord).collect(),
                    };

                    let buffer = reader.read_hyperslab(&var.name, &chunk.coord, &count)?;
                    let mut start = chunk.coord.clone();
                    start[record_pos] = shifted_value;
                    writer.write_hyperslab(&var.name, &start, &count, &buffer)?;
                    debug!("{}: fallback hyperslab write at {start:?} (input #{})", var.name, fi + 1);
                }
                else {
                    let mut shifted = chunk.coord.clone();
                    shifted[record_pos] = shifted_value;
                    let (filter_mask, bytes) = reader.read_raw_chunk(&var.name, &chunk.coord)?;
                    writer.write_raw_chunk(&var.name, &shifted, filter_mask, &bytes)?;
                    if opts.verbose {
                        debug!("{}: raw chunk {:?} -> {shifted:?} (input #{})", var.name, chunk.coord, fi + 1);
                    }
                }
            }

            offsets.insert(var.name.clone(), offset + input_extent);
        }
    }

    // Step 6: repair NetCDF-4 DIMENSION_LIST references to point at the output's own dimension
    // scales.
    writer.repair_dimension_scale_references()?;

    // Step 7: prepend a history entry.
    prepend_history(first, writer, argv)?;

    // Step 8: flush. Closing is left to the caller, which owns the writer past this call.
    writer.flush()
}

fn record_dim_position(var: &VarMeta, dims: &[Dimension]) -> Option<usize> {
    var.dim_names.iter().position(|name| dims.iter().any(|d| d.name == *name && d.is_unlimited))
}

fn record_extent(var: &VarMeta, dims: &[Dimension]) -> u64 {
    record_dim_position(var, dims).map(|pos| var.shape[pos]).unwrap_or(0)
}

/// Prepend a `"YYYY-MM-DD HH:MM:SS UTC: <argv joined>\n"` entry to the output's root `history`
/// attribute, creating it if `src` (and therefore the cloned tree) didn't already have one.
fn prepend_history(src: &dyn ContainerReader, writer: &mut dyn ContainerWriter, argv: &[String]) -> Result<()> {
    let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let new_entry = format!("{now}: {}\n", argv.join(" "));

    let existing = src
        .attributes(AttrScope::Root)?
        .into_iter()
        .find(|a| a.name == "history")
        .and_then(|a| match a.value {
            AttrValue::Text(s) => Some(s),
            _ => None,
        })
        .unwrap_or_default();

    let attr = Attr { name: "history".to_string(), value: AttrValue::Text(format!("{new_entry}{existing}")) };
    writer.put_attribute(AttrScope::Root, &attr)
}
