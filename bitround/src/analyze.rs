// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bit-pattern analysis (`bit-analyze`): for every variable reachable from a root (or a caller-
//! scoped group), summarise the per-bit {ALLZERO, ALLONE, MIXED} pattern observed across its
//! finite values and emit a fixed-width textual report.

use log::{debug, warn};

use bitround_core::container::{classify_var, BitPatternReport, ContainerReader, VarClass, VarMeta};
use bitround_core::report::{format_bit_pattern, format_report_row, format_shape, format_slice_label};
use bitround_core::slab::SlabIndex;
use bitround_core::Result;

use crate::common::buffer_words;

/// Options controlling which part of a container's variable tree [`analyze`] walks.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Scope the walk to a single group, by path (e.g. `"/forecast"`). `None` walks the whole
    /// file from its root group, matching the contract's "container-index order" over all
    /// variables when no group nesting is in play.
    pub group: Option<String>,
}

/// Counts of how many variables were processed whole versus slab-by-slab, for the final tally
/// line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyzeTally {
    pub whole_processed: u32,
    pub slab_processed: u32,
    pub skipped: u32,
}

/// Walk every variable of `reader` (or just those under `opts.group`) in container-index order,
/// emitting one report row per variable and a final tally.
///
/// Returns the full report text (ready to print to stdout) and the tally. Coordinate, scalar,
/// and non-float variables are skipped with a one-line note rather than analysed, per the
/// contract; a single variable's Reader error is logged and does not abort the walk.
pub fn analyze(reader: &dyn ContainerReader, opts: &AnalyzeOptions) -> Result<(String, AnalyzeTally)> {
    let dims = reader.dimensions()?;
    let mut tally = AnalyzeTally::default();
    let mut report = String::new();

    for var in reader.variables()? {
        if let Some(group) = &opts.group {
            if !in_group(&var.name, group) {
                continue;
            }
        }

        match classify_var(&var, &dims) {
            VarClass::Coordinate => {
                report.push_str(&format!("{}  (coordinate, skipped)\n", var.name));
                tally.skipped += 1;
                continue;
            }
            VarClass::Scalar => {
                report.push_str(&format!("{}  (scalar, skipped)\n", var.name));
                tally.skipped += 1;
                continue;
            }
            VarClass::NonFloat32 if !var.element_type.supports_bit_analysis() => {
                report.push_str(&format!("{}  (unsupported type, skipped)\n", var.name));
                tally.skipped += 1;
                continue;
            }
            _ => {}
        }

        match analyze_one(reader, &var) {
            Ok((rows, whole)) => {
                report.push_str(&rows);
                if whole {
                    tally.whole_processed += 1;
                }
                else {
                    tally.slab_processed += 1;
                }
            }
            Err(err) => {
                warn!("{}: {err}", var.name);
                tally.skipped += 1;
            }
        }
    }

    report.push_str(&format!(
        "\n{} whole, {} slab-processed, {} skipped\n",
        tally.whole_processed, tally.slab_processed, tally.skipped
    ));

    Ok((report, tally))
}

/// Whether `var_name` is reachable from group path `group` (prefix match on the slash-delimited
/// path the `netcdf` crate exposes variable names under when nested in groups).
fn in_group(var_name: &str, group: &str) -> bool {
    let group = group.trim_end_matches('/');
    var_name.starts_with(group)
}

fn analyze_one(reader: &dyn ContainerReader, var: &VarMeta) -> Result<(String, bool)> {
    let bit_width = var.element_type.bit_width().unwrap_or(32);
    let shape_str = format_shape(&var.shape);

    if var.rank() <= 2 {
        let buffer = reader.read_all(&var.name)?;
        let words = buffer_words(&buffer);
        let report = BitPatternReport::summarize(words.into_iter(), bit_width);
        let row = format_report_row(&var.name, &shape_str, &format_bit_pattern(&report));
        return Ok((format!("{row}\n"), true));
    }

    let leading: Vec<u64> = var.shape[..var.rank() - 2].to_vec();
    let trailing = &var.shape[var.rank() - 2..];

    let mut rows = String::new();
    for index in SlabIndex::new(&leading) {
        let mut start: Vec<u64> = index.clone();
        start.push(0);
        start.push(0);
        let mut count: Vec<u64> = vec![1; index.len()];
        count.extend_from_slice(trailing);

        let buffer = reader.read_hyperslab(&var.name, &start, &count)?;
        let words = buffer_words(&buffer);
        let report = BitPatternReport::summarize(words.into_iter(), bit_width);

        let label = format!("{}{}", var.name, format_slice_label(&index));
        rows.push_str(&format!("{}\n", format_report_row(&label, &shape_str, &format_bit_pattern(&report))));
    }

    debug!("{}: summarised {} slabs", var.name, SlabIndex::new(&leading).count());
    Ok((rows, false))
}
