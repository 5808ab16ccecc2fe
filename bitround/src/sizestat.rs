// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Size statistics (`size-stat`): per-variable uncompressed and on-disk size, chunk payload
//! statistics, classified and sorted for a quick look at where a file's bytes actually go.

use log::warn;

use bitround_core::container::{classify_var, ContainerReader, Dimension, VarClass, VarMeta};
use bitround_core::Result;

/// Size figures recorded for one variable.
#[derive(Debug, Clone)]
pub struct SizeStat {
    pub name: String,
    pub class: SizeClass,
    pub uncompressed: u64,
    pub on_disk: u64,
    pub chunk_min: Option<u64>,
    pub chunk_max: Option<u64>,
    pub chunk_mean: Option<f64>,
}

/// The three-way-plus-other classification the report groups variables into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    ThreeDPlus,
    TwoD,
    Coordinate,
    Other,
}

impl std::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeClass::ThreeDPlus => write!(f, "3-D+"),
            SizeClass::TwoD => write!(f, "2-D"),
            SizeClass::Coordinate => write!(f, "coordinate"),
            SizeClass::Other => write!(f, "other"),
        }
    }
}

/// Compute size statistics for every variable of `reader` and render the categorised, sorted
/// report the contract describes.
pub fn size_stat(reader: &dyn ContainerReader) -> Result<String> {
    let stats = collect(reader)?;
    let file_total: u64 = stats.iter().map(|s| s.on_disk).sum();
    Ok(render(&stats, file_total))
}

/// Compute size statistics for every variable of `reader`, in container-index order, without
/// rendering a report. Shared with `bit-round`'s per-variable compression-ratio line, so both
/// commands agree on what "on-disk size" means for a variable.
pub fn collect(reader: &dyn ContainerReader) -> Result<Vec<SizeStat>> {
    let dims = reader.dimensions()?;
    let mut stats = Vec::new();

    for var in reader.variables()? {
        match one_var_stat(reader, &var, &dims) {
            Ok(stat) => stats.push(stat),
            Err(err) => warn!("{}: {err}", var.name),
        }
    }

    Ok(stats)
}

fn one_var_stat(reader: &dyn ContainerReader, var: &VarMeta, dims: &[Dimension]) -> Result<SizeStat> {
    let class = match classify_var(var, dims) {
        VarClass::Coordinate => SizeClass::Coordinate,
        _ if var.rank() >= 3 => SizeClass::ThreeDPlus,
        _ if var.rank() == 2 => SizeClass::TwoD,
        _ => SizeClass::Other,
    };

    let elem_size = var.element_type.fixed_size().unwrap_or(1) as u64;
    let uncompressed = var.element_count() * elem_size;

    let chunks = reader.chunk_info(&var.name).unwrap_or_default();

    let (on_disk, chunk_min, chunk_max, chunk_mean) = if chunks.is_empty() {
        (uncompressed, None, None, None)
    }
    else {
        let sizes: Vec<u64> = chunks.iter().map(|c| c.payload_size).collect();
        let total: u64 = sizes.iter().sum();
        let min = *sizes.iter().min().unwrap();
        let max = *sizes.iter().max().unwrap();
        let mean = total as f64 / sizes.len() as f64;
        (total, Some(min), Some(max), Some(mean))
    };

    Ok(SizeStat { name: var.name.clone(), class, uncompressed, on_disk, chunk_min, chunk_max, chunk_mean })
}

fn render(stats: &[SizeStat], file_total: u64) -> String {
    let mut out = String::new();

    for class in [SizeClass::ThreeDPlus, SizeClass::TwoD, SizeClass::Coordinate, SizeClass::Other] {
        let mut group: Vec<&SizeStat> = stats.iter().filter(|s| s.class == class).collect();
        if group.is_empty() {
            continue;
        }
        group.sort_by(|a, b| b.on_disk.cmp(&a.on_disk));

        out.push_str(&format!("[{class}]\n"));
        for s in group {
            let proportion = if file_total > 0 { 100.0 * s.on_disk as f64 / file_total as f64 } else { 0.0 };
            out.push_str(&format!(
                "  {:<45}uncompressed={:<12}on_disk={:<12}({:.1}% of file)",
                s.name, s.uncompressed, s.on_disk, proportion
            ));
            if let (Some(min), Some(max), Some(mean)) = (s.chunk_min, s.chunk_max, s.chunk_mean) {
                out.push_str(&format!("  chunk[min={min} max={max} mean={mean:.1}]"));
            }
            out.push('\n');
        }
    }

    out
}
