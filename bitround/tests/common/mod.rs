// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory [`ContainerReader`]/[`ContainerWriter`] double, used by this crate's integration
//! tests to exercise the Array I/O Orchestrator without linking against real netCDF/HDF5
//! libraries. It supports exactly the subset of the container model the orchestrator actually
//! drives: whole-variable and hyperslab access for `F32`/`F64` data, chunk enumeration and raw
//! (here: unfiltered) chunk movement for the concatenator, and attribute copying.
//!
//! This mirrors the teacher workspace's habit of keeping integration-test support code under
//! `tests/common/` rather than inside a crate's own `src/` tree (see e.g.
//! `snarkos-network/tests/common/mod.rs` in the sibling `AleoNet-snarkOS` example repo).

#![allow(dead_code)]

use std::collections::HashMap;

use bitround_core::container::{
    Attr, AttrScope, AttrValue, Buffer, ChunkInfo, ContainerReader, ContainerWriter, Dimension,
    ElementType, FilterStack, VarMeta,
};
use bitround_core::error::{unsupported_type_error, BitroundError, Result};
use bitround_core::slab::SlabIndex;

/// An in-memory container: a flat list of variables (each with its own element buffer, chunk
/// shape, and filter stack) plus shared dimensions and root attributes.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    pub dims: Vec<Dimension>,
    pub vars: Vec<VarMeta>,
    pub data: HashMap<String, Buffer>,
    pub root_attrs: Vec<Attr>,
}

impl MemoryContainer {
    pub fn new(dims: Vec<Dimension>) -> Self {
        MemoryContainer { dims, vars: Vec::new(), data: HashMap::new(), root_attrs: Vec::new() }
    }

    /// Define a variable and seed its data buffer, as if it had already been written to disk.
    pub fn add_var(&mut self, meta: VarMeta, buffer: Buffer) {
        self.data.insert(meta.name.clone(), buffer);
        self.vars.push(meta);
    }

    fn var_meta(&self, name: &str) -> Result<&VarMeta> {
        self.vars.iter().find(|v| v.name == name).ok_or_else(|| missing(name))
    }

    fn var_meta_mut(&mut self, name: &str) -> Result<&mut VarMeta> {
        self.vars.iter_mut().find(|v| v.name == name).ok_or_else(|| missing(name))
    }
}

fn missing(name: &str) -> BitroundError {
    BitroundError::ContainerIoError(Box::new(MissingVar(name.to_string())))
}

#[derive(Debug)]
struct MissingVar(String);

impl std::fmt::Display for MissingVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no such variable: {}", self.0)
    }
}

impl std::error::Error for MissingVar {}

/// Row-major strides for `shape`, most-significant dimension first.
fn strides(shape: &[u64]) -> Vec<u64> {
    let mut s = vec![1u64; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        s[i] = s[i + 1] * shape[i + 1];
    }
    s
}

fn flat_index(strides: &[u64], start: &[u64], local: &[u64]) -> usize {
    strides
        .iter()
        .zip(start.iter().zip(local))
        .map(|(&s, (&b, &l))| s * (b + l))
        .sum::<u64>() as usize
}

/// Clip a chunk's nominal `chunk_shape` to however much of it actually lies within `shape`,
/// starting at `coord` -- the short trailing chunk the alignment rule in §4.5.4 worries about.
fn clipped_chunk_count(coord: &[u64], chunk_shape: &[u64], shape: &[u64]) -> Vec<u64> {
    coord
        .iter()
        .zip(chunk_shape)
        .zip(shape)
        .map(|((&c, &cs), &extent)| cs.min(extent.saturating_sub(c)))
        .collect()
}

/// Extract (or overwrite) the `count`-shaped hyperslab starting at `start` out of (into) a flat
/// row-major buffer with full extent `shape`.
macro_rules! hyperslab_impl {
    ($read:ident, $write:ident) => {
        fn $read<T: Copy + Default>(data: &[T], shape: &[u64], start: &[u64], count: &[u64]) -> Vec<T> {
            let strides = strides(shape);
            let mut out = Vec::with_capacity(count.iter().product::<u64>() as usize);
            for local in SlabIndex::new(count) {
                out.push(data[flat_index(&strides, start, &local)]);
            }
            out
        }

        fn $write<T: Copy>(data: &mut [T], shape: &[u64], start: &[u64], count: &[u64], values: &[T]) {
            let strides = strides(shape);
            for (local, &v) in SlabIndex::new(count).zip(values) {
                data[flat_index(&strides, start, &local)] = v;
            }
        }
    };
}

hyperslab_impl!(read_slab, write_slab);

fn whole_range(shape: &[u64]) -> (Vec<u64>, Vec<u64>) {
    (vec![0u64; shape.len()], shape.to_vec())
}

impl ContainerReader for MemoryContainer {
    fn dimensions(&self) -> Result<Vec<Dimension>> {
        Ok(self.dims.clone())
    }

    fn variables(&self) -> Result<Vec<VarMeta>> {
        Ok(self.vars.clone())
    }

    fn read_all(&self, var: &str) -> Result<Buffer> {
        let meta = self.var_meta(var)?;
        let (start, count) = whole_range(&meta.shape);
        self.read_hyperslab_inner(var, &meta.shape, &start, &count)
    }

    fn read_hyperslab(&self, var: &str, start: &[u64], count: &[u64]) -> Result<Buffer> {
        let meta = self.var_meta(var)?;
        self.read_hyperslab_inner(var, &meta.shape, start, count)
    }

    fn chunk_info(&self, var: &str) -> Result<Vec<ChunkInfo>> {
        let meta = self.var_meta(var)?;
        let elem_size = meta.element_type.fixed_size().unwrap_or(4) as u64;

        let chunk_shape = match &meta.chunk_shape {
            Some(cs) => cs.clone(),
            None => meta.shape.clone(),
        };

        let n_chunks: Vec<u64> =
            chunk_shape.iter().zip(&meta.shape).map(|(&cs, &extent)| extent.div_ceil(cs.max(1))).collect();

        let mut out = Vec::new();
        for chunk_idx in SlabIndex::new(&n_chunks) {
            let coord: Vec<u64> = chunk_idx.iter().zip(&chunk_shape).map(|(&i, &cs)| i * cs).collect();
            let count = clipped_chunk_count(&coord, &chunk_shape, &meta.shape);
            let payload_size = count.iter().product::<u64>() * elem_size;
            out.push(ChunkInfo { coord, filter_mask: 0, payload_size });
        }
        Ok(out)
    }

    fn read_raw_chunk(&self, var: &str, coord: &[u64]) -> Result<(u32, Vec<u8>)> {
        let meta = self.var_meta(var)?;
        let chunk_shape = meta.chunk_shape.clone().unwrap_or_else(|| meta.shape.clone());
        let count = clipped_chunk_count(coord, &chunk_shape, &meta.shape);
        let buffer = self.read_hyperslab_inner(var, &meta.shape, coord, &count)?;
        Ok((0, buffer_to_bytes(&buffer)?))
    }

    fn attributes(&self, scope: AttrScope<'_>) -> Result<Vec<Attr>> {
        match scope {
            AttrScope::Root => Ok(self.root_attrs.clone()),
            AttrScope::Group(_) => Ok(Vec::new()),
            AttrScope::Variable(name) => Ok(self.var_meta(name)?.attributes.clone()),
        }
    }
}

impl MemoryContainer {
    fn read_hyperslab_inner(&self, var: &str, shape: &[u64], start: &[u64], count: &[u64]) -> Result<Buffer> {
        let buffer = self.data.get(var).ok_or_else(|| missing(var))?;
        Ok(match buffer {
            Buffer::F32(v) => Buffer::F32(read_slab(v, shape, start, count)),
            Buffer::F64(v) => Buffer::F64(read_slab(v, shape, start, count)),
            Buffer::I16(v) => Buffer::I16(read_slab(v, shape, start, count)),
            Buffer::U16(v) => Buffer::U16(read_slab(v, shape, start, count)),
            Buffer::I32(v) => Buffer::I32(read_slab(v, shape, start, count)),
            Buffer::U32(v) => Buffer::U32(read_slab(v, shape, start, count)),
            Buffer::I64(v) => Buffer::I64(read_slab(v, shape, start, count)),
            Buffer::U64(v) => Buffer::U64(read_slab(v, shape, start, count)),
            Buffer::Raw(_) => return unsupported_type_error("raw buffers have no hyperslab shape"),
        })
    }
}

fn buffer_to_bytes(buffer: &Buffer) -> Result<Vec<u8>> {
    Ok(match buffer {
        Buffer::F32(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        Buffer::F64(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        Buffer::I32(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        Buffer::U32(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        _ => return unsupported_type_error("unsupported element type for raw-chunk encoding in this test double"),
    })
}

fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_ne_bytes(c.try_into().unwrap())).collect()
}

impl ContainerWriter for MemoryContainer {
    fn create_var(&mut self, meta: &VarMeta, chunk_shape: Option<&[u64]>, filter_stack: &FilterStack) -> Result<()> {
        let mut meta = meta.clone();
        meta.chunk_shape = chunk_shape.map(|c| c.to_vec());
        meta.filter_stack = filter_stack.clone();

        let count = meta.element_count() as usize;
        let buffer = match meta.element_type {
            ElementType::F32 => Buffer::F32(vec![0.0; count]),
            ElementType::F64 => Buffer::F64(vec![0.0; count]),
            ElementType::I16 => Buffer::I16(vec![0; count]),
            ElementType::U16 => Buffer::U16(vec![0; count]),
            ElementType::I32 => Buffer::I32(vec![0; count]),
            ElementType::U32 => Buffer::U32(vec![0; count]),
            ElementType::I64 => Buffer::I64(vec![0; count]),
            ElementType::U64 => Buffer::U64(vec![0; count]),
            _ => return unsupported_type_error("unsupported element type in test double"),
        };

        self.data.insert(meta.name.clone(), buffer);
        self.vars.retain(|v| v.name != meta.name);
        self.vars.push(meta);
        Ok(())
    }

    fn write_all(&mut self, var: &str, buffer: &Buffer) -> Result<()> {
        self.var_meta(var)?;
        self.data.insert(var.to_string(), buffer.clone());
        Ok(())
    }

    fn write_hyperslab(&mut self, var: &str, start: &[u64], count: &[u64], buffer: &Buffer) -> Result<()> {
        let shape = self.var_meta(var)?.shape.clone();
        let existing = self.data.get_mut(var).ok_or_else(|| missing(var))?;

        match (existing, buffer) {
            (Buffer::F32(dst), Buffer::F32(src)) => write_slab(dst, &shape, start, count, src),
            (Buffer::F64(dst), Buffer::F64(src)) => write_slab(dst, &shape, start, count, src),
            (Buffer::I32(dst), Buffer::I32(src)) => write_slab(dst, &shape, start, count, src),
            (Buffer::U32(dst), Buffer::U32(src)) => write_slab(dst, &shape, start, count, src),
            _ => return unsupported_type_error("mismatched or unsupported buffer type in write_hyperslab"),
        }
        Ok(())
    }

    fn write_raw_chunk(&mut self, var: &str, coord: &[u64], _filter_mask: u32, bytes: &[u8]) -> Result<()> {
        let meta = self.var_meta(var)?;
        let chunk_shape = meta.chunk_shape.clone().unwrap_or_else(|| meta.shape.clone());
        let shape = meta.shape.clone();
        let count = clipped_chunk_count(coord, &chunk_shape, &shape);

        let values = bytes_to_f32(bytes);
        let Buffer::F32(dst) = self.data.get_mut(var).ok_or_else(|| missing(var))?
        else {
            return unsupported_type_error("write_raw_chunk only supports F32 in this test double");
        };
        write_slab(dst, &shape, coord, &count, &values);
        Ok(())
    }

    fn set_extent(&mut self, var: &str, new_shape: &[u64]) -> Result<()> {
        let old_shape = self.var_meta(var)?.shape.clone();
        let old_count = old_shape.iter().product::<u64>() as usize;

        let buffer = self.data.get(var).ok_or_else(|| missing(var))?.clone();
        let resized = resize_preserving_prefix(buffer, old_count, new_shape);
        self.data.insert(var.to_string(), resized);

        self.var_meta_mut(var)?.shape = new_shape.to_vec();
        Ok(())
    }

    fn copy_attribute(&mut self, src: &dyn ContainerReader, scope: AttrScope<'_>, name: &str) -> Result<()> {
        let attrs = src.attributes(scope)?;
        let Some(attr) = attrs.into_iter().find(|a| a.name == name)
        else {
            return Ok(());
        };
        self.put_attribute(scope, &attr)
    }

    fn put_attribute(&mut self, scope: AttrScope<'_>, attr: &Attr) -> Result<()> {
        match scope {
            AttrScope::Root => {
                self.root_attrs.retain(|a| a.name != attr.name);
                self.root_attrs.push(attr.clone());
            }
            AttrScope::Group(_) => {}
            AttrScope::Variable(name) => {
                let meta = self.var_meta_mut(name)?;
                meta.attributes.retain(|a| a.name != attr.name);
                meta.attributes.push(attr.clone());
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Grow a buffer's backing storage from `old_count` elements to `product(new_shape)` elements,
/// keeping the first `old_count` elements in place and zero-filling the rest. Sound only when the
/// newly extended dimension is the outermost one (true of every unlimited/record dimension this
/// test double is exercised against), since row-major layout then keeps the old data's bytes
/// contiguous at the front of the buffer.
fn resize_preserving_prefix(buffer: Buffer, old_count: usize, new_shape: &[u64]) -> Buffer {
    let new_count = new_shape.iter().product::<u64>() as usize;

    macro_rules! grow {
        ($v:expr, $fill:expr) => {{
            let mut v = $v;
            v.resize(new_count.max(old_count), $fill);
            v
        }};
    }

    match buffer {
        Buffer::F32(v) => Buffer::F32(grow!(v, 0.0)),
        Buffer::F64(v) => Buffer::F64(grow!(v, 0.0)),
        Buffer::I16(v) => Buffer::I16(grow!(v, 0)),
        Buffer::U16(v) => Buffer::U16(grow!(v, 0)),
        Buffer::I32(v) => Buffer::I32(grow!(v, 0)),
        Buffer::U32(v) => Buffer::U32(grow!(v, 0)),
        Buffer::I64(v) => Buffer::I64(grow!(v, 0)),
        Buffer::U64(v) => Buffer::U64(grow!(v, 0)),
        Buffer::Raw(v) => Buffer::Raw(v),
    }
}

/// Build the small, shared two-dimensional-grid container used by several tests: a `lat`/`lon`
/// coordinate pair and a `time` unlimited dimension, with no variables defined yet.
pub fn grid_dims() -> Vec<Dimension> {
    vec![
        Dimension { name: "time".into(), extent: 0, is_unlimited: true },
        Dimension { name: "lat".into(), extent: 4, is_unlimited: false },
        Dimension { name: "lon".into(), extent: 3, is_unlimited: false },
    ]
}

pub fn f32_var(name: &str, shape: Vec<u64>, dim_names: Vec<&str>) -> VarMeta {
    VarMeta {
        name: name.to_string(),
        element_type: ElementType::F32,
        shape,
        dim_names: dim_names.into_iter().map(String::from).collect(),
        chunk_shape: None,
        filter_stack: FilterStack::none(),
        fill_value: None,
        attributes: Vec::new(),
    }
}

pub fn attr_text(name: &str, value: &str) -> Attr {
    Attr { name: name.to_string(), value: AttrValue::Text(value.to_string()) }
}
