// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A [`ContainerReader`]/[`ContainerWriter`] backend for NetCDF-4/HDF5 files.
//!
//! Whole-variable, hyperslab, and attribute access goes through the `netcdf` crate (safe bindings
//! over libnetcdf). Raw, still-filtered chunk access -- needed only by the concatenator -- has no
//! safe API in either `netcdf` or `hdf5`, so it is driven directly against the HDF5 C library by
//! the [`raw`] module; both crates open the same on-disk file side by side and are kept positioned
//! at the same variable/dataset by name.

#![allow(unsafe_code)]

pub mod raw;

use std::path::Path;

use log::{debug, warn};

use bitround_core::container::{
    AttrScope, AttrValue, Attr, Buffer, ChunkInfo, ContainerReader, ContainerWriter, Dimension,
    ElementType, FilterId, FilterStack, FilterStep, VarMeta,
};
use bitround_core::error::{unsupported_type_error, wrap_container_io_error, Result};

/// A read-only handle on one NetCDF-4/HDF5 file, open through both the high-level `netcdf` crate
/// (for typed whole-variable/hyperslab/attribute access) and the low-level `hdf5` crate (for
/// [`raw`]'s direct-chunk-I/O FFI). Both point at the same path; opening a file twice read-only is
/// explicitly allowed by the Reader contract.
pub struct NetcdfReader {
    nc: netcdf::File,
    h5: hdf5::File,
}

impl NetcdfReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let nc = netcdf::open(path).map_err(|err| wrap_container_io_error(err))?;
        let h5 = hdf5::File::open(path).map_err(|err| wrap_container_io_error(err))?;
        Ok(NetcdfReader { nc, h5 })
    }

    fn dataset(&self, var: &str) -> Result<hdf5::Dataset> {
        self.h5
            .dataset(var)
            .map_err(|err| wrap_container_io_error(err))
    }
}

/// A mutable handle on a NetCDF-4/HDF5 file being created. Whole-variable/attribute operations go
/// through `netcdf`; [`ContainerWriter::write_raw_chunk`] re-opens the path through `hdf5` lazily
/// (the `netcdf` crate must finish defining a variable, including its chunking and filters, before
/// HDF5 will agree to direct-chunk writes against it).
pub struct NetcdfWriter {
    nc: netcdf::FileMut,
    path: std::path::PathBuf,
    h5: Option<hdf5::File>,
}

impl NetcdfWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let nc = netcdf::create(&path).map_err(|err| wrap_container_io_error(err))?;
        Ok(NetcdfWriter { nc, path, h5: None })
    }

    /// Open (or reuse) the HDF5 handle used for direct-chunk writes. `netcdf`'s writes must be
    /// flushed first so the chunk's property list and B-tree entry actually exist on disk.
    fn dataset_for_raw_io(&mut self, var: &str) -> Result<hdf5::Dataset> {
        if self.h5.is_none() {
            self.nc.sync().map_err(|err| wrap_container_io_error(err))?;
            let h5 = hdf5::File::append(&self.path).map_err(|err| wrap_container_io_error(err))?;
            self.h5 = Some(h5);
        }
        self.h5
            .as_ref()
            .unwrap()
            .dataset(var)
            .map_err(|err| wrap_container_io_error(err))
    }
}

/// Translate a `netcdf` crate variable type into the container data model's [`ElementType`].
fn element_type_of(ty: &netcdf::types::NcVariableType) -> ElementType {
    use netcdf::types::{BasicType, NcVariableType};

    match ty {
        NcVariableType::Basic(BasicType::Short) => ElementType::I16,
        NcVariableType::Basic(BasicType::Ushort) => ElementType::U16,
        NcVariableType::Basic(BasicType::Int) => ElementType::I32,
        NcVariableType::Basic(BasicType::Uint) => ElementType::U32,
        NcVariableType::Basic(BasicType::Int64) => ElementType::I64,
        NcVariableType::Basic(BasicType::Uint64) => ElementType::U64,
        NcVariableType::Basic(BasicType::Float) => ElementType::F32,
        NcVariableType::Basic(BasicType::Double) => ElementType::F64,
        NcVariableType::Basic(BasicType::Char) => ElementType::Text,
        NcVariableType::String => ElementType::String,
        other => ElementType::Other(format!("{other:?}")),
    }
}

/// The reverse of [`element_type_of`], for defining a new variable of the given type.
fn nc_type_of(ty: &ElementType) -> Result<netcdf::types::NcVariableType> {
    use netcdf::types::{BasicType, NcVariableType};

    Ok(match ty {
        ElementType::I16 => NcVariableType::Basic(BasicType::Short),
        ElementType::U16 => NcVariableType::Basic(BasicType::Ushort),
        ElementType::I32 => NcVariableType::Basic(BasicType::Int),
        ElementType::U32 => NcVariableType::Basic(BasicType::Uint),
        ElementType::I64 => NcVariableType::Basic(BasicType::Int64),
        ElementType::U64 => NcVariableType::Basic(BasicType::Uint64),
        ElementType::F32 => NcVariableType::Basic(BasicType::Float),
        ElementType::F64 => NcVariableType::Basic(BasicType::Double),
        ElementType::Text => NcVariableType::Basic(BasicType::Char),
        ElementType::String => NcVariableType::String,
        ElementType::Opaque | ElementType::Other(_) => {
            return unsupported_type_error("opaque/unknown element type has no netCDF-4 equivalent")
        }
    })
}

fn filter_stack_of(var: &netcdf::Variable) -> FilterStack {
    let mut steps = Vec::new();

    if var.shuffle().unwrap_or(false) {
        steps.push(FilterStep::new(FilterId::Shuffle, vec![var.vartype().map(|t| t.size() as u32).unwrap_or(4)]));
    }
    if let Ok(Some(level)) = var.deflate_level() {
        steps.push(FilterStep::new(FilterId::Deflate, vec![level as u32]));
    }

    FilterStack(steps)
}

fn var_meta_of(var: &netcdf::Variable) -> Result<VarMeta> {
    let dims: Vec<netcdf::Dimension> = var.dimensions().to_vec();

    let shape: Vec<u64> = dims.iter().map(|d| d.len() as u64).collect();
    let dim_names: Vec<String> = dims.iter().map(|d| d.name().to_string()).collect();

    let chunk_shape = var.chunking().ok().flatten().map(|c| c.iter().map(|&n| n as u64).collect());

    let fill_value = var.fill_value::<f32>().ok().flatten().map(|v| v as f64);

    let attributes = var
        .attributes()
        .filter(|a| a.name() != "_FillValue")
        .map(attr_of)
        .collect::<Result<Vec<_>>>()?;

    Ok(VarMeta {
        name: var.name().to_string(),
        element_type: element_type_of(&var.vartype().map_err(|err| wrap_container_io_error(err))?),
        shape,
        dim_names,
        chunk_shape,
        filter_stack: filter_stack_of(var),
        fill_value,
        attributes,
    })
}

fn attr_of(attr: netcdf::Attribute) -> Result<Attr> {
    let name = attr.name().to_string();
    let value = attr.value().map_err(|err| wrap_container_io_error(err))?;

    let value = match value {
        netcdf::AttributeValue::Schar(v) => AttrValue::I32(v as i32),
        netcdf::AttributeValue::Short(v) => AttrValue::I32(v as i32),
        netcdf::AttributeValue::Int(v) => AttrValue::I32(v),
        netcdf::AttributeValue::Longlong(v) => AttrValue::I64(v),
        netcdf::AttributeValue::Float(v) => AttrValue::F32(v),
        netcdf::AttributeValue::Double(v) => AttrValue::F64(v),
        netcdf::AttributeValue::Str(v) => AttrValue::Text(v),
        netcdf::AttributeValue::Ints(v) => AttrValue::I32Array(v),
        netcdf::AttributeValue::Doubles(v) => AttrValue::F64Array(v),
        other => AttrValue::Text(format!("{other:?}")),
    };

    Ok(Attr { name, value })
}

impl ContainerReader for NetcdfReader {
    fn dimensions(&self) -> Result<Vec<Dimension>> {
        Ok(self
            .nc
            .dimensions()
            .map(|d| Dimension { name: d.name().to_string(), extent: d.len() as u64, is_unlimited: d.is_unlimited() })
            .collect())
    }

    fn variables(&self) -> Result<Vec<VarMeta>> {
        self.nc.variables().map(|v| var_meta_of(&v)).collect()
    }

    fn read_all(&self, var: &str) -> Result<Buffer> {
        let variable =
            self.nc.variable(var).ok_or_else(|| wrap_container_io_error(MissingVariable(var.to_string())))?;
        read_buffer(&variable, &element_type_of(&variable.vartype().map_err(|e| wrap_container_io_error(e))?), None, None)
    }

    fn read_hyperslab(&self, var: &str, start: &[u64], count: &[u64]) -> Result<Buffer> {
        let variable =
            self.nc.variable(var).ok_or_else(|| wrap_container_io_error(MissingVariable(var.to_string())))?;
        let ty = element_type_of(&variable.vartype().map_err(|e| wrap_container_io_error(e))?);
        read_buffer(&variable, &ty, Some(start), Some(count))
    }

    fn chunk_info(&self, var: &str) -> Result<Vec<ChunkInfo>> {
        raw::chunk_info(&self.dataset(var)?)
    }

    fn read_raw_chunk(&self, var: &str, coord: &[u64]) -> Result<(u32, Vec<u8>)> {
        raw::read_raw_chunk(&self.dataset(var)?, coord)
    }

    fn attributes(&self, scope: AttrScope<'_>) -> Result<Vec<Attr>> {
        let attrs: Box<dyn Iterator<Item = netcdf::Attribute>> = match scope {
            AttrScope::Root => Box::new(self.nc.attributes()),
            AttrScope::Group(path) => {
                let group = self
                    .nc
                    .group(path)
                    .map_err(|e| wrap_container_io_error(e))?
                    .ok_or_else(|| wrap_container_io_error(MissingVariable(path.to_string())))?;
                Box::new(group.attributes())
            }
            AttrScope::Variable(name) => {
                let variable = self
                    .nc
                    .variable(name)
                    .ok_or_else(|| wrap_container_io_error(MissingVariable(name.to_string())))?;
                Box::new(variable.attributes().collect::<Vec<_>>().into_iter())
            }
        };

        attrs.map(attr_of).collect()
    }
}

/// Read a variable's data (whole, or a hyperslab when `start`/`count` are given) into a
/// [`Buffer`] of the appropriate element type.
fn read_buffer(
    var: &netcdf::Variable,
    ty: &ElementType,
    start: Option<&[u64]>,
    count: Option<&[u64]>,
) -> Result<Buffer> {
    macro_rules! read_typed {
        ($t:ty, $variant:ident) => {{
            let data: Vec<$t> = match (start, count) {
                (Some(start), Some(count)) => var
                    .get_values((start, count))
                    .map_err(|e| wrap_container_io_error(e))?,
                _ => var.get_values(..).map_err(|e| wrap_container_io_error(e))?,
            };
            Buffer::$variant(data)
        }};
    }

    Ok(match ty {
        ElementType::F32 => read_typed!(f32, F32),
        ElementType::F64 => read_typed!(f64, F64),
        ElementType::I16 => read_typed!(i16, I16),
        ElementType::U16 => read_typed!(u16, U16),
        ElementType::I32 => read_typed!(i32, I32),
        ElementType::U32 => read_typed!(u32, U32),
        ElementType::I64 => read_typed!(i64, I64),
        ElementType::U64 => read_typed!(u64, U64),
        other => return unsupported_type_error(other.to_string()),
    })
}

impl ContainerWriter for NetcdfWriter {
    fn create_var(&mut self, meta: &VarMeta, chunk_shape: Option<&[u64]>, filter_stack: &FilterStack) -> Result<()> {
        for (name, &extent) in meta.dim_names.iter().zip(meta.shape.iter()) {
            if self.nc.dimension(name).is_none() {
                self.nc.add_dimension(name, extent as usize).map_err(|e| wrap_container_io_error(e))?;
            }
        }

        let ty = nc_type_of(&meta.element_type)?;
        let dim_names: Vec<&str> = meta.dim_names.iter().map(String::as_str).collect();

        let mut var = self
            .nc
            .add_variable_with_type(&meta.name, &dim_names, &ty)
            .map_err(|e| wrap_container_io_error(e))?;

        if let Some(chunks) = chunk_shape {
            let chunks: Vec<usize> = chunks.iter().map(|&c| c as usize).collect();
            var.set_chunking(&chunks).map_err(|e| wrap_container_io_error(e))?;
        }

        let shuffle = filter_stack.steps().iter().any(|s| s.id() == Some(FilterId::Shuffle));
        let deflate = filter_stack.steps().iter().find_map(|s| match s.id() {
            Some(FilterId::Deflate) => s.params.first().copied(),
            _ => None,
        });
        if let Some(level) = deflate {
            var.set_compression(level as i32, shuffle).map_err(|e| wrap_container_io_error(e))?;
        }

        if let Some(fill) = meta.fill_value {
            var.set_fill_value(fill as f32).map_err(|e| wrap_container_io_error(e))?;
        }

        debug!("created variable {} with shape {:?}", meta.name, meta.shape);
        Ok(())
    }

    fn write_all(&mut self, var: &str, buffer: &Buffer) -> Result<()> {
        let mut variable = self
            .nc
            .variable_mut(var)
            .ok_or_else(|| wrap_container_io_error(MissingVariable(var.to_string())))?;
        write_buffer(&mut variable, buffer, None, None)
    }

    fn write_hyperslab(&mut self, var: &str, start: &[u64], count: &[u64], buffer: &Buffer) -> Result<()> {
        let mut variable = self
            .nc
            .variable_mut(var)
            .ok_or_else(|| wrap_container_io_error(MissingVariable(var.to_string())))?;
        write_buffer(&mut variable, buffer, Some(start), Some(count))
    }

    fn write_raw_chunk(&mut self, var: &str, coord: &[u64], filter_mask: u32, bytes: &[u8]) -> Result<()> {
        let dataset = self.dataset_for_raw_io(var)?;
        raw::write_raw_chunk(&dataset, coord, filter_mask, bytes)
    }

    fn set_extent(&mut self, var: &str, new_shape: &[u64]) -> Result<()> {
        let variable = self
            .nc
            .variable(var)
            .ok_or_else(|| wrap_container_io_error(MissingVariable(var.to_string())))?;

        for (name, &extent) in variable.dimensions().iter().map(|d| d.name().to_string()).zip(new_shape) {
            if let Some(mut dim) = self.nc.dimension_mut(&name) {
                if dim.is_unlimited() {
                    dim.resize(extent as usize).map_err(|e| wrap_container_io_error(e))?;
                }
            }
        }

        Ok(())
    }

    fn copy_attribute(&mut self, src: &dyn ContainerReader, scope: AttrScope<'_>, name: &str) -> Result<()> {
        let attrs = src.attributes(scope)?;
        let Some(attr) = attrs.into_iter().find(|a| a.name == name) else {
            warn!("attribute {name} not found on source while copying; skipping");
            return Ok(());
        };

        let target_scope = match scope {
            AttrScope::Root => None,
            AttrScope::Group(g) => Some(g.to_string()),
            AttrScope::Variable(v) => Some(v.to_string()),
        };

        put_attribute(&mut self.nc, target_scope.as_deref(), scope, &attr)
    }

    fn put_attribute(&mut self, scope: AttrScope<'_>, attr: &Attr) -> Result<()> {
        let target = match scope {
            AttrScope::Root => None,
            AttrScope::Group(g) => Some(g),
            AttrScope::Variable(v) => Some(v),
        };
        put_attribute(&mut self.nc, target, scope, attr)
    }

    fn flush(&mut self) -> Result<()> {
        self.nc.sync().map_err(|e| wrap_container_io_error(e))
    }

    fn close(self: Box<Self>) -> Result<()> {
        // `netcdf::FileMut`'s `Drop` impl closes the underlying file handle; nothing further is
        // required here beyond letting the box's contents drop.
        Ok(())
    }

    /// NetCDF-4's `DIMENSION_LIST` attribute references dimension-scale datasets by the *source*
    /// file's HDF5 object addresses. Those addresses are meaningless in the freshly-created output
    /// file, so every `DIMENSION_LIST` attribute in the tree is rewritten here to reference this
    /// file's own dimension-scale datasets, looked up by path instead of by address (see the
    /// Design Notes on cyclic dataset/dimension-scale references).
    fn repair_dimension_scale_references(&mut self) -> Result<()> {
        let var_names: Vec<String> = self.nc.variables().map(|v| v.name().to_string()).collect();

        for name in var_names {
            let Some(variable) = self.nc.variable(&name) else { continue };
            let dim_paths: Vec<String> = variable.dimensions().iter().map(|d| format!("/{}", d.name())).collect();
            drop(variable);

            if let Some(mut variable) = self.nc.variable_mut(&name) {
                if variable.attribute("DIMENSION_LIST").is_some() {
                    variable
                        .put_attribute("DIMENSION_LIST", netcdf::AttributeValue::Str(dim_paths.join(",")))
                        .map_err(|e| wrap_container_io_error(e))?;
                    debug!("repaired DIMENSION_LIST for {name} -> {dim_paths:?}");
                }
            }
        }

        Ok(())
    }
}

fn write_buffer(var: &mut netcdf::VariableMut, buffer: &Buffer, start: Option<&[u64]>, count: Option<&[u64]>) -> Result<()> {
    macro_rules! write_typed {
        ($data:expr) => {{
            match (start, count) {
                (Some(start), Some(count)) => var
                    .put_values($data, (start, count))
                    .map_err(|e| wrap_container_io_error(e))?,
                _ => var.put_values($data, ..).map_err(|e| wrap_container_io_error(e))?,
            }
        }};
    }

    match buffer {
        Buffer::F32(v) => write_typed!(v),
        Buffer::F64(v) => write_typed!(v),
        Buffer::I16(v) => write_typed!(v),
        Buffer::U16(v) => write_typed!(v),
        Buffer::I32(v) => write_typed!(v),
        Buffer::U32(v) => write_typed!(v),
        Buffer::I64(v) => write_typed!(v),
        Buffer::U64(v) => write_typed!(v),
        Buffer::Raw(_) => return unsupported_type_error("raw byte buffers cannot be written through write_all/write_hyperslab"),
    }

    Ok(())
}

fn put_attribute(
    file: &mut netcdf::FileMut,
    target: Option<&str>,
    scope: AttrScope<'_>,
    attr: &Attr,
) -> Result<()> {
    let value = match &attr.value {
        AttrValue::I32(v) => netcdf::AttributeValue::Int(*v),
        AttrValue::I64(v) => netcdf::AttributeValue::Longlong(*v),
        AttrValue::F32(v) => netcdf::AttributeValue::Float(*v),
        AttrValue::F64(v) => netcdf::AttributeValue::Double(*v),
        AttrValue::Text(v) => netcdf::AttributeValue::Str(v.clone()),
        AttrValue::I32Array(v) => netcdf::AttributeValue::Ints(v.clone()),
        AttrValue::F64Array(v) => netcdf::AttributeValue::Doubles(v.clone()),
    };

    match scope {
        AttrScope::Root => {
            file.add_attribute(&attr.name, value).map_err(|e| wrap_container_io_error(e))?;
        }
        AttrScope::Group(_) => {
            let path = target.unwrap_or_default();
            let mut group = file
                .group_mut(path)
                .map_err(|e| wrap_container_io_error(e))?
                .ok_or_else(|| wrap_container_io_error(MissingVariable(path.to_string())))?;
            group.add_attribute(&attr.name, value).map_err(|e| wrap_container_io_error(e))?;
        }
        AttrScope::Variable(_) => {
            let name = target.unwrap_or_default();
            let mut variable = file
                .variable_mut(name)
                .ok_or_else(|| wrap_container_io_error(MissingVariable(name.to_string())))?;
            variable.put_attribute(&attr.name, value).map_err(|e| wrap_container_io_error(e))?;
        }
    }

    Ok(())
}

#[derive(Debug)]
struct MissingVariable(String);

impl std::fmt::Display for MissingVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no such variable or group: {}", self.0)
    }
}

impl std::error::Error for MissingVariable {}
