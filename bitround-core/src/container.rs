// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data model for chunked, filter-stacked scientific array containers (the NetCDF-4/HDF5 family),
//! and the [`ContainerReader`]/[`ContainerWriter`] traits through which a concrete backend plugs
//! into the orchestrator. Everything in this module is pure data and trait contracts; no backend
//! lives here (see `bitround-netcdf` for one).

use std::fmt;

use crate::error::Result;

/// Element type of a variable. Mirrors the subset of the NetCDF-4/HDF5 atomic type system this
/// toolkit understands; `Other` carries a backend-specific type name for types it doesn't, so
/// analysis can still report "unsupported" with something useful in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Text,
    Opaque,
    String,
    Other(String),
}

impl ElementType {
    /// Size in bytes of a single element, when fixed-width; `Text`/`Opaque`/`String`/`Other`
    /// have no single fixed size at this layer.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            ElementType::I16 | ElementType::U16 => Some(2),
            ElementType::I32 | ElementType::U32 | ElementType::F32 => Some(4),
            ElementType::I64 | ElementType::U64 | ElementType::F64 => Some(8),
            _ => None,
        }
    }

    /// Whether this is the float32 type the bit-rounding pipeline operates on.
    pub fn is_f32(&self) -> bool {
        matches!(self, ElementType::F32)
    }

    /// Whether bit-pattern analysis supports this type: float32/64 and every supported integer
    /// width (see the design notes on analysing all supported integer widths, not just the
    /// reference tool's float-only behaviour).
    pub fn supports_bit_analysis(&self) -> bool {
        matches!(
            self,
            ElementType::I16
                | ElementType::U16
                | ElementType::I32
                | ElementType::U32
                | ElementType::I64
                | ElementType::U64
                | ElementType::F32
                | ElementType::F64
        )
    }

    /// Bit width of the element's image, for types [`Self::supports_bit_analysis`] accepts.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            ElementType::I16 | ElementType::U16 => Some(16),
            ElementType::I32 | ElementType::U32 | ElementType::F32 => Some(32),
            ElementType::I64 | ElementType::U64 | ElementType::F64 => Some(64),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::I16 => write!(f, "i16"),
            ElementType::U16 => write!(f, "u16"),
            ElementType::I32 => write!(f, "i32"),
            ElementType::U32 => write!(f, "u32"),
            ElementType::I64 => write!(f, "i64"),
            ElementType::U64 => write!(f, "u64"),
            ElementType::F32 => write!(f, "f32"),
            ElementType::F64 => write!(f, "f64"),
            ElementType::Text => write!(f, "text"),
            ElementType::Opaque => write!(f, "opaque"),
            ElementType::String => write!(f, "string"),
            ElementType::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A dimension shared across variables in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub extent: u64,
    pub is_unlimited: bool,
}

/// Identifier of a codec in a variable's filter stack. Well-known filters get their own variant;
/// anything else carries the raw HDF5 filter ID so chunk payloads can still be moved untouched
/// even when this crate doesn't understand the codec itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterId {
    Shuffle,
    Deflate,
    Szip,
    Other(u32),
}

/// One entry in a variable's ordered filter stack, with its codec-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterStep {
    pub id_value: Option<FilterId>,
    pub params: Vec<u32>,
}

impl FilterStep {
    pub fn new(id: FilterId, params: Vec<u32>) -> Self {
        FilterStep { id_value: Some(id), params }
    }

    pub fn shuffle(element_size: u32) -> Self {
        FilterStep::new(FilterId::Shuffle, vec![element_size])
    }

    pub fn deflate(level: u32) -> Self {
        FilterStep::new(FilterId::Deflate, vec![level])
    }

    pub fn id(&self) -> Option<FilterId> {
        self.id_value
    }
}

/// An ordered filter stack, applied front-to-back on write and inversely on read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterStack(pub Vec<FilterStep>);

impl FilterStack {
    pub fn none() -> Self {
        FilterStack(Vec::new())
    }

    pub fn shuffle_then_deflate(element_size: u32, level: u32) -> Self {
        FilterStack(vec![FilterStep::shuffle(element_size), FilterStep::deflate(level)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[FilterStep] {
        &self.0
    }
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    I32Array(Vec<i32>),
    F64Array(Vec<f64>),
}

/// A named, typed attribute attached to a group or variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    pub value: AttrValue,
}

/// What a group or variable's attributes belong to, for [`ContainerReader::attributes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrScope<'a> {
    Root,
    Group(&'a str),
    Variable(&'a str),
}

/// Metadata describing one variable, independent of its data.
#[derive(Debug, Clone, PartialEq)]
pub struct VarMeta {
    pub name: String,
    pub element_type: ElementType,
    pub shape: Vec<u64>,
    pub dim_names: Vec<String>,
    pub chunk_shape: Option<Vec<u64>>,
    pub filter_stack: FilterStack,
    pub fill_value: Option<f64>,
    pub attributes: Vec<Attr>,
}

impl VarMeta {
    /// Total number of elements, i.e. the product of `shape`.
    pub fn element_count(&self) -> u64 {
        self.shape.iter().product()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Whether this variable's shape includes the unlimited dimension (see `Record variable` in
    /// the data model): any dimension named in `dim_names` that a reader reports as unlimited.
    pub fn is_record(&self, dims: &[Dimension]) -> bool {
        self.dim_names.iter().any(|name| {
            dims.iter().any(|d| d.name == *name && d.is_unlimited)
        })
    }
}

/// How the orchestrator classifies a variable before deciding how to process it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarClass {
    Coordinate,
    NonFloat32,
    Scalar,
    Small,
    Large,
}

/// Classify `var` per the variable-classification table: coordinate variables and non-float32
/// variables are checked first (they're copied verbatim regardless of shape), then scalars, then
/// rank decides small (whole-variable) vs. large (slab-wise) processing.
pub fn classify_var(var: &VarMeta, dims: &[Dimension]) -> VarClass {
    if dims.iter().any(|d| d.name == var.name) {
        return VarClass::Coordinate;
    }
    if !var.element_type.is_f32() {
        return VarClass::NonFloat32;
    }
    if var.element_count() <= 1 {
        return VarClass::Scalar;
    }
    if var.rank() <= 2 {
        VarClass::Small
    }
    else {
        VarClass::Large
    }
}

/// Per-bit classification used by the bit-pattern summariser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitPattern {
    AllZero,
    AllOne,
    Mixed,
}

/// A bit-pattern summary over some buffer's elements, one entry per bit position (index 0 = MSB).
#[derive(Debug, Clone)]
pub struct BitPatternReport {
    pub bits: Vec<BitPattern>,
}

impl BitPatternReport {
    /// Summarise the bit pattern of `words`, each `bit_width` bits wide, treating bit 0 as the
    /// MSB. Non-finite float values must already have been filtered out by the caller (the bit
    /// pattern of NaN/infinity payload bits is not meaningful to this summary).
    pub fn summarize(words: impl Iterator<Item = u64>, bit_width: u32) -> Self {
        let mut seen_zero = vec![false; bit_width as usize];
        let mut seen_one = vec![false; bit_width as usize];
        let mut any = false;

        for w in words {
            any = true;
            for b in 0..bit_width {
                let shift = bit_width - 1 - b;
                if (w >> shift) & 1 == 1 {
                    seen_one[b as usize] = true;
                }
                else {
                    seen_zero[b as usize] = true;
                }
            }
        }

        let bits = (0..bit_width as usize)
            .map(|b| {
                if !any {
                    BitPattern::AllZero
                }
                else if seen_zero[b] && seen_one[b] {
                    BitPattern::Mixed
                }
                else if seen_one[b] {
                    BitPattern::AllOne
                }
                else {
                    BitPattern::AllZero
                }
            })
            .collect();

        BitPatternReport { bits }
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        let mut zero = 0;
        let mut one = 0;
        let mut mixed = 0;
        for b in &self.bits {
            match b {
                BitPattern::AllZero => zero += 1,
                BitPattern::AllOne => one += 1,
                BitPattern::Mixed => mixed += 1,
            }
        }
        (zero, one, mixed)
    }
}

/// Coordinate and filter mask of one on-disk chunk, as reported by a Reader without decoding the
/// chunk's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    pub coord: Vec<u64>,
    pub filter_mask: u32,
    pub payload_size: u64,
}

/// In-memory variable data, typed by element type. Only the types the orchestrator actually reads
/// and writes whole buffers of are represented here.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    Raw(Vec<u8>),
}

/// A read-only handle on one opened container file.
///
/// Implementations are expected to be cheap to open multiple times read-only against the same
/// path; this trait has no mutating methods.
pub trait ContainerReader {
    fn dimensions(&self) -> Result<Vec<Dimension>>;
    fn variables(&self) -> Result<Vec<VarMeta>>;
    fn read_all(&self, var: &str) -> Result<Buffer>;
    fn read_hyperslab(&self, var: &str, start: &[u64], count: &[u64]) -> Result<Buffer>;
    fn chunk_info(&self, var: &str) -> Result<Vec<ChunkInfo>>;
    fn read_raw_chunk(&self, var: &str, coord: &[u64]) -> Result<(u32, Vec<u8>)>;
    fn attributes(&self, scope: AttrScope<'_>) -> Result<Vec<Attr>>;
}

/// A mutable handle on one container file being created or extended.
///
/// The orchestrator is the sole owner of any `ContainerWriter` it opens; see the concurrency
/// design notes on the writer being the only mutable shared resource.
pub trait ContainerWriter {
    fn create_var(
        &mut self,
        meta: &VarMeta,
        chunk_shape: Option<&[u64]>,
        filter_stack: &FilterStack,
    ) -> Result<()>;
    fn write_all(&mut self, var: &str, buffer: &Buffer) -> Result<()>;
    fn write_hyperslab(&mut self, var: &str, start: &[u64], count: &[u64], buffer: &Buffer) -> Result<()>;
    fn write_raw_chunk(&mut self, var: &str, coord: &[u64], filter_mask: u32, bytes: &[u8]) -> Result<()>;
    fn set_extent(&mut self, var: &str, new_shape: &[u64]) -> Result<()>;
    fn copy_attribute(&mut self, src: &dyn ContainerReader, scope: AttrScope<'_>, name: &str) -> Result<()>;
    /// Write (creating or overwriting) one attribute directly, without a source Reader. Used by
    /// the concatenator to prepend an entry to the root `history` attribute, which has no
    /// analogue in any input file to copy from.
    fn put_attribute(&mut self, scope: AttrScope<'_>, attr: &Attr) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn close(self: Box<Self>) -> Result<()>;

    /// Called once after an entire metadata tree has been cloned into this writer, so a backend
    /// that encodes inter-dataset references by address (NetCDF-4's `DIMENSION_LIST`, which
    /// points at dimension-scale datasets by the *source* file's object addresses) can rewrite
    /// them to point at this file's own dimension scales instead. Backends with no such
    /// address-based references can leave this a no-op.
    fn repair_dimension_scale_references(&mut self) -> Result<()> {
        Ok(())
    }
}
