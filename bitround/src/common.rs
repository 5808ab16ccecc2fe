// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small helpers shared by the Array I/O Orchestrator's four operations.

use bitround_core::container::{AttrScope, Buffer, ContainerReader, ContainerWriter, VarMeta};
use bitround_core::Result;

/// Flatten a [`Buffer`] into its bit-image words (native-endian, widened to `u64`), for feeding
/// [`bitround_core::container::BitPatternReport::summarize`]. Non-finite float values are
/// dropped, matching the contract's "non-finite values are ignored".
pub fn buffer_words(buffer: &Buffer) -> Vec<u64> {
    match buffer {
        Buffer::F32(v) => v.iter().filter(|x| x.is_finite()).map(|&x| x.to_bits() as u64).collect(),
        Buffer::F64(v) => v.iter().filter(|x| x.is_finite()).map(|&x| x.to_bits()).collect(),
        Buffer::I16(v) => v.iter().map(|&x| x as u16 as u64).collect(),
        Buffer::U16(v) => v.iter().map(|&x| x as u64).collect(),
        Buffer::I32(v) => v.iter().map(|&x| x as u32 as u64).collect(),
        Buffer::U32(v) => v.iter().map(|&x| x as u64).collect(),
        Buffer::I64(v) => v.iter().map(|&x| x as u64).collect(),
        Buffer::U64(v) => v.to_vec(),
        Buffer::Raw(_) => Vec::new(),
    }
}

/// Copy one variable from `reader` to `writer` unchanged: definition, whole-buffer data, and
/// every attribute. Used for coordinate/scalar/non-float passthrough in both the analyser's
/// sibling operations and the bit-rounding rewrite.
pub fn copy_variable_verbatim(reader: &dyn ContainerReader, writer: &mut dyn ContainerWriter, var: &VarMeta) -> Result<()> {
    writer.create_var(var, var.chunk_shape.as_deref(), &var.filter_stack)?;
    let buffer = reader.read_all(&var.name)?;
    writer.write_all(&var.name, &buffer)?;
    copy_all_attributes(reader, writer, var)
}

/// Copy every attribute of variable `var` from `reader` to `writer`.
pub fn copy_all_attributes(reader: &dyn ContainerReader, writer: &mut dyn ContainerWriter, var: &VarMeta) -> Result<()> {
    for attr in &var.attributes {
        writer.copy_attribute(reader, AttrScope::Variable(&var.name), &attr.name)?;
    }
    Ok(())
}
