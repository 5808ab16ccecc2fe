// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Direct-chunk I/O via HDF5 FFI.
//!
//! Neither the `netcdf` nor the safe `hdf5` crate expose `H5Dget_chunk_info` / `H5Dread_chunk` /
//! `H5Dwrite_chunk`: there is no way to move a chunk's filtered (still-compressed) payload
//! without decoding it through the safe API. The raw-chunk concatenator needs exactly that, so
//! this module is the one place in the workspace `unsafe` is used, confined behind the four
//! functions below and built on `hdf5-sys`'s raw bindings.
//!
//! Every function here takes a `hdf5::Dataset` (for its property lists and type information) and
//! drives the C API directly using its raw ids; `hdf5` keeps those ids alive for as long as the
//! safe wrapper value is, so borrowing `dataset` for the duration of the call is sound.

use std::convert::TryInto;
use std::ffi::c_void;
use std::os::raw::c_uint;

use hdf5::Dataset;
use hdf5_sys::h5::{haddr_t, hsize_t};
use hdf5_sys::h5d::{H5Dget_chunk_info, H5Dget_num_chunks, H5Dread_chunk, H5Dwrite_chunk};
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5s::H5S_ALL;

use bitround_core::container::ChunkInfo;
use bitround_core::error::{container_io_error, wrap_container_io_error, Result};

/// Enumerate every on-disk chunk of `dataset` without decoding any payload.
pub fn chunk_info(dataset: &Dataset) -> Result<Vec<ChunkInfo>> {
    let dataset_id = dataset.id();
    let rank = dataset.ndim();

    let mut n_chunks: hsize_t = 0;
    let status = unsafe { H5Dget_num_chunks(dataset_id, H5S_ALL, &mut n_chunks) };
    if status < 0 {
        return container_io_error(HdfError::new("H5Dget_num_chunks failed"));
    }

    let mut out = Vec::with_capacity(n_chunks as usize);

    for idx in 0..n_chunks {
        let mut offsets = vec![0 as hsize_t; rank];
        let mut filter_mask: c_uint = 0;
        let mut addr: haddr_t = 0;
        let mut size: hsize_t = 0;

        let status = unsafe {
            H5Dget_chunk_info(
                dataset_id,
                H5S_ALL,
                idx,
                offsets.as_mut_ptr(),
                &mut filter_mask,
                &mut addr,
                &mut size,
            )
        };
        if status < 0 {
            return container_io_error(HdfError::new("H5Dget_chunk_info failed"));
        }

        out.push(ChunkInfo {
            coord: offsets.into_iter().map(|o| o as u64).collect(),
            filter_mask: filter_mask as u32,
            payload_size: size as u64,
        });
    }

    Ok(out)
}

/// Read the raw (still-filtered) payload of the chunk starting at `coord`, along with the filter
/// mask that was in effect when it was written.
pub fn read_raw_chunk(dataset: &Dataset, coord: &[u64]) -> Result<(u32, Vec<u8>)> {
    let dataset_id = dataset.id();

    let chunk = match chunk_info(dataset)?.into_iter().find(|c| c.coord == coord) {
        Some(chunk) => chunk,
        None => return container_io_error(HdfError::new("no chunk at requested coordinate")),
    };

    let offsets: Vec<hsize_t> = coord.iter().map(|&c| c as hsize_t).collect();
    let mut buf = vec![0u8; chunk.payload_size as usize];
    let mut filter_mask: c_uint = 0;

    let status = unsafe {
        H5Dread_chunk(dataset_id, H5S_ALL as hid_t, offsets.as_ptr(), &mut filter_mask, buf.as_mut_ptr() as *mut c_void)
    };
    if status < 0 {
        return container_io_error(HdfError::new("H5Dread_chunk failed"));
    }

    Ok((filter_mask as u32, buf))
}

/// Write `bytes` as the raw (already-filtered) payload of the chunk starting at `coord`.
pub fn write_raw_chunk(dataset: &Dataset, coord: &[u64], filter_mask: u32, bytes: &[u8]) -> Result<()> {
    let dataset_id = dataset.id();
    let offsets: Vec<hsize_t> = coord.iter().map(|&c| c as hsize_t).collect();
    let size: u32 = bytes
        .len()
        .try_into()
        .map_err(|_| wrap_container_io_error(HdfError::new("chunk payload too large")))?;

    let status = unsafe {
        H5Dwrite_chunk(
            dataset_id,
            H5S_ALL as hid_t,
            filter_mask as c_uint,
            offsets.as_ptr(),
            size as usize,
            bytes.as_ptr() as *const c_void,
        )
    };
    if status < 0 {
        return container_io_error(HdfError::new("H5Dwrite_chunk failed"));
    }

    Ok(())
}

#[derive(Debug)]
struct HdfError(String);

impl HdfError {
    fn new(msg: &str) -> Self {
        HdfError(msg.to_string())
    }
}

impl std::fmt::Display for HdfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HdfError {}
