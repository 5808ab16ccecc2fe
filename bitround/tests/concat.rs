// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for raw-chunk concatenation (`concat`), driven against the in-memory
//! container double in `tests/common`.

mod common;

use bitround_core::container::{AttrScope, AttrValue, Buffer, ContainerReader, ContainerWriter, Dimension, ElementType};
use bitround::concat::{concat, ConcatOptions};

use common::{attr_text, f32_var, MemoryContainer};

fn record_dims() -> Vec<Dimension> {
    vec![
        Dimension { name: "time".into(), extent: 0, is_unlimited: true },
        Dimension { name: "lat".into(), extent: 2, is_unlimited: false },
        Dimension { name: "lon".into(), extent: 2, is_unlimited: false },
    ]
}

fn input_with_times(n_time: u64, chunked: bool, fill_value: f32) -> MemoryContainer {
    let mut c = MemoryContainer::new(record_dims());
    let mut lat = f32_var("lat", vec![2], vec!["lat"]);
    lat.element_type = ElementType::F64;
    c.add_var(lat, Buffer::F64(vec![-1.0, 1.0]));

    let mut temp = f32_var("temp", vec![n_time, 2, 2], vec!["time", "lat", "lon"]);
    if chunked {
        temp.chunk_shape = Some(vec![1, 2, 2]);
    }
    let data: Vec<f32> = (0..n_time * 4).map(|i| fill_value + i as f32).collect();
    c.add_var(temp, Buffer::F32(data));
    c
}

#[test]
fn record_dimension_extents_are_summed_across_inputs() {
    let a = input_with_times(2, true, 0.0);
    let b = input_with_times(3, true, 100.0);
    let mut writer = MemoryContainer::new(record_dims());

    let readers: Vec<&dyn ContainerReader> = vec![&a, &b];
    let opts = ConcatOptions::default();
    concat(&readers, &mut writer, &["bitround".to_string(), "concat".to_string()], &opts).unwrap();

    let out = writer.variables().unwrap().into_iter().find(|v| v.name == "temp").unwrap();
    assert_eq!(out.shape[0], 5, "record dimension must hold the sum of both inputs' time extents");
}

#[test]
fn chunk_aligned_record_data_is_copied_byte_exact_via_raw_chunks() {
    let a = input_with_times(2, true, 0.0);
    let b = input_with_times(2, true, 100.0);
    let mut writer = MemoryContainer::new(record_dims());

    let readers: Vec<&dyn ContainerReader> = vec![&a, &b];
    concat(&readers, &mut writer, &["argv".to_string()], &ConcatOptions::default()).unwrap();

    let Buffer::F32(out) = writer.read_all("temp").unwrap()
    else {
        panic!("expected F32 buffer");
    };
    let mut expected: Vec<f32> = (0..8).map(|i| i as f32).collect();
    expected.extend((0..8).map(|i| 100.0 + i as f32));
    assert_eq!(out, expected);
}

fn short_chunked_input(n_time: u64, fill_value: f32) -> MemoryContainer {
    // Every input declares a 2-time-step chunk, but an input whose actual time extent is 1
    // leaves that single chunk short -- the alignment rule's fallback case the raw-chunk fast
    // path can't use.
    let mut c = MemoryContainer::new(record_dims());
    let mut lat = f32_var("lat", vec![2], vec!["lat"]);
    lat.element_type = ElementType::F64;
    c.add_var(lat, Buffer::F64(vec![-1.0, 1.0]));

    let mut temp = f32_var("temp", vec![n_time, 2, 2], vec!["time", "lat", "lon"]);
    temp.chunk_shape = Some(vec![2, 2, 2]);
    let data: Vec<f32> = (0..n_time * 4).map(|i| fill_value + i as f32).collect();
    c.add_var(temp, Buffer::F32(data));
    c
}

#[test]
fn short_trailing_chunk_falls_back_to_hyperslab_copy() {
    let a = short_chunked_input(1, 1.0);
    let b = short_chunked_input(1, 10.0);
    let mut writer = MemoryContainer::new(record_dims());

    let readers: Vec<&dyn ContainerReader> = vec![&a, &b];
    concat(&readers, &mut writer, &["argv".to_string()], &ConcatOptions::default()).unwrap();

    let Buffer::F32(out) = writer.read_all("temp").unwrap()
    else {
        panic!("expected F32 buffer");
    };
    assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0, 10.0, 11.0, 12.0, 13.0]);
}

#[test]
fn non_record_variables_are_copied_bit_exact_from_the_first_input() {
    let a = input_with_times(2, true, 0.0);
    let b = input_with_times(2, true, 100.0);
    let mut writer = MemoryContainer::new(record_dims());

    let readers: Vec<&dyn ContainerReader> = vec![&a, &b];
    concat(&readers, &mut writer, &["argv".to_string()], &ConcatOptions::default()).unwrap();

    assert_eq!(writer.read_all("lat").unwrap(), a.read_all("lat").unwrap());
}

#[test]
fn mismatched_chunk_shapes_between_inputs_are_a_schema_mismatch_error() {
    let a = input_with_times(2, true, 0.0);
    let b = input_with_times(2, false, 100.0);
    let mut writer = MemoryContainer::new(record_dims());

    let readers: Vec<&dyn ContainerReader> = vec![&a, &b];
    let result = concat(&readers, &mut writer, &["argv".to_string()], &ConcatOptions::default());
    assert!(result.is_err());
}

#[test]
fn fewer_than_two_inputs_is_rejected() {
    let a = input_with_times(2, true, 0.0);
    let mut writer = MemoryContainer::new(record_dims());
    let readers: Vec<&dyn ContainerReader> = vec![&a];
    let result = concat(&readers, &mut writer, &["argv".to_string()], &ConcatOptions::default());
    assert!(result.is_err());
}

#[test]
fn history_attribute_is_prepended_with_the_argv_and_not_dropped() {
    let mut a = input_with_times(2, true, 0.0);
    a.put_attribute(AttrScope::Root, &attr_text("history", "2020-01-01 00:00:00 UTC: ncgen old.nc\n")).unwrap();
    let b = input_with_times(2, true, 100.0);
    let mut writer = MemoryContainer::new(record_dims());

    let readers: Vec<&dyn ContainerReader> = vec![&a, &b];
    concat(&readers, &mut writer, &["bitround".to_string(), "concat".to_string(), "a.nc".to_string(), "b.nc".to_string()], &ConcatOptions::default()).unwrap();

    let attrs = writer.attributes(AttrScope::Root).unwrap();
    let history = attrs.into_iter().find(|a| a.name == "history").unwrap();
    let AttrValue::Text(text) = history.value
    else {
        panic!("expected text attribute");
    };
    assert!(text.contains("bitround concat a.nc b.nc"));
    assert!(text.contains("ncgen old.nc"), "the prior history entry must be preserved, not overwritten");
}
