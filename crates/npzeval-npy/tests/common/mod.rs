#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Builds an array stream the way numpy writes one: padded with spaces and a
/// trailing newline so the data starts on a 64-byte boundary.
pub fn npy_stream(
    major: u8,
    descr: &str,
    fortran_order: bool,
    shape: &[usize],
    data: &[u8],
) -> Vec<u8> {
    let shape_text = match shape {
        [] => "()".to_string(),
        [d] => format!("({d},)"),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let order = if fortran_order { "True" } else { "False" };
    let dict = format!("{{'descr': '{descr}', 'fortran_order': {order}, 'shape': {shape_text}, }}");

    let prefix_len = if major == 1 { 10 } else { 12 };
    let unpadded = prefix_len + dict.len() + 1;
    let padding = unpadded.next_multiple_of(64) - unpadded;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::new();
    out.extend_from_slice(b"\x93NUMPY");
    out.push(major);
    out.push(0);
    if major == 1 {
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
    } else {
        out.extend_from_slice(&(header_len as u32).to_le_bytes());
    }
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    out.extend_from_slice(data);
    out
}

/// Magic, version and length field followed by `header` verbatim; no
/// padding is added and the declared length is exactly `header.len()`.
pub fn raw_stream(major: u8, header: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"\x93NUMPY");
    out.push(major);
    out.push(0);
    if major == 1 {
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    } else {
        out.extend_from_slice(&(header.len() as u32).to_le_bytes());
    }
    out.extend_from_slice(header);
    out
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn i64_bytes(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn zip_bytes(entries: &[(&str, Vec<u8>)], method: CompressionMethod) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(method);
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// `x`: float32 [n, 1, 28, 28] with value = flat index; `y`: int64 [n].
pub fn mnist_like(n: usize, labels: &[i64]) -> Vec<(&'static str, Vec<u8>)> {
    let pixels: Vec<f32> = (0..n * 784).map(|i| i as f32).collect();
    vec![
        ("x.npy", npy_stream(1, "<f4", false, &[n, 1, 28, 28], &f32_bytes(&pixels))),
        ("y.npy", npy_stream(1, "<i8", false, &[labels.len()], &i64_bytes(labels))),
    ]
}
