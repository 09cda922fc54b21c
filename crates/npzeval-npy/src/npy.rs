use npzeval_core::{
    ArrayData, ArrayRecord, DType, EvalError, FormatError, Result, Shape, StorageOrder,
};

use crate::header::{parse_header, Literal};

pub const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// The data segment of a well-formed stream starts on this boundary.
pub const DATA_ALIGNMENT: usize = 64;

/// Decodes one array stream into an unnamed record.
pub fn decode_array_stream(bytes: &[u8]) -> Result<ArrayRecord> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(FormatError::BadMagic.into());
    }

    let (major, minor) = match bytes.get(6..8) {
        Some(v) => (v[0], v[1]),
        None => return Err(truncated_header(2, bytes.len() - MAGIC.len())),
    };
    let len_field = match major {
        1 => 2,
        2 | 3 => 4,
        _ => return Err(FormatError::UnsupportedVersion { major, minor }.into()),
    };

    let header_start = 8 + len_field;
    let header_len = match bytes.get(8..header_start) {
        Some(&[a, b]) => usize::from(u16::from_le_bytes([a, b])),
        Some(&[a, b, c, d]) => u32::from_le_bytes([a, b, c, d]) as usize,
        _ => return Err(truncated_header(len_field, bytes.len() - 8)),
    };

    let header_end = header_start + header_len;
    let Some(header_bytes) = bytes.get(header_start..header_end) else {
        return Err(truncated_header(header_len, bytes.len() - header_start));
    };
    let header_text = std::str::from_utf8(header_bytes)
        .map_err(|e| FormatError::MalformedHeader(format!("header is not valid text: {e}")))?;
    let header = parse_header(header_text)?;

    let dtype = match &header.descr {
        Literal::Str(code) => parse_descr(code)?,
        other => {
            return Err(EvalError::dtype(format!(
                "structured dtype {other:?} is not supported"
            )))
        }
    };
    let shape = Shape::from_slice(&header.shape);
    let Some(expected) = shape.checked_numel() else {
        return Err(FormatError::MalformedHeader(format!("shape {shape} overflows")).into());
    };
    let order = if header.fortran_order {
        StorageOrder::ColumnMajor
    } else {
        StorageOrder::RowMajor
    };

    // The header text carries its own padding; the aligned offset is what counts.
    let data_start = header_end.next_multiple_of(DATA_ALIGNMENT);
    let payload = bytes.get(data_start..).unwrap_or_default();
    let data = ArrayData::from_le_bytes(dtype, payload)?;

    if data.len() != expected {
        return Err(FormatError::ElementCount {
            shape,
            expected,
            actual: data.len(),
        }
        .into());
    }

    ArrayRecord::new(shape, order, data)
}

/// Maps a dtype code such as `<f4` or `|u1` to an element type.
pub fn parse_descr(code: &str) -> Result<DType> {
    let unsupported = || EvalError::dtype(format!("unsupported dtype code `{code}`"));

    let (byte_order, kind) = match code.as_bytes().first() {
        Some(b'<' | b'>' | b'|' | b'=') => code.split_at(1),
        _ => ("=", code),
    };

    let dtype = match kind {
        "b1" | "?" => DType::Bool,
        "u1" => DType::U8,
        "u2" => DType::U16,
        "u4" => DType::U32,
        "u8" => DType::U64,
        "i1" => DType::I8,
        "i2" => DType::I16,
        "i4" => DType::I32,
        "i8" => DType::I64,
        "f2" => DType::F16,
        "f4" => DType::F32,
        "f8" => DType::F64,
        _ => return Err(unsupported()),
    };

    if byte_order == ">" && dtype.byte_size() > 1 {
        return Err(EvalError::dtype(format!(
            "big-endian dtype code `{code}` is not supported"
        )));
    }
    if byte_order == "=" && cfg!(target_endian = "big") && dtype.byte_size() > 1 {
        return Err(unsupported());
    }

    Ok(dtype)
}

fn truncated_header(declared: usize, available: usize) -> EvalError {
    FormatError::TruncatedHeader {
        declared,
        available,
    }
    .into()
}
