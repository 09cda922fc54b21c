mod common;

use anyhow::Result;
use common::{f32_bytes, i64_bytes, npy_stream, raw_stream};
use half::f16;
use npzeval_core::{ArrayData, DType, EvalError, FormatError, StorageOrder};
use npzeval_npy::{decode_array_stream, parse_descr};

#[test]
fn decodes_float32_stream() -> Result<()> {
    let values = [0.0f32, 0.5, -1.25, 3.0, 8.5, 1e-3];
    let bytes = npy_stream(1, "<f4", false, &[2, 3], &f32_bytes(&values));
    assert_eq!(bytes.len() % 64, 24, "data begins on the 64-byte boundary");

    let record = decode_array_stream(&bytes)?;
    assert_eq!(record.dtype(), DType::F32);
    assert_eq!(record.shape.dims(), &[2, 3]);
    assert_eq!(record.order, StorageOrder::RowMajor);
    assert_eq!(record.data, ArrayData::F32(values.to_vec()));
    Ok(())
}

#[test]
fn shape_and_dtype_match_header_for_every_supported_code() -> Result<()> {
    let cases: [(&str, DType); 12] = [
        ("|b1", DType::Bool),
        ("|u1", DType::U8),
        ("<u2", DType::U16),
        ("<u4", DType::U32),
        ("<u8", DType::U64),
        ("|i1", DType::I8),
        ("<i2", DType::I16),
        ("<i4", DType::I32),
        ("<i8", DType::I64),
        ("<f2", DType::F16),
        ("<f4", DType::F32),
        ("<f8", DType::F64),
    ];
    for (descr, dtype) in cases {
        let shape = [3, 2, 2];
        let data = vec![1u8; 12 * dtype.byte_size()];
        let record = decode_array_stream(&npy_stream(1, descr, false, &shape, &data))?;
        assert_eq!(record.dtype(), dtype, "{descr}");
        assert_eq!(record.shape.dims(), &shape, "{descr}");
        assert_eq!(record.data.len(), 12, "{descr}");
    }
    Ok(())
}

#[test]
fn decoding_is_deterministic() -> Result<()> {
    let bytes = npy_stream(1, "<i8", false, &[4], &i64_bytes(&[3, 7, 1, 0]));
    assert_eq!(decode_array_stream(&bytes)?, decode_array_stream(&bytes)?);
    Ok(())
}

#[test]
fn version_two_uses_four_byte_header_length() -> Result<()> {
    let bytes = npy_stream(2, "<i8", false, &[3], &i64_bytes(&[-1, 0, 1]));
    let record = decode_array_stream(&bytes)?;
    assert_eq!(record.data, ArrayData::I64(vec![-1, 0, 1]));
    Ok(())
}

#[test]
fn scalar_holds_one_element() -> Result<()> {
    let bytes = npy_stream(1, "<f2", false, &[], &f16::from_f32(1.5).to_le_bytes());
    let record = decode_array_stream(&bytes)?;
    assert_eq!(record.shape.rank(), 0);
    assert_eq!(record.data, ArrayData::F16(vec![f16::from_f32(1.5)]));
    Ok(())
}

#[test]
fn fortran_order_is_recorded() -> Result<()> {
    let bytes = npy_stream(1, "|u1", true, &[2, 2], &[1, 3, 2, 4]);
    let record = decode_array_stream(&bytes)?;
    assert_eq!(record.order, StorageOrder::ColumnMajor);
    Ok(())
}

#[test]
fn bool_bytes_decode_as_nonzero() -> Result<()> {
    let record = decode_array_stream(&npy_stream(1, "|b1", false, &[3], &[0, 1, 2]))?;
    assert_eq!(record.data, ArrayData::Bool(vec![false, true, true]));
    Ok(())
}

#[test]
fn missing_magic_is_a_format_error() {
    let mut bytes = npy_stream(1, "<f4", false, &[1], &f32_bytes(&[1.0]));
    bytes[0] = b'P';
    let err = decode_array_stream(&bytes).unwrap_err();
    assert!(matches!(err, EvalError::Format(FormatError::BadMagic)), "{err}");
    assert_eq!(err.to_string(), "bad magic");

    let err = decode_array_stream(b"\x93NUM").unwrap_err();
    assert!(matches!(err, EvalError::Format(FormatError::BadMagic)), "{err}");
}

#[test]
fn header_cut_short_is_a_format_error() {
    let bytes = npy_stream(1, "<f4", false, &[1], &f32_bytes(&[1.0]));
    for cut in [7, 9, 40] {
        let err = decode_array_stream(&bytes[..cut]).unwrap_err();
        assert!(
            matches!(err, EvalError::Format(FormatError::TruncatedHeader { .. })),
            "cut at {cut}: {err}"
        );
    }
}

#[test]
fn garbled_header_is_malformed() {
    let mut bytes = npy_stream(1, "<f4", false, &[1], &f32_bytes(&[1.0]));
    // Replace the opening brace of the dictionary.
    bytes[10] = b'<';
    let err = decode_array_stream(&bytes).unwrap_err();
    assert!(matches!(err, EvalError::Format(FormatError::MalformedHeader(_))), "{err}");
}

#[test]
fn unknown_version_is_rejected() {
    let mut bytes = npy_stream(1, "<f4", false, &[1], &f32_bytes(&[1.0]));
    bytes[6] = 9;
    let err = decode_array_stream(&bytes).unwrap_err();
    assert!(matches!(
        err,
        EvalError::Format(FormatError::UnsupportedVersion { major: 9, .. })
    ));
}

#[test]
fn partial_element_is_truncated_data() {
    let mut bytes = npy_stream(1, "<f4", false, &[2], &f32_bytes(&[1.0, 2.0]));
    bytes.pop();
    let err = decode_array_stream(&bytes).unwrap_err();
    assert!(matches!(err, EvalError::Format(FormatError::TruncatedData { .. })), "{err}");
}

#[test]
fn element_count_must_match_shape() {
    let bytes = npy_stream(1, "<f4", false, &[3], &f32_bytes(&[1.0, 2.0]));
    let err = decode_array_stream(&bytes).unwrap_err();
    assert!(
        matches!(
            err,
            EvalError::Format(FormatError::ElementCount {
                expected: 3,
                actual: 2,
                ..
            })
        ),
        "{err}"
    );
}

#[test]
fn unsupported_dtypes_are_dtype_errors() {
    for descr in ["<c8", ">f4", "<U10", "<M8"] {
        let bytes = npy_stream(1, descr, false, &[1], &[0; 8]);
        let err = decode_array_stream(&bytes).unwrap_err();
        assert!(matches!(err, EvalError::Dtype(_)), "{descr}: {err}");
    }
}

#[test]
fn single_byte_codes_ignore_byte_order() -> Result<()> {
    assert_eq!(parse_descr(">u1")?, DType::U8);
    assert_eq!(parse_descr("|b1")?, DType::Bool);
    assert_eq!(parse_descr("<f8")?, DType::F64);
    Ok(())
}

#[test]
fn data_starts_at_the_aligned_offset_not_the_header_end() -> Result<()> {
    let header = "{'descr': '<i8', 'fortran_order': False, 'shape': (1,)}";
    let mut bytes = raw_stream(1, header.as_bytes());
    assert!(bytes.len() < 64);
    bytes.resize(64, 0xAA);
    bytes.extend_from_slice(&i64_bytes(&[42]));

    let record = decode_array_stream(&bytes)?;
    assert_eq!(record.data, ArrayData::I64(vec![42]));
    Ok(())
}

#[test]
fn overflowing_shape_is_malformed() {
    let bytes = npy_stream(1, "|u1", false, &[1 << 32, 1 << 32], &[]);
    let err = decode_array_stream(&bytes).unwrap_err();
    assert!(
        matches!(err, EvalError::Format(FormatError::MalformedHeader(_))),
        "{err}"
    );
}

#[test]
fn deeply_nested_header_is_malformed() {
    let mut header = b"{'descr': ".to_vec();
    header.extend(std::iter::repeat(b'[').take(200_000));
    let err = decode_array_stream(&raw_stream(2, &header)).unwrap_err();
    assert!(
        matches!(err, EvalError::Format(FormatError::MalformedHeader(_))),
        "{err}"
    );
}
