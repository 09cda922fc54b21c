use npzeval_core::{
    ArrayData, ArrayRecord, DType, EvalError, FormatError, IOName, ModelSpec, NamedArray, Shape,
    StorageOrder, Tensor, TensorSpec,
};

#[test]
fn shape_counts_and_batches() {
    let sample = Shape::from_slice(&[1, 28, 28]);
    assert_eq!(sample.numel(), 784);
    assert_eq!(sample.with_batch(1).dims(), &[1, 1, 28, 28]);
    assert_eq!(sample.with_batch(1).to_string(), "[1, 1, 28, 28]");

    assert_eq!(Shape::scalar().numel(), 1);
    assert_eq!(Shape::scalar().to_string(), "[]");
    assert_eq!(Shape::from_slice(&[0, 5]).numel(), 0);
    assert_eq!(Shape::from_slice(&[3, 4]).first_dim(), Some(3));

    let huge = Shape::from_slice(&[1 << 32, 1 << 32]);
    assert_eq!(huge.checked_numel(), None);
    assert_eq!(huge.numel(), usize::MAX);
    assert_eq!(Shape::from_slice(&[1 << 32, 1 << 32, 0]).checked_numel(), Some(0));
}

#[test]
fn dtype_names_parse_back() {
    for name in ["bool", "uint8", "int64", "float16", "float32", "float64"] {
        let dtype: DType = name.parse().unwrap();
        assert_eq!(dtype.to_string(), name);
    }
    assert!("complex64".parse::<DType>().is_err());
    assert_eq!(DType::F16.byte_size(), 2);
    assert!(DType::F64.is_float());
    assert!(!DType::I64.is_float());
}

#[test]
fn tensor_elements_decode_their_bytes() {
    let data = ArrayData::I64(vec![101, 2023, 102, 0]);
    let tensor = Tensor::from_elements(Shape::from_slice(&[1, 4]), &data);
    assert_eq!(tensor.dtype(), DType::I64);
    assert_eq!(tensor.byte_len(), 32);
    assert_eq!(tensor.bytes[..8], 101i64.to_le_bytes());
    assert_eq!(tensor.elements().unwrap(), data);
}

#[test]
fn record_rejects_mismatched_element_count() {
    let err = ArrayRecord::new(
        Shape::from_slice(&[2, 3]),
        StorageOrder::RowMajor,
        ArrayData::F32(vec![0.0; 5]),
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Shape(_)), "{err}");

    let err = ArrayRecord::new(
        Shape::from_slice(&[1 << 32, 1 << 32]),
        StorageOrder::RowMajor,
        ArrayData::U8(Vec::new()),
    )
    .unwrap_err();
    assert!(err.to_string().contains("overflows"), "{err}");
}

#[test]
fn named_array_exposes_its_record() {
    let record = ArrayRecord::new(
        Shape::from_slice(&[3]),
        StorageOrder::RowMajor,
        ArrayData::U8(vec![7, 8, 9]),
    )
    .unwrap();
    let array = NamedArray::new("y", record);
    assert_eq!(array.name(), "y");
    assert_eq!(array.dtype(), DType::U8);
    assert_eq!(array.len(), 3);
    assert_eq!(array.data().preview(2), "[7, 8]");
}

#[test]
fn model_spec_finds_io_by_name() {
    let spec = ModelSpec {
        inputs: vec![TensorSpec {
            name: IOName::new("input"),
            dtype: DType::F32,
            dims: vec![None, Some(1), Some(28), Some(28)],
        }],
        outputs: vec![TensorSpec {
            name: IOName::new("logits"),
            dtype: DType::F32,
            dims: vec![None, Some(10)],
        }],
    };
    assert!(spec.input("input").is_some());
    assert!(spec.output("logits").is_some());
    assert!(spec.output("probs").is_none());
}

#[test]
fn format_errors_convert_into_eval_errors() {
    let err: EvalError = FormatError::UnsupportedVersion { major: 4, minor: 0 }.into();
    assert_eq!(err.to_string(), "unsupported format version 4.0");

    let err: EvalError = FormatError::ElementCount {
        shape: Shape::from_slice(&[2, 2]),
        expected: 4,
        actual: 3,
    }
    .into();
    assert_eq!(err.to_string(), "data holds 3 elements, shape [2, 2] needs 4");
}
