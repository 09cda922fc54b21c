use std::borrow::Cow;
use std::ops::Range;

use bytes::Bytes;
use half::f16;

use crate::{DType, EvalError, FormatError, Result, Shape};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageOrder {
    RowMajor,
    ColumnMajor,
}

/// Flat, typed element storage.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! with_elements {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($v) => $body,
            ArrayData::U8($v) => $body,
            ArrayData::U16($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::I8($v) => $body,
            ArrayData::I16($v) => $body,
            ArrayData::I32($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::F16($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
        }
    };
}

macro_rules! map_elements {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($v) => ArrayData::Bool($body),
            ArrayData::U8($v) => ArrayData::U8($body),
            ArrayData::U16($v) => ArrayData::U16($body),
            ArrayData::U32($v) => ArrayData::U32($body),
            ArrayData::U64($v) => ArrayData::U64($body),
            ArrayData::I8($v) => ArrayData::I8($body),
            ArrayData::I16($v) => ArrayData::I16($body),
            ArrayData::I32($v) => ArrayData::I32($body),
            ArrayData::I64($v) => ArrayData::I64($body),
            ArrayData::F16($v) => ArrayData::F16($body),
            ArrayData::F32($v) => ArrayData::F32($body),
            ArrayData::F64($v) => ArrayData::F64($body),
        }
    };
}

trait LeElement: Copy {
    const SIZE: usize;
    fn read_le(chunk: &[u8]) -> Self;
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_le_element {
    ($($t:ty),*) => {
        $(
            impl LeElement for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn read_le(chunk: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(chunk);
                    <$t>::from_le_bytes(buf)
                }

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_le_element!(u8, u16, u32, u64, i8, i16, i32, i64, f16, f32, f64);

impl LeElement for bool {
    const SIZE: usize = 1;

    fn read_le(chunk: &[u8]) -> Self {
        chunk[0] != 0
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}

fn decode_le<T: LeElement>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::SIZE).map(T::read_le).collect()
}

fn encode_le<T: LeElement>(values: &[T], out: &mut Vec<u8>) {
    out.reserve(values.len() * T::SIZE);
    for v in values {
        v.write_le(out);
    }
}

/// A single element widened to a representation that holds every
/// supported dtype exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Scalar {
    Int(i128),
    Float(f64),
}

impl ArrayData {
    pub fn from_le_bytes(dtype: DType, bytes: &[u8]) -> Result<Self, FormatError> {
        let element_size = dtype.byte_size();
        if bytes.len() % element_size != 0 {
            return Err(FormatError::TruncatedData {
                len: bytes.len(),
                element_size,
                dtype,
            });
        }

        Ok(match dtype {
            DType::Bool => ArrayData::Bool(decode_le(bytes)),
            DType::U8 => ArrayData::U8(bytes.to_vec()),
            DType::U16 => ArrayData::U16(decode_le(bytes)),
            DType::U32 => ArrayData::U32(decode_le(bytes)),
            DType::U64 => ArrayData::U64(decode_le(bytes)),
            DType::I8 => ArrayData::I8(decode_le(bytes)),
            DType::I16 => ArrayData::I16(decode_le(bytes)),
            DType::I32 => ArrayData::I32(decode_le(bytes)),
            DType::I64 => ArrayData::I64(decode_le(bytes)),
            DType::F16 => ArrayData::F16(decode_le(bytes)),
            DType::F32 => ArrayData::F32(decode_le(bytes)),
            DType::F64 => ArrayData::F64(decode_le(bytes)),
        })
    }

    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Bool(_) => DType::Bool,
            ArrayData::U8(_) => DType::U8,
            ArrayData::U16(_) => DType::U16,
            ArrayData::U32(_) => DType::U32,
            ArrayData::U64(_) => DType::U64,
            ArrayData::I8(_) => DType::I8,
            ArrayData::I16(_) => DType::I16,
            ArrayData::I32(_) => DType::I32,
            ArrayData::I64(_) => DType::I64,
            ArrayData::F16(_) => DType::F16,
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        with_elements!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_le_bytes(&self) -> Bytes {
        self.range_to_le_bytes(0..self.len())
    }

    /// Encodes `range` of the elements into a freshly allocated buffer.
    ///
    /// Panics if `range` is out of bounds, like slice indexing.
    pub fn range_to_le_bytes(&self, range: Range<usize>) -> Bytes {
        let mut out = Vec::new();
        with_elements!(self, v => encode_le(&v[range], &mut out));
        Bytes::from(out)
    }

    /// Picks elements by position, in the order given.
    pub fn gather(&self, positions: &[usize]) -> Self {
        map_elements!(self, v => positions.iter().map(|&p| v[p]).collect())
    }

    /// Float elements widened or narrowed to `f32`; `None` for non-float data.
    pub fn float_values(&self) -> Option<Vec<f32>> {
        match self {
            ArrayData::F16(v) => Some(v.iter().map(|x| x.to_f32()).collect()),
            ArrayData::F32(v) => Some(v.clone()),
            ArrayData::F64(v) => Some(v.iter().map(|&x| x as f32).collect()),
            _ => None,
        }
    }

    /// Debug rendering of the first `n` elements.
    pub fn preview(&self, n: usize) -> String {
        with_elements!(self, v => format!("{:?}", &v[..n.min(v.len())]))
    }

    pub(crate) fn scalar_at(&self, i: usize) -> Scalar {
        match self {
            ArrayData::Bool(v) => Scalar::Int(i128::from(v[i])),
            ArrayData::U8(v) => Scalar::Int(i128::from(v[i])),
            ArrayData::U16(v) => Scalar::Int(i128::from(v[i])),
            ArrayData::U32(v) => Scalar::Int(i128::from(v[i])),
            ArrayData::U64(v) => Scalar::Int(i128::from(v[i])),
            ArrayData::I8(v) => Scalar::Int(i128::from(v[i])),
            ArrayData::I16(v) => Scalar::Int(i128::from(v[i])),
            ArrayData::I32(v) => Scalar::Int(i128::from(v[i])),
            ArrayData::I64(v) => Scalar::Int(i128::from(v[i])),
            ArrayData::F16(v) => Scalar::Float(v[i].to_f64()),
            ArrayData::F32(v) => Scalar::Float(f64::from(v[i])),
            ArrayData::F64(v) => Scalar::Float(v[i]),
        }
    }
}

/// Shape, layout and elements of one decoded array stream, not yet named.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayRecord {
    pub shape: Shape,
    pub order: StorageOrder,
    pub data: ArrayData,
}

impl ArrayRecord {
    pub fn new(shape: Shape, order: StorageOrder, data: ArrayData) -> Result<Self> {
        let Some(expected) = shape.checked_numel() else {
            return Err(EvalError::shape(format!("shape {shape} overflows")));
        };
        if data.len() != expected {
            return Err(EvalError::shape(format!(
                "shape {shape} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, order, data })
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamedArray {
    name: String,
    record: ArrayRecord,
}

impl NamedArray {
    pub fn new(name: impl Into<String>, record: ArrayRecord) -> Self {
        Self {
            name: name.into(),
            record,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.record.dtype()
    }

    pub fn shape(&self) -> &Shape {
        &self.record.shape
    }

    pub fn order(&self) -> StorageOrder {
        self.record.order
    }

    pub fn data(&self) -> &ArrayData {
        &self.record.data
    }

    pub fn len(&self) -> usize {
        self.record.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements in row-major order. Borrows unless a column-major array
    /// of rank two or more has to be reordered.
    pub fn to_row_major(&self) -> Cow<'_, ArrayData> {
        if self.record.order == StorageOrder::RowMajor || self.record.shape.rank() < 2 {
            return Cow::Borrowed(&self.record.data);
        }
        let positions = column_major_positions(self.record.shape.dims());
        Cow::Owned(self.record.data.gather(&positions))
    }
}

/// For each row-major index, the offset of that element in a column-major buffer.
fn column_major_positions(dims: &[usize]) -> Vec<usize> {
    let total: usize = dims.iter().product();
    let mut strides = vec![1usize; dims.len()];
    for k in 1..dims.len() {
        strides[k] = strides[k - 1] * dims[k - 1];
    }

    let mut index = vec![0usize; dims.len()];
    let mut positions = Vec::with_capacity(total);
    for _ in 0..total {
        positions.push(index.iter().zip(&strides).map(|(i, s)| i * s).sum());
        for k in (0..dims.len()).rev() {
            index[k] += 1;
            if index[k] < dims[k] {
                break;
            }
            index[k] = 0;
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_major_matrix_is_reordered() {
        // 2x3 matrix [[1, 2, 3], [4, 5, 6]] stored column by column.
        let record = ArrayRecord::new(
            Shape::from_slice(&[2, 3]),
            StorageOrder::ColumnMajor,
            ArrayData::I32(vec![1, 4, 2, 5, 3, 6]),
        )
        .unwrap();
        let array = NamedArray::new("m", record);
        assert_eq!(
            array.to_row_major().into_owned(),
            ArrayData::I32(vec![1, 2, 3, 4, 5, 6])
        );
    }

    #[test]
    fn column_major_vector_is_borrowed() {
        let record = ArrayRecord::new(
            Shape::from_slice(&[3]),
            StorageOrder::ColumnMajor,
            ArrayData::U8(vec![7, 8, 9]),
        )
        .unwrap();
        let array = NamedArray::new("v", record);
        assert!(matches!(array.to_row_major(), Cow::Borrowed(_)));
    }

    #[test]
    fn bytes_round_trip_preserves_values() {
        let data = ArrayData::F16(vec![f16::from_f32(0.5), f16::from_f32(-2.0)]);
        let bytes = data.to_le_bytes();
        assert_eq!(bytes.len(), 4);
        assert_eq!(ArrayData::from_le_bytes(DType::F16, &bytes).unwrap(), data);
    }

    #[test]
    fn range_encoding_only_covers_the_range() {
        let data = ArrayData::I64(vec![10, 20, 30, 40]);
        let bytes = data.range_to_le_bytes(1..3);
        assert_eq!(bytes.len(), 16);
        assert_eq!(
            ArrayData::from_le_bytes(DType::I64, &bytes).unwrap(),
            ArrayData::I64(vec![20, 30])
        );
    }

    #[test]
    fn odd_byte_count_is_truncated_data() {
        let err = ArrayData::from_le_bytes(DType::F32, &[0, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, FormatError::TruncatedData { len: 5, .. }));
    }
}
