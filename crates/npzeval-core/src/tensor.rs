use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use smallvec::SmallVec;

use crate::{ArrayData, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda { device_id: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl DType {
    pub fn byte_size(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 | DType::F16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F16 | DType::F32 | DType::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::F16 => "float16",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        const ALL: [DType; 12] = [
            DType::Bool,
            DType::U8,
            DType::U16,
            DType::U32,
            DType::U64,
            DType::I8,
            DType::I16,
            DType::I32,
            DType::I64,
            DType::F16,
            DType::F32,
            DType::F64,
        ];
        ALL.into_iter()
            .find(|dtype| dtype.name() == s)
            .ok_or_else(|| format!("unknown dtype `{s}`"))
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }

    pub fn scalar() -> Self {
        Self(SmallVec::new())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Element count; the empty shape is a scalar and holds one element.
    /// Saturates at `usize::MAX` when the product overflows.
    pub fn numel(&self) -> usize {
        self.checked_numel().unwrap_or(usize::MAX)
    }

    /// Element count, or `None` when the product of dims overflows `usize`.
    pub fn checked_numel(&self) -> Option<usize> {
        if self.0.contains(&0) {
            return Some(0);
        }
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn first_dim(&self) -> Option<usize> {
        self.0.first().copied()
    }

    /// Same dims with a leading batch dimension of `batch`.
    pub fn with_batch(&self, batch: usize) -> Self {
        let mut dims = SmallVec::with_capacity(self.rank() + 1);
        dims.push(batch);
        dims.extend(self.0.iter().copied());
        Self(dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str("]")
    }
}

#[derive(Clone, Debug)]
pub struct TensorDesc {
    pub dtype: DType,
    pub shape: Shape,
    pub device: Device,
}

/// A dense tensor handed across the inference-session boundary.
///
/// Storage is little-endian bytes in row-major order.
#[derive(Clone, Debug)]
pub struct Tensor {
    pub desc: TensorDesc,
    pub bytes: Bytes,
}

impl Tensor {
    pub fn from_cpu_bytes(dtype: DType, shape: Shape, bytes: Bytes) -> Self {
        Self {
            desc: TensorDesc {
                dtype,
                shape,
                device: Device::Cpu,
            },
            bytes,
        }
    }

    pub fn from_elements(shape: Shape, data: &ArrayData) -> Self {
        Self::from_cpu_bytes(data.dtype(), shape, data.to_le_bytes())
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Decodes the byte storage back into typed elements.
    pub fn elements(&self) -> Result<ArrayData> {
        Ok(ArrayData::from_le_bytes(self.desc.dtype, &self.bytes)?)
    }
}
