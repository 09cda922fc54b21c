use half::f16;

use crate::array::Scalar;
use crate::{ArrayData, DType, EvalError, Result};

/// Converts every element to `target`, failing on the first value that
/// would not survive the conversion unchanged.
pub fn convert_exact(data: &ArrayData, target: DType) -> Result<ArrayData> {
    let source = data.dtype();
    if source == target {
        return Ok(data.clone());
    }

    let lossy = |i: usize, value: Scalar| {
        let shown = match value {
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) => v.to_string(),
        };
        EvalError::dtype(format!(
            "value {shown} at index {i} cannot be represented exactly as {target} (stored as {source})"
        ))
    };

    macro_rules! convert {
        ($variant:ident, $f:expr) => {{
            let mut out = Vec::with_capacity(data.len());
            for i in 0..data.len() {
                let value = data.scalar_at(i);
                out.push($f(value).ok_or_else(|| lossy(i, value))?);
            }
            ArrayData::$variant(out)
        }};
    }

    Ok(match target {
        DType::Bool => convert!(Bool, to_bool),
        DType::U8 => convert!(U8, to_int::<u8>),
        DType::U16 => convert!(U16, to_int::<u16>),
        DType::U32 => convert!(U32, to_int::<u32>),
        DType::U64 => convert!(U64, to_int::<u64>),
        DType::I8 => convert!(I8, to_int::<i8>),
        DType::I16 => convert!(I16, to_int::<i16>),
        DType::I32 => convert!(I32, to_int::<i32>),
        DType::I64 => convert!(I64, to_int::<i64>),
        DType::F16 => convert!(F16, to_f16),
        DType::F32 => convert!(F32, to_f32),
        DType::F64 => convert!(F64, to_f64),
    })
}

/// Integral value of a scalar, if it has one.
fn integral(value: Scalar) -> Option<i128> {
    match value {
        Scalar::Int(v) => Some(v),
        // Every supported integer target fits well inside +/-2^127.
        Scalar::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e38 => Some(x as i128),
        Scalar::Float(_) => None,
    }
}

fn to_int<T: TryFrom<i128>>(value: Scalar) -> Option<T> {
    integral(value).and_then(|v| T::try_from(v).ok())
}

fn to_bool(value: Scalar) -> Option<bool> {
    match integral(value)? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

fn to_f64(value: Scalar) -> Option<f64> {
    match value {
        Scalar::Float(x) => Some(x),
        Scalar::Int(v) => {
            let x = v as f64;
            (x as i128 == v).then_some(x)
        }
    }
}

fn to_f32(value: Scalar) -> Option<f32> {
    match value {
        Scalar::Float(x) => {
            let y = x as f32;
            (f64::from(y) == x || (x.is_nan() && y.is_nan())).then_some(y)
        }
        Scalar::Int(v) => {
            let y = v as f32;
            (y.is_finite() && y as i128 == v).then_some(y)
        }
    }
}

fn to_f16(value: Scalar) -> Option<f16> {
    match value {
        Scalar::Float(x) => {
            let y = f16::from_f64(x);
            (y.to_f64() == x || (x.is_nan() && y.is_nan())).then_some(y)
        }
        Scalar::Int(v) => {
            let y = f16::from_f64(v as f64);
            (y.is_finite() && y.to_f64() as i128 == v).then_some(y)
        }
    }
}
