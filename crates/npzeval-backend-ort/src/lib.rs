use anyhow::{bail, ensure, Context, Result};
use half::f16;
use npzeval_core::{
    ArrayData, Backend, BackendModel, DType, Device, IOName, ModelArtifact, ModelSpec, Shape,
    Tensor, TensorSpec,
};
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session, SessionInputValue,
    },
    tensor::TensorElementType,
    value::{DynValue, ValueRef, ValueType},
};
use tracing::{debug, info};

pub struct OrtBackend;

impl OrtBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OrtBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub struct OrtModel {
    spec: ModelSpec,
    session: Session,
}

impl Backend for OrtBackend {
    type Model = OrtModel;

    fn name(&self) -> &'static str {
        "onnxruntime"
    }

    fn load(&self, artifact: &ModelArtifact, device: Device) -> Result<Self::Model> {
        let builder = Session::builder()
            .context("failed to create ORT session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("failed to configure ORT session builder")?;

        let builder = configure_session_builder(builder, &device)?;

        let session = match artifact {
            ModelArtifact::OnnxPath(path) => builder
                .commit_from_file(path)
                .with_context(|| format!("failed to load ONNX model {}", path.display()))?,
            ModelArtifact::OnnxBytes(bytes) => builder
                .commit_from_memory(bytes)
                .context("failed to load ONNX model from memory")?,
        };

        let spec = build_model_spec(&session)?;
        info!(
            ?device,
            inputs = ?names(&spec.inputs),
            outputs = ?names(&spec.outputs),
            "onnx session ready"
        );

        Ok(OrtModel { spec, session })
    }
}

impl BackendModel for OrtModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn run(&mut self, inputs: Vec<(IOName, Tensor)>) -> Result<Vec<(IOName, Tensor)>> {
        for (name, _) in &inputs {
            ensure!(
                self.spec.input(name.as_str()).is_some(),
                "model has no input named `{name}` (inputs: {:?})",
                names(&self.spec.inputs)
            );
        }
        for spec in &self.spec.inputs {
            ensure!(
                inputs.iter().any(|(name, _)| *name == spec.name),
                "input `{}` was not fed",
                spec.name
            );
        }

        let mut ort_inputs = Vec::with_capacity(inputs.len());
        for (name, input) in inputs {
            let value = tensor_to_ort_value(&input)
                .with_context(|| format!("failed to prepare input `{name}`"))?;
            ort_inputs.push((name.0, SessionInputValue::from(value)));
        }

        let outputs = self.session.run(ort_inputs)?;
        let mut out_tensors = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            let tensor = ort_value_to_tensor(&value)
                .with_context(|| format!("failed to read output `{name}`"))?;
            debug!(
                output = name,
                dtype = %tensor.dtype(),
                shape = %tensor.shape(),
                "session output"
            );
            out_tensors.push((IOName::new(name), tensor));
        }

        Ok(out_tensors)
    }
}

fn names(specs: &[TensorSpec]) -> Vec<&str> {
    specs.iter().map(|spec| spec.name.as_str()).collect()
}

fn build_model_spec(session: &Session) -> Result<ModelSpec> {
    let inputs = session
        .inputs
        .iter()
        .map(|input| tensor_spec_from_value_type(&input.name, &input.input_type))
        .collect::<Result<Vec<_>>>()?;

    let outputs = session
        .outputs
        .iter()
        .map(|output| tensor_spec_from_value_type(&output.name, &output.output_type))
        .collect::<Result<Vec<_>>>()?;

    Ok(ModelSpec { inputs, outputs })
}

fn configure_session_builder(builder: SessionBuilder, device: &Device) -> Result<SessionBuilder> {
    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda { device_id } => configure_cuda(builder, *device_id),
    }
}

fn configure_cuda(builder: SessionBuilder, device_id: u32) -> Result<SessionBuilder> {
    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::cuda::CUDAExecutionProvider;
        let ep = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32)
            .build();
        builder
            .with_execution_providers([ep])
            .context("failed to enable ORT CUDA execution provider")
    }
    #[cfg(not(feature = "cuda"))]
    {
        let _ = (builder, device_id);
        bail!("CUDA requested but npzeval-backend-ort was built without the `cuda` feature")
    }
}

fn tensor_spec_from_value_type(name: &str, value_type: &ValueType) -> Result<TensorSpec> {
    let ValueType::Tensor { ty, shape, .. } = value_type else {
        bail!("`{name}`: unsupported non-tensor IO value type");
    };

    let dtype = dtype_from_ort(*ty)?;
    let dims = shape
        .iter()
        .map(|d| if *d < 0 { None } else { Some(*d as usize) })
        .collect::<Vec<_>>();

    Ok(TensorSpec {
        name: IOName::new(name),
        dtype,
        dims,
    })
}

pub fn dtype_from_ort(ty: TensorElementType) -> Result<DType> {
    match ty {
        TensorElementType::Bool => Ok(DType::Bool),
        TensorElementType::Uint8 => Ok(DType::U8),
        TensorElementType::Uint16 => Ok(DType::U16),
        TensorElementType::Uint32 => Ok(DType::U32),
        TensorElementType::Uint64 => Ok(DType::U64),
        TensorElementType::Int8 => Ok(DType::I8),
        TensorElementType::Int16 => Ok(DType::I16),
        TensorElementType::Int32 => Ok(DType::I32),
        TensorElementType::Int64 => Ok(DType::I64),
        TensorElementType::Float16 => Ok(DType::F16),
        TensorElementType::Float32 => Ok(DType::F32),
        TensorElementType::Float64 => Ok(DType::F64),
        _ => bail!("unsupported tensor element type: {ty}"),
    }
}

pub fn dtype_to_ort(dtype: DType) -> TensorElementType {
    match dtype {
        DType::Bool => TensorElementType::Bool,
        DType::U8 => TensorElementType::Uint8,
        DType::U16 => TensorElementType::Uint16,
        DType::U32 => TensorElementType::Uint32,
        DType::U64 => TensorElementType::Uint64,
        DType::I8 => TensorElementType::Int8,
        DType::I16 => TensorElementType::Int16,
        DType::I32 => TensorElementType::Int32,
        DType::I64 => TensorElementType::Int64,
        DType::F16 => TensorElementType::Float16,
        DType::F32 => TensorElementType::Float32,
        DType::F64 => TensorElementType::Float64,
    }
}

fn tensor_to_ort_value(tensor: &Tensor) -> Result<DynValue> {
    let expected_bytes = tensor
        .shape()
        .checked_numel()
        .and_then(|n| n.checked_mul(tensor.dtype().byte_size()))
        .with_context(|| format!("input shape {} overflows", tensor.shape()))?;
    ensure!(
        tensor.byte_len() == expected_bytes,
        "input byte size mismatch: got {}, expected {}",
        tensor.byte_len(),
        expected_bytes
    );

    let shape = tensor.shape().dims().to_vec();
    macro_rules! owned {
        ($data:expr) => {
            ort::value::Tensor::from_array((shape, $data))?.into_dyn()
        };
    }

    let value = match tensor.elements()? {
        ArrayData::Bool(v) => owned!(v),
        ArrayData::U8(v) => owned!(v),
        ArrayData::U16(v) => owned!(v),
        ArrayData::U32(v) => owned!(v),
        ArrayData::U64(v) => owned!(v),
        ArrayData::I8(v) => owned!(v),
        ArrayData::I16(v) => owned!(v),
        ArrayData::I32(v) => owned!(v),
        ArrayData::I64(v) => owned!(v),
        ArrayData::F16(v) => owned!(v),
        ArrayData::F32(v) => owned!(v),
        ArrayData::F64(v) => owned!(v),
    };

    Ok(value)
}

fn ort_value_to_tensor(value: &ValueRef<'_>) -> Result<Tensor> {
    let ValueType::Tensor { ty, shape, .. } = value.dtype() else {
        bail!("non-tensor outputs are not supported");
    };

    let dims: Vec<usize> = shape.iter().map(|d| *d as usize).collect();

    // Logical (row-major) order regardless of the output's memory layout.
    macro_rules! extract {
        ($variant:ident, $t:ty) => {
            ArrayData::$variant(value.try_extract_array::<$t>()?.iter().copied().collect())
        };
    }

    let data = match dtype_from_ort(*ty)? {
        DType::Bool => extract!(Bool, bool),
        DType::U8 => extract!(U8, u8),
        DType::U16 => extract!(U16, u16),
        DType::U32 => extract!(U32, u32),
        DType::U64 => extract!(U64, u64),
        DType::I8 => extract!(I8, i8),
        DType::I16 => extract!(I16, i16),
        DType::I32 => extract!(I32, i32),
        DType::I64 => extract!(I64, i64),
        DType::F16 => extract!(F16, f16),
        DType::F32 => extract!(F32, f32),
        DType::F64 => extract!(F64, f64),
    };

    Ok(Tensor::from_elements(Shape::from_slice(&dims), &data))
}
