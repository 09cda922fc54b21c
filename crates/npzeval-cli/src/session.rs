use std::path::Path;

use anyhow::{Context, Result};
use npzeval_backend_ort::OrtBackend;
use npzeval_core::{Backend, BackendModel, Device, ModelArtifact};

/// Opens an ONNX model as a boxed session.
pub fn load_onnx(path: &Path, device: Device) -> Result<Box<dyn BackendModel>> {
    let backend = OrtBackend::new();
    let artifact = ModelArtifact::OnnxPath(path.to_path_buf());
    let model = backend
        .load(&artifact, device)
        .with_context(|| format!("{} backend could not load {}", backend.name(), path.display()))?;

    let spec = model.spec();
    for input in &spec.inputs {
        tracing::info!(name = %input.name, dtype = %input.dtype, dims = ?input.dims, "model input");
    }
    for output in &spec.outputs {
        tracing::info!(
            name = %output.name,
            dtype = %output.dtype,
            dims = ?output.dims,
            "model output"
        );
    }

    Ok(Box::new(model))
}

pub fn parse_device(raw: &str) -> Result<Device> {
    if raw.eq_ignore_ascii_case("cpu") {
        return Ok(Device::Cpu);
    }

    if let Some(rest) = raw.strip_prefix("cuda:") {
        let device_id: u32 = rest.parse().context("invalid cuda device id")?;
        return Ok(Device::Cuda { device_id });
    }

    anyhow::bail!("unsupported device: {raw} (expected cpu or cuda:N)");
}
