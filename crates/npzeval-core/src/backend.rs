use anyhow::Result;

use crate::{Device, IOName, ModelArtifact, ModelSpec, Tensor};

pub trait Backend {
    type Model: BackendModel;

    fn name(&self) -> &'static str;
    fn load(&self, artifact: &ModelArtifact, device: Device) -> Result<Self::Model>;
}

/// A loaded inference session.
pub trait BackendModel: Send {
    /// Declared inputs and outputs. An empty list means the session does not
    /// advertise them.
    fn spec(&self) -> &ModelSpec;

    /// Runs the model once, blocking until every output is materialised.
    fn run(&mut self, inputs: Vec<(IOName, Tensor)>) -> Result<Vec<(IOName, Tensor)>>;
}
