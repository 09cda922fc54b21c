/// Where an inference session's model comes from.
#[derive(Clone, Debug)]
pub enum ModelArtifact {
    OnnxPath(std::path::PathBuf),
    OnnxBytes(Vec<u8>),
}
