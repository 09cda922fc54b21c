use thiserror::Error;

use crate::{DType, Shape};

pub type Result<T, E = EvalError> = std::result::Result<T, E>;

/// Malformed array streams and archive layouts.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("bad magic")]
    BadMagic,
    #[error("unsupported format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("truncated header: declared {declared} bytes, {available} available")]
    TruncatedHeader { declared: usize, available: usize },
    #[error("malformed header: {0}")]
    MalformedHeader(String),
    #[error("truncated data: {len} bytes is not a multiple of the {element_size}-byte {dtype} element")]
    TruncatedData {
        len: usize,
        element_size: usize,
        dtype: DType,
    },
    #[error("data holds {actual} elements, shape {shape} needs {expected}")]
    ElementCount {
        shape: Shape,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate member `{0}`")]
    DuplicateMember(String),
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("archive error: {context}")]
    Archive {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("dtype error: {0}")]
    Dtype(String),
    #[error("shape error: {0}")]
    Shape(String),
    #[error("missing archive member `{0}`")]
    MissingMember(String),
    #[error("missing model output `{0}`")]
    MissingOutput(String),
    #[error("empty dataset: nothing to evaluate")]
    EmptyDataset,
    #[error("empty input: {0} needs at least one value")]
    EmptyInput(&'static str),
    #[error("inference backend call failed")]
    RuntimeInvocation(#[source] anyhow::Error),
    #[error("tokenizer failed on {text:?}")]
    Tokenize {
        text: String,
        #[source]
        source: anyhow::Error,
    },
}

impl EvalError {
    pub fn archive(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        EvalError::Archive {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn dtype(msg: impl Into<String>) -> Self {
        EvalError::Dtype(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        EvalError::Shape(msg.into())
    }
}
