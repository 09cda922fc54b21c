use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IOName(pub String);

impl IOName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IOName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct TensorSpec {
    pub name: IOName,
    pub dtype: super::DType,
    pub dims: Vec<Option<usize>>, // None = dynamic
}

#[derive(Clone, Debug, Default)]
pub struct ModelSpec {
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

impl ModelSpec {
    pub fn input(&self, name: &str) -> Option<&TensorSpec> {
        self.inputs.iter().find(|spec| spec.name.0 == name)
    }

    pub fn output(&self, name: &str) -> Option<&TensorSpec> {
        self.outputs.iter().find(|spec| spec.name.0 == name)
    }
}
