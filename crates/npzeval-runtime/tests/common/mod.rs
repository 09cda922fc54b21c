#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::bail;
use npzeval_core::{
    ArrayData, ArrayRecord, BackendModel, DType, IOName, ModelSpec, NamedArray, Shape,
    StorageOrder, Tensor, TensorSpec,
};
use npzeval_npy::Archive;

pub type Calls = Arc<Mutex<Vec<Vec<(IOName, Tensor)>>>>;

/// Replays canned score vectors, one per call, and records what it was fed.
pub struct ScriptedModel {
    spec: ModelSpec,
    output: IOName,
    script: VecDeque<anyhow::Result<Vec<f32>>>,
    calls: Calls,
}

impl ScriptedModel {
    pub fn new(output: &str, script: Vec<Vec<f32>>) -> Self {
        Self {
            spec: ModelSpec::default(),
            output: IOName::new(output),
            script: script.into_iter().map(Ok).collect(),
            calls: Calls::default(),
        }
    }

    /// Scores whose argmax is `class`, out of `num_classes`.
    pub fn predicting(classes: &[usize], num_classes: usize) -> Self {
        Self::new("logits", classes.iter().map(|&c| one_hot(c, num_classes)).collect())
    }

    pub fn advertising(mut self, inputs: &[&str], outputs: &[&str]) -> Self {
        let spec = |name: &&str| TensorSpec {
            name: IOName::new(*name),
            dtype: DType::F32,
            dims: vec![None],
        };
        self.spec = ModelSpec {
            inputs: inputs.iter().map(spec).collect(),
            outputs: outputs.iter().map(spec).collect(),
        };
        self
    }

    pub fn failing_at(mut self, call: usize) -> Self {
        self.script[call] = Err(anyhow::anyhow!("device lost"));
        self
    }

    pub fn calls(&self) -> Calls {
        Arc::clone(&self.calls)
    }
}

impl BackendModel for ScriptedModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn run(&mut self, inputs: Vec<(IOName, Tensor)>) -> anyhow::Result<Vec<(IOName, Tensor)>> {
        self.calls.lock().unwrap().push(inputs);
        let Some(next) = self.script.pop_front() else {
            bail!("script exhausted");
        };
        let scores = next?;
        let shape = Shape::from_slice(&[1, scores.len()]);
        Ok(vec![(
            self.output.clone(),
            Tensor::from_elements(shape, &ArrayData::F32(scores)),
        )])
    }
}

pub fn one_hot(class: usize, num_classes: usize) -> Vec<f32> {
    let mut scores = vec![-1.0; num_classes];
    scores[class] = 4.0;
    scores
}

pub fn array(name: &str, shape: &[usize], data: ArrayData) -> NamedArray {
    let record = ArrayRecord::new(Shape::from_slice(shape), StorageOrder::RowMajor, data).unwrap();
    NamedArray::new(name, record)
}

/// `x`: float32 [n, 1, 28, 28] where every element equals its flat index;
/// `y`: int64 labels.
pub fn mnist_archive(n: usize, labels: &[i64]) -> Archive {
    let pixels = (0..n * 784).map(|i| i as f32).collect();
    Archive::from_arrays([
        array("x", &[n, 1, 28, 28], ArrayData::F32(pixels)),
        array("y", &[labels.len()], ArrayData::I64(labels.to_vec())),
    ])
    .unwrap()
}

pub fn f32_values(tensor: &Tensor) -> Vec<f32> {
    match tensor.elements().unwrap() {
        ArrayData::F32(v) => v,
        other => panic!("expected f32 tensor, got {other:?}"),
    }
}
