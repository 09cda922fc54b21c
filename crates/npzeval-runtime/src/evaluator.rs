use std::time::Instant;

use npzeval_core::{BackendModel, EvalError, IOName, Result, Tensor};
use tracing::{debug, info};

use crate::{argmax, SampleFeedBuilder};

#[derive(Clone, Debug)]
pub struct EvalOptions {
    /// Session output holding the class scores.
    pub output_name: IOName,
    pub num_classes: usize,
}

/// What happened to one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleOutcome {
    pub index: usize,
    pub predicted: usize,
    pub label: Option<usize>,
    pub backend_us: u64,
}

impl SampleOutcome {
    pub fn is_correct(&self) -> Option<bool> {
        self.label.map(|label| label == self.predicted)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvaluationResult {
    pub total_samples: usize,
    pub labeled: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub backend_us: u64,
}

impl EvaluationResult {
    pub fn from_counts(
        total_samples: usize,
        labeled: usize,
        correct: usize,
        backend_us: u64,
    ) -> Result<Self> {
        if total_samples == 0 {
            return Err(EvalError::EmptyDataset);
        }
        Ok(Self {
            total_samples,
            labeled,
            correct,
            accuracy: correct as f64 / total_samples as f64,
            backend_us,
        })
    }
}

/// Drives one inference call per sample, strictly in order.
pub struct Evaluator {
    session: Box<dyn BackendModel>,
    options: EvalOptions,
}

impl Evaluator {
    pub fn new(session: Box<dyn BackendModel>, options: EvalOptions) -> Self {
        Self { session, options }
    }

    pub fn run(&mut self, feeds: &SampleFeedBuilder<'_>) -> Result<EvaluationResult> {
        self.run_with(feeds, |_| {})
    }

    /// Like [`Evaluator::run`], reporting each sample to `on_sample` as it finishes.
    pub fn run_with(
        &mut self,
        feeds: &SampleFeedBuilder<'_>,
        mut on_sample: impl FnMut(&SampleOutcome),
    ) -> Result<EvaluationResult> {
        let total = feeds.sample_count();
        if total == 0 {
            return Err(EvalError::EmptyDataset);
        }
        check_output(self.session.as_ref(), &self.options.output_name)?;

        info!(
            samples = total,
            output = %self.options.output_name,
            classes = self.options.num_classes,
            "evaluation started"
        );

        let mut labeled = 0;
        let mut correct = 0;
        let mut backend_us = 0;
        for index in 0..total {
            let feed = feeds.build(index)?;
            let (scores, us) = score(
                self.session.as_mut(),
                feed.inputs,
                &self.options.output_name,
                self.options.num_classes,
            )?;
            let outcome = SampleOutcome {
                index,
                predicted: argmax(&scores)?,
                label: feed.label,
                backend_us: us,
            };

            backend_us += us;
            if let Some(hit) = outcome.is_correct() {
                labeled += 1;
                correct += usize::from(hit);
            }
            debug!(
                index,
                predicted = outcome.predicted,
                label = ?outcome.label,
                backend_us = us,
                "sample done"
            );
            on_sample(&outcome);
        }

        let result = EvaluationResult::from_counts(total, labeled, correct, backend_us)?;
        info!(
            samples = result.total_samples,
            correct = result.correct,
            accuracy = result.accuracy,
            "evaluation finished"
        );
        Ok(result)
    }
}

/// Fails early when the session advertises outputs and `output` is not among them.
pub(crate) fn check_output(session: &dyn BackendModel, output: &IOName) -> Result<()> {
    let spec = session.spec();
    if !spec.outputs.is_empty() && spec.output(output.as_str()).is_none() {
        return Err(EvalError::MissingOutput(output.to_string()));
    }
    Ok(())
}

/// One blocking backend call; returns the named output's scores and the
/// time spent in the backend.
pub(crate) fn score(
    session: &mut dyn BackendModel,
    inputs: Vec<(IOName, Tensor)>,
    output: &IOName,
    num_classes: usize,
) -> Result<(Vec<f32>, u64)> {
    let t0 = Instant::now();
    let outputs = session.run(inputs).map_err(EvalError::RuntimeInvocation)?;
    let backend_us = t0.elapsed().as_micros() as u64;

    let (_, tensor) = outputs
        .into_iter()
        .find(|(name, _)| name == output)
        .ok_or_else(|| EvalError::MissingOutput(output.to_string()))?;

    if !tensor.dtype().is_float() {
        return Err(EvalError::dtype(format!(
            "output `{output}` has non-float element type {}",
            tensor.dtype()
        )));
    }
    let scores = tensor.elements()?.float_values().unwrap_or_default();
    if scores.len() != num_classes {
        return Err(EvalError::shape(format!(
            "unexpected {output} len: {} (expected {num_classes})",
            scores.len()
        )));
    }

    Ok((scores, backend_us))
}
