use std::borrow::Cow;

use npzeval_core::{
    convert_exact, ArrayData, DType, EvalError, IOName, NamedArray, Result, Shape, Tensor,
};
use npzeval_npy::Archive;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberRole {
    Input,
    Label,
}

/// One archive member the evaluation needs.
#[derive(Clone, Debug)]
pub struct MemberSpec {
    pub member: String,
    /// Session input the per-sample slice is fed to. Unused for labels.
    pub feed_name: IOName,
    /// Element type handed to the backend (or that labels must convert to exactly).
    pub dtype: DType,
    pub sample_shape: Shape,
    pub role: MemberRole,
}

impl MemberSpec {
    pub fn input(
        member: impl Into<String>,
        feed_name: impl Into<String>,
        dtype: DType,
        sample_shape: &[usize],
    ) -> Self {
        Self {
            member: member.into(),
            feed_name: IOName::new(feed_name),
            dtype,
            sample_shape: Shape::from_slice(sample_shape),
            role: MemberRole::Input,
        }
    }

    pub fn label(member: impl Into<String>, dtype: DType) -> Self {
        let member = member.into();
        Self {
            feed_name: IOName::new(member.clone()),
            member,
            dtype,
            sample_shape: Shape::scalar(),
            role: MemberRole::Label,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub members: Vec<MemberSpec>,
    pub num_classes: usize,
}

/// Everything one inference call needs for a single sample.
#[derive(Clone, Debug)]
pub struct SampleFeed {
    pub index: usize,
    pub inputs: Vec<(IOName, Tensor)>,
    pub label: Option<usize>,
}

struct PreparedInput<'a> {
    feed_name: IOName,
    data: Cow<'a, ArrayData>,
    tensor_shape: Shape,
    per_sample: usize,
}

/// Slices an archive into per-sample feeds.
///
/// Inputs borrow the archive's elements unless they had to be reordered or
/// converted. Every [`SampleFeed`] owns freshly encoded buffers, so nothing
/// carries over from one sample to the next.
pub struct SampleFeedBuilder<'a> {
    inputs: Vec<PreparedInput<'a>>,
    labels: Option<Vec<usize>>,
    sample_count: usize,
}

impl<'a> SampleFeedBuilder<'a> {
    pub fn new(archive: &'a Archive, config: &FeedConfig) -> Result<Self> {
        let mut label_spec = None;
        for spec in config.members.iter().filter(|s| s.role == MemberRole::Label) {
            if label_spec.replace(spec).is_some() {
                return Err(EvalError::shape("more than one label member configured"));
            }
        }
        let input_specs: Vec<&MemberSpec> = config
            .members
            .iter()
            .filter(|s| s.role == MemberRole::Input)
            .collect();
        if input_specs.is_empty() {
            return Err(EvalError::shape("no input members configured"));
        }

        let label_array = label_spec
            .map(|spec| archive.require(&spec.member))
            .transpose()?;
        let input_arrays = input_specs
            .iter()
            .map(|spec| archive.require(&spec.member))
            .collect::<Result<Vec<_>>>()?;

        let sample_count = match label_array {
            Some(array) => array.shape().first_dim().ok_or_else(|| {
                EvalError::shape(format!(
                    "label member `{}` is a scalar, expected shape [N]",
                    array.name()
                ))
            })?,
            None => infer_sample_count(input_specs[0], input_arrays[0])?,
        };

        let mut inputs = Vec::with_capacity(input_specs.len());
        for (spec, array) in input_specs.iter().zip(input_arrays) {
            let per_sample = per_sample_len(spec)?;
            check_count(array, sample_count, per_sample)?;
            inputs.push(PreparedInput {
                feed_name: spec.feed_name.clone(),
                data: prepare(array, spec.dtype)?,
                tensor_shape: spec.sample_shape.with_batch(1),
                per_sample,
            });
        }

        let labels = match (label_spec, label_array) {
            (Some(spec), Some(array)) => {
                if spec.sample_shape.numel() != 1 {
                    return Err(EvalError::shape(format!(
                        "label member `{}` must hold one value per sample, configured shape is {}",
                        spec.member, spec.sample_shape
                    )));
                }
                check_count(array, sample_count, 1)?;
                Some(class_indices(array, spec.dtype, config.num_classes)?)
            }
            _ => None,
        };

        debug!(
            sample_count,
            inputs = inputs.len(),
            labeled = labels.is_some(),
            "sample feeds ready"
        );

        Ok(Self {
            inputs,
            labels,
            sample_count,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// Elements per sample for the given session input.
    pub fn input_len(&self, feed_name: &str) -> Option<usize> {
        self.inputs
            .iter()
            .find(|input| input.feed_name.as_str() == feed_name)
            .map(|input| input.per_sample)
    }

    pub fn build(&self, index: usize) -> Result<SampleFeed> {
        if index >= self.sample_count {
            return Err(EvalError::shape(format!(
                "sample index {index} out of range for {} samples",
                self.sample_count
            )));
        }

        let inputs = self
            .inputs
            .iter()
            .map(|input| {
                let start = index * input.per_sample;
                let bytes = input.data.range_to_le_bytes(start..start + input.per_sample);
                let tensor = Tensor::from_cpu_bytes(
                    input.data.dtype(),
                    input.tensor_shape.clone(),
                    bytes,
                );
                (input.feed_name.clone(), tensor)
            })
            .collect();

        Ok(SampleFeed {
            index,
            inputs,
            label: self.labels.as_ref().map(|labels| labels[index]),
        })
    }
}

fn per_sample_len(spec: &MemberSpec) -> Result<usize> {
    spec.sample_shape.checked_numel().ok_or_else(|| {
        EvalError::shape(format!(
            "sample shape {} of `{}` overflows",
            spec.sample_shape, spec.member
        ))
    })
}

fn infer_sample_count(spec: &MemberSpec, array: &NamedArray) -> Result<usize> {
    let per_sample = per_sample_len(spec)?;
    if per_sample == 0 || array.len() % per_sample != 0 {
        return Err(EvalError::shape(format!(
            "`{}` holds {} elements, not a whole number of {} samples",
            array.name(),
            array.len(),
            spec.sample_shape
        )));
    }
    Ok(array.len() / per_sample)
}

fn check_count(array: &NamedArray, sample_count: usize, per_sample: usize) -> Result<()> {
    let expected = sample_count.checked_mul(per_sample);
    if expected != Some(array.len()) {
        let expected = expected
            .map_or_else(|| "more than usize::MAX".to_string(), |n| n.to_string());
        return Err(EvalError::shape(format!(
            "unexpected {} size: got {}, want {} (= {} * {})",
            array.name(),
            array.len(),
            expected,
            sample_count,
            per_sample
        )));
    }
    Ok(())
}

/// Row-major elements in the requested dtype.
fn prepare(array: &NamedArray, dtype: DType) -> Result<Cow<'_, ArrayData>> {
    let data = array.to_row_major();
    if data.dtype() == dtype {
        return Ok(data);
    }
    debug!(member = array.name(), from = %data.dtype(), to = %dtype, "converting member");
    convert_exact(&data, dtype)
        .map(Cow::Owned)
        .map_err(|err| match err {
            EvalError::Dtype(msg) => EvalError::Dtype(format!("member `{}`: {msg}", array.name())),
            other => other,
        })
}

fn class_indices(array: &NamedArray, dtype: DType, num_classes: usize) -> Result<Vec<usize>> {
    let typed = prepare(array, dtype)?;
    let values = match convert_exact(&typed, DType::U64) {
        Ok(ArrayData::U64(values)) => values,
        Ok(other) => {
            return Err(EvalError::dtype(format!(
                "label member `{}` converted to {} instead of uint64",
                array.name(),
                other.dtype()
            )))
        }
        Err(err) => {
            return Err(EvalError::dtype(format!(
                "label member `{}` is not a class index: {err}",
                array.name()
            )))
        }
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            usize::try_from(v)
                .ok()
                .filter(|&class| class < num_classes)
                .ok_or_else(|| {
                    EvalError::shape(format!(
                        "label {v} of sample {i} is outside [0, {num_classes})"
                    ))
                })
        })
        .collect()
}
