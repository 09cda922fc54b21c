use npzeval_core::{ArrayData, BackendModel, EvalError, IOName, Result, Shape, Tensor};
use tracing::debug;

use crate::evaluator::{check_output, score};
use crate::{argmax, softmax, EvaluationResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecialTokens {
    pub cls: i64,
    pub sep: i64,
    pub pad: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
    /// Pad every sequence to `max_length`.
    MaxLength,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
    pub max_length: usize,
    pub padding: Padding,
    pub truncation: bool,
}

impl EncodeOptions {
    /// Fixed-length sequences: truncate long input, pad short input.
    pub fn fixed(max_length: usize) -> Self {
        Self {
            max_length,
            padding: Padding::MaxLength,
            truncation: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoding {
    pub token_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
}

pub trait Tokenizer: Send + Sync {
    /// Vocabulary ids for `text`, without special tokens.
    fn ids(&self, text: &str) -> anyhow::Result<Vec<i64>>;

    fn special_tokens(&self) -> SpecialTokens;
}

/// Tokenizes `text` into `[CLS] ids.. [SEP]` followed by padding.
pub fn encode(tokenizer: &dyn Tokenizer, text: &str, options: &EncodeOptions) -> Result<Encoding> {
    let ids = tokenizer.ids(text).map_err(|source| EvalError::Tokenize {
        text: text.to_string(),
        source,
    })?;
    frame(&ids, tokenizer.special_tokens(), options)
}

/// Wraps content ids in `[CLS]`/`[SEP]`, truncating the content (never the
/// `[SEP]`) and padding with `[PAD]` under a zero attention mask.
pub fn frame(ids: &[i64], special: SpecialTokens, options: &EncodeOptions) -> Result<Encoding> {
    let max_length = options.max_length;
    if max_length < 2 {
        return Err(EvalError::shape(format!(
            "max_length {max_length} leaves no room for [CLS] and [SEP]"
        )));
    }

    let room = max_length - 2;
    let content = if ids.len() > room {
        if !options.truncation {
            return Err(EvalError::shape(format!(
                "{} tokens exceed max_length {max_length} and truncation is off",
                ids.len() + 2
            )));
        }
        &ids[..room]
    } else {
        ids
    };

    let mut token_ids = Vec::with_capacity(max_length);
    token_ids.push(special.cls);
    token_ids.extend_from_slice(content);
    token_ids.push(special.sep);
    let mut attention_mask = vec![1; token_ids.len()];

    if options.padding == Padding::MaxLength {
        token_ids.resize(max_length, special.pad);
        attention_mask.resize(max_length, 0);
    }

    Ok(Encoding {
        token_ids,
        attention_mask,
    })
}

#[derive(Clone, Debug)]
pub struct TextConfig {
    pub ids_input: IOName,
    pub mask_input: IOName,
    pub output_name: IOName,
    pub encode: EncodeOptions,
    /// One name per class, in class-index order.
    pub label_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextPrediction {
    pub logits: Vec<f32>,
    pub probabilities: Vec<f32>,
    pub class: usize,
    pub label_name: String,
    pub backend_us: u64,
}

pub struct TextClassifier {
    session: Box<dyn BackendModel>,
    tokenizer: Box<dyn Tokenizer>,
    config: TextConfig,
}

impl TextClassifier {
    pub fn new(
        session: Box<dyn BackendModel>,
        tokenizer: Box<dyn Tokenizer>,
        config: TextConfig,
    ) -> Self {
        Self {
            session,
            tokenizer,
            config,
        }
    }

    pub fn classify(&mut self, text: &str) -> Result<TextPrediction> {
        let encoding = encode(self.tokenizer.as_ref(), text, &self.config.encode)?;
        let inputs = vec![
            (self.config.ids_input.clone(), to_i64_tensor(encoding.token_ids)),
            (
                self.config.mask_input.clone(),
                to_i64_tensor(encoding.attention_mask),
            ),
        ];

        let (logits, backend_us) = score(
            self.session.as_mut(),
            inputs,
            &self.config.output_name,
            self.config.label_names.len(),
        )?;
        let probabilities = softmax(&logits)?;
        let class = argmax(&logits)?;
        debug!(text, class, backend_us, "text classified");

        Ok(TextPrediction {
            label_name: self.config.label_names[class].clone(),
            logits,
            probabilities,
            class,
            backend_us,
        })
    }

    /// Classifies each text in order. With `labels`, accuracy counts
    /// predictions that match; without, it is zero and `labeled` is zero.
    pub fn evaluate(
        &mut self,
        texts: &[String],
        labels: Option<&[usize]>,
        mut on_text: impl FnMut(&str, &TextPrediction),
    ) -> Result<EvaluationResult> {
        if texts.is_empty() {
            return Err(EvalError::EmptyDataset);
        }
        if let Some(labels) = labels {
            if labels.len() != texts.len() {
                return Err(EvalError::shape(format!(
                    "{} labels for {} texts",
                    labels.len(),
                    texts.len()
                )));
            }
            let num_classes = self.config.label_names.len();
            if let Some(bad) = labels.iter().find(|&&l| l >= num_classes) {
                return Err(EvalError::shape(format!(
                    "label {bad} is outside [0, {num_classes})"
                )));
            }
        }
        check_output(self.session.as_ref(), &self.config.output_name)?;

        let mut correct = 0;
        let mut backend_us = 0;
        for (i, text) in texts.iter().enumerate() {
            let prediction = self.classify(text)?;
            backend_us += prediction.backend_us;
            if labels.is_some_and(|labels| labels[i] == prediction.class) {
                correct += 1;
            }
            on_text(text, &prediction);
        }

        let labeled = if labels.is_some() { texts.len() } else { 0 };
        EvaluationResult::from_counts(texts.len(), labeled, correct, backend_us)
    }
}

/// A `[1, len]` int64 tensor, the batch-of-one layout the session expects.
fn to_i64_tensor(values: Vec<i64>) -> Tensor {
    let shape = Shape::from_slice(&[1, values.len()]);
    Tensor::from_elements(shape, &ArrayData::I64(values))
}
