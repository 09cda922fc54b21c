use std::path::PathBuf;

use clap::{Args, FromArgMatches, Parser, Subcommand};
use npzeval_core::DType;

#[derive(Parser, Debug)]
#[command(
    name = "npzeval",
    version,
    about = "Evaluate ONNX classifiers against NPZ test sets"
)]
pub struct Cli {
    /// Log level (RUST_LOG syntax); RUST_LOG takes precedence when set
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The requested subcommand, or `eval` with every default when none was given.
    pub fn into_command(self) -> Result<Command, clap::Error> {
        match self.command {
            Some(command) => Ok(command),
            None => {
                let matches = EvalArgs::augment_args(clap::Command::new("eval"))
                    .try_get_matches_from(["eval"])?;
                EvalArgs::from_arg_matches(&matches).map(Command::Eval)
            }
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every sample of an archive through a model and report accuracy
    Eval(EvalArgs),

    /// List the arrays stored in an archive
    Inspect(InspectArgs),

    /// Classify sentences with a BERT-style sequence classifier
    ClassifyText(ClassifyTextArgs),
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// NPZ archive holding the test set
    #[arg(long, default_value = "data/mnist_test_normalized.npz")]
    pub archive: PathBuf,

    /// Path to ONNX model file
    #[arg(long, default_value = "data/mnist_cnn.onnx")]
    pub model: PathBuf,

    /// Device for inference (cpu or cuda:N)
    #[arg(long, default_value = "cpu")]
    pub device: String,

    /// Archive member with the model inputs
    #[arg(long, default_value = "x")]
    pub input_member: String,

    /// Session input fed with one sample of the input member
    #[arg(long, default_value = "input")]
    pub input_name: String,

    /// Element type the session input expects
    #[arg(long, default_value = "float32")]
    pub input_dtype: DType,

    /// Per-sample dims, without the batch dimension
    #[arg(long, value_delimiter = ',', default_value = "1,28,28")]
    pub sample_shape: Vec<usize>,

    /// Archive member with the expected class of each sample
    #[arg(long, default_value = "y")]
    pub label_member: String,

    /// Element type labels are read as
    #[arg(long, default_value = "int64")]
    pub label_dtype: DType,

    /// Evaluate without labels (predictions only)
    #[arg(long)]
    pub no_labels: bool,

    /// Session output holding the class scores
    #[arg(long, default_value = "logits")]
    pub output_name: String,

    #[arg(long, default_value_t = 10)]
    pub num_classes: usize,

    /// Print a progress line every N samples (0 disables)
    #[arg(long, default_value_t = 1000)]
    pub progress_every: usize,

    /// Print one line per sample
    #[arg(long)]
    pub per_sample: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// NPZ archive to list
    #[arg(default_value = "data/mnist_test_normalized.npz")]
    pub archive: PathBuf,

    /// Leading elements to print per member
    #[arg(long, default_value_t = 10)]
    pub preview: usize,
}

#[derive(Args, Debug)]
pub struct ClassifyTextArgs {
    /// Path to ONNX model file
    #[arg(long, default_value = "data/bert-sst2.onnx")]
    pub model: PathBuf,

    /// HuggingFace tokenizer.json
    #[arg(long, default_value = "data/bert-sst2/tokenizer.json")]
    pub tokenizer: PathBuf,

    /// Device for inference (cpu or cuda:N)
    #[arg(long, default_value = "cpu")]
    pub device: String,

    #[arg(long, default_value_t = 128)]
    pub max_length: usize,

    /// Class names in class-index order
    #[arg(long, value_delimiter = ',', default_value = "negative,positive")]
    pub labels: Vec<String>,

    #[arg(long, default_value = "input_ids")]
    pub ids_input: String,

    #[arg(long, default_value = "attention_mask")]
    pub mask_input: String,

    #[arg(long, default_value = "logits")]
    pub output_name: String,

    /// Expected class per text; enables the accuracy line
    #[arg(long, value_delimiter = ',')]
    pub expect: Vec<usize>,

    /// Sentences to classify (a built-in set when omitted)
    pub texts: Vec<String>,
}
