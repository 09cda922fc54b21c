pub mod classify;
pub mod evaluator;
pub mod feed;
pub mod text;

pub use classify::*;
pub use evaluator::{EvalOptions, EvaluationResult, Evaluator, SampleOutcome};
pub use feed::*;
pub use text::*;
