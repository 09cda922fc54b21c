use npzeval_core::{EvalError, Result};

/// Probabilities from raw scores. The maximum is subtracted before
/// exponentiating; sums are accumulated in `f64`.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>> {
    let max = logits
        .iter()
        .copied()
        .reduce(f32::max)
        .ok_or(EvalError::EmptyInput("softmax"))?;

    let exps: Vec<f64> = logits
        .iter()
        .map(|&v| f64::from(v - max).exp())
        .collect();
    let sum: f64 = exps.iter().sum();

    Ok(exps.iter().map(|e| (e / sum) as f32).collect())
}

/// Index of the largest value; ties go to the lowest index.
pub fn argmax(values: &[f32]) -> Result<usize> {
    let (first, rest) = values
        .split_first()
        .ok_or(EvalError::EmptyInput("argmax"))?;

    let mut best_idx = 0;
    let mut best_val = *first;
    for (i, &v) in rest.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = i + 1;
        }
    }
    Ok(best_idx)
}
