//! Loss functions returning the loss and its gradient.
//!
//! - [`mean_absolute_error`] - the loss the spline models are trained with
//! - [`masked_mse`] - Mean Squared Error with optional masking
//!
//! # Example
//!
//! ```rust
//! use abel_spline::loss::mean_absolute_error;
//!
//! let predictions = vec![0.5, 1.0, 1.5];
//! let targets = vec![0.0, 1.0, 2.0];
//!
//! let (loss, grad) = mean_absolute_error(&predictions, &targets);
//! assert!((loss - 1.0 / 3.0).abs() < 1e-6);
//! assert_eq!(grad.len(), 3);
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Loss selector for [`train_step`](crate::train_step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Loss {
    /// Mean absolute error.
    #[default]
    MeanAbsoluteError,
    /// Mean squared error.
    MeanSquaredError,
}

impl Loss {
    /// Evaluates the loss and its gradient with respect to `predictions`.
    pub fn evaluate(&self, predictions: &[f32], targets: &[f32]) -> (f32, Vec<f32>) {
        match self {
            Loss::MeanAbsoluteError => mean_absolute_error(predictions, targets),
            Loss::MeanSquaredError => masked_mse(predictions, targets, None),
        }
    }
}

/// Mean Absolute Error.
///
/// The gradient uses `sign(0) = 0`.
pub fn mean_absolute_error(predictions: &[f32], targets: &[f32]) -> (f32, Vec<f32>) {
    debug_assert_eq!(predictions.len(), targets.len());

    let n = predictions.len();
    if n == 0 {
        return (0.0, Vec::new());
    }
    let scale = 1.0 / n as f32;

    let mut loss = 0.0f32;
    let grad = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| {
            let diff = p - t;
            loss += diff.abs();
            if diff > 0.0 {
                scale
            } else if diff < 0.0 {
                -scale
            } else {
                0.0
            }
        })
        .collect();

    (loss * scale, grad)
}

/// Masked Mean Squared Error loss.
///
/// Computes MSE only for positions where `mask > 0`.
///
/// # Arguments
///
/// * `predictions` - Model output: `[batch_size * output_dim]`
/// * `targets` - Ground truth: `[batch_size * output_dim]`
/// * `mask` - Optional mask: 1.0 for active, 0.0 for ignore
pub fn masked_mse(predictions: &[f32], targets: &[f32], mask: Option<&[f32]>) -> (f32, Vec<f32>) {
    debug_assert_eq!(predictions.len(), targets.len());

    let n = predictions.len();
    let mut loss = 0.0f32;
    let mut grad = vec![0.0f32; n];
    let mut count = 0.0f32;

    for i in 0..n {
        let m = mask.map(|m| m[i]).unwrap_or(1.0);

        if m > 0.0 {
            let diff = predictions[i] - targets[i];
            loss += m * diff * diff;
            grad[i] = 2.0 * m * diff;
            count += m;
        }
    }

    if count > 0.0 {
        loss /= count;
        for g in &mut grad {
            *g /= count;
        }
    }

    (loss, grad)
}
