//! Unified error types for abel-spline.
//!
//! This module provides [`AbelError`], the error type returned by every
//! fallible model operation. It uses the `thiserror` crate for ergonomic
//! error handling.
//!
//! # Example
//!
//! ```rust
//! use abel_spline::AbelError;
//!
//! fn validate_shape(expected: &[usize], got: &[usize]) -> Result<(), AbelError> {
//!     if expected != got {
//!         return Err(AbelError::ShapeMismatch {
//!             expected: expected.to_vec(),
//!             got: got.to_vec(),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::config::ConfigError;

/// Unified error type for abel-spline operations.
///
/// None of these are retried internally: every variant fails the call that
/// detected it.
#[derive(Error, Debug)]
pub enum AbelError {
    /// Invalid constructor arguments.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The repartition solve hit a singular or ill-conditioned basis matrix.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Shape mismatch between expected and actual tensor shapes.
    ///
    /// Returned when an input batch does not have `input_dim` columns or an
    /// output buffer has the wrong length.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected tensor shape.
        expected: Vec<usize>,
        /// Actual tensor shape received.
        got: Vec<usize>,
    },

    /// A computed table row fell outside the allocated table.
    #[error("Index {index} out of range for table with {len} rows")]
    IndexOutOfRange {
        /// Offending row.
        index: usize,
        /// Rows in the table.
        len: usize,
    },

    /// Tensor shape mismatch between parameter and gradient.
    ///
    /// Parameter and gradient tensors must have identical shapes for update.
    #[error("Tensor shape mismatch: param shape {param_shape:?}, grad shape {grad_shape:?}")]
    TensorShapeMismatch {
        /// Shape of the parameter tensor.
        param_shape: Vec<usize>,
        /// Shape of the gradient tensor.
        grad_shape: Vec<usize>,
    },

    /// The number of gradient tensors does not match the parameter list.
    #[error("Expected {expected} parameter tensors, got {got}")]
    ParameterCountMismatch {
        /// Parameter tensors in the model.
        expected: usize,
        /// Tensors supplied.
        got: usize,
    },

    /// The model has no resolution-change operator.
    #[error("Repartition is not supported for {0}")]
    RepartitionUnsupported(&'static str),
}

/// Result type alias for abel-spline operations.
pub type AbelResult<T> = Result<T, AbelError>;

impl AbelError {
    /// Creates a shape mismatch error.
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        AbelError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Creates a numerical instability error with the given message.
    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        AbelError::NumericalInstability(msg.into())
    }

    /// Creates an index out of range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        AbelError::IndexOutOfRange { index, len }
    }

    /// Creates a tensor shape mismatch error.
    pub fn tensor_shape_mismatch(param_shape: &[usize], grad_shape: &[usize]) -> Self {
        AbelError::TensorShapeMismatch {
            param_shape: param_shape.to_vec(),
            grad_shape: grad_shape.to_vec(),
        }
    }
}

/// Checks that `inputs` is a whole number of rows of width `input_dim` and
/// returns the batch size.
pub(crate) fn check_batch(inputs: &[f32], input_dim: usize) -> AbelResult<usize> {
    if input_dim == 0 || inputs.len() % input_dim != 0 {
        return Err(AbelError::shape_mismatch(
            &[inputs.len() / input_dim.max(1), input_dim],
            &[inputs.len()],
        ));
    }
    Ok(inputs.len() / input_dim)
}

/// Checks that a per-batch buffer has exactly `batch_size * width` entries.
pub(crate) fn check_len(buf: &[f32], batch_size: usize, width: usize) -> AbelResult<()> {
    if buf.len() != batch_size * width {
        return Err(AbelError::shape_mismatch(
            &[batch_size, width],
            &[buf.len()],
        ));
    }
    Ok(())
}
