//! Named parameter tensors.
//!
//! Every model exposes its state as an ordered list of [`Parameter`]s.
//! A training harness reads and writes them through
//! [`Approximator::parameters_mut`](crate::Approximator::parameters_mut);
//! tensors with `trainable == false` must never be updated.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A dense, row-major `f32` tensor with a name and a trainable flag.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Parameter {
    /// Stable name, e.g. `"control_points"`.
    pub name: String,
    /// Tensor shape.
    pub shape: Vec<usize>,
    /// Flat row-major values.
    pub values: Vec<f32>,
    /// Whether gradient updates may touch this tensor.
    pub trainable: bool,
}

impl Parameter {
    /// Creates a tensor filled with `value`.
    pub fn filled(name: impl Into<String>, shape: &[usize], value: f32, trainable: bool) -> Self {
        let len = shape.iter().product();
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            values: vec![value; len],
            trainable,
        }
    }

    /// Creates a trainable tensor drawn from `Uniform(-range, range)`.
    ///
    /// The same `seed` always produces the same values.
    pub fn uniform(name: impl Into<String>, shape: &[usize], range: f32, seed: u64) -> Self {
        let len = shape.iter().product();
        let mut rng = StdRng::seed_from_u64(seed);
        let values = (0..len).map(|_| rng.gen_range(-range..range)).collect();
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            values,
            trainable: true,
        }
    }

    /// Number of scalar entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the tensor holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Width of one row (last shape axis).
    #[inline]
    pub fn row_len(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }

    /// Number of rows (product of all but the last axis).
    #[inline]
    pub fn rows(&self) -> usize {
        let width = self.row_len();
        if width == 0 {
            0
        } else {
            self.values.len() / width
        }
    }

    /// Row `row` as a slice, if in range.
    #[inline]
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let width = self.row_len();
        self.values.get(row * width..(row + 1) * width)
    }

    /// Row `row` as a mutable slice, if in range.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> Option<&mut [f32]> {
        let width = self.row_len();
        self.values.get_mut(row * width..(row + 1) * width)
    }
}
