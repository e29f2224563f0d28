//! Reusable scratch buffers for batched forward and backward passes.
//!
//! Create a [`Workspace`] once and pass it to every call; after the first
//! call with a given batch size no further allocation happens.
//!
//! ```rust
//! use abel_spline::{Approximator, SplineAnn, SplineConfig, Workspace};
//!
//! let model = SplineAnn::new(SplineConfig::default()).unwrap();
//! let mut workspace = Workspace::new();
//!
//! let input = vec![0.25f32, 0.75];
//! let mut output = vec![0.0f32; 1];
//! for _ in 0..100 {
//!     model.forward_batch(&input, &mut output, &mut workspace).unwrap();
//! }
//! ```

use crate::config::SUPPORT;

/// Preallocated buffers shared by the models of this crate.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    /// Basis weights: `[batch * input_dim * 4]`.
    pub basis_values: Vec<f32>,

    /// Control-point table rows: `[batch * input_dim * 4]`.
    pub control_rows: Vec<u32>,

    /// Output of an intermediate branch (ABEL indirect spline).
    pub branch_output: Vec<f32>,

    /// Gradient flowing into an intermediate branch.
    pub branch_grad: Vec<f32>,
}

impl Workspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a workspace sized for `batch_size` rows of `input_dim` coordinates.
    pub fn with_capacity(batch_size: usize, input_dim: usize) -> Self {
        let mut ws = Self::new();
        ws.reserve_basis(batch_size, input_dim);
        ws
    }

    /// Ensures the basis buffers hold `batch_size * input_dim * 4` entries.
    pub fn reserve_basis(&mut self, batch_size: usize, input_dim: usize) {
        let needed = batch_size * input_dim * SUPPORT;
        if self.basis_values.len() < needed {
            self.basis_values.resize(needed, 0.0);
        }
        if self.control_rows.len() < needed {
            self.control_rows.resize(needed, 0);
        }
    }

    /// Bytes currently held by the workspace.
    pub fn memory_usage(&self) -> usize {
        (self.basis_values.capacity() + self.branch_output.capacity() + self.branch_grad.capacity())
            * std::mem::size_of::<f32>()
            + self.control_rows.capacity() * std::mem::size_of::<u32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_grows_only() {
        let mut ws = Workspace::with_capacity(16, 2);
        assert_eq!(ws.basis_values.len(), 16 * 2 * SUPPORT);
        assert_eq!(ws.control_rows.len(), 16 * 2 * SUPPORT);

        ws.reserve_basis(4, 2);
        assert_eq!(ws.basis_values.len(), 16 * 2 * SUPPORT);

        ws.reserve_basis(32, 2);
        assert_eq!(ws.basis_values.len(), 32 * 2 * SUPPORT);
        assert!(ws.memory_usage() > 0);
    }
}
