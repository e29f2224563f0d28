//! Piecewise-constant lookup-table baseline.
//!
//! Each coordinate is clamped to be non-negative, scaled by
//! `partition_num`, floored and bounded to `[0, partition_num - 1]`. The
//! per-dimension cells are combined into one flat index
//!
//! ```text
//! flat = Σ_i cell_i * partition_num^i
//! ```
//!
//! and the table row at `flat` is the output. Contrast with the spline
//! models, which wrap their index space instead of bounding it.
//!
//! # Reserved Entry
//!
//! Index `partition_num^input_dim` is reserved for the configured default
//! value. It lives in its own non-trainable [`Parameter`] and is only
//! reachable through [`LookupTableModel::entry`]; normal forward calls
//! never produce it.

use crate::buffer::Workspace;
use crate::config::{ConfigError, LookupConfig, INIT_RANGE};
use crate::error::{check_batch, check_len, AbelError, AbelResult};
use crate::model::Approximator;
use crate::param::Parameter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lookup table over a regular grid of the unit hypercube.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LookupTableModel {
    /// Configuration.
    pub config: LookupConfig,
    /// `partition_num^d` per dimension, mixed-radix weights.
    radix: Vec<usize>,
    /// Trainable cells: `[partition_num^input_dim, output_dim]`.
    table: Parameter,
    /// Reserved default entry: `[1, output_dim]`, never trained.
    default: Parameter,
}

impl LookupTableModel {
    /// Creates a model with cells drawn from `Uniform(-0.05, 0.05)`.
    ///
    /// # Errors
    ///
    /// Returns [`AbelError::Config`] if the configuration is invalid or the
    /// table would not fit in `usize` addressing.
    pub fn new(config: LookupConfig) -> AbelResult<Self> {
        config.validate()?;
        let cells = config.num_cells().ok_or(ConfigError::TableTooLarge {
            partition_num: config.partition_num,
            input_dim: config.input_dim,
        })?;

        let radix = (0..config.input_dim)
            .scan(1usize, |acc, _| {
                let current = *acc;
                *acc = acc.saturating_mul(config.partition_num);
                Some(current)
            })
            .collect();

        let table = Parameter::uniform("table", &[cells, config.output_dim], INIT_RANGE, config.seed);
        let default = Parameter::filled("default", &[1, config.output_dim], config.default_val, false);

        log::debug!(
            "LookupTableModel: {} cells x {} outputs, default={}",
            cells,
            config.output_dim,
            config.default_val
        );

        Ok(Self {
            config,
            radix,
            table,
            default,
        })
    }

    /// Number of regular cells (`partition_num^input_dim`).
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.table.rows()
    }

    /// Index of the reserved default entry.
    #[inline]
    pub fn default_index(&self) -> usize {
        self.num_cells()
    }

    /// Cell of one coordinate: ReLU, scale, floor, bound.
    #[inline]
    fn cell(&self, coord: f32) -> usize {
        let z = self.config.partition_num;
        let scaled = (coord.max(0.0) * z as f32).floor();
        // Saturating cast; NaN lands in cell 0.
        (scaled as usize).min(z - 1)
    }

    /// Flat table index of one input row.
    ///
    /// # Errors
    ///
    /// Returns [`AbelError::ShapeMismatch`] if `row.len() != input_dim`.
    pub fn flat_index(&self, row: &[f32]) -> AbelResult<usize> {
        if row.len() != self.config.input_dim {
            return Err(AbelError::shape_mismatch(
                &[self.config.input_dim],
                &[row.len()],
            ));
        }
        Ok(row
            .iter()
            .zip(&self.radix)
            .map(|(&c, &r)| self.cell(c) * r)
            .sum())
    }

    /// Table entry at `index`, including the reserved default slot.
    pub fn entry(&self, index: usize) -> AbelResult<&[f32]> {
        if index == self.default_index() {
            return Ok(&self.default.values);
        }
        self.table
            .row(index)
            .ok_or_else(|| AbelError::index_out_of_range(index, self.num_cells() + 1))
    }

    /// The configured default value.
    #[inline]
    pub fn default_value(&self) -> f32 {
        self.config.default_val
    }
}

impl Approximator for LookupTableModel {
    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn output_dim(&self) -> usize {
        self.config.output_dim
    }

    fn forward_batch(
        &self,
        inputs: &[f32],
        outputs: &mut [f32],
        _workspace: &mut Workspace,
    ) -> AbelResult<()> {
        let input_dim = self.config.input_dim;
        let output_dim = self.config.output_dim;
        let batch_size = check_batch(inputs, input_dim)?;
        check_len(outputs, batch_size, output_dim)?;

        for (row, out) in inputs
            .chunks_exact(input_dim)
            .zip(outputs.chunks_exact_mut(output_dim))
        {
            let index = self.flat_index(row)?;
            out.copy_from_slice(self.entry(index)?);
        }
        Ok(())
    }

    fn backward(
        &self,
        inputs: &[f32],
        grad_output: &[f32],
        _workspace: &mut Workspace,
    ) -> AbelResult<Vec<Vec<f32>>> {
        let input_dim = self.config.input_dim;
        let output_dim = self.config.output_dim;
        let batch_size = check_batch(inputs, input_dim)?;
        check_len(grad_output, batch_size, output_dim)?;

        let mut grad_table = vec![0.0f32; self.table.len()];
        for (row, g) in inputs
            .chunks_exact(input_dim)
            .zip(grad_output.chunks_exact(output_dim))
        {
            let index = self.flat_index(row)?;
            if index >= self.num_cells() {
                return Err(AbelError::index_out_of_range(index, self.num_cells()));
            }
            let dst = &mut grad_table[index * output_dim..(index + 1) * output_dim];
            for (d, s) in dst.iter_mut().zip(g) {
                *d += s;
            }
        }

        Ok(vec![grad_table, vec![0.0; self.default.len()]])
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.table, &self.default]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.table, &mut self.default]
    }
}
