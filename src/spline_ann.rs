//! Additive cubic-spline approximator.
//!
//! # Mathematical Foundation
//!
//! For input `x` with `d` coordinates the model computes
//!
//! ```text
//! y = Σ_i Σ_k w_k(t_i) * C[i * density + (floor(s_i) + k) mod density]
//! ```
//!
//! where `s_i = x_i * (density - 3)`, `t_i` is its fractional part, `w_k`
//! are the cubic channel weights from [`crate::spline`] and `C` is the
//! control-point table. Each sample touches `4 * d` control-point vectors;
//! the basis weight is shared across the output channels of a vector.
//!
//! The per-dimension splines add up rather than multiply, so a table filled
//! with a constant `v` evaluates to `input_dim * v` everywhere.
//!
//! # Table Layout
//!
//! `C` has shape `[input_dim * density, output_dim]`, row-major. Rows
//! `[i * density, (i + 1) * density)` belong to input dimension `i`.

use crate::buffer::Workspace;
use crate::config::{GridSpec, SplineConfig, INIT_RANGE, SUPPORT};
use crate::error::{check_batch, check_len, AbelError, AbelResult};
use crate::model::Approximator;
use crate::param::Parameter;
use crate::spline::{compute_basis_batch, cubic_spline};
use wide::f32x8;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Spline additive model with a trainable control-point table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplineAnn {
    /// Configuration.
    pub config: SplineConfig,
    /// Control points: `[input_dim * density, output_dim]`.
    control_points: Parameter,
}

impl SplineAnn {
    /// Parameter name of the control-point table.
    pub const CONTROL_POINTS: &'static str = "control_points";

    /// Creates a model with control points drawn from `Uniform(-0.05, 0.05)`.
    ///
    /// # Errors
    ///
    /// Returns [`AbelError::Config`] if the configuration is invalid.
    pub fn new(config: SplineConfig) -> AbelResult<Self> {
        config.validate()?;
        let grid = config.grid();
        let control_points = Parameter::uniform(
            Self::CONTROL_POINTS,
            &[grid.table_rows(), config.output_dim],
            INIT_RANGE,
            config.seed,
        );
        log::debug!(
            "SplineAnn: input_dim={} output_dim={} z={} density={}",
            config.input_dim,
            config.output_dim,
            config.partition_num,
            grid.density()
        );
        Ok(Self {
            config,
            control_points,
        })
    }

    /// Creates a model around an existing flat table.
    pub(crate) fn from_table(config: SplineConfig, values: Vec<f32>) -> AbelResult<Self> {
        config.validate()?;
        let shape = [config.grid().table_rows(), config.output_dim];
        if values.len() != shape[0] * shape[1] {
            return Err(AbelError::shape_mismatch(&shape, &[values.len()]));
        }
        Ok(Self {
            config,
            control_points: Parameter {
                name: Self::CONTROL_POINTS.to_string(),
                shape: shape.to_vec(),
                values,
                trainable: true,
            },
        })
    }

    /// Prefixes the table name, e.g. `"direct.control_points"`.
    pub(crate) fn with_prefix(mut self, prefix: &str) -> Self {
        self.control_points.name = format!("{}.{}", prefix, Self::CONTROL_POINTS);
        self
    }

    /// Grid geometry.
    #[inline]
    pub fn grid(&self) -> GridSpec {
        self.config.grid()
    }

    /// Partitions per input dimension.
    #[inline]
    pub fn partition_num(&self) -> usize {
        self.config.partition_num
    }

    /// Control points per input dimension.
    #[inline]
    pub fn density(&self) -> usize {
        self.grid().density()
    }

    /// The control-point table.
    #[inline]
    pub fn control_points(&self) -> &Parameter {
        &self.control_points
    }

    fn table_row(&self, dim: usize, index: usize) -> AbelResult<usize> {
        let density = self.density();
        if dim >= self.config.input_dim || index >= density {
            return Err(AbelError::index_out_of_range(
                dim * density + index,
                self.control_points.rows(),
            ));
        }
        Ok(dim * density + index)
    }

    /// Control-point vector `index` of input dimension `dim`.
    pub fn control_point(&self, dim: usize, index: usize) -> AbelResult<&[f32]> {
        let row = self.table_row(dim, index)?;
        self.control_points
            .row(row)
            .ok_or_else(|| AbelError::index_out_of_range(row, self.control_points.rows()))
    }

    /// Overwrites control-point vector `index` of input dimension `dim`.
    pub fn set_control_point(&mut self, dim: usize, index: usize, values: &[f32]) -> AbelResult<()> {
        let row = self.table_row(dim, index)?;
        let rows = self.control_points.rows();
        let target = self
            .control_points
            .row_mut(row)
            .ok_or_else(|| AbelError::index_out_of_range(row, rows))?;
        if target.len() != values.len() {
            return Err(AbelError::shape_mismatch(&[target.len()], &[values.len()]));
        }
        target.copy_from_slice(values);
        Ok(())
    }

    /// Sets every control-point entry to `value`.
    pub fn fill(&mut self, value: f32) {
        self.control_points.values.fill(value);
    }

    /// Evaluates the 1D spline of one `(dim, channel)` slice at `coord`.
    ///
    /// Unlike the forward pass the index space is not wrapped: control
    /// points outside `[0, density)` contribute nothing. For `coord` in
    /// `[0, 1]` both agree.
    pub fn evaluate_dimension(&self, dim: usize, channel: usize, coord: f64) -> AbelResult<f64> {
        let grid = self.grid();
        let density = grid.density();
        let output_dim = self.config.output_dim;
        if dim >= self.config.input_dim {
            return Err(AbelError::index_out_of_range(dim, self.config.input_dim));
        }
        if channel >= output_dim {
            return Err(AbelError::index_out_of_range(channel, output_dim));
        }

        let scaled = coord * grid.scale() as f64;
        let base = scaled.floor() as i64;
        let table = &self.control_points.values;

        let mut value = 0.0;
        for k in 0..SUPPORT as i64 {
            let j = base + k;
            if j < 0 || j >= density as i64 {
                continue;
            }
            let weight = cubic_spline(scaled + 3.0 - j as f64);
            let row = dim * density + j as usize;
            value += weight * table[row * output_dim + channel] as f64;
        }
        Ok(value)
    }

    /// Resamples this model onto `new_partition_num` partitions.
    ///
    /// See [`crate::repartition`] for the guarantees.
    pub fn repartition(&self, new_partition_num: usize) -> AbelResult<SplineAnn> {
        crate::repartition::repartition(self, new_partition_num)
    }

    /// Accumulates `dL/dC` for a batch into `grad_table`.
    pub fn backward_table(
        &self,
        inputs: &[f32],
        grad_output: &[f32],
        grad_table: &mut [f32],
        workspace: &mut Workspace,
    ) -> AbelResult<()> {
        let input_dim = self.config.input_dim;
        let output_dim = self.config.output_dim;
        let batch_size = check_batch(inputs, input_dim)?;
        check_len(grad_output, batch_size, output_dim)?;
        if grad_table.len() != self.control_points.len() {
            return Err(AbelError::tensor_shape_mismatch(
                &self.control_points.shape,
                &[grad_table.len()],
            ));
        }

        self.address_batch(inputs, batch_size, workspace);

        let rows = self.control_points.rows();
        let terms = input_dim * SUPPORT;
        for b in 0..batch_size {
            let g_out = &grad_output[b * output_dim..(b + 1) * output_dim];
            let basis = &workspace.basis_values[b * terms..(b + 1) * terms];
            let rows_b = &workspace.control_rows[b * terms..(b + 1) * terms];

            for (&w, &row) in basis.iter().zip(rows_b) {
                let row = row as usize;
                if row >= rows {
                    return Err(AbelError::index_out_of_range(row, rows));
                }
                let g_row = &mut grad_table[row * output_dim..(row + 1) * output_dim];
                axpy(w, g_out, g_row);
            }
        }
        Ok(())
    }

    fn address_batch(&self, inputs: &[f32], batch_size: usize, workspace: &mut Workspace) {
        let grid = self.grid();
        workspace.reserve_basis(batch_size, grid.input_dim);
        compute_basis_batch(
            inputs,
            &grid,
            &mut workspace.basis_values,
            &mut workspace.control_rows,
        );
    }
}

impl Approximator for SplineAnn {
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
        workspace: &mut Workspace,
    ) -> AbelResult<()> {
        let input_dim = self.config.input_dim;
        let output_dim = self.config.output_dim;
        let batch_size = check_batch(inputs, input_dim)?;
        check_len(outputs, batch_size, output_dim)?;

        self.address_batch(inputs, batch_size, workspace);

        let rows = self.control_points.rows();
        let terms = input_dim * SUPPORT;
        for b in 0..batch_size {
            let out = &mut outputs[b * output_dim..(b + 1) * output_dim];
            out.fill(0.0);

            let basis = &workspace.basis_values[b * terms..(b + 1) * terms];
            let rows_b = &workspace.control_rows[b * terms..(b + 1) * terms];

            for (&w, &row) in basis.iter().zip(rows_b) {
                let cp = self
                    .control_points
                    .row(row as usize)
                    .ok_or_else(|| AbelError::index_out_of_range(row as usize, rows))?;
                axpy(w, cp, out);
            }
        }
        Ok(())
    }

    fn backward(
        &self,
        inputs: &[f32],
        grad_output: &[f32],
        workspace: &mut Workspace,
    ) -> AbelResult<Vec<Vec<f32>>> {
        let mut grad_table = vec![0.0f32; self.control_points.len()];
        self.backward_table(inputs, grad_output, &mut grad_table, workspace)?;
        Ok(vec![grad_table])
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.control_points]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.control_points]
    }
}

/// `y += w * x`, 8 lanes at a time.
#[inline]
fn axpy(w: f32, x: &[f32], y: &mut [f32]) {
    debug_assert_eq!(x.len(), y.len());
    let chunks = y.len() / 8;
    let wv = f32x8::splat(w);

    for c in 0..chunks {
        let s = c * 8;
        let mut xa = [0.0f32; 8];
        let mut ya = [0.0f32; 8];
        xa.copy_from_slice(&x[s..s + 8]);
        ya.copy_from_slice(&y[s..s + 8]);
        let r: [f32; 8] = (f32x8::new(ya) + wv * f32x8::new(xa)).into();
        y[s..s + 8].copy_from_slice(&r);
    }

    for i in chunks * 8..y.len() {
        y[i] += w * x[i];
    }
}
