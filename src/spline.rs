//! Uniform cubic B-spline basis and control-point addressing.
//!
//! This module provides the two leaf computations shared by every spline
//! model and by the repartition operator:
//! - The piecewise cubic evaluator [`cubic_spline`]
//! - The addressing layer mapping a coordinate to 4 weights and 4 table rows
//! - SIMD-accelerated batch evaluation of both
//!
//! # Cubic Pieces
//!
//! On `[0, 4)` the basis function is defined by four polynomial pieces:
//!
//! ```text
//! w0 = x^3 / 6                                   0 <= x < 1
//! w1 = (-3(x-1)^3 + 3(x-1)^2 + 3(x-1) + 1) / 6   1 <= x < 2
//! w2 = (3(x-2)^3 - 6(x-2)^2 + 4) / 6             2 <= x < 3
//! w3 = (4 - x)^3 / 6                             3 <= x < 4
//! ```
//!
//! and is zero everywhere else.
//!
//! # Addressing
//!
//! A coordinate `c` is scaled by `density - 3`. The fractional part `t`
//! is shared by the four channels; channel `k` evaluates the basis at
//! `t + 3 - k` and reads table row `floor(scaled) + k`, wrapped modulo
//! `density` and shifted by `dim * density`.
//!
//! # Partition of Unity
//!
//! For every `t` in `[0, 1]` the four channel weights sum to 1.
//!
//! ```rust
//! use abel_spline::spline::basis_weights;
//!
//! let w = basis_weights(0.3);
//! let sum: f32 = w.iter().sum();
//! assert!((sum - 1.0).abs() < 1e-6);
//! ```

use crate::config::{GridSpec, SUPPORT};
use wide::f32x8;

const SIXTH: f32 = 1.0 / 6.0;

/// Evaluates the uniform cubic B-spline piece covering `x`.
///
/// Returns 0 for `x < 0`, `x >= 4` and NaN.
///
/// # Example
///
/// ```rust
/// use abel_spline::spline::cubic_spline;
///
/// assert!((cubic_spline(2.0) - 4.0 / 6.0).abs() < 1e-12);
/// assert_eq!(cubic_spline(4.0), 0.0);
/// assert_eq!(cubic_spline(-0.5), 0.0);
/// ```
#[inline]
pub fn cubic_spline(x: f64) -> f64 {
    if (0.0..1.0).contains(&x) {
        x * x * x / 6.0
    } else if (1.0..2.0).contains(&x) {
        let u = x - 1.0;
        (-3.0 * u * u * u + 3.0 * u * u + 3.0 * u + 1.0) / 6.0
    } else if (2.0..3.0).contains(&x) {
        let u = x - 2.0;
        (3.0 * u * u * u - 6.0 * u * u + 4.0) / 6.0
    } else if (3.0..4.0).contains(&x) {
        let u = 4.0 - x;
        u * u * u / 6.0
    } else {
        0.0
    }
}

/// Batched [`cubic_spline`].
///
/// # Panics
///
/// Debug-asserts that `out` is as long as `xs`.
pub fn cubic_spline_batch(xs: &[f64], out: &mut [f64]) {
    debug_assert_eq!(xs.len(), out.len());
    for (o, &x) in out.iter_mut().zip(xs) {
        *o = cubic_spline(x);
    }
}

/// Channel weights for fractional offset `t`.
///
/// `weights[k]` equals `cubic_spline(t + 3 - k)` and multiplies the control
/// point at `floor(scaled) + k`.
#[inline]
pub fn basis_weights(t: f32) -> [f32; SUPPORT] {
    let t2 = t * t;
    let t3 = t2 * t;
    let u = 1.0 - t;
    [
        u * u * u * SIXTH,
        (3.0 * t3 - 6.0 * t2 + 4.0) * SIXTH,
        (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) * SIXTH,
        t3 * SIXTH,
    ]
}

/// Channel weights for 8 offsets at once.
#[inline]
fn basis_weights_x8(t: f32x8) -> [[f32; 8]; SUPPORT] {
    let one = f32x8::splat(1.0);
    let three = f32x8::splat(3.0);
    let four = f32x8::splat(4.0);
    let six = f32x8::splat(6.0);
    let sixth = f32x8::splat(SIXTH);

    let t2 = t * t;
    let t3 = t2 * t;
    let u = one - t;

    let w0 = u * u * u * sixth;
    let w1 = (three * t3 - six * t2 + four) * sixth;
    let w2 = (three * (t2 + t - t3) + one) * sixth;
    let w3 = t3 * sixth;

    [w0.into(), w1.into(), w2.into(), w3.into()]
}

/// Wraps a (possibly negative) base index into `[0, density)`.
#[inline]
fn wrap_index(base: f32, k: usize, density: usize) -> usize {
    // Saturating cast: NaN maps to 0, infinities to the i64 bounds.
    let base = (base as i64).rem_euclid(density as i64) as usize;
    (base + k) % density
}

/// Weights and table rows for one coordinate of one input dimension.
///
/// Recomputed on every forward pass, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasisWeights {
    /// Channel weights, summing to 1.
    pub weights: [f32; SUPPORT],
    /// Flat control-point table rows, already shifted by `dim * density`.
    pub rows: [usize; SUPPORT],
}

/// Fractional offset of `coord` within its partition cell.
///
/// Returns `(floor(scaled), scaled - floor(scaled))`.
#[inline]
pub fn cell_offset(coord: f32, grid: &GridSpec) -> (f32, f32) {
    let scaled = coord * grid.scale() as f32;
    let base = scaled.floor();
    (base, scaled - base)
}

/// Addresses one coordinate of input dimension `dim`.
///
/// Indices wrap modulo the density instead of clamping, so every result is
/// a valid row of the `dim` slice of the table.
///
/// # Example
///
/// ```rust
/// use abel_spline::config::GridSpec;
/// use abel_spline::spline::address;
///
/// let grid = GridSpec::new(2, 4).unwrap(); // density 19
/// let basis = address(0.5, 1, &grid);
/// assert_eq!(basis.rows, [19 + 8, 19 + 9, 19 + 10, 19 + 11]);
/// ```
pub fn address(coord: f32, dim: usize, grid: &GridSpec) -> BasisWeights {
    let density = grid.density();
    let (base, t) = cell_offset(coord, grid);
    let shift = dim * density;
    let mut rows = [0usize; SUPPORT];
    for (k, row) in rows.iter_mut().enumerate() {
        *row = wrap_index(base, k, density) + shift;
    }
    BasisWeights {
        weights: basis_weights(t),
        rows,
    }
}

/// Batched addressing for a row-major `[batch, input_dim]` input.
///
/// Processes 8 coordinates at a time with SIMD weight evaluation.
///
/// # Arguments
///
/// * `inputs` - Coordinates: `[batch_size * input_dim]`
/// * `grid` - Grid geometry
/// * `basis_out` - Weights: `[batch_size * input_dim * 4]`
/// * `rows_out` - Table rows: `[batch_size * input_dim * 4]`
pub fn compute_basis_batch(
    inputs: &[f32],
    grid: &GridSpec,
    basis_out: &mut [f32],
    rows_out: &mut [u32],
) {
    debug_assert!(basis_out.len() >= inputs.len() * SUPPORT);
    debug_assert!(rows_out.len() >= inputs.len() * SUPPORT);

    let density = grid.density();
    let n = inputs.len();

    let mut start = 0;
    while start < n {
        let end = (start + 8).min(n);
        let mut offsets = [0.0f32; 8];

        for (lane, idx) in (start..end).enumerate() {
            let (base, t) = cell_offset(inputs[idx], grid);
            offsets[lane] = t;

            let shift = (idx % grid.input_dim) * density;
            // A validated grid has at most `u32::MAX` rows.
            for k in 0..SUPPORT {
                rows_out[idx * SUPPORT + k] = (wrap_index(base, k, density) + shift) as u32;
            }
        }

        let weights = basis_weights_x8(f32x8::new(offsets));
        for (lane, idx) in (start..end).enumerate() {
            for (k, channel) in weights.iter().enumerate() {
                basis_out[idx * SUPPORT + k] = channel[lane];
            }
        }

        start = end;
    }
}
