//! Resolution change for spline models.
//!
//! [`repartition`] moves a [`SplineAnn`] from `z_old` to `z_new` partitions
//! without retraining. For every `(input dimension, output channel)` slice
//! the old 1D spline is sampled at the knots of the new grid and the new
//! coefficients are obtained by solving
//!
//! ```text
//! M · c_new = f_old(knots)
//! ```
//!
//! where `M[i][j] = B(knot_i * (density_new - 3) + 3 - j)` is the basis
//! matrix of the new grid on its own knots.
//!
//! # Guarantee
//!
//! This is exact knot interpolation, not a least-squares fit: the new model
//! reproduces the old one at every knot and follows cubic-spline
//! interpolation in between. Repartitioning to the same resolution returns
//! the original coefficients up to rounding.
//!
//! The source model is only read; the result owns a freshly allocated table.

use nalgebra::DMatrix;

use crate::config::{density, SplineConfig};
use crate::error::{AbelError, AbelResult};
use crate::spline::cubic_spline;
use crate::spline_ann::SplineAnn;

/// Knot positions of a grid with `partition_num` partitions.
///
/// `knots[i] = (i - 1) / (density - 3)` for `i` in `[0, density)`, so the
/// interior knots `1..=density-2` cover `[0, 1]`.
///
/// # Example
///
/// ```rust
/// use abel_spline::repartition::knot_positions;
///
/// let knots = knot_positions(1); // density 7
/// assert_eq!(knots.len(), 7);
/// assert_eq!(knots[1], 0.0);
/// assert_eq!(knots[5], 1.0);
/// ```
pub fn knot_positions(partition_num: usize) -> Vec<f64> {
    let density = density(partition_num);
    let scale = (density - 3) as f64;
    (0..density).map(|i| -(1.0 - i as f64) / scale).collect()
}

/// Dense basis matrix of a grid evaluated on its own knots.
///
/// Row `i` holds the weight of every control point at knot `i`. The matrix
/// is tridiagonal with `4/6` on the diagonal and `1/6` beside it.
pub fn basis_matrix(partition_num: usize) -> DMatrix<f64> {
    let density = density(partition_num);
    let scale = (density - 3) as f64;
    let knots = knot_positions(partition_num);
    DMatrix::from_fn(density, density, |i, j| {
        cubic_spline(knots[i] * scale + 3.0 - j as f64)
    })
}

/// Resamples `model` onto `new_partition_num` partitions.
///
/// # Errors
///
/// - [`AbelError::Config`] if `new_partition_num` is 0
/// - [`AbelError::NumericalInstability`] if the basis matrix is singular or
///   the solve produces non-finite coefficients
pub fn repartition(model: &SplineAnn, new_partition_num: usize) -> AbelResult<SplineAnn> {
    let config = SplineConfig {
        partition_num: new_partition_num,
        ..model.config.clone()
    };
    config.validate()?;

    let input_dim = config.input_dim;
    let output_dim = config.output_dim;
    let new_density = config.grid().density();
    let knots = knot_positions(new_partition_num);

    log::debug!(
        "repartition: z={} -> z={} ({} solves of size {})",
        model.partition_num(),
        new_partition_num,
        input_dim * output_dim,
        new_density
    );

    // One right-hand side per (dimension, channel) slice.
    let slices = input_dim * output_dim;
    let mut targets = DMatrix::<f64>::zeros(new_density, slices);
    for dim in 0..input_dim {
        for channel in 0..output_dim {
            let col = dim * output_dim + channel;
            for (i, &knot) in knots.iter().enumerate() {
                targets[(i, col)] = model.evaluate_dimension(dim, channel, knot)?;
            }
        }
    }

    let m = basis_matrix(new_partition_num);
    let lu = m.clone().lu();
    if !lu.is_invertible() {
        return Err(AbelError::numerical(format!(
            "basis matrix for z={} is singular",
            new_partition_num
        )));
    }
    let coefficients = lu.solve(&targets).ok_or_else(|| {
        AbelError::numerical(format!("LU solve failed for z={}", new_partition_num))
    })?;

    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(AbelError::numerical(format!(
            "non-finite coefficients after solve for z={}",
            new_partition_num
        )));
    }

    if log::log_enabled!(log::Level::Trace) {
        let residual = (&m * &coefficients - &targets).amax();
        log::trace!("repartition: max knot residual {:.3e}", residual);
    }

    let mut values = vec![0.0f32; input_dim * new_density * output_dim];
    for dim in 0..input_dim {
        for channel in 0..output_dim {
            let col = dim * output_dim + channel;
            for i in 0..new_density {
                let row = dim * new_density + i;
                values[row * output_dim + channel] = coefficients[(i, col)] as f32;
            }
        }
    }

    SplineAnn::from_table(config, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Approximator;

    #[test]
    fn test_knots_cover_unit_interval() {
        for z in 1..6 {
            let knots = knot_positions(z);
            let d = density(z);
            assert!((knots[0] + 1.0 / (d - 3) as f64).abs() < 1e-15);
            assert_eq!(knots[1], 0.0);
            assert!((knots[d - 2] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_basis_matrix_is_tridiagonal() {
        let m = basis_matrix(2);
        let d = density(2);
        assert_eq!(m.shape(), (d, d));
        for i in 0..d {
            for j in 0..d {
                let expected = match i as i64 - j as i64 {
                    0 => 4.0 / 6.0,
                    1 | -1 => 1.0 / 6.0,
                    _ => 0.0,
                };
                assert!(
                    (m[(i, j)] - expected).abs() < 1e-12,
                    "M[{}][{}] = {}",
                    i,
                    j,
                    m[(i, j)]
                );
            }
        }
    }

    #[test]
    fn test_basis_matrix_invertible() {
        for z in [1, 4, 20, 50] {
            assert!(basis_matrix(z).lu().is_invertible(), "z={}", z);
        }
    }

    #[test]
    fn test_source_unchanged() {
        let model = SplineAnn::new(SplineConfig::new(2, 2, 3, 9)).unwrap();
        let before = model.clone();
        let refined = repartition(&model, 7).unwrap();
        assert_eq!(model, before);
        assert_eq!(refined.partition_num(), 7);
        assert_eq!(refined.control_points().shape, vec![2 * 31, 2]);
        assert_eq!(refined.output_dim(), 2);
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let model = SplineAnn::new(SplineConfig::new(1, 1, 3, 9)).unwrap();
        assert!(matches!(
            repartition(&model, 0),
            Err(AbelError::Config(_))
        ));
    }
}
