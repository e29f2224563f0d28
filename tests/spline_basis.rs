//! Properties of the cubic basis function and the addressing layer.
//!
//! # Methodology
//!
//! Smoothness is checked with one-sided finite differences at the integer
//! knots 0..=4: the left and right limits of the value, the first and the
//! second derivative must agree.

use abel_spline::config::GridSpec;
use abel_spline::spline::{
    address, basis_weights, compute_basis_batch, cubic_spline, cubic_spline_batch,
};

/// Step for finite differences (f64).
const H: f64 = 1e-4;

fn left_derivative(x: f64) -> f64 {
    (cubic_spline(x) - cubic_spline(x - H)) / H
}

fn right_derivative(x: f64) -> f64 {
    (cubic_spline(x + H) - cubic_spline(x)) / H
}

fn left_second(x: f64) -> f64 {
    (cubic_spline(x) - 2.0 * cubic_spline(x - H) + cubic_spline(x - 2.0 * H)) / (H * H)
}

fn right_second(x: f64) -> f64 {
    (cubic_spline(x + 2.0 * H) - 2.0 * cubic_spline(x + H) + cubic_spline(x)) / (H * H)
}

#[test]
fn test_zero_outside_support() {
    for x in [-10.0, -1.0, -1e-9, 4.0, 4.5, 100.0, f64::NAN] {
        assert_eq!(cubic_spline(x), 0.0, "x = {}", x);
    }
}

#[test]
fn test_batch_matches_scalar() {
    let xs = [-1.0, 0.0, 0.5, 1.0, 1.75, 2.0, 2.5, 3.999, 4.0, 5.5, f64::NAN];
    let mut out = [f64::NAN; 11];
    cubic_spline_batch(&xs, &mut out);

    for (&x, &y) in xs.iter().zip(&out) {
        assert_eq!(y, cubic_spline(x), "x = {}", x);
    }
    // Out-of-domain inputs, NaN included, evaluate to zero.
    assert_eq!(out[0], 0.0);
    assert_eq!(out[8], 0.0);
    assert_eq!(out[9], 0.0);
    assert_eq!(out[10], 0.0);
}

#[test]
fn test_peak_and_symmetry() {
    assert!((cubic_spline(2.0) - 2.0 / 3.0).abs() < 1e-12);
    for i in 1..40 {
        let x = i as f64 * 0.05;
        assert!(
            (cubic_spline(x) - cubic_spline(4.0 - x)).abs() < 1e-12,
            "asymmetric at {}",
            x
        );
    }
}

#[test]
fn test_partition_of_unity() {
    for i in 0..=100 {
        let t = i as f64 / 100.0;
        let sum: f64 = (0..4).map(|k| cubic_spline(t + 3.0 - k as f64)).sum();
        assert!((sum - 1.0).abs() < 1e-12, "t = {}: sum = {}", t, sum);

        let w = basis_weights(t as f32);
        let sum32: f32 = w.iter().sum();
        assert!((sum32 - 1.0).abs() < 1e-6);
        assert!(w.iter().all(|&v| v >= 0.0));
    }
}

#[test]
fn test_value_continuity_at_knots() {
    for knot in 0..=4 {
        let x = knot as f64;
        let jump = (cubic_spline(x + H) - cubic_spline(x - H)).abs();
        assert!(jump < 1e-3, "value jumps by {} at {}", jump, x);
    }
}

#[test]
fn test_first_derivative_continuity_at_knots() {
    for knot in 0..=4 {
        let x = knot as f64;
        let diff = (left_derivative(x) - right_derivative(x)).abs();
        assert!(diff < 1e-3, "first derivative jumps by {} at {}", diff, x);
    }
}

#[test]
fn test_second_derivative_continuity_at_knots() {
    for knot in 0..=4 {
        let x = knot as f64;
        let diff = (left_second(x) - right_second(x)).abs();
        assert!(diff < 1e-2, "second derivative jumps by {} at {}", diff, x);
    }
}

#[test]
fn test_address_reference_point() {
    // d = 2, z = 4: density 19, scale 16; 0.5 lands exactly on knot 8.
    let grid = GridSpec::new(2, 4).unwrap();
    let basis = address(0.5, 0, &grid);
    assert_eq!(basis.rows, [8, 9, 10, 11]);
    let expected = [1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0, 0.0];
    for (w, e) in basis.weights.iter().zip(expected) {
        assert!((w - e).abs() < 1e-6);
    }
}

#[test]
fn test_address_wraps_out_of_range() {
    let grid = GridSpec::new(1, 4).unwrap();
    let density = grid.density();

    // Negative coordinates wrap to the top of the index space.
    let below = address(-0.25, 0, &grid);
    assert_eq!(below.rows, [15, 16, 17, 18]);

    // Past 1.0 the index space wraps back to the start.
    let above = address(1.0, 0, &grid);
    assert_eq!(above.rows, [16, 17, 18, 0]);

    for coord in [-3.7f32, -0.01, 0.0, 0.99, 1.5, 12.0] {
        let basis = address(coord, 0, &grid);
        assert!(basis.rows.iter().all(|&r| r < density), "coord {}", coord);
    }
}

#[test]
fn test_batch_addressing_shifts_by_dimension() {
    let grid = GridSpec::new(3, 2).unwrap();
    let density = grid.density();
    let inputs = [0.1f32, 0.5, 0.9, -0.2, 1.3, 0.0];
    let mut basis = vec![0.0f32; inputs.len() * 4];
    let mut rows = vec![0u32; inputs.len() * 4];

    compute_basis_batch(&inputs, &grid, &mut basis, &mut rows);

    for (idx, &coord) in inputs.iter().enumerate() {
        let dim = idx % 3;
        let single = address(coord, dim, &grid);
        for k in 0..4 {
            assert_eq!(rows[idx * 4 + k] as usize, single.rows[k]);
            assert!((basis[idx * 4 + k] - single.weights[k]).abs() < 1e-6);
            let row = rows[idx * 4 + k] as usize;
            assert!(row >= dim * density && row < (dim + 1) * density);
        }
    }
}
