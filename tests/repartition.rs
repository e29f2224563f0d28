//! Function preservation across resolution changes.
//!
//! The resampled model must reproduce the old one at every knot of the new
//! grid. Through the wrapped forward pass this holds for knots inside
//! `[0, 1]`; the un-wrapped per-dimension evaluation agrees on all of them.

use abel_spline::repartition::knot_positions;
use abel_spline::{
    AbelConfig, AbelError, AbelSpline, Approximator, Model, ModelConfig, SplineAnn, SplineConfig,
};

/// Tolerance for values recovered through an f32 table.
const TOL: f32 = 1e-5;

fn make_spline(input_dim: usize, output_dim: usize, z: usize, seed: u64) -> SplineAnn {
    SplineAnn::new(SplineConfig::new(input_dim, output_dim, z, seed)).unwrap()
}

/// Interior knots `0, 1/scale, ..., 1` of a grid with `z` partitions.
fn interior_knots(z: usize) -> Vec<f32> {
    let scale = 4 * z;
    (0..=scale).map(|i| i as f32 / scale as f32).collect()
}

#[test]
fn test_same_resolution_is_identity() {
    let model = make_spline(2, 3, 5, 13);
    let same = model.repartition(5).unwrap();

    assert_eq!(same.control_points().shape, model.control_points().shape);
    for (a, b) in same
        .control_points()
        .values
        .iter()
        .zip(&model.control_points().values)
    {
        assert!((a - b).abs() < TOL, "{} vs {}", a, b);
    }
}

#[test]
fn test_interpolates_every_knot() {
    let model = make_spline(2, 2, 3, 4);
    for new_z in [1usize, 2, 5, 9] {
        let refined = model.repartition(new_z).unwrap();
        assert_eq!(refined.density(), 4 * new_z + 3);

        for &knot in &knot_positions(new_z) {
            for dim in 0..2 {
                for channel in 0..2 {
                    let old = model.evaluate_dimension(dim, channel, knot).unwrap();
                    let new = refined.evaluate_dimension(dim, channel, knot).unwrap();
                    assert!(
                        (old - new).abs() < TOL as f64,
                        "z={} knot={} dim={} channel={}: {} vs {}",
                        new_z,
                        knot,
                        dim,
                        channel,
                        old,
                        new
                    );
                }
            }
        }
    }
}

#[test]
fn test_forward_agrees_on_interior_knot_grid() {
    let model = make_spline(2, 1, 4, 31);
    let refined = model.repartition(6).unwrap();

    let knots = interior_knots(6);
    for &x0 in &knots {
        for &x1 in &knots {
            let old = model.forward(&[x0, x1]).unwrap();
            let new = refined.forward(&[x0, x1]).unwrap();
            assert!(
                (old[0] - new[0]).abs() < 1e-4,
                "({}, {}): {} vs {}",
                x0,
                x1,
                old[0],
                new[0]
            );
        }
    }
}

#[test]
fn test_downsample_interpolates_new_knots() {
    let model = make_spline(1, 1, 8, 2);
    let coarse = model.repartition(2).unwrap();
    for &x in &interior_knots(2) {
        let old = model.forward(&[x]).unwrap()[0];
        let new = coarse.forward(&[x]).unwrap()[0];
        assert!((old - new).abs() < 1e-4, "x={}: {} vs {}", x, old, new);
    }
}

#[test]
fn test_constant_function_upsampled() {
    let mut model = make_spline(2, 1, 2, 0);
    model.fill(0.25);
    let refined = model.repartition(8).unwrap();

    for i in 0..=50 {
        let x = i as f32 / 50.0;
        let y = refined.forward(&[x, 1.0 - x]).unwrap()[0];
        assert!((y - 0.5).abs() < 1e-4, "x={}: {}", x, y);
    }
    for v in &refined.control_points().values {
        assert!((v - 0.25).abs() < 1e-5);
    }
}

#[test]
fn test_source_model_untouched() {
    let model = make_spline(2, 2, 3, 8);
    let before = model.clone();
    let _ = model.repartition(7).unwrap();
    assert_eq!(model, before);
}

#[test]
fn test_invalid_resolution_rejected() {
    let model = make_spline(1, 1, 3, 8);
    let err = model.repartition(0).unwrap_err();
    assert!(matches!(err, AbelError::Config(_)));
}

#[test]
fn test_abel_repartition_preserves_knots() {
    let model = AbelSpline::new(AbelConfig {
        input_dim: 2,
        output_dim: 2,
        partition_num: 3,
        num_exps: 3,
        seed: 19,
    })
    .unwrap();
    let refined = model.repartition(5).unwrap();

    assert_eq!(refined.config.partition_num, 5);
    assert_eq!(refined.config.num_exps, 3);
    assert_eq!(refined.num_parameters(), 2 * 23 * 2 + 2 * 23 * 12);

    let knots = interior_knots(5);
    for &x0 in knots.iter().step_by(3) {
        for &x1 in knots.iter().step_by(4) {
            let old = model.forward(&[x0, x1]).unwrap();
            let new = refined.forward(&[x0, x1]).unwrap();
            for c in 0..2 {
                assert!(
                    (old[c] - new[c]).abs() < 1e-4,
                    "({}, {}) channel {}: {} vs {}",
                    x0,
                    x1,
                    c,
                    old[c],
                    new[c]
                );
            }
        }
    }
}

#[test]
fn test_model_family_repartition() {
    for config in ModelConfig::spline_family(2, 1, 3, 2, 55) {
        let model = config.build().unwrap();
        match (&model, model.repartition(6)) {
            (Model::Lookup(_), Err(AbelError::RepartitionUnsupported(_))) => {}
            (Model::Lookup(_), other) => panic!("lookup repartitioned: {:?}", other),
            (_, Ok(refined)) => {
                assert_eq!(refined.label(), config.label().replace("z=3", "z=6"));
                let x = [0.5f32, 0.25];
                let a = model.forward(&x).unwrap()[0];
                let b = refined.forward(&x).unwrap()[0];
                assert!((a - b).abs() < 1e-4);
            }
            (_, Err(e)) => panic!("repartition failed: {}", e),
        }
    }
}
