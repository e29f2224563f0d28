//! Numerical gradient checking for the `backward` passes.
//!
//! # Methodology
//!
//! For a fixed batch and fixed upstream weights `g`, the scalar
//! `L = Σ g · y` is differentiated with respect to every parameter entry:
//! - Analytical gradient: `backward(inputs, g)`
//! - Numerical gradient: `(L(w + ε) - L(w - ε)) / (2ε)`
//!
//! The models are small enough that every entry is checked.

use abel_spline::{
    AbelConfig, AbelSpline, Approximator, LookupConfig, LookupTableModel, SplineAnn, SplineConfig,
    Workspace,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Step for central differences (f32 parameters).
const EPSILON: f32 = 1e-2;

/// Allowed error relative to `max(1, |grad|)`.
const TOLERANCE: f32 = 2e-3;

fn random_vec(n: usize, lo: f32, hi: f32, seed: u64) -> Vec<f32> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(lo..hi)).collect()
}

/// `Σ g · y`, accumulated in f64.
fn weighted_output<M: Approximator>(model: &M, inputs: &[f32], upstream: &[f32]) -> f64 {
    let outputs = model.forward(inputs).unwrap();
    outputs
        .iter()
        .zip(upstream)
        .map(|(&y, &g)| y as f64 * g as f64)
        .sum()
}

fn check_gradients<M: Approximator + Clone>(model: &M, inputs: &[f32], seed: u64) {
    let batch = inputs.len() / model.input_dim();
    let upstream = random_vec(batch * model.output_dim(), -1.0, 1.0, seed);

    let mut workspace = Workspace::new();
    let analytic = model.backward(inputs, &upstream, &mut workspace).unwrap();
    let params = model.parameters();
    assert_eq!(analytic.len(), params.len());

    let mut checked = 0;
    for (p, param) in params.iter().enumerate() {
        assert_eq!(analytic[p].len(), param.len(), "tensor {}", param.name);
        if !param.trainable {
            assert!(analytic[p].iter().all(|&g| g == 0.0));
            continue;
        }

        for i in 0..param.len() {
            let mut plus = model.clone();
            plus.parameters_mut()[p].values[i] += EPSILON;
            let mut minus = model.clone();
            minus.parameters_mut()[p].values[i] -= EPSILON;

            let numeric = ((weighted_output(&plus, inputs, &upstream)
                - weighted_output(&minus, inputs, &upstream))
                / (2.0 * EPSILON as f64)) as f32;
            let ana = analytic[p][i];
            assert!(
                (ana - numeric).abs() < TOLERANCE * ana.abs().max(1.0),
                "{}[{}]: analytic {} numeric {}",
                param.name,
                i,
                ana,
                numeric
            );
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn test_gradient_check_spline() {
    let model = SplineAnn::new(SplineConfig::new(2, 3, 2, 7)).unwrap();
    let inputs = random_vec(6 * 2, -0.2, 1.2, 70);
    check_gradients(&model, &inputs, 71);
}

#[test]
fn test_gradient_check_abel() {
    let model = AbelSpline::new(AbelConfig {
        input_dim: 2,
        output_dim: 1,
        partition_num: 2,
        num_exps: 2,
        seed: 8,
    })
    .unwrap();
    let inputs = random_vec(5 * 2, 0.0, 1.0, 80);
    check_gradients(&model, &inputs, 81);
}

#[test]
fn test_gradient_check_abel_multi_output() {
    let model = AbelSpline::new(AbelConfig {
        input_dim: 1,
        output_dim: 2,
        partition_num: 1,
        num_exps: 3,
        seed: 9,
    })
    .unwrap();
    let inputs = random_vec(4, 0.0, 1.0, 90);
    check_gradients(&model, &inputs, 91);
}

#[test]
fn test_gradient_check_lookup() {
    let model = LookupTableModel::new(LookupConfig {
        input_dim: 2,
        output_dim: 2,
        partition_num: 3,
        default_val: -1.0,
        seed: 10,
    })
    .unwrap();
    let inputs = random_vec(7 * 2, -0.1, 1.1, 100);
    check_gradients(&model, &inputs, 101);
}

#[test]
fn test_backward_rejects_bad_upstream() {
    let model = SplineAnn::new(SplineConfig::new(2, 2, 2, 1)).unwrap();
    let mut workspace = Workspace::new();
    assert!(model
        .backward(&[0.1, 0.2], &[1.0], &mut workspace)
        .is_err());
}
