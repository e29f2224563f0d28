//! Gradient-descent optimizers over [`Parameter`] lists.
//!
//! Optimizers receive the parameter list of a model and one gradient
//! tensor per parameter, in the same order. Non-trainable parameters are
//! skipped; their gradients are ignored.
//!
//! Optimizer state is sized on the first step. A model produced by
//! `repartition` has differently shaped tensors and needs a fresh optimizer.

use crate::error::{AbelError, AbelResult};
use crate::param::Parameter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Applies one update to a parameter list.
pub trait Optimizer {
    /// Updates every trainable parameter from its gradient.
    ///
    /// # Errors
    ///
    /// - [`AbelError::ParameterCountMismatch`] if `grads.len() != params.len()`
    /// - [`AbelError::TensorShapeMismatch`] if a gradient has the wrong length
    ///   or the parameter list changed shape since the last step
    fn step(&mut self, params: Vec<&mut Parameter>, grads: &[Vec<f32>]) -> AbelResult<()>;

    /// Discards accumulated state.
    fn reset(&mut self);
}

fn check_grads(params: &[&mut Parameter], grads: &[Vec<f32>]) -> AbelResult<()> {
    if params.len() != grads.len() {
        return Err(AbelError::ParameterCountMismatch {
            expected: params.len(),
            got: grads.len(),
        });
    }
    for (p, g) in params.iter().zip(grads) {
        if p.len() != g.len() {
            return Err(AbelError::tensor_shape_mismatch(&p.shape, &[g.len()]));
        }
    }
    Ok(())
}

/// Adam optimizer state for a single parameter tensor.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdamState {
    /// First moment (mean of gradients).
    pub m: Vec<f32>,

    /// Second moment (variance of gradients).
    pub v: Vec<f32>,

    /// Timestep for bias correction.
    pub t: usize,
}

impl AdamState {
    /// Creates a zeroed state for a tensor of given size.
    pub fn new(size: usize) -> Self {
        Self {
            m: vec![0.0; size],
            v: vec![0.0; size],
            t: 0,
        }
    }

    /// Resets the state.
    pub fn reset(&mut self) {
        self.m.fill(0.0);
        self.v.fill(0.0);
        self.t = 0;
    }
}

/// Adam optimizer configuration.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdamConfig {
    /// Learning rate (alpha).
    pub lr: f32,

    /// First moment decay (beta1).
    pub beta1: f32,

    /// Second moment decay (beta2).
    pub beta2: f32,

    /// Epsilon for numerical stability.
    pub epsilon: f32,

    /// Decoupled weight decay.
    pub weight_decay: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            lr: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            weight_decay: 0.0,
        }
    }
}

impl AdamConfig {
    /// Creates config with learning rate.
    pub fn with_lr(lr: f32) -> Self {
        Self {
            lr,
            ..Default::default()
        }
    }
}

/// Adam optimizer.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Adam {
    /// Configuration.
    pub config: AdamConfig,

    /// Per-tensor states, in parameter order.
    pub states: Vec<AdamState>,
}

impl Adam {
    /// Creates a new Adam optimizer.
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            states: Vec::new(),
        }
    }

    fn update_params(params: &mut [f32], grads: &[f32], state: &mut AdamState, config: &AdamConfig) {
        state.t += 1;

        let beta1 = config.beta1;
        let beta2 = config.beta2;
        let lr = config.lr;
        let eps = config.epsilon;
        let decay = config.weight_decay;

        // Bias correction factors
        let bc1 = 1.0 - beta1.powi(state.t as i32);
        let bc2 = 1.0 - beta2.powi(state.t as i32);
        let alpha = lr * bc2.sqrt() / bc1;

        for i in 0..params.len() {
            let g = grads[i];

            state.m[i] = beta1 * state.m[i] + (1.0 - beta1) * g;
            state.v[i] = beta2 * state.v[i] + (1.0 - beta2) * g * g;

            let update = alpha * state.m[i] / (state.v[i].sqrt() + eps);

            if decay > 0.0 {
                params[i] *= 1.0 - lr * decay;
            }

            params[i] -= update;
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, mut params: Vec<&mut Parameter>, grads: &[Vec<f32>]) -> AbelResult<()> {
        check_grads(&params, grads)?;

        if self.states.is_empty() {
            self.states = params.iter().map(|p| AdamState::new(p.len())).collect();
        }
        if self.states.len() != params.len() {
            return Err(AbelError::ParameterCountMismatch {
                expected: self.states.len(),
                got: params.len(),
            });
        }

        for ((param, grad), state) in params.iter_mut().zip(grads).zip(&mut self.states) {
            if !param.trainable {
                continue;
            }
            if state.m.len() != param.len() {
                return Err(AbelError::tensor_shape_mismatch(&param.shape, &[state.m.len()]));
            }
            Self::update_params(&mut param.values, grad, state, &self.config);
        }
        Ok(())
    }

    fn reset(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }
}

/// SGD optimizer with momentum.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SGD {
    /// Learning rate.
    pub lr: f32,

    /// Momentum coefficient.
    pub momentum: f32,

    /// Velocity for each parameter tensor.
    pub velocities: Vec<Vec<f32>>,
}

impl SGD {
    /// Creates a new SGD optimizer.
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            velocities: Vec::new(),
        }
    }

    /// Creates SGD without momentum.
    pub fn vanilla(lr: f32) -> Self {
        Self::new(lr, 0.0)
    }
}

impl Optimizer for SGD {
    fn step(&mut self, mut params: Vec<&mut Parameter>, grads: &[Vec<f32>]) -> AbelResult<()> {
        check_grads(&params, grads)?;

        if self.velocities.is_empty() {
            self.velocities = params.iter().map(|p| vec![0.0; p.len()]).collect();
        }
        if self.velocities.len() != params.len() {
            return Err(AbelError::ParameterCountMismatch {
                expected: self.velocities.len(),
                got: params.len(),
            });
        }

        for ((param, grad), velocity) in params.iter_mut().zip(grads).zip(&mut self.velocities) {
            if !param.trainable {
                continue;
            }
            if velocity.len() != param.len() {
                return Err(AbelError::tensor_shape_mismatch(&param.shape, &[velocity.len()]));
            }
            for ((w, g), v) in param.values.iter_mut().zip(grad).zip(velocity.iter_mut()) {
                *v = self.momentum * *v + g;
                *w -= self.lr * *v;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        for v in &mut self.velocities {
            v.fill(0.0);
        }
    }
}
