//! The shared model interface and the tagged model variants.
//!
//! Every approximator in the crate implements [`Approximator`]. The three
//! spline-family models compared in the continual-learning experiment are
//! described by [`ModelConfig`] and built into a [`Model`]:
//!
//! ```rust
//! use abel_spline::{Approximator, ModelConfig};
//!
//! let configs = ModelConfig::spline_family(2, 1, 4, 3, 55);
//! for config in &configs {
//!     let model = config.build().unwrap();
//!     let y = model.forward(&[0.25, 0.75]).unwrap();
//!     assert_eq!(y.len(), 1);
//!     println!("{}: {} parameters", config.label(), model.num_parameters());
//! }
//! ```

use crate::buffer::Workspace;
use crate::config::{AbelConfig, LookupConfig, SplineConfig};
use crate::error::{check_batch, check_len, AbelError, AbelResult};
use crate::loss::Loss;
use crate::lookup::LookupTableModel;
use crate::network::AbelSpline;
use crate::optimizer::Optimizer;
use crate::param::Parameter;
use crate::spline_ann::SplineAnn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Batched function approximator with trainable parameter tensors.
///
/// Inputs are row-major `[batch_size * input_dim]`, outputs
/// `[batch_size * output_dim]`.
pub trait Approximator {
    /// Width of one input row.
    fn input_dim(&self) -> usize;

    /// Width of one output row.
    fn output_dim(&self) -> usize;

    /// Batched forward pass into a caller-provided buffer.
    ///
    /// # Errors
    ///
    /// Returns [`AbelError::ShapeMismatch`] if `inputs` is not a whole
    /// number of rows or `outputs` has the wrong length.
    fn forward_batch(
        &self,
        inputs: &[f32],
        outputs: &mut [f32],
        workspace: &mut Workspace,
    ) -> AbelResult<()>;

    /// Allocating forward pass.
    fn forward(&self, inputs: &[f32]) -> AbelResult<Vec<f32>> {
        let batch_size = check_batch(inputs, self.input_dim())?;
        let mut outputs = vec![0.0f32; batch_size * self.output_dim()];
        let mut workspace = Workspace::new();
        self.forward_batch(inputs, &mut outputs, &mut workspace)?;
        Ok(outputs)
    }

    /// Gradients of `Σ grad_output · y` with respect to every parameter
    /// tensor, in [`parameters`](Approximator::parameters) order.
    fn backward(
        &self,
        inputs: &[f32],
        grad_output: &[f32],
        workspace: &mut Workspace,
    ) -> AbelResult<Vec<Vec<f32>>>;

    /// Parameter tensors in a fixed order.
    fn parameters(&self) -> Vec<&Parameter>;

    /// Mutable parameter tensors, same order as [`parameters`](Approximator::parameters).
    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    /// Number of trainable scalars.
    fn num_parameters(&self) -> usize {
        self.parameters()
            .iter()
            .filter(|p| p.trainable)
            .map(|p| p.len())
            .sum()
    }
}

/// Configuration of one of the spline-family models.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModelConfig {
    /// Plain additive spline.
    Spline(SplineConfig),
    /// Spline with anti-symmetric exponential correction.
    Abel(AbelConfig),
    /// Piecewise-constant lookup table.
    Lookup(LookupConfig),
}

impl ModelConfig {
    /// The three configurations compared at resolution `partition_num`:
    /// Spline ANN, ABEL-Spline and a lookup table with default value `-1`.
    pub fn spline_family(
        input_dim: usize,
        output_dim: usize,
        partition_num: usize,
        num_exps: usize,
        seed: u64,
    ) -> Vec<ModelConfig> {
        vec![
            ModelConfig::Spline(SplineConfig::new(input_dim, output_dim, partition_num, seed)),
            ModelConfig::Abel(AbelConfig {
                input_dim,
                output_dim,
                partition_num,
                num_exps,
                seed,
            }),
            ModelConfig::Lookup(LookupConfig {
                input_dim,
                output_dim,
                partition_num,
                default_val: -1.0,
                seed,
            }),
        ]
    }

    /// Partitions per input dimension.
    pub fn partition_num(&self) -> usize {
        match self {
            ModelConfig::Spline(c) => c.partition_num,
            ModelConfig::Abel(c) => c.partition_num,
            ModelConfig::Lookup(c) => c.partition_num,
        }
    }

    /// Display label, e.g. `"ABEL-Spline (z=20)"`.
    pub fn label(&self) -> String {
        let name = match self {
            ModelConfig::Spline(_) => "Spline ANN",
            ModelConfig::Abel(_) => "ABEL-Spline",
            ModelConfig::Lookup(_) => "Lookup Table",
        };
        format!("{} (z={})", name, self.partition_num())
    }

    /// Builds a freshly initialized model.
    pub fn build(&self) -> AbelResult<Model> {
        Ok(match self {
            ModelConfig::Spline(c) => Model::Spline(SplineAnn::new(c.clone())?),
            ModelConfig::Abel(c) => Model::Abel(AbelSpline::new(c.clone())?),
            ModelConfig::Lookup(c) => Model::Lookup(LookupTableModel::new(c.clone())?),
        })
    }
}

/// One of the spline-family models.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Model {
    /// Plain additive spline.
    Spline(SplineAnn),
    /// Spline with anti-symmetric exponential correction.
    Abel(AbelSpline),
    /// Piecewise-constant lookup table.
    Lookup(LookupTableModel),
}

impl Model {
    /// Configuration this model was built from.
    pub fn config(&self) -> ModelConfig {
        match self {
            Model::Spline(m) => ModelConfig::Spline(m.config.clone()),
            Model::Abel(m) => ModelConfig::Abel(m.config.clone()),
            Model::Lookup(m) => ModelConfig::Lookup(m.config.clone()),
        }
    }

    /// Display label, see [`ModelConfig::label`].
    pub fn label(&self) -> String {
        self.config().label()
    }

    /// Builds an independent model at `new_partition_num` partitions that
    /// reproduces this one.
    ///
    /// # Errors
    ///
    /// - [`AbelError::RepartitionUnsupported`] for the lookup table
    /// - [`AbelError::Config`] if `new_partition_num < 1`
    /// - [`AbelError::NumericalInstability`] if the basis solve fails
    pub fn repartition(&self, new_partition_num: usize) -> AbelResult<Model> {
        match self {
            Model::Spline(m) => m.repartition(new_partition_num).map(Model::Spline),
            Model::Abel(m) => m.repartition(new_partition_num).map(Model::Abel),
            Model::Lookup(_) => Err(AbelError::RepartitionUnsupported("LookupTableModel")),
        }
    }

    /// The inner spline, if this is a [`Model::Spline`].
    pub fn as_spline(&self) -> Option<&SplineAnn> {
        match self {
            Model::Spline(m) => Some(m),
            _ => None,
        }
    }

    /// The inner ABEL-Spline, if this is a [`Model::Abel`].
    pub fn as_abel(&self) -> Option<&AbelSpline> {
        match self {
            Model::Abel(m) => Some(m),
            _ => None,
        }
    }

    /// The inner lookup table, if this is a [`Model::Lookup`].
    pub fn as_lookup(&self) -> Option<&LookupTableModel> {
        match self {
            Model::Lookup(m) => Some(m),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn Approximator {
        match self {
            Model::Spline(m) => m,
            Model::Abel(m) => m,
            Model::Lookup(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Approximator {
        match self {
            Model::Spline(m) => m,
            Model::Abel(m) => m,
            Model::Lookup(m) => m,
        }
    }
}

impl Approximator for Model {
    fn input_dim(&self) -> usize {
        self.inner().input_dim()
    }

    fn output_dim(&self) -> usize {
        self.inner().output_dim()
    }

    fn forward_batch(
        &self,
        inputs: &[f32],
        outputs: &mut [f32],
        workspace: &mut Workspace,
    ) -> AbelResult<()> {
        self.inner().forward_batch(inputs, outputs, workspace)
    }

    fn backward(
        &self,
        inputs: &[f32],
        grad_output: &[f32],
        workspace: &mut Workspace,
    ) -> AbelResult<Vec<Vec<f32>>> {
        self.inner().backward(inputs, grad_output, workspace)
    }

    fn parameters(&self) -> Vec<&Parameter> {
        self.inner().parameters()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.inner_mut().parameters_mut()
    }
}

impl From<SplineAnn> for Model {
    fn from(m: SplineAnn) -> Self {
        Model::Spline(m)
    }
}

impl From<AbelSpline> for Model {
    fn from(m: AbelSpline) -> Self {
        Model::Abel(m)
    }
}

impl From<LookupTableModel> for Model {
    fn from(m: LookupTableModel) -> Self {
        Model::Lookup(m)
    }
}

/// One gradient step on a batch: forward, loss, backward, update.
///
/// Returns the loss before the update.
///
/// # Errors
///
/// Returns [`AbelError::ShapeMismatch`] if `targets` does not hold
/// `batch_size * output_dim` values, and propagates model and optimizer
/// errors.
pub fn train_step<M, O>(
    model: &mut M,
    optimizer: &mut O,
    loss: Loss,
    inputs: &[f32],
    targets: &[f32],
    workspace: &mut Workspace,
) -> AbelResult<f32>
where
    M: Approximator + ?Sized,
    O: Optimizer + ?Sized,
{
    let batch_size = check_batch(inputs, model.input_dim())?;
    check_len(targets, batch_size, model.output_dim())?;

    let mut predictions = vec![0.0f32; targets.len()];
    model.forward_batch(inputs, &mut predictions, workspace)?;

    let (value, grad) = loss.evaluate(&predictions, targets);
    if !value.is_finite() {
        return Err(AbelError::numerical(format!("loss is {}", value)));
    }

    let grads = model.backward(inputs, &grad, workspace)?;
    optimizer.step(model.parameters_mut(), &grads)?;

    log::trace!("train_step: batch={} loss={:.6}", batch_size, value);
    Ok(value)
}
