//! ABEL-Spline: direct spline plus anti-symmetric exponential correction.
//!
//! ```text
//! y = direct(x) + ase(indirect(x))     if num_exps > 0
//! y = direct(x)                        otherwise
//! ```
//!
//! `direct` is a [`SplineAnn`] with `output_dim` channels, `indirect` a
//! [`SplineAnn`] with `2 * num_exps * output_dim` channels feeding an
//! [`AntiSymmetricExponential`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffer::Workspace;
use crate::config::{AbelConfig, ConfigError, SplineConfig};
use crate::error::{check_batch, check_len, AbelResult};
use crate::exponential::AntiSymmetricExponential;
use crate::model::Approximator;
use crate::param::Parameter;
use crate::spline_ann::SplineAnn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The indirect branch and its exponential head.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Correction {
    spline: SplineAnn,
    exponential: AntiSymmetricExponential,
}

/// Anti-symmetric bounded exponential spline model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AbelSpline {
    /// Configuration.
    pub config: AbelConfig,

    direct: SplineAnn,

    correction: Option<Correction>,
}

/// Derives the (direct, indirect) branch seeds from a model seed.
fn branch_seeds(seed: u64) -> (u64, u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    (rng.gen(), rng.gen())
}

impl AbelSpline {
    /// Creates a model with freshly initialized branches.
    ///
    /// # Errors
    ///
    /// Returns [`AbelError::Config`](crate::AbelError::Config) if the configuration is invalid.
    pub fn new(config: AbelConfig) -> AbelResult<Self> {
        config.validate()?;
        let (direct_seed, indirect_seed) = branch_seeds(config.seed);

        let direct = SplineAnn::new(SplineConfig::new(
            config.input_dim,
            config.output_dim,
            config.partition_num,
            direct_seed,
        ))?;

        let indirect = if config.num_exps > 0 {
            Some(SplineAnn::new(SplineConfig::new(
                config.input_dim,
                config.indirect_dim(),
                config.partition_num,
                indirect_seed,
            ))?)
        } else {
            None
        };

        log::debug!(
            "AbelSpline: z={} num_exps={} output_dim={}",
            config.partition_num,
            config.num_exps,
            config.output_dim
        );

        Self::from_branches(direct, indirect, config.num_exps, config.seed)
    }

    /// Assembles a model from existing branches.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MismatchedBranches`] if the branches disagree
    /// on input dimension or resolution, if the indirect width is not
    /// `2 * num_exps * output_dim`, or if exactly one of `indirect` and
    /// `num_exps > 0` is present.
    pub fn from_branches(
        direct: SplineAnn,
        indirect: Option<SplineAnn>,
        num_exps: usize,
        seed: u64,
    ) -> AbelResult<Self> {
        let config = AbelConfig {
            input_dim: direct.input_dim(),
            output_dim: direct.output_dim(),
            partition_num: direct.partition_num(),
            num_exps,
            seed,
        };
        config.validate()?;

        let correction = match (indirect, num_exps) {
            (None, 0) => None,
            (Some(spline), n) if n > 0 => {
                if spline.input_dim() != config.input_dim {
                    return Err(ConfigError::MismatchedBranches("input_dim differs").into());
                }
                if spline.partition_num() != config.partition_num {
                    return Err(ConfigError::MismatchedBranches("partition_num differs").into());
                }
                if spline.output_dim() != config.indirect_dim() {
                    return Err(ConfigError::MismatchedBranches(
                        "indirect output_dim must be 2 * num_exps * output_dim",
                    )
                    .into());
                }
                Some(Correction {
                    spline: spline.with_prefix("indirect"),
                    exponential: AntiSymmetricExponential::new(n, config.output_dim)?,
                })
            }
            _ => {
                return Err(ConfigError::MismatchedBranches(
                    "indirect branch present iff num_exps > 0",
                )
                .into())
            }
        };

        Ok(Self {
            config,
            direct: direct.with_prefix("direct"),
            correction,
        })
    }

    /// The direct branch.
    #[inline]
    pub fn direct(&self) -> &SplineAnn {
        &self.direct
    }

    /// The indirect branch, if `num_exps > 0`.
    #[inline]
    pub fn indirect(&self) -> Option<&SplineAnn> {
        self.correction.as_ref().map(|c| &c.spline)
    }

    /// The exponential head, if `num_exps > 0`.
    #[inline]
    pub fn exponential(&self) -> Option<&AntiSymmetricExponential> {
        self.correction.as_ref().map(|c| &c.exponential)
    }

    /// Mutable access to the direct branch.
    #[inline]
    pub fn direct_mut(&mut self) -> &mut SplineAnn {
        &mut self.direct
    }

    /// Mutable access to the indirect branch.
    #[inline]
    pub fn indirect_mut(&mut self) -> Option<&mut SplineAnn> {
        self.correction.as_mut().map(|c| &mut c.spline)
    }

    /// Builds an independent model at `new_partition_num` partitions.
    ///
    /// Both branches are resampled with [`SplineAnn::repartition`]; the
    /// exponential head has no resolution-dependent state. `self` is left
    /// untouched.
    pub fn repartition(&self, new_partition_num: usize) -> AbelResult<AbelSpline> {
        let direct = self.direct.repartition(new_partition_num)?;
        let indirect = match &self.correction {
            Some(c) => Some(c.spline.repartition(new_partition_num)?),
            None => None,
        };
        Self::from_branches(direct, indirect, self.config.num_exps, self.config.seed)
    }
}

impl Approximator for AbelSpline {
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
        let batch_size = check_batch(inputs, self.config.input_dim)?;
        check_len(outputs, batch_size, self.config.output_dim)?;

        self.direct.forward_batch(inputs, outputs, workspace)?;

        if let Some(correction) = &self.correction {
            // Take the branch buffer out so the workspace can be lent to the spline.
            let mut branch = std::mem::take(&mut workspace.branch_output);
            branch.resize(batch_size * correction.spline.output_dim(), 0.0);

            let result = correction
                .spline
                .forward_batch(inputs, &mut branch, workspace)
                .and_then(|_| correction.exponential.forward_accumulate(&branch, outputs));
            workspace.branch_output = branch;
            result?;
        }
        Ok(())
    }

    fn backward(
        &self,
        inputs: &[f32],
        grad_output: &[f32],
        workspace: &mut Workspace,
    ) -> AbelResult<Vec<Vec<f32>>> {
        let mut grads = self.direct.backward(inputs, grad_output, workspace)?;

        if let Some(correction) = &self.correction {
            let batch_size = check_batch(inputs, self.config.input_dim)?;
            let width = correction.spline.output_dim();

            let mut branch = std::mem::take(&mut workspace.branch_output);
            let mut branch_grad = std::mem::take(&mut workspace.branch_grad);
            branch.resize(batch_size * width, 0.0);
            branch_grad.resize(batch_size * width, 0.0);

            let result = correction
                .spline
                .forward_batch(inputs, &mut branch, workspace)
                .and_then(|_| {
                    correction
                        .exponential
                        .backward(&branch, grad_output, &mut branch_grad)
                })
                .and_then(|_| correction.spline.backward(inputs, &branch_grad, workspace));

            workspace.branch_output = branch;
            workspace.branch_grad = branch_grad;
            grads.extend(result?);
        }
        Ok(grads)
    }

    fn parameters(&self) -> Vec<&Parameter> {
        let mut params = self.direct.parameters();
        if let Some(c) = &self.correction {
            params.extend(c.spline.parameters());
        }
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        let mut params = self.direct.parameters_mut();
        if let Some(c) = &mut self.correction {
            params.extend(c.spline.parameters_mut());
        }
        params
    }
}
