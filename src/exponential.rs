//! Anti-symmetric exponential recombination layer.
//!
//! Turns `2 * num_exps` raw values per output channel into one odd
//! correction term:
//!
//! ```text
//! y_o = Σ_k exp(a[o, 0, k] + b_k) - Σ_k exp(a[o, 1, k] + b_k),   b_k = -2 ln(k + 1)
//! ```
//!
//! The raw input of one sample is laid out as `[output_dim, 2, num_exps]`,
//! row-major: the first half of each channel block is the positive branch,
//! the second half the negative one. Swapping the halves negates the output.
//!
//! The biases are fixed by `num_exps` and hold no trainable state.

use crate::config::ConfigError;
use crate::error::{check_batch, check_len, AbelResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fixed-bias exponential differencing layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AntiSymmetricExponential {
    num_exps: usize,
    output_dim: usize,
    bias: Vec<f32>,
}

impl AntiSymmetricExponential {
    /// Creates the layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `num_exps` or `output_dim` is 0.
    pub fn new(num_exps: usize, output_dim: usize) -> Result<Self, ConfigError> {
        if num_exps == 0 {
            return Err(ConfigError::InvalidNumExps(num_exps));
        }
        if output_dim == 0 {
            return Err(ConfigError::InvalidDimension("output_dim must be > 0"));
        }
        let bias = (0..num_exps)
            .map(|k| -2.0 * ((k + 1) as f32).ln())
            .collect();
        Ok(Self {
            num_exps,
            output_dim,
            bias,
        })
    }

    /// Number of exponential terms per half.
    #[inline]
    pub fn num_exps(&self) -> usize {
        self.num_exps
    }

    /// Output width.
    #[inline]
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Raw input width, `output_dim * 2 * num_exps`.
    #[inline]
    pub fn input_dim(&self) -> usize {
        self.output_dim * 2 * self.num_exps
    }

    /// The fixed biases `-2 ln(k + 1)`.
    #[inline]
    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    /// Sum of `exp(raw_k + b_k)` over one half.
    #[inline]
    fn half_sum(&self, raw: &[f32]) -> f32 {
        raw.iter()
            .zip(&self.bias)
            .map(|(a, b)| (a + b).exp())
            .sum()
    }

    /// Batched forward pass.
    ///
    /// * `inputs` - `[batch_size * input_dim]`
    /// * `outputs` - `[batch_size * output_dim]`
    pub fn forward(&self, inputs: &[f32], outputs: &mut [f32]) -> AbelResult<()> {
        outputs.fill(0.0);
        self.forward_accumulate(inputs, outputs)
    }

    /// Batched forward pass adding into `outputs` instead of overwriting.
    pub fn forward_accumulate(&self, inputs: &[f32], outputs: &mut [f32]) -> AbelResult<()> {
        let batch_size = check_batch(inputs, self.input_dim())?;
        check_len(outputs, batch_size, self.output_dim)?;

        let e = self.num_exps;
        for (raw, out) in inputs
            .chunks_exact(2 * e)
            .zip(outputs.iter_mut())
        {
            *out += self.half_sum(&raw[..e]) - self.half_sum(&raw[e..]);
        }
        Ok(())
    }

    /// Gradient of the loss with respect to the raw inputs.
    ///
    /// `dy_o / da[o, h, k] = ±exp(a[o, h, k] + b_k)`, positive for `h = 0`.
    pub fn backward(
        &self,
        inputs: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
    ) -> AbelResult<()> {
        let batch_size = check_batch(inputs, self.input_dim())?;
        check_len(grad_output, batch_size, self.output_dim)?;
        check_len(grad_input, batch_size, self.input_dim())?;

        let e = self.num_exps;
        for ((raw, g_in), &g_out) in inputs
            .chunks_exact(2 * e)
            .zip(grad_input.chunks_exact_mut(2 * e))
            .zip(grad_output)
        {
            for k in 0..e {
                g_in[k] = g_out * (raw[k] + self.bias[k]).exp();
                g_in[e + k] = -g_out * (raw[e + k] + self.bias[k]).exp();
            }
        }
        Ok(())
    }
}
