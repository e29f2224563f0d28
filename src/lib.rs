//! # abel-spline - Spline-basis function approximators
//!
//! Additive cubic-spline models over the unit hypercube, built for
//! continual learning where updates should stay local:
//!
//! - [`SplineAnn`]: sum of per-dimension uniform cubic B-splines
//! - [`AbelSpline`]: a direct spline plus an anti-symmetric exponential
//!   correction branch
//! - [`LookupTableModel`]: piecewise-constant baseline
//!
//! Spline models can be resampled onto a finer or coarser grid with
//! [`SplineAnn::repartition`], which solves a small linear system so the
//! new model interpolates the old one at every knot.
//!
//! ## Architecture
//! - Row-major control-point tables: `[input_dim * density, output_dim]`
//! - Density `4z + 3` per dimension, index space wraps modulo density
//! - Preallocated [`Workspace`] to avoid hot-path allocations
//!
//! ## Usage
//! ```rust
//! use abel_spline::{Approximator, AbelConfig, AbelSpline, Workspace};
//!
//! let model = AbelSpline::new(AbelConfig {
//!     partition_num: 4,
//!     num_exps: 3,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let inputs = vec![0.2f32, 0.4, 0.6, 0.8];
//! let mut outputs = vec![0.0f32; 2];
//! let mut workspace = Workspace::new();
//! model.forward_batch(&inputs, &mut outputs, &mut workspace).unwrap();
//!
//! let finer = model.repartition(8).unwrap();
//! assert_eq!(finer.config.partition_num, 8);
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod exponential;
pub mod lookup;
pub mod loss;
pub mod model;
pub mod network;
pub mod optimizer;
pub mod param;
pub mod repartition;
pub mod spline;
pub mod spline_ann;

// Re-exports
pub use buffer::Workspace;
pub use config::{
    AbelConfig, ConfigError, GridSpec, LookupConfig, SplineConfig, DEFAULT_NUM_EXPS,
    DEFAULT_PARTITION_NUM, DEFAULT_SEED,
};
pub use error::{AbelError, AbelResult};
pub use exponential::AntiSymmetricExponential;
pub use lookup::LookupTableModel;
pub use loss::{masked_mse, mean_absolute_error, Loss};
pub use model::{train_step, Approximator, Model, ModelConfig};
pub use network::AbelSpline;
pub use optimizer::{Adam, AdamConfig, AdamState, Optimizer, SGD};
pub use param::Parameter;
pub use spline::{basis_weights, cubic_spline};
pub use spline_ann::SplineAnn;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
