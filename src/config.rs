//! Model configuration and grid geometry.
//!
//! This module provides the configuration structs for every model in the
//! crate and the [`GridSpec`] that fixes the control-point layout of a
//! spline model.
//!
//! # Example
//!
//! ```rust
//! use abel_spline::{AbelConfig, SplineConfig};
//!
//! // Defaults match the reference experiment: 2D input, z = 20.
//! let config = SplineConfig::default();
//! assert_eq!(config.grid().density(), 83);
//!
//! // Or customize
//! let config = AbelConfig {
//!     partition_num: 4,
//!     num_exps: 3,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Grid Parameters
//!
//! | Parameter | Typical Values | Effect |
//! |-----------|---------------|--------|
//! | `partition_num` | 4-50 | More partitions = finer resolution, more control points |
//! | `num_exps` | 0-8 | Exponential terms in the ABEL correction branch (0 disables it) |

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default seed for parameter initialization.
pub const DEFAULT_SEED: u64 = 55;

/// Default number of partitions per input dimension.
pub const DEFAULT_PARTITION_NUM: usize = 20;

/// Default number of exponential terms in an ABEL-Spline.
pub const DEFAULT_NUM_EXPS: usize = 6;

/// Half-width of the uniform range used to initialize trainable tables.
pub const INIT_RANGE: f32 = 0.05;

/// Number of control points touched per input dimension (cubic support).
pub const SUPPORT: usize = 4;

/// Computes the number of control points per dimension for `partition_num`.
///
/// A uniform cubic B-spline over `z` partitions of the unit interval is
/// stored with `4z + 3` control points per dimension.
///
/// # Example
///
/// ```rust
/// use abel_spline::config::density;
///
/// assert_eq!(density(4), 19);
/// ```
#[inline]
pub const fn density(partition_num: usize) -> usize {
    4 * partition_num + 3
}

/// Grid geometry of a spline model.
///
/// The density is always derived from `partition_num` and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridSpec {
    /// Number of input dimensions.
    pub input_dim: usize,
    /// Partitions per input dimension.
    pub partition_num: usize,
}

impl GridSpec {
    /// Creates a validated grid.
    pub fn new(input_dim: usize, partition_num: usize) -> Result<Self, ConfigError> {
        let grid = Self {
            input_dim,
            partition_num,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Control points per input dimension (`4z + 3`).
    #[inline]
    pub const fn density(&self) -> usize {
        density(self.partition_num)
    }

    /// Factor mapping `[0, 1]` onto `[0, density - 3]`.
    #[inline]
    pub const fn scale(&self) -> usize {
        self.density() - 3
    }

    /// Rows of the flat control-point table (`input_dim * density`).
    #[inline]
    pub const fn table_rows(&self) -> usize {
        self.input_dim * self.density()
    }

    /// [`table_rows`](Self::table_rows), or `None` if the count overflows
    /// or a row index would not fit in `u32`.
    pub fn checked_table_rows(&self) -> Option<usize> {
        let rows = self
            .partition_num
            .checked_mul(4)?
            .checked_add(3)?
            .checked_mul(self.input_dim)?;
        (rows <= u32::MAX as usize).then_some(rows)
    }

    /// Validates the grid.
    ///
    /// Rejects zero sizes and grids whose table rows are not addressable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_dim == 0 {
            return Err(ConfigError::InvalidDimension("input_dim must be > 0"));
        }
        if self.partition_num == 0 {
            return Err(ConfigError::InvalidPartitionNum(self.partition_num));
        }
        if self.checked_table_rows().is_none() {
            return Err(self.too_large());
        }
        Ok(())
    }

    /// Checks that a table of `width` columns fits in memory addressing.
    fn check_width(&self, width: usize) -> Result<(), ConfigError> {
        match self.checked_table_rows().and_then(|rows| rows.checked_mul(width)) {
            Some(_) => Ok(()),
            None => Err(self.too_large()),
        }
    }

    fn too_large(&self) -> ConfigError {
        ConfigError::TableTooLarge {
            partition_num: self.partition_num,
            input_dim: self.input_dim,
        }
    }
}

/// Configuration of a [`SplineAnn`](crate::SplineAnn).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplineConfig {
    /// Input dimension.
    pub input_dim: usize,
    /// Output dimension (length of each control-point vector).
    pub output_dim: usize,
    /// Partitions per input dimension.
    pub partition_num: usize,
    /// Seed for control-point initialization.
    pub seed: u64,
}

impl Default for SplineConfig {
    fn default() -> Self {
        Self {
            input_dim: 2,
            output_dim: 1,
            partition_num: DEFAULT_PARTITION_NUM,
            seed: DEFAULT_SEED,
        }
    }
}

impl SplineConfig {
    /// Creates a configuration from its parts.
    pub fn new(input_dim: usize, output_dim: usize, partition_num: usize, seed: u64) -> Self {
        Self {
            input_dim,
            output_dim,
            partition_num,
            seed,
        }
    }

    /// Grid geometry of this configuration.
    #[inline]
    pub fn grid(&self) -> GridSpec {
        GridSpec {
            input_dim: self.input_dim,
            partition_num: self.partition_num,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a dimension is zero, `partition_num < 1`
    /// or the control-point table would overflow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = self.grid();
        grid.validate()?;
        if self.output_dim == 0 {
            return Err(ConfigError::InvalidDimension("output_dim must be > 0"));
        }
        grid.check_width(self.output_dim)
    }
}

/// Configuration of an [`AbelSpline`](crate::AbelSpline).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AbelConfig {
    /// Input dimension.
    pub input_dim: usize,
    /// Output dimension.
    pub output_dim: usize,
    /// Partitions per input dimension (shared by both branches).
    pub partition_num: usize,
    /// Exponential terms per output and sign; 0 disables the indirect branch.
    pub num_exps: usize,
    /// Seed from which both branch seeds are derived.
    pub seed: u64,
}

impl Default for AbelConfig {
    fn default() -> Self {
        Self {
            input_dim: 2,
            output_dim: 1,
            partition_num: DEFAULT_PARTITION_NUM,
            num_exps: DEFAULT_NUM_EXPS,
            seed: DEFAULT_SEED,
        }
    }
}

impl AbelConfig {
    /// Output width of the indirect branch (`2 * num_exps * output_dim`).
    ///
    /// Only meaningful for a configuration that passed [`validate`](Self::validate).
    #[inline]
    pub fn indirect_dim(&self) -> usize {
        2 * self.num_exps * self.output_dim
    }

    /// [`indirect_dim`](Self::indirect_dim), or `None` on overflow.
    pub fn checked_indirect_dim(&self) -> Option<usize> {
        self.num_exps.checked_mul(2)?.checked_mul(self.output_dim)
    }

    /// Validates the configuration, including the size of both branch tables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = GridSpec {
            input_dim: self.input_dim,
            partition_num: self.partition_num,
        };
        grid.validate()?;
        if self.output_dim == 0 {
            return Err(ConfigError::InvalidDimension("output_dim must be > 0"));
        }
        grid.check_width(self.output_dim)?;
        let indirect = self
            .checked_indirect_dim()
            .ok_or_else(|| grid.too_large())?;
        grid.check_width(indirect)
    }
}

/// Configuration of a [`LookupTableModel`](crate::LookupTableModel).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LookupConfig {
    /// Input dimension.
    pub input_dim: usize,
    /// Output dimension.
    pub output_dim: usize,
    /// Cells per input dimension.
    pub partition_num: usize,
    /// Value held by the reserved out-of-range entry.
    pub default_val: f32,
    /// Seed for table initialization.
    pub seed: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            input_dim: 2,
            output_dim: 1,
            partition_num: DEFAULT_PARTITION_NUM,
            default_val: -1.0,
            seed: DEFAULT_SEED,
        }
    }
}

impl LookupConfig {
    /// Number of regular cells, `partition_num ^ input_dim`.
    ///
    /// Returns `None` on overflow.
    pub fn num_cells(&self) -> Option<usize> {
        let exp = u32::try_from(self.input_dim).ok()?;
        self.partition_num.checked_pow(exp)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_dim == 0 {
            return Err(ConfigError::InvalidDimension("input_dim must be > 0"));
        }
        if self.output_dim == 0 {
            return Err(ConfigError::InvalidDimension("output_dim must be > 0"));
        }
        if self.partition_num == 0 {
            return Err(ConfigError::InvalidPartitionNum(self.partition_num));
        }
        match self.num_cells() {
            Some(cells) if cells.checked_mul(self.output_dim).is_some() => Ok(()),
            _ => Err(ConfigError::TableTooLarge {
                partition_num: self.partition_num,
                input_dim: self.input_dim,
            }),
        }
    }
}

/// Errors returned by the `validate` methods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A dimension parameter is invalid (zero or mismatched).
    #[error("Invalid dimension: {0}")]
    InvalidDimension(&'static str),

    /// Partition count must be at least 1.
    #[error("partition_num must be >= 1, got {0}")]
    InvalidPartitionNum(usize),

    /// The exponential layer needs at least one term.
    #[error("num_exps must be >= 1 for an exponential layer, got {0}")]
    InvalidNumExps(usize),

    /// A table derived from `partition_num` and `input_dim` does not fit
    /// in memory addressing.
    #[error("Table for partition_num={partition_num}, input_dim={input_dim} is too large")]
    TableTooLarge {
        /// Cells per dimension.
        partition_num: usize,
        /// Number of dimensions.
        input_dim: usize,
    },

    /// Direct and indirect ABEL branches disagree.
    #[error("Mismatched ABEL branches: {0}")]
    MismatchedBranches(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs_validate() {
        assert!(SplineConfig::default().validate().is_ok());
        assert!(AbelConfig::default().validate().is_ok());
        assert!(LookupConfig::default().validate().is_ok());
    }

    #[test]
    fn test_density_derivation() {
        for z in 1..10 {
            let grid = GridSpec::new(2, z).unwrap();
            assert_eq!(grid.density(), 4 * z + 3);
            assert_eq!(grid.scale(), 4 * z);
            assert_eq!(grid.table_rows(), 2 * (4 * z + 3));
        }
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let config = SplineConfig {
            partition_num: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidPartitionNum(0)));
    }

    #[test]
    fn test_zero_output_rejected() {
        let config = AbelConfig {
            output_dim: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_indirect_dim() {
        let config = AbelConfig {
            output_dim: 3,
            num_exps: 6,
            ..Default::default()
        };
        assert_eq!(config.indirect_dim(), 36);
    }

    #[test]
    fn test_spline_overflow_rejected() {
        let config = SplineConfig::new(2, 1, usize::MAX / 2, 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TableTooLarge { .. })
        ));

        let wide = SplineConfig::new(1, usize::MAX / 4, 1, 1);
        assert!(matches!(
            wide.validate(),
            Err(ConfigError::TableTooLarge { .. })
        ));
    }

    #[test]
    fn test_abel_overflow_rejected() {
        let config = AbelConfig {
            output_dim: 2,
            num_exps: usize::MAX / 2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TableTooLarge { .. })
        ));
        assert_eq!(config.checked_indirect_dim(), None);

        let config = AbelConfig {
            partition_num: usize::MAX / 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_rows_bounded_by_u32() {
        // 4 * (2^30 - 1) + 3 == u32::MAX rows is the largest addressable grid.
        let largest = GridSpec::new(1, (1 << 30) - 1).unwrap();
        assert_eq!(largest.checked_table_rows(), Some(u32::MAX as usize));

        assert!(matches!(
            GridSpec::new(1, 1 << 30),
            Err(ConfigError::TableTooLarge { .. })
        ));
        assert!(GridSpec::new(2, 1 << 29).is_err());
    }

    #[test]
    fn test_lookup_overflow_rejected() {
        let config = LookupConfig {
            input_dim: 64,
            partition_num: 1000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TableTooLarge { .. })
        ));
    }
}
