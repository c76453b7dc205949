//! Engine configuration
//!
//! Everything the host integrator decides once per context: the precision
//! mode and the bounds of the matrix-coupled convergence loop.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::precision::Precision;

/// Hard cap on CCMA iterations per solve.
///
/// Reaching it is not an error; the solve keeps whatever correction it has.
pub const CCMA_MAX_ITERATIONS: usize = 150;

/// The host checks the convergence flag once every this many iterations.
pub const CCMA_CHECK_INTERVAL: usize = 4;

/// Bounds of the matrix-coupled convergence loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcmaLimits {
    /// Maximum iterations before the loop gives up silently
    pub max_iterations: usize,
    /// Iterations between host synchronization checkpoints
    pub check_interval: usize,
}

impl Default for CcmaLimits {
    fn default() -> Self {
        Self {
            max_iterations: CCMA_MAX_ITERATIONS,
            check_interval: CCMA_CHECK_INTERVAL,
        }
    }
}

impl CcmaLimits {
    /// Upper bound on synchronization checkpoints in one solve.
    pub fn max_checkpoints(&self) -> usize {
        self.max_iterations / self.check_interval
    }
}

/// Configuration of an [`IntegrationUtilities`](crate::integration::IntegrationUtilities)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Precision mode of the owning context
    pub precision: Precision,
    /// Matrix-coupled loop bounds
    pub ccma: CcmaLimits,
}

impl IntegrationConfig {
    /// Default configuration for the given precision mode.
    pub fn with_precision(precision: Precision) -> Self {
        Self {
            precision,
            ..Default::default()
        }
    }

    /// Override the CCMA loop bounds.
    pub fn with_ccma_limits(mut self, max_iterations: usize, check_interval: usize) -> Self {
        self.ccma = CcmaLimits {
            max_iterations,
            check_interval,
        };
        self
    }

    /// Reject configurations the convergence loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ccma.max_iterations == 0 {
            return Err(Error::InvalidArgument {
                arg: "ccma.max_iterations",
                reason: "must be at least 1".into(),
            });
        }
        if self.ccma.max_iterations > i32::MAX as usize {
            return Err(Error::InvalidArgument {
                arg: "ccma.max_iterations",
                reason: "iteration index is passed to kernels as a 32-bit int".into(),
            });
        }
        if self.ccma.check_interval == 0 {
            return Err(Error::InvalidArgument {
                arg: "ccma.check_interval",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = IntegrationConfig::default();
        assert_eq!(config.precision, Precision::Single);
        assert_eq!(config.ccma.max_iterations, 150);
        assert_eq!(config.ccma.check_interval, 4);
        assert_eq!(config.ccma.max_checkpoints(), 37);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let err = IntegrationConfig::default()
            .with_ccma_limits(0, 4)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("ccma.max_iterations"));

        let err = IntegrationConfig::default()
            .with_ccma_limits(10, 0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("ccma.check_interval"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: IntegrationConfig =
            serde_json::from_str(r#"{"precision":"double","ccma":{"check_interval":2}}"#).unwrap();
        assert_eq!(config.precision, Precision::Double);
        assert_eq!(config.ccma.max_iterations, CCMA_MAX_ITERATIONS);
        assert_eq!(config.ccma.check_interval, 2);
    }
}
