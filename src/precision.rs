//! Floating-point precision modes
//!
//! The engine does not choose a precision; it is handed one by the owning
//! context. What it does own is how the solver tolerance crosses into kernel
//! arguments: double and mixed precision contexts receive the tolerance as an
//! `f64`, single precision contexts receive it rounded to `f32`.

use serde::{Deserialize, Serialize};

use crate::runtime::KernelArg;

/// Precision mode of the simulation context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// All arithmetic in `f32`
    #[default]
    Single,
    /// `f32` forces, `f64` integration state
    Mixed,
    /// All arithmetic in `f64`
    Double,
}

impl Precision {
    /// Whether kernels of this mode take real-valued scalars as `f64`
    #[inline]
    pub fn uses_double_scalars(self) -> bool {
        matches!(self, Precision::Mixed | Precision::Double)
    }

    /// Kernel argument carrying `tol` at this mode's scalar width.
    ///
    /// In single precision the value is narrowed with `as f32`, so callers see
    /// the nearest representable `f32`, not the exact input.
    #[inline]
    pub fn tolerance_arg(self, tol: f64) -> KernelArg {
        if self.uses_double_scalars() {
            KernelArg::F64(tol)
        } else {
            KernelArg::F32(tol as f32)
        }
    }

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Precision::Single => "single",
            Precision::Mixed => "mixed",
            Precision::Double => "double",
        }
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
