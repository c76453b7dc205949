//! # holonomic
//!
//! **Constraint and virtual-site engine for accelerator-resident molecular dynamics.**
//!
//! holonomic drives the kernels that keep bond lengths and rigid waters at
//! their target geometry after each integration step, and spreads forces on
//! massless virtual sites back onto real particles.
//!
//! ## Solvers
//!
//! - **SETTLE**: closed-form correction for rigid three-particle groups, one launch
//! - **SHAKE**: per-group relaxation iterated inside the kernel, one launch
//! - **CCMA**: coupled constraints, an outer loop with a host-mapped
//!   convergence flag checked every few iterations
//!
//! Kernel compilation, constraint classification and buffer allocation belong
//! to the host integrator. This crate decides which kernel runs, with which
//! per-call arguments, over how many work units, and when the host waits.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use holonomic::prelude::*;
//!
//! let layout = SystemLayout::new(num_atoms).with_settle(num_waters).with_ccma(num_bonds);
//! let mut utilities = IntegrationUtilities::<CudaRuntime>::new(
//!     client,
//!     IntegrationConfig::with_precision(Precision::Mixed),
//!     layout,
//!     kernels,
//!     buffers,
//! )?;
//!
//! utilities.apply_constraints(false, 1e-5)?;
//! utilities.distribute_forces_from_virtual_sites()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cuda`: NVIDIA CUDA backend via cudarc
//!
//! The host backend ([`runtime::cpu`]) is always available.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod integration;
pub mod precision;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{CCMA_CHECK_INTERVAL, CCMA_MAX_ITERATIONS, CcmaLimits, IntegrationConfig};
    pub use crate::error::{Error, Result};
    pub use crate::integration::{
        CcmaOutcome, ConstraintKernels, ConstraintMode, ConstraintStats, IntegrationBuffers,
        IntegrationUtilities, SystemLayout,
    };
    pub use crate::precision::Precision;
    pub use crate::runtime::{
        Device, DeviceArray, Kernel, KernelArg, MappedWord, Runtime, RuntimeClient,
    };

    pub use crate::runtime::cpu::CpuRuntime;

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::CudaRuntime;
}

/// Default runtime based on enabled features
///
/// - With `cuda` feature: `CudaRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "cuda")]
pub type DefaultRuntime = runtime::cuda::CudaRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "cuda"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
