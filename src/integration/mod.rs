//! Constraint engine
//!
//! [`IntegrationUtilities`] is called by a host integrator once per step. It
//! dispatches the three constraint solvers over their pre-classified batches
//! and redistributes virtual-site forces.
//!
//! ```text
//! apply_constraints(mode, tol)
//! ├── SETTLE  (one launch, if any rigid groups)
//! ├── SHAKE   (one launch, if any simple groups)
//! └── CCMA    (directions + convergence loop, if any coupled groups)
//! ```
//!
//! All launches go onto the client's stream in this order. The host only
//! blocks at CCMA checkpoints.

mod ccma;
mod kernels;
mod signal;
mod stats;

pub use ccma::CcmaOutcome;
pub use kernels::{CcmaKernels, ConstraintKernels, ConstraintMode, SelectedKernels, slots};
pub use signal::ConvergenceSignal;
pub use stats::ConstraintStats;

use crate::config::IntegrationConfig;
use crate::error::{Error, Result};
use crate::precision::Precision;
use crate::runtime::{DeviceArray, Kernel, Runtime};

use ccma::CcmaParams;

/// Batch sizes of the particle system, fixed at setup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemLayout {
    /// Particles, including virtual sites
    pub num_atoms: usize,
    /// Rigid-analytic (SETTLE) groups
    pub settle_groups: usize,
    /// Single-constraint (SHAKE) groups
    pub shake_groups: usize,
    /// Matrix-coupled (CCMA) constraints
    pub ccma_groups: usize,
    /// Virtual sites
    pub num_vsites: usize,
}

impl SystemLayout {
    /// Layout with `num_atoms` particles and no constraints
    pub fn new(num_atoms: usize) -> Self {
        Self {
            num_atoms,
            ..Default::default()
        }
    }

    /// Set the rigid-analytic group count
    pub fn with_settle(mut self, groups: usize) -> Self {
        self.settle_groups = groups;
        self
    }

    /// Set the single-constraint group count
    pub fn with_shake(mut self, groups: usize) -> Self {
        self.shake_groups = groups;
        self
    }

    /// Set the matrix-coupled constraint count
    pub fn with_ccma(mut self, groups: usize) -> Self {
        self.ccma_groups = groups;
        self
    }

    /// Set the virtual-site count
    pub fn with_vsites(mut self, sites: usize) -> Self {
        self.num_vsites = sites;
        self
    }

    /// Whether any constraint solver will run
    pub fn has_constraints(&self) -> bool {
        self.settle_groups + self.shake_groups + self.ccma_groups > 0
    }

    fn validate(&self) -> Result<()> {
        // CCMA update runs over every particle.
        if self.ccma_groups > 0 && self.num_atoms == 0 {
            return Err(Error::InvalidArgument {
                arg: "layout.num_atoms",
                reason: "matrix-coupled constraints need at least one particle".into(),
            });
        }
        Ok(())
    }
}

/// Accelerator arrays owned by the host integrator and context
///
/// Handles are non-owning; the engine never frees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrationBuffers {
    /// Per-particle position correction
    pub pos_delta: DeviceArray,
    /// Random numbers for stochastic integrators
    pub random: DeviceArray,
    /// Current and previous step size
    pub step_size: DeviceArray,
    /// Velocities with inverse masses, corrected in velocity mode
    pub velm: DeviceArray,
    /// Fixed-point force accumulator, read by virtual-site redistribution
    pub long_force: DeviceArray,
}

/// Constraint and virtual-site engine for one simulation context
///
/// Not safe for concurrent use; every call takes `&mut self`.
pub struct IntegrationUtilities<R: Runtime> {
    client: R::Client,
    config: IntegrationConfig,
    layout: SystemLayout,
    kernels: ConstraintKernels<R::Kernel>,
    buffers: IntegrationBuffers,
    convergence: Option<ConvergenceSignal<R>>,
    stats: ConstraintStats,
}

impl<R: Runtime> IntegrationUtilities<R> {
    /// Create the engine.
    ///
    /// The convergence signal is allocated only when `layout` contains
    /// matrix-coupled constraints. Any allocation failure aborts construction
    /// and releases whatever was already created.
    pub fn new(
        client: R::Client,
        config: IntegrationConfig,
        layout: SystemLayout,
        kernels: ConstraintKernels<R::Kernel>,
        buffers: IntegrationBuffers,
    ) -> Result<Self> {
        config.validate()?;
        layout.validate()?;

        let convergence = if layout.ccma_groups > 0 {
            Some(ConvergenceSignal::new(&client)?)
        } else {
            None
        };

        tracing::debug!(
            runtime = R::name(),
            precision = %config.precision,
            atoms = layout.num_atoms,
            settle = layout.settle_groups,
            shake = layout.shake_groups,
            ccma = layout.ccma_groups,
            vsites = layout.num_vsites,
            "integration utilities created"
        );

        Ok(Self {
            client,
            config,
            layout,
            kernels,
            buffers,
            convergence,
            stats: ConstraintStats::default(),
        })
    }

    /// Constrain positions or velocities to tolerance `tol`.
    ///
    /// Only runtime failures are errors. A CCMA solve that hits the iteration
    /// cap returns `Ok(())`; see [`stats`](Self::stats).
    pub fn apply_constraints(&mut self, constrain_velocities: bool, tol: f64) -> Result<()> {
        let mode = ConstraintMode::from_flag(constrain_velocities);
        let tolerance = self.config.precision.tolerance_arg(tol);
        let selected = self.kernels.select(mode);
        self.stats.apply_calls += 1;

        if self.layout.settle_groups > 0 {
            selected.settle.set_arg(slots::SETTLE_TOLERANCE, tolerance)?;
            selected.settle.execute(self.layout.settle_groups)?;
        }

        if self.layout.shake_groups > 0 {
            selected.shake.set_arg(slots::SHAKE_TOLERANCE, tolerance)?;
            selected.shake.execute(self.layout.shake_groups)?;
        }

        if self.layout.ccma_groups > 0 {
            let signal = self
                .convergence
                .as_ref()
                .ok_or_else(|| Error::Internal("convergence signal missing".into()))?;
            let target = match mode {
                ConstraintMode::Velocities => self.buffers.velm.as_arg(),
                ConstraintMode::Positions => self.buffers.pos_delta.as_arg(),
            };
            let params = CcmaParams {
                tolerance,
                target,
                num_groups: self.layout.ccma_groups,
                num_atoms: self.layout.num_atoms,
                limits: self.config.ccma,
            };
            let outcome = ccma::solve(&self.client, signal, selected.ccma, params)?;
            self.stats.record_ccma(outcome);
        }
        Ok(())
    }

    /// Constrain positions (through the position-delta buffer).
    pub fn apply_position_constraints(&mut self, tol: f64) -> Result<()> {
        self.apply_constraints(false, tol)
    }

    /// Constrain velocities.
    pub fn apply_velocity_constraints(&mut self, tol: f64) -> Result<()> {
        self.apply_constraints(true, tol)
    }

    /// Spread forces on virtual sites onto the particles that define them.
    pub fn distribute_forces_from_virtual_sites(&mut self) -> Result<()> {
        if self.layout.num_vsites == 0 {
            return Ok(());
        }
        let kernel = &mut self.kernels.vsite_force;
        kernel.set_arg(slots::VSITE_FORCE_BUFFER, self.buffers.long_force.as_arg())?;
        kernel.execute(self.layout.num_vsites)?;
        self.stats.vsite_redistributions += 1;
        Ok(())
    }

    /// Position-delta array
    #[inline]
    pub fn pos_delta(&self) -> &DeviceArray {
        &self.buffers.pos_delta
    }

    /// Random-number array
    #[inline]
    pub fn random(&self) -> &DeviceArray {
        &self.buffers.random
    }

    /// Step-size array
    #[inline]
    pub fn step_size(&self) -> &DeviceArray {
        &self.buffers.step_size
    }

    /// All integrator-owned arrays
    pub fn buffers(&self) -> &IntegrationBuffers {
        &self.buffers
    }

    /// Client all kernels launch through
    pub fn client(&self) -> &R::Client {
        &self.client
    }

    /// Active configuration
    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    /// Precision mode tolerances are passed at
    pub fn precision(&self) -> Precision {
        self.config.precision
    }

    /// Batch sizes
    pub fn layout(&self) -> &SystemLayout {
        &self.layout
    }

    /// Kernel set, for inspecting bound arguments
    pub fn kernels(&self) -> &ConstraintKernels<R::Kernel> {
        &self.kernels
    }

    /// Kernel set, for rebinding setup-time arguments
    pub fn kernels_mut(&mut self) -> &mut ConstraintKernels<R::Kernel> {
        &mut self.kernels
    }

    /// Convergence signal, present only with matrix-coupled constraints
    pub fn convergence_signal(&self) -> Option<&ConvergenceSignal<R>> {
        self.convergence.as_ref()
    }

    /// Counters since construction or the last reset
    pub fn stats(&self) -> &ConstraintStats {
        &self.stats
    }

    /// Zero the counters.
    pub fn reset_stats(&mut self) {
        self.stats = ConstraintStats::default();
    }
}

impl<R: Runtime> std::fmt::Debug for IntegrationUtilities<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationUtilities")
            .field("runtime", &R::name())
            .field("config", &self.config)
            .field("layout", &self.layout)
            .field("convergence", &self.convergence)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_builders() {
        let layout = SystemLayout::new(30)
            .with_settle(10)
            .with_shake(2)
            .with_ccma(8)
            .with_vsites(1);
        assert_eq!(layout.num_atoms, 30);
        assert_eq!(layout.settle_groups, 10);
        assert_eq!(layout.shake_groups, 2);
        assert_eq!(layout.ccma_groups, 8);
        assert_eq!(layout.num_vsites, 1);
        assert!(layout.has_constraints());
        assert!(!SystemLayout::new(5).with_vsites(2).has_constraints());
    }

    #[test]
    fn test_layout_rejects_ccma_without_atoms() {
        let err = SystemLayout::new(0).with_ccma(1).validate().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidArgument {
                arg: "layout.num_atoms",
                ..
            }
        ));
        assert!(SystemLayout::new(0).with_settle(1).validate().is_ok());
    }
}
