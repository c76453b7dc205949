//! Constraint kernel set and per-call variant selection
//!
//! SETTLE, SHAKE and the CCMA force step each exist as a position-mode and a
//! velocity-mode kernel. Which one runs is decided once per call by
//! [`ConstraintKernels::select`]; everything downstream works with the
//! selected references and never looks at the mode again.

use crate::runtime::Kernel;

/// Argument slots this crate binds; every other slot is bound at setup.
pub mod slots {
    /// SETTLE tolerance
    pub const SETTLE_TOLERANCE: usize = 1;
    /// SHAKE tolerance
    pub const SHAKE_TOLERANCE: usize = 1;
    /// CCMA force: device address of the convergence flag
    pub const CCMA_FORCE_CONVERGED: usize = 6;
    /// CCMA force: tolerance
    pub const CCMA_FORCE_TOLERANCE: usize = 7;
    /// CCMA force: iteration index
    pub const CCMA_FORCE_ITERATION: usize = 8;
    /// CCMA multiply: iteration index
    pub const CCMA_MULTIPLY_ITERATION: usize = 5;
    /// CCMA update: buffer receiving the correction
    pub const CCMA_UPDATE_TARGET: usize = 3;
    /// CCMA update: iteration index
    pub const CCMA_UPDATE_ITERATION: usize = 8;
    /// Virtual-site redistribution: long-format force buffer
    pub const VSITE_FORCE_BUFFER: usize = 2;
}

/// What a constraint pass corrects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintMode {
    /// Correct positions (through the position-delta buffer)
    Positions,
    /// Correct velocities in place
    Velocities,
}

impl ConstraintMode {
    /// Mode for a `constrain_velocities` flag
    #[inline]
    pub fn from_flag(constrain_velocities: bool) -> Self {
        if constrain_velocities {
            ConstraintMode::Velocities
        } else {
            ConstraintMode::Positions
        }
    }
}

/// Every kernel the engine launches, pre-built by the host integrator
#[derive(Debug)]
pub struct ConstraintKernels<K> {
    /// SETTLE, position mode
    pub settle_pos: K,
    /// SETTLE, velocity mode
    pub settle_vel: K,
    /// SHAKE, position mode
    pub shake_pos: K,
    /// SHAKE, velocity mode
    pub shake_vel: K,
    /// CCMA constraint directions (once per solve)
    pub ccma_directions: K,
    /// CCMA force step, position mode
    pub ccma_pos_force: K,
    /// CCMA force step, velocity mode
    pub ccma_vel_force: K,
    /// CCMA coupling-matrix multiply
    pub ccma_multiply: K,
    /// CCMA correction update (runs over every particle)
    pub ccma_update: K,
    /// Virtual-site force redistribution
    pub vsite_force: K,
}

/// The four kernels one CCMA solve uses
#[derive(Debug)]
pub struct CcmaKernels<'a, K> {
    /// Directions, launched once before the loop
    pub directions: &'a mut K,
    /// Mode-selected force step
    pub force: &'a mut K,
    /// Matrix multiply
    pub multiply: &'a mut K,
    /// Update
    pub update: &'a mut K,
}

/// Kernels resolved for one `apply_constraints` call
#[derive(Debug)]
pub struct SelectedKernels<'a, K> {
    /// Mode the references were selected for
    pub mode: ConstraintMode,
    /// SETTLE variant
    pub settle: &'a mut K,
    /// SHAKE variant
    pub shake: &'a mut K,
    /// CCMA kernels with the force variant resolved
    pub ccma: CcmaKernels<'a, K>,
}

impl<K: Kernel> ConstraintKernels<K> {
    /// Resolve the mode-dependent variants.
    pub fn select(&mut self, mode: ConstraintMode) -> SelectedKernels<'_, K> {
        let ConstraintKernels {
            settle_pos,
            settle_vel,
            shake_pos,
            shake_vel,
            ccma_directions,
            ccma_pos_force,
            ccma_vel_force,
            ccma_multiply,
            ccma_update,
            vsite_force: _,
        } = self;
        let (settle, shake, force) = match mode {
            ConstraintMode::Positions => (settle_pos, shake_pos, ccma_pos_force),
            ConstraintMode::Velocities => (settle_vel, shake_vel, ccma_vel_force),
        };
        SelectedKernels {
            mode,
            settle,
            shake,
            ccma: CcmaKernels {
                directions: ccma_directions,
                force,
                multiply: ccma_multiply,
                update: ccma_update,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuClient, CpuDevice, CpuKernel};

    fn kernel_set(client: &CpuClient) -> ConstraintKernels<CpuKernel> {
        ConstraintKernels {
            settle_pos: client.noop_kernel("settle_pos"),
            settle_vel: client.noop_kernel("settle_vel"),
            shake_pos: client.noop_kernel("shake_pos"),
            shake_vel: client.noop_kernel("shake_vel"),
            ccma_directions: client.noop_kernel("ccma_directions"),
            ccma_pos_force: client.noop_kernel("ccma_pos_force"),
            ccma_vel_force: client.noop_kernel("ccma_vel_force"),
            ccma_multiply: client.noop_kernel("ccma_multiply"),
            ccma_update: client.noop_kernel("ccma_update"),
            vsite_force: client.noop_kernel("vsite_force"),
        }
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(ConstraintMode::from_flag(true), ConstraintMode::Velocities);
        assert_eq!(ConstraintMode::from_flag(false), ConstraintMode::Positions);
    }

    #[test]
    fn test_select_positions() {
        let client = CpuClient::new(CpuDevice::new());
        let mut kernels = kernel_set(&client);
        let selected = kernels.select(ConstraintMode::Positions);
        assert_eq!(selected.settle.name(), "settle_pos");
        assert_eq!(selected.shake.name(), "shake_pos");
        assert_eq!(selected.ccma.force.name(), "ccma_pos_force");
        assert_eq!(selected.ccma.update.name(), "ccma_update");
    }

    #[test]
    fn test_select_velocities() {
        let client = CpuClient::new(CpuDevice::new());
        let mut kernels = kernel_set(&client);
        let selected = kernels.select(ConstraintMode::Velocities);
        assert_eq!(selected.mode, ConstraintMode::Velocities);
        assert_eq!(selected.settle.name(), "settle_vel");
        assert_eq!(selected.shake.name(), "shake_vel");
        assert_eq!(selected.ccma.force.name(), "ccma_vel_force");
        assert_eq!(selected.ccma.directions.name(), "ccma_directions");
    }
}
