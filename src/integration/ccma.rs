//! Matrix-coupled (CCMA) convergence loop
//!
//! Each iteration enqueues force, multiply and update. Every
//! `check_interval`-th iteration the event is recorded right after the force
//! step (the only kernel that writes the flag), and after the update is
//! enqueued the host waits on that event and reads the flag. The device
//! keeps computing multiply and update while the host waits.

use crate::config::CcmaLimits;
use crate::error::Result;
use crate::runtime::{Kernel, KernelArg, Runtime};

use super::kernels::{CcmaKernels, slots};
use super::signal::ConvergenceSignal;

/// Result of one matrix-coupled solve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CcmaOutcome {
    /// Iterations enqueued
    pub iterations: usize,
    /// Host synchronizations performed
    pub checkpoints: usize,
    /// Whether a checkpoint saw the convergence flag set
    pub converged: bool,
}

/// Per-solve inputs that do not come from the kernels
#[derive(Debug, Clone, Copy)]
pub(crate) struct CcmaParams {
    pub tolerance: KernelArg,
    pub target: KernelArg,
    pub num_groups: usize,
    pub num_atoms: usize,
    pub limits: CcmaLimits,
}

#[inline]
fn is_checkpoint(iteration: usize, interval: usize) -> bool {
    (iteration + 1) % interval == 0
}

/// Run the convergence loop to completion or to the iteration cap.
///
/// Hitting the cap is reported through [`CcmaOutcome::converged`], not as an
/// error. Any runtime failure aborts the loop immediately.
pub(crate) fn solve<R: Runtime>(
    client: &R::Client,
    signal: &ConvergenceSignal<R>,
    kernels: CcmaKernels<'_, R::Kernel>,
    params: CcmaParams,
) -> Result<CcmaOutcome> {
    let CcmaKernels {
        directions,
        force,
        multiply,
        update,
    } = kernels;

    signal.reset();
    force.set_arg(
        slots::CCMA_FORCE_CONVERGED,
        KernelArg::Ptr(signal.device_address()),
    )?;
    force.set_arg(slots::CCMA_FORCE_TOLERANCE, params.tolerance)?;
    update.set_arg(slots::CCMA_UPDATE_TARGET, params.target)?;

    directions.execute(params.num_groups)?;

    let mut outcome = CcmaOutcome::default();
    for i in 0..params.limits.max_iterations {
        let iteration = KernelArg::I32(i as i32);
        let checkpoint = is_checkpoint(i, params.limits.check_interval);

        force.set_arg(slots::CCMA_FORCE_ITERATION, iteration)?;
        force.execute(params.num_groups)?;
        if checkpoint {
            signal.checkpoint(client)?;
        }
        multiply.set_arg(slots::CCMA_MULTIPLY_ITERATION, iteration)?;
        multiply.execute(params.num_groups)?;
        update.set_arg(slots::CCMA_UPDATE_ITERATION, iteration)?;
        update.execute(params.num_atoms)?;
        outcome.iterations = i + 1;

        if checkpoint {
            outcome.checkpoints += 1;
            if signal.wait_converged(client)? {
                outcome.converged = true;
                break;
            }
            tracing::trace!(iteration = i, "CCMA checkpoint: not converged");
        }
    }

    if outcome.converged {
        tracing::trace!(
            iterations = outcome.iterations,
            checkpoints = outcome.checkpoints,
            "CCMA converged"
        );
    } else {
        tracing::debug!(
            iterations = outcome.iterations,
            groups = params.num_groups,
            "CCMA reached iteration cap without converging"
        );
    }
    Ok(outcome)
}
