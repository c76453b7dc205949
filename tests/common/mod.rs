//! Common test utilities
#![allow(dead_code)]

use holonomic::config::IntegrationConfig;
use holonomic::integration::{ConstraintKernels, IntegrationBuffers, IntegrationUtilities, SystemLayout};
use holonomic::runtime::Runtime;
use holonomic::runtime::cpu::{CpuClient, CpuDevice, CpuKernel, CpuRuntime};
#[cfg(feature = "cuda")]
use holonomic::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};

pub const SETTLE_POS: &str = "applySettleToPositions";
pub const SETTLE_VEL: &str = "applySettleToVelocities";
pub const SHAKE_POS: &str = "applyShakeToPositions";
pub const SHAKE_VEL: &str = "applyShakeToVelocities";
pub const CCMA_DIRECTIONS: &str = "computeCCMAConstraintDirections";
pub const CCMA_POS_FORCE: &str = "computeCCMAPositionConstraintForce";
pub const CCMA_VEL_FORCE: &str = "computeCCMAVelocityConstraintForce";
pub const CCMA_MULTIPLY: &str = "multiplyByCCMAConstraintMatrix";
pub const CCMA_UPDATE: &str = "updateCCMAAtomPositions";
pub const VSITE_FORCE: &str = "distributeVirtualSiteForces";

/// Route engine logs to the test harness (`RUST_LOG=holonomic=trace` to see them)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a CPU client (activity log on) and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    init_tracing();
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device)
        .unwrap()
        .with_activity_log();
    (client, device)
}

/// Kernel set where every kernel does nothing
pub fn noop_kernels(client: &CpuClient) -> ConstraintKernels<CpuKernel> {
    ConstraintKernels {
        settle_pos: client.noop_kernel(SETTLE_POS),
        settle_vel: client.noop_kernel(SETTLE_VEL),
        shake_pos: client.noop_kernel(SHAKE_POS),
        shake_vel: client.noop_kernel(SHAKE_VEL),
        ccma_directions: client.noop_kernel(CCMA_DIRECTIONS),
        ccma_pos_force: client.noop_kernel(CCMA_POS_FORCE),
        ccma_vel_force: client.noop_kernel(CCMA_VEL_FORCE),
        ccma_multiply: client.noop_kernel(CCMA_MULTIPLY),
        ccma_update: client.noop_kernel(CCMA_UPDATE),
        vsite_force: client.noop_kernel(VSITE_FORCE),
    }
}

/// CCMA force kernel that raises the convergence flag from 1-indexed
/// iteration `converge_at` onward (never, if `None`)
pub fn converging_force(client: &CpuClient, name: &str, converge_at: Option<usize>) -> CpuKernel {
    client.kernel(name, move |launch| {
        let iteration = launch.int(8)? as usize + 1;
        if converge_at.is_some_and(|k| iteration >= k) {
            launch.store_word(6, 1)?;
        }
        Ok(())
    })
}

/// Four-component per-particle buffers sized for `num_atoms`
pub fn create_buffers(client: &CpuClient, num_atoms: usize) -> IntegrationBuffers {
    let n = num_atoms.max(1);
    IntegrationBuffers {
        pos_delta: client.alloc_zeroed::<f64>(4 * n),
        random: client.alloc_zeroed::<f32>(4 * n),
        step_size: client.alloc_zeroed::<f64>(2),
        velm: client.alloc_zeroed::<f64>(4 * n),
        long_force: client.alloc_zeroed::<i64>(3 * n),
    }
}

/// Engine on the CPU runtime with freshly allocated buffers
pub fn create_engine(
    client: &CpuClient,
    config: IntegrationConfig,
    layout: SystemLayout,
    kernels: ConstraintKernels<CpuKernel>,
) -> IntegrationUtilities<CpuRuntime> {
    let buffers = create_buffers(client, layout.num_atoms);
    IntegrationUtilities::new(client.clone(), config, layout, kernels, buffers).unwrap()
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Create a CUDA client and device, returning None if CUDA is unavailable
#[cfg(feature = "cuda")]
pub fn create_cuda_client() -> Option<(CudaClient, CudaDevice)> {
    if !holonomic::runtime::cuda::is_cuda_available() {
        return None;
    }
    let device = CudaDevice::new(0);
    let client = CudaRuntime::default_client(&device).ok()?;
    Some((client, device))
}
