//! CUDA kernel wrapper with persistent argument slots

use cudarc::driver::PushKernelArg;
use cudarc::driver::safe::{CudaFunction, CudaStream, LaunchConfig};
use std::sync::Arc;

use super::driver_error;
use crate::error::{Error, Result};
use crate::runtime::kernel::ArgSlots;
use crate::runtime::{Kernel, KernelArg};

/// Block size for per-group and per-particle launches
pub const BLOCK_SIZE: u32 = 256;

/// 1D launch covering `work_units` threads in blocks of `block_size`.
///
/// Counts that do not fit the driver's `u32` thread index are rejected.
#[inline]
fn launch_config(work_units: usize, block_size: u32) -> Result<LaunchConfig> {
    let units = u32::try_from(work_units).map_err(|_| Error::InvalidArgument {
        arg: "work_units",
        reason: format!("{work_units} exceeds the 1D launch limit of {}", u32::MAX),
    })?;
    Ok(LaunchConfig {
        grid_dim: (units.div_ceil(block_size), 1, 1),
        block_dim: (block_size, 1, 1),
        shared_mem_bytes: 0,
    })
}

/// Kernel function loaded from a PTX module, launched on the client's stream
pub struct CudaKernel {
    name: String,
    func: CudaFunction,
    stream: Arc<CudaStream>,
    args: ArgSlots,
    block_size: u32,
}

impl CudaKernel {
    pub(crate) fn new(name: String, func: CudaFunction, stream: Arc<CudaStream>) -> Self {
        Self {
            name,
            func,
            stream,
            args: ArgSlots::default(),
            block_size: BLOCK_SIZE,
        }
    }

    /// Use a different threads-per-block count for this kernel
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size.max(1);
        self
    }
}

impl std::fmt::Debug for CudaKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaKernel")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

impl Kernel for CudaKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_arg(&mut self, index: usize, arg: KernelArg) -> Result<()> {
        self.args.set(index, arg);
        Ok(())
    }

    fn arg(&self, index: usize) -> Option<KernelArg> {
        self.args.get(index)
    }

    fn execute(&mut self, work_units: usize) -> Result<()> {
        if work_units == 0 {
            return Err(Error::EmptyLaunch {
                kernel: self.name.clone(),
            });
        }
        let bound = self.args.bound(&self.name)?;
        let cfg = launch_config(work_units, self.block_size)?;

        let mut builder = self.stream.launch_builder(&self.func);
        for arg in &bound {
            match arg {
                KernelArg::F32(v) => builder.arg(v),
                KernelArg::F64(v) => builder.arg(v),
                KernelArg::I32(v) => builder.arg(v),
                KernelArg::U32(v) => builder.arg(v),
                KernelArg::Ptr(v) => builder.arg(v),
            };
        }

        // SAFETY: argument types and order are fixed by whoever built the
        // kernel; every slot up to the highest bound one is present.
        unsafe { builder.launch(cfg) }
            .map(|_| ())
            .map_err(|e| driver_error(e, "Error launching kernel"))
    }
}
