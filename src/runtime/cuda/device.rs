//! CUDA Device implementation

use crate::error::Result;
use crate::runtime::Device;

use super::driver_error;

/// CUDA Device using cudarc
///
/// Identifies one GPU by ordinal. The context for it is created by
/// [`CudaClient::new`](super::CudaClient::new).
#[derive(Clone, Debug)]
pub struct CudaDevice {
    /// Index of the GPU device (0, 1, 2, ...)
    pub(crate) index: usize,
}

impl CudaDevice {
    /// Create a new CUDA device
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// Whether this device can map pinned host memory into its address space.
    ///
    /// The convergence flag word requires it.
    pub fn can_map_host_memory(&self) -> Result<bool> {
        let device = cudarc::driver::result::device::get(self.index as i32)
            .map_err(|e| driver_error(e, "Error querying CUDA device"))?;
        // SAFETY: `device` is a valid handle returned by cuDeviceGet.
        let value = unsafe {
            cudarc::driver::result::device::get_attribute(
                device,
                cudarc::driver::sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_CAN_MAP_HOST_MEMORY,
            )
        }
        .map_err(|e| driver_error(e, "Error querying host memory mapping support"))?;
        Ok(value != 0)
    }
}

impl Device for CudaDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("cuda:{}", self.index)
    }
}

impl Default for CudaDevice {
    fn default() -> Self {
        Self::new(0)
    }
}
