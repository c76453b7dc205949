//! CUDA runtime adapter

use super::client::CudaClient;
use super::device::CudaDevice;
use super::kernel::CudaKernel;
use super::sync::{CudaEvent, CudaMappedWord};
use crate::error::Result;
use crate::runtime::Runtime;

/// CUDA Runtime adapter
///
/// Implements the generic Runtime trait for the CUDA backend.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;
    type Kernel = CudaKernel;
    type Event = CudaEvent;
    type MappedWord = CudaMappedWord;

    fn name() -> &'static str {
        "cuda"
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        CudaClient::new(device.clone())
    }
}

/// Check if CUDA is available on this system
///
/// The driver library is loaded dynamically; a missing library panics inside
/// cudarc, which is caught here and reported as "unavailable".
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| CudaClient::new(CudaDevice::new(0)).is_ok()).unwrap_or(false)
}
