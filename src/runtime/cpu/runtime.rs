//! CPU runtime adapter

use super::client::CpuClient;
use super::device::CpuDevice;
use super::kernel::CpuKernel;
use super::memory::{CpuEvent, CpuMappedWord};
use crate::error::Result;
use crate::runtime::Runtime;

/// CPU Runtime adapter
///
/// Every call to [`default_client`](Runtime::default_client) returns a fresh
/// client with its own memory and an empty activity log.
#[derive(Clone, Debug, Default)]
pub struct CpuRuntime;

impl Runtime for CpuRuntime {
    type Device = CpuDevice;
    type Client = CpuClient;
    type Kernel = CpuKernel;
    type Event = CpuEvent;
    type MappedWord = CpuMappedWord;

    fn name() -> &'static str {
        "cpu"
    }

    fn default_device() -> Self::Device {
        CpuDevice::new()
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        Ok(CpuClient::new(*device))
    }
}
