//! Host device identity

use crate::runtime::Device;

/// The host CPU as a constraint-kernel device
///
/// There is exactly one; kernels targeting it run on whichever thread calls
/// [`Kernel::execute`](crate::runtime::Kernel::execute).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuDevice;

impl CpuDevice {
    /// The host device
    pub fn new() -> Self {
        CpuDevice
    }
}

impl Device for CpuDevice {
    fn id(&self) -> usize {
        0
    }

    fn name(&self) -> String {
        "cpu".to_string()
    }
}
