//! Handles to accelerator-resident arrays

use super::KernelArg;

/// Non-owning handle to a typed array in device memory
///
/// The integrator that allocated the array owns it; this crate only passes
/// the handle to kernels. Copying a handle never copies device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceArray {
    handle: u64,
    len: usize,
    elem_size: usize,
}

impl DeviceArray {
    /// Wrap an existing device allocation
    pub fn new(handle: u64, len: usize, elem_size: usize) -> Self {
        Self {
            handle,
            len,
            elem_size,
        }
    }

    /// Device handle (pointer for CUDA, registry key for the host runtime)
    #[inline]
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array has no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of one element in bytes
    #[inline]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Total size in bytes
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.len * self.elem_size
    }

    /// The handle as a kernel argument
    #[inline]
    pub fn as_arg(&self) -> KernelArg {
        KernelArg::Ptr(self.handle)
    }
}

impl From<&DeviceArray> for KernelArg {
    fn from(array: &DeviceArray) -> Self {
        array.as_arg()
    }
}
