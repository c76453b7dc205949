//! Host kernels: closures with positional argument slots

use bytemuck::Pod;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::client::{CpuClient, HostFault, StreamOp};
use crate::error::{Error, Result};
use crate::runtime::kernel::ArgSlots;
use crate::runtime::{Kernel, KernelArg};

pub(crate) type HostKernelFn = dyn Fn(&HostLaunch<'_>) -> Result<()> + Send + Sync;

/// Kernel of the CPU runtime
pub struct CpuKernel {
    name: String,
    args: ArgSlots,
    body: Arc<HostKernelFn>,
    client: CpuClient,
}

impl CpuKernel {
    pub(crate) fn new(name: String, body: Arc<HostKernelFn>, client: CpuClient) -> Self {
        Self {
            name,
            args: ArgSlots::default(),
            body,
            client,
        }
    }
}

impl std::fmt::Debug for CpuKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuKernel")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl Kernel for CpuKernel {
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
        self.client
            .check_fault(HostFault::Launch(self.name.clone()), "Error launching kernel")?;
        self.client.log(|| StreamOp::Launch {
            kernel: self.name.clone(),
            work_units,
            args: self.args.snapshot(),
        });

        let launch = HostLaunch {
            kernel: &self.name,
            args: &self.args,
            work_units,
            client: &self.client,
        };
        (self.body)(&launch)
    }
}

/// View of one host kernel launch handed to the kernel body
pub struct HostLaunch<'a> {
    kernel: &'a str,
    args: &'a ArgSlots,
    work_units: usize,
    client: &'a CpuClient,
}

impl HostLaunch<'_> {
    /// Name of the running kernel
    pub fn kernel_name(&self) -> &str {
        self.kernel
    }

    /// Work units this launch covers
    pub fn work_units(&self) -> usize {
        self.work_units
    }

    /// Bound value of slot `index`
    pub fn arg(&self, index: usize) -> Result<KernelArg> {
        self.args.get(index).ok_or_else(|| Error::MissingKernelArg {
            kernel: self.kernel.to_string(),
            index,
        })
    }

    /// Slot `index` as a real scalar (`F32` widened to `f64`)
    pub fn real(&self, index: usize) -> Result<f64> {
        let arg = self.arg(index)?;
        arg.as_real().ok_or_else(|| self.mismatch(index, "a real scalar", arg))
    }

    /// Slot `index` as an `i32`
    pub fn int(&self, index: usize) -> Result<i32> {
        let arg = self.arg(index)?;
        arg.as_i32().ok_or_else(|| self.mismatch(index, "an i32", arg))
    }

    /// Slot `index` as a device address
    pub fn ptr(&self, index: usize) -> Result<u64> {
        let arg = self.arg(index)?;
        arg.as_ptr().ok_or_else(|| self.mismatch(index, "a pointer", arg))
    }

    /// Copy of the buffer bound at slot `index`
    pub fn read<T: Pod>(&self, index: usize) -> Result<Vec<T>> {
        self.client.memory.read(self.ptr(index)?)
    }

    /// Overwrite the buffer bound at slot `index`
    pub fn write<T: Pod>(&self, index: usize, data: &[T]) -> Result<()> {
        self.client.memory.write(self.ptr(index)?, data)
    }

    /// Read the mapped word bound at slot `index`
    pub fn load_word(&self, index: usize) -> Result<i32> {
        Ok(self.client.memory.word(self.ptr(index)?)?.load(Ordering::Acquire))
    }

    /// Write the mapped word bound at slot `index`
    pub fn store_word(&self, index: usize, value: i32) -> Result<()> {
        self.client
            .memory
            .word(self.ptr(index)?)?
            .store(value, Ordering::Release);
        Ok(())
    }

    fn mismatch(&self, index: usize, expected: &str, got: KernelArg) -> Error {
        Error::InvalidArgument {
            arg: "kernel argument",
            reason: format!(
                "kernel '{}' slot {} expected {}, found {:?}",
                self.kernel, index, expected, got
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuDevice;

    #[test]
    fn test_kernel_reads_and_writes_bound_buffer() {
        let client = CpuClient::new(CpuDevice::new());
        let buffer = client.alloc_array(&[1.0f32, 2.0, 3.0]).unwrap();
        let mut kernel = client.kernel("scale", |launch| {
            let factor = launch.real(1)? as f32;
            let data: Vec<f32> = launch.read(0)?;
            let scaled: Vec<f32> = data.iter().map(|x| x * factor).collect();
            launch.write(0, &scaled)
        });
        kernel.set_arg(0, buffer.as_arg()).unwrap();
        kernel.set_arg(1, KernelArg::F32(2.0)).unwrap();
        kernel.execute(buffer.len()).unwrap();

        assert_eq!(client.read_array::<f32>(&buffer).unwrap(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_empty_launch_rejected_and_not_logged() {
        let client = CpuClient::new(CpuDevice::new()).with_activity_log();
        let mut kernel = client.noop_kernel("settle_pos");
        assert!(matches!(kernel.execute(0), Err(Error::EmptyLaunch { .. })));
        assert!(client.launches().is_empty());
    }

    #[test]
    fn test_type_mismatch_reports_slot() {
        let client = CpuClient::new(CpuDevice::new());
        let mut kernel = client.kernel("k", |launch| launch.int(0).map(|_| ()));
        kernel.set_arg(0, KernelArg::F64(1.0)).unwrap();
        let err = kernel.execute(1).unwrap_err();
        assert!(err.to_string().contains("slot 0 expected an i32"));
    }

    #[test]
    fn test_injected_launch_fault() {
        let client = CpuClient::new(CpuDevice::new());
        client.inject_fault(HostFault::Launch("k".into()), 719);
        let mut kernel = client.noop_kernel("k");
        assert_eq!(kernel.execute(1).unwrap_err().code(), Some(719));
        assert!(kernel.execute(1).is_ok());
    }
}
