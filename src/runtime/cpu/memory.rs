//! Host-side storage backing the CPU runtime
//!
//! Buffers, mapped words and events all live in one registry keyed by
//! non-zero handles drawn from a shared counter, so a handle never names two
//! objects and `0` stays free to mean "null".

use bytemuck::Pod;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::runtime::{DeviceArray, MappedWord};

/// One host buffer, stored as `u64` words so any `Pod` element type up to
/// 8-byte alignment can be viewed in place.
#[derive(Debug)]
struct HostBuffer {
    storage: Vec<u64>,
    len: usize,
    elem_size: usize,
}

impl HostBuffer {
    fn zeroed(len: usize, elem_size: usize) -> Self {
        let words = (len * elem_size).div_ceil(8);
        Self {
            storage: vec![0u64; words],
            len,
            elem_size,
        }
    }

    fn check_elem<T: Pod>(&self, handle: u64) -> Result<()> {
        if std::mem::size_of::<T>() != self.elem_size {
            return Err(Error::InvalidArgument {
                arg: "T",
                reason: format!(
                    "buffer 0x{:x} holds {}-byte elements, requested {}-byte view",
                    handle,
                    self.elem_size,
                    std::mem::size_of::<T>()
                ),
            });
        }
        Ok(())
    }

    fn read<T: Pod>(&self, handle: u64) -> Result<Vec<T>> {
        self.check_elem::<T>(handle)?;
        let bytes = &bytemuck::cast_slice::<u64, u8>(&self.storage)[..self.len * self.elem_size];
        let values: &[T] = bytemuck::try_cast_slice(bytes)
            .map_err(|e| Error::Internal(format!("host buffer 0x{:x} view failed: {}", handle, e)))?;
        Ok(values.to_vec())
    }

    fn write<T: Pod>(&mut self, handle: u64, data: &[T]) -> Result<()> {
        self.check_elem::<T>(handle)?;
        if data.len() != self.len {
            return Err(Error::InvalidArgument {
                arg: "data",
                reason: format!(
                    "buffer 0x{:x} has {} elements, got {}",
                    handle,
                    self.len,
                    data.len()
                ),
            });
        }
        let n = self.len * self.elem_size;
        bytemuck::cast_slice_mut::<u64, u8>(&mut self.storage)[..n]
            .copy_from_slice(bytemuck::cast_slice(data));
        Ok(())
    }
}

/// Registry of everything a [`CpuClient`](super::CpuClient) has allocated.
#[derive(Debug)]
pub(crate) struct HostMemory {
    next_handle: AtomicU64,
    buffers: Mutex<HashMap<u64, HostBuffer>>,
    words: Mutex<HashMap<u64, Arc<AtomicI32>>>,
    events: Mutex<HashSet<u64>>,
}

impl Default for HostMemory {
    fn default() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            buffers: Mutex::new(HashMap::new()),
            words: Mutex::new(HashMap::new()),
            events: Mutex::new(HashSet::new()),
        }
    }
}

impl HostMemory {
    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn alloc_buffer(&self, len: usize, elem_size: usize) -> DeviceArray {
        let handle = self.next_handle();
        self.buffers
            .lock()
            .insert(handle, HostBuffer::zeroed(len, elem_size));
        DeviceArray::new(handle, len, elem_size)
    }

    pub(crate) fn free_buffer(&self, handle: u64) -> bool {
        self.buffers.lock().remove(&handle).is_some()
    }

    pub(crate) fn read<T: Pod>(&self, handle: u64) -> Result<Vec<T>> {
        let buffers = self.buffers.lock();
        let buffer = buffers
            .get(&handle)
            .ok_or(Error::UnknownBuffer { handle })?;
        buffer.read(handle)
    }

    pub(crate) fn write<T: Pod>(&self, handle: u64, data: &[T]) -> Result<()> {
        let mut buffers = self.buffers.lock();
        let buffer = buffers
            .get_mut(&handle)
            .ok_or(Error::UnknownBuffer { handle })?;
        buffer.write(handle, data)
    }

    pub(crate) fn word(&self, address: u64) -> Result<Arc<AtomicI32>> {
        self.words
            .lock()
            .get(&address)
            .cloned()
            .ok_or(Error::UnknownBuffer { handle: address })
    }

    pub(crate) fn live_words(&self) -> usize {
        self.words.lock().len()
    }

    pub(crate) fn live_events(&self) -> usize {
        self.events.lock().len()
    }
}

/// Host-mapped flag word of the CPU runtime
///
/// Kernels reach the value through its device address; the host reads the
/// same cell directly.
#[derive(Debug)]
pub struct CpuMappedWord {
    address: u64,
    cell: Arc<AtomicI32>,
    memory: Arc<HostMemory>,
}

impl CpuMappedWord {
    pub(crate) fn new(memory: &Arc<HostMemory>) -> Self {
        let address = memory.next_handle();
        let cell = Arc::new(AtomicI32::new(0));
        memory.words.lock().insert(address, cell.clone());
        Self {
            address,
            cell,
            memory: memory.clone(),
        }
    }
}

impl MappedWord for CpuMappedWord {
    fn device_address(&self) -> u64 {
        self.address
    }

    fn load(&self) -> i32 {
        self.cell.load(Ordering::Acquire)
    }

    fn store(&self, value: i32) {
        self.cell.store(value, Ordering::Release);
    }
}

impl Drop for CpuMappedWord {
    fn drop(&mut self) {
        self.memory.words.lock().remove(&self.address);
    }
}

/// Stream checkpoint of the CPU runtime
///
/// Host kernels complete before `execute` returns, so a recorded event is
/// always already reached; the event exists to make the synchronization
/// points observable.
#[derive(Debug)]
pub struct CpuEvent {
    id: u64,
    memory: Arc<HostMemory>,
}

impl CpuEvent {
    pub(crate) fn new(memory: &Arc<HostMemory>) -> Self {
        let id = memory.next_handle();
        memory.events.lock().insert(id);
        Self {
            id,
            memory: memory.clone(),
        }
    }

    /// Identifier used in the client's activity log
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CpuEvent {
    fn drop(&mut self) {
        self.memory.events.lock().remove(&self.id);
    }
}
