//! CPU client: host memory, kernel construction and the activity log

use bytemuck::Pod;
use parking_lot::Mutex;
use std::sync::Arc;

use super::device::CpuDevice;
use super::kernel::{CpuKernel, HostLaunch};
use super::memory::{CpuEvent, CpuMappedWord, HostMemory};
use super::runtime::CpuRuntime;
use crate::error::{Error, Result};
use crate::runtime::{DeviceArray, KernelArg, RuntimeClient};

/// One entry of the client's stream activity log
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOp {
    /// Kernel launch with the argument bindings it was launched with
    Launch {
        /// Kernel name
        kernel: String,
        /// Work units requested
        work_units: usize,
        /// Argument slots at launch time
        args: Vec<Option<KernelArg>>,
    },
    /// Event recorded on the stream
    RecordEvent {
        /// Event id
        event: u64,
    },
    /// Host blocked on an event
    SynchronizeEvent {
        /// Event id
        event: u64,
    },
    /// Host blocked on the whole stream
    Synchronize,
}

/// Runtime call that can be made to fail once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostFault {
    /// `create_event`
    CreateEvent,
    /// `record_event`
    RecordEvent,
    /// `synchronize_event`
    SynchronizeEvent,
    /// `alloc_mapped_word`
    AllocMappedWord,
    /// Launch of the named kernel
    Launch(String),
}

#[derive(Debug, Default)]
struct Activity {
    recording: bool,
    ops: Vec<StreamOp>,
    faults: Vec<(HostFault, i32)>,
}

/// CPU client for kernel dispatch
///
/// Clones share memory and the activity log. The log is off unless
/// [`with_activity_log`](Self::with_activity_log) turns it on; injected
/// faults fire either way.
#[derive(Clone, Debug, Default)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    pub(crate) memory: Arc<HostMemory>,
    activity: Arc<Mutex<Activity>>,
}

impl CpuClient {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            memory: Arc::new(HostMemory::default()),
            activity: Arc::new(Mutex::new(Activity::default())),
        }
    }

    /// Record every launch, event record and host block from now on.
    ///
    /// Applies to all clones. The log grows until
    /// [`clear_activity`](Self::clear_activity) is called.
    pub fn with_activity_log(self) -> Self {
        self.activity.lock().recording = true;
        self
    }

    /// Whether stream activity is being recorded
    pub fn is_recording(&self) -> bool {
        self.activity.lock().recording
    }

    /// Build a host kernel from a closure.
    ///
    /// The closure runs synchronously inside [`Kernel::execute`](crate::runtime::Kernel::execute).
    pub fn kernel<F>(&self, name: impl Into<String>, body: F) -> CpuKernel
    where
        F: Fn(&HostLaunch<'_>) -> Result<()> + Send + Sync + 'static,
    {
        CpuKernel::new(name.into(), Arc::new(body), self.clone())
    }

    /// Build a kernel that does nothing when launched.
    pub fn noop_kernel(&self, name: impl Into<String>) -> CpuKernel {
        self.kernel(name, |_| Ok(()))
    }

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------

    /// Allocate a buffer initialized from `data`
    pub fn alloc_array<T: Pod>(&self, data: &[T]) -> Result<DeviceArray> {
        let array = self
            .memory
            .alloc_buffer(data.len(), std::mem::size_of::<T>());
        self.memory.write(array.handle(), data)?;
        Ok(array)
    }

    /// Allocate a zero-filled buffer of `len` elements of `T`
    pub fn alloc_zeroed<T: Pod>(&self, len: usize) -> DeviceArray {
        self.memory.alloc_buffer(len, std::mem::size_of::<T>())
    }

    /// Copy a buffer's contents to a new vector
    pub fn read_array<T: Pod>(&self, array: &DeviceArray) -> Result<Vec<T>> {
        self.memory.read(array.handle())
    }

    /// Overwrite a buffer's contents
    pub fn write_array<T: Pod>(&self, array: &DeviceArray, data: &[T]) -> Result<()> {
        self.memory.write(array.handle(), data)
    }

    /// Release a buffer
    pub fn free_array(&self, array: DeviceArray) -> Result<()> {
        if self.memory.free_buffer(array.handle()) {
            Ok(())
        } else {
            Err(Error::UnknownBuffer {
                handle: array.handle(),
            })
        }
    }

    /// Number of mapped words currently allocated
    pub fn live_mapped_words(&self) -> usize {
        self.memory.live_words()
    }

    /// Number of events currently alive
    pub fn live_events(&self) -> usize {
        self.memory.live_events()
    }

    // ------------------------------------------------------------------
    // Instrumentation
    // ------------------------------------------------------------------

    /// Make the next matching runtime call fail with status `code`
    pub fn inject_fault(&self, fault: HostFault, code: i32) {
        self.activity.lock().faults.push((fault, code));
    }

    /// Full activity log in stream order
    pub fn activity(&self) -> Vec<StreamOp> {
        self.activity.lock().ops.clone()
    }

    /// Forget all logged activity (pending faults are kept)
    pub fn clear_activity(&self) {
        self.activity.lock().ops.clear();
    }

    /// Launched kernel names in order
    pub fn launches(&self) -> Vec<String> {
        self.activity
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                StreamOp::Launch { kernel, .. } => Some(kernel.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of launches of the named kernel
    pub fn launch_count(&self, kernel: &str) -> usize {
        self.activity
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, StreamOp::Launch { kernel: k, .. } if k == kernel))
            .count()
    }

    /// Number of event recordings
    pub fn event_records(&self) -> usize {
        self.count_ops(|op| matches!(op, StreamOp::RecordEvent { .. }))
    }

    /// Number of host blocks on an event or on the whole stream
    pub fn host_syncs(&self) -> usize {
        self.count_ops(|op| {
            matches!(op, StreamOp::SynchronizeEvent { .. } | StreamOp::Synchronize)
        })
    }

    fn count_ops(&self, pred: impl Fn(&StreamOp) -> bool) -> usize {
        self.activity.lock().ops.iter().filter(|op| pred(op)).count()
    }

    /// Append to the log; `op` is only built when recording is on.
    pub(crate) fn log(&self, op: impl FnOnce() -> StreamOp) {
        let mut activity = self.activity.lock();
        if activity.recording {
            activity.ops.push(op());
        }
    }

    /// Consume a pending fault, turning it into a runtime error.
    #[track_caller]
    pub(crate) fn check_fault(&self, fault: HostFault, context: &'static str) -> Result<()> {
        let mut activity = self.activity.lock();
        if let Some(pos) = activity.faults.iter().position(|(f, _)| *f == fault) {
            let (_, code) = activity.faults.remove(pos);
            return Err(Error::runtime(context, code, "injected host fault"));
        }
        Ok(())
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // Host kernels finish inside execute; only the block is logged
        self.log(|| StreamOp::Synchronize);
        Ok(())
    }

    fn create_event(&self) -> Result<CpuEvent> {
        self.check_fault(HostFault::CreateEvent, "Error creating event")?;
        Ok(CpuEvent::new(&self.memory))
    }

    fn record_event(&self, event: &CpuEvent) -> Result<()> {
        self.check_fault(HostFault::RecordEvent, "Error recording event")?;
        self.log(|| StreamOp::RecordEvent { event: event.id() });
        Ok(())
    }

    fn synchronize_event(&self, event: &CpuEvent) -> Result<()> {
        self.check_fault(HostFault::SynchronizeEvent, "Error synchronizing on event")?;
        self.log(|| StreamOp::SynchronizeEvent { event: event.id() });
        Ok(())
    }

    fn alloc_mapped_word(&self) -> Result<CpuMappedWord> {
        self.check_fault(HostFault::AllocMappedWord, "Error allocating pinned memory")?;
        Ok(CpuMappedWord::new(&self.memory))
    }
}
