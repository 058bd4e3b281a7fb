//! The kernel context object.
//!
//! A [`Kernel`] owns the four subsystems — queue set, heap, dispatcher and
//! the placement region backing the heap — and exposes the operations the
//! shell drives. Everything takes `&mut self`, so tests build as many
//! independent kernels as they like; embedders that want a single shared
//! instance go through [`KERNEL`] / [`with_kernel`], which serialize access
//! behind a spin mutex.

use spin::{Lazy, Mutex};

use crate::context::{Context, OpCode};
use crate::dispatcher::Dispatcher;
use crate::memory::{
    AllocError, BumpRegion, Heap, DEFAULT_ARENA_BASE, DEFAULT_ARENA_CAPACITY,
};
use crate::pcb::{valid_priority, Pcb, ProcessClass, ProcessError};
use crate::queue::{QueueId, QueueSet};

pub struct Kernel {
    queues: QueueSet,
    heap: Heap,
    dispatcher: Dispatcher,
    backing: BumpRegion,
}

impl Kernel {
    pub fn new() -> Self {
        Self::with_arena(DEFAULT_ARENA_BASE, DEFAULT_ARENA_CAPACITY)
    }

    /// Builds a kernel whose heap will be placed inside the given region.
    pub fn with_arena(base: usize, capacity: usize) -> Self {
        Self {
            queues: QueueSet::new(),
            heap: Heap::new(),
            dispatcher: Dispatcher::new(),
            backing: BumpRegion::new(base, capacity),
        }
    }

    /// Creates a ready, unsuspended process. The name must be unused by any
    /// queued process and by the running one.
    pub fn create_process(
        &mut self,
        name: &str,
        class: ProcessClass,
        priority: u8,
    ) -> Result<(), ProcessError> {
        if self.queues.find(name).is_some() || self.is_running(name) {
            return Err(ProcessError::AlreadyExists);
        }
        let pcb = Pcb::new(name, class, priority)?;
        self.requeue(pcb);
        Ok(())
    }

    /// Removes the named process from its queue and releases its resources.
    /// The running process is not in any queue and cannot be deleted.
    pub fn delete_process(&mut self, name: &str) -> Result<(), ProcessError> {
        self.queues
            .remove(name)
            .map(drop)
            .ok_or(ProcessError::NotFound)
    }

    /// Moves the named process to the blocked queue matching its suspension
    /// flag. Re-blocking an already blocked process sends it to the tail.
    pub fn block(&mut self, name: &str) -> Result<(), ProcessError> {
        self.reroute(name, |pcb| pcb.state = crate::pcb::State::Blocked)
    }

    /// Moves the named process back to the ready queue matching its
    /// suspension flag, at its priority position.
    pub fn unblock(&mut self, name: &str) -> Result<(), ProcessError> {
        self.reroute(name, |pcb| pcb.state = crate::pcb::State::Ready)
    }

    /// Sets the suspension flag and moves the process to the suspended
    /// variant of its queue. Already-suspended processes keep their queue
    /// position untouched.
    pub fn suspend(&mut self, name: &str) -> Result<(), ProcessError> {
        match self.queues.find(name) {
            None => Err(ProcessError::NotFound),
            Some(pcb) if pcb.suspended => Ok(()),
            Some(_) => self.reroute(name, |pcb| pcb.suspended = true),
        }
    }

    /// Clears the suspension flag and moves the process back to the active
    /// variant of its queue. Already-active processes are left where they
    /// are.
    pub fn resume(&mut self, name: &str) -> Result<(), ProcessError> {
        match self.queues.find(name) {
            None => Err(ProcessError::NotFound),
            Some(pcb) if !pcb.suspended => Ok(()),
            Some(_) => self.reroute(name, |pcb| pcb.suspended = false),
        }
    }

    /// Resumes every suspended process, ready-class first, preserving each
    /// queue's internal order.
    pub fn resume_all(&mut self) {
        for id in [QueueId::SuspendedReady, QueueId::SuspendedBlocked] {
            while let Some(mut pcb) = self.queues.pop(id) {
                pcb.suspended = false;
                self.requeue(pcb);
            }
        }
    }

    /// Changes the named process's priority and re-inserts it so the new
    /// priority takes effect on queue ordering.
    pub fn set_priority(&mut self, name: &str, priority: u8) -> Result<(), ProcessError> {
        if !valid_priority(priority) {
            return Err(ProcessError::InvalidParameter);
        }
        self.reroute(name, |pcb| {
            // Validated above, cannot fail.
            let _ = pcb.set_priority(priority);
        })
    }

    pub fn init_heap(&mut self, size: usize) -> Result<(), AllocError> {
        self.heap.init(size, &mut self.backing)
    }

    /// Allocates heap memory tagged with the running process's name, or
    /// `"bootstrap"` when called from outside any process.
    pub fn alloc_mem(&mut self, size: usize) -> Result<usize, AllocError> {
        let owner = self.dispatcher.current_name();
        self.heap.allocate(size, &owner)
    }

    pub fn free_mem(&mut self, addr: usize) -> Result<(), AllocError> {
        self.heap.deallocate(addr)
    }

    pub fn heap_is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Hands one trap to the dispatcher. See [`Dispatcher::sys_call`].
    pub fn sys_call(&mut self, op: OpCode, trapped: Context) -> Context {
        self.dispatcher.sys_call(&mut self.queues, op, trapped)
    }

    /// Every known process: all queued PCBs plus the running one.
    pub fn process_count(&self) -> usize {
        self.queues.total_len() + self.dispatcher.current().is_some() as usize
    }

    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn running(&self) -> Option<&Pcb> {
        self.dispatcher.current()
    }

    fn is_running(&self, name: &str) -> bool {
        self.dispatcher
            .current()
            .map_or(false, |pcb| pcb.name() == name)
    }

    /// Pulls the named PCB out of its queue, applies `edit`, and routes it
    /// back in under its (possibly changed) state and flags.
    fn reroute(
        &mut self,
        name: &str,
        edit: impl FnOnce(&mut Pcb),
    ) -> Result<(), ProcessError> {
        let mut pcb = self.queues.remove(name).ok_or(ProcessError::NotFound)?;
        edit(&mut pcb);
        self.requeue(pcb);
        Ok(())
    }

    fn requeue(&mut self, pcb: Pcb) {
        // Cannot fail: the name is free at this point and the state is
        // never Running on this path.
        let _requeued = self.queues.insert(pcb);
        debug_assert!(_requeued.is_ok(), "requeue collided with a queued name");
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared kernel instance for embedders.
pub static KERNEL: Lazy<Mutex<Kernel>> = Lazy::new(|| Mutex::new(Kernel::new()));

/// Runs `f` with the shared kernel locked.
pub fn with_kernel<F, R>(f: F) -> R
where
    F: FnOnce(&mut Kernel) -> R,
{
    let mut kernel = KERNEL.lock();
    f(&mut kernel)
}
