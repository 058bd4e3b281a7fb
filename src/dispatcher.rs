//! Cooperative dispatcher.
//!
//! Every trap into the kernel lands here as a [`sys_call`]: the trapping
//! process hands over its saved [`Context`] and an [`OpCode`] saying what it
//! wants, and gets back the context of whichever process should run next.
//! The function is pure dispatch — it touches only the queue set it is
//! given and its own two slots, and performs no I/O.
//!
//! The very first trap comes from the boot path rather than a process; its
//! context is stashed so the machine has somewhere to land once the ready
//! queue drains.
//!
//! [`sys_call`]: Dispatcher::sys_call

use alloc::string::String;

use crate::context::{Context, OpCode};
use crate::pcb::{Pcb, State};
use crate::queue::{QueueId, QueueSet};

/// Name reported as the allocation owner when no process is running.
pub const BOOT_OWNER: &str = "bootstrap";

pub struct Dispatcher {
    /// The running process. Exactly this PCB is outside the queue set.
    current: Option<Pcb>,
    /// Saved boot-path context, filled on the first trap that arrives while
    /// no process is running.
    bootstrap: Option<Context>,
}

impl Dispatcher {
    pub const fn new() -> Self {
        Self {
            current: None,
            bootstrap: None,
        }
    }

    /// Handles one trap and picks the next context to resume.
    ///
    /// The outgoing process is retired first: `Exit` drops its PCB, every
    /// other op-code saves `trapped` into it and requeues it as ready.
    /// `Read` and `Write` are accepted but not yet wired to a device, so
    /// they behave as a yield. If the trap arrived while no process was
    /// running, `trapped` is the boot-path context and is stashed instead.
    ///
    /// Then the highest-priority ready process (if any) becomes the running
    /// one and its context is returned; with an empty ready queue the
    /// stashed boot context is returned so the machine resumes where boot
    /// left off.
    pub fn sys_call(&mut self, queues: &mut QueueSet, op: OpCode, trapped: Context) -> Context {
        match self.current.take() {
            None => {
                self.bootstrap = Some(trapped);
            }
            Some(prev) => match op {
                OpCode::Exit => drop(prev),
                OpCode::Idle | OpCode::Read | OpCode::Write => {
                    let mut prev = prev;
                    prev.set_context(trapped);
                    prev.state = State::Ready;
                    // The name cannot collide: the PCB just came out of the
                    // running slot, not the queues.
                    let _requeued = queues.insert(prev);
                    debug_assert!(_requeued.is_ok(), "running PCB name collided on requeue");
                }
            },
        }

        match queues.pop(QueueId::Ready) {
            Some(mut next) => {
                next.state = State::Running;
                let resume = next.context();
                self.current = Some(next);
                resume
            }
            None => self.bootstrap.unwrap_or(trapped),
        }
    }

    /// The running process, if any.
    pub fn current(&self) -> Option<&Pcb> {
        self.current.as_ref()
    }

    /// Name to tag heap allocations with: the running process's, or
    /// [`BOOT_OWNER`] between processes.
    pub fn current_name(&self) -> String {
        match &self.current {
            Some(pcb) => String::from(pcb.name()),
            None => String::from(BOOT_OWNER),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
