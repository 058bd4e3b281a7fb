//! Process control blocks.
//!
//! A [`Pcb`] is the descriptor for one schedulable unit of execution: its
//! name, scheduling class and priority, state flags, and an owned stack
//! region whose top holds the saved register context. Ownership does the
//! lifetime bookkeeping: a live PCB is held by exactly one scheduling queue
//! or by the dispatcher's current slot, and dropping it releases the stack,
//! the name, and the descriptor in one go.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use core::fmt;
use core::mem::size_of;

use crate::context::Context;

/// Bytes of stack owned by every process.
pub const STACK_SIZE: usize = 4096;
/// Upper bound on process name length, in bytes.
pub const NAME_CAPACITY: usize = 256;
/// Highest (and therefore most urgent) valid priority.
pub const PRIORITY_MAX: u8 = 9;

/// Scheduling class of a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ProcessClass {
    System = 0,
    Application = 1,
}

impl ProcessClass {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::System),
            1 => Some(Self::Application),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Application => f.write_str("application"),
        }
    }
}

/// Execution state of a process. `Running` processes are never queued; they
/// occupy the dispatcher's current slot instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum State {
    Blocked = 0,
    Ready = 1,
    Running = 2,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocked => f.write_str("blocked"),
            Self::Ready => f.write_str("ready"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// Process-management errors, rendered as status text by the shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessError {
    InvalidParameter,
    NotFound,
    AlreadyExists,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => f.write_str("invalid parameter"),
            Self::NotFound => f.write_str("no such process"),
            Self::AlreadyExists => f.write_str("process name already exists"),
        }
    }
}

/// The owned stack region of a process: a contiguous `STACK_SIZE`-byte
/// buffer with the saved register context at its top. The `repr(C)` layout
/// puts `context` at the highest addresses, which is where the trap shim
/// expects to find a saved frame.
#[repr(C)]
pub struct ProcessStack {
    data: [u8; STACK_SIZE - size_of::<Context>()],
    pub context: Context,
}

impl ProcessStack {
    fn new() -> Self {
        Self {
            data: [0; STACK_SIZE - size_of::<Context>()],
            context: Context::new(0),
        }
    }
}

/// Checks that a process name is usable: non-empty and within capacity.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= NAME_CAPACITY
}

/// Checks that a priority is within `0..=PRIORITY_MAX`.
pub fn valid_priority(priority: u8) -> bool {
    priority <= PRIORITY_MAX
}

/// Process control block.
pub struct Pcb {
    name: String,
    class: ProcessClass,
    priority: u8,
    pub suspended: bool,
    pub state: State,
    stack: Box<ProcessStack>,
}

impl Pcb {
    /// Creates a descriptor with a zeroed stack and a default context at the
    /// stack top. New processes start ready and not suspended.
    ///
    /// Fails with `InvalidParameter` when the name or priority is out of
    /// range; the class cannot be invalid by construction.
    pub fn new(name: &str, class: ProcessClass, priority: u8) -> Result<Self, ProcessError> {
        if !valid_name(name) || !valid_priority(priority) {
            return Err(ProcessError::InvalidParameter);
        }
        Ok(Self {
            name: name.to_string(),
            class,
            priority,
            suspended: false,
            state: State::Ready,
            stack: Box::new(ProcessStack::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> ProcessClass {
        self.class
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Changes the priority. The caller is responsible for re-inserting the
    /// PCB into its queue so the new priority takes effect on ordering.
    pub fn set_priority(&mut self, priority: u8) -> Result<(), ProcessError> {
        if !valid_priority(priority) {
            return Err(ProcessError::InvalidParameter);
        }
        self.priority = priority;
        Ok(())
    }

    /// The saved register context at the top of the stack region.
    pub fn context(&self) -> Context {
        self.stack.context
    }

    /// Records a new resume point, typically the frame captured at the
    /// process's last trap.
    pub fn set_context(&mut self, context: Context) {
        self.stack.context = context;
    }
}

impl fmt::Debug for Pcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pcb")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("priority", &self.priority)
            .field("suspended", &self.suspended)
            .field("state", &self.state)
            .finish()
    }
}
