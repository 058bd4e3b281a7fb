//! # mikros
//!
//! A teaching operating-system kernel core for x86: process control blocks,
//! a four-queue cooperative scheduler, a boundary-tag heap allocator, and
//! the dispatch protocol that ties them together.
//!
//! The crate is the machine-independent half of a kernel. Descriptor tables,
//! interrupt delivery, paging, and serial I/O live in the embedding kernel;
//! this crate only assumes a caller that delivers traps ([`Kernel::sys_call`])
//! and copies the returned [`Context`] back into hardware registers.
//!
//! ## Subsystems
//!
//! - [`pcb`]: process descriptors and their owned stack regions
//! - [`queue`]: the ready/blocked/suspended scheduling queues
//! - [`memory`]: the boundary-tag heap over a pluggable backing region
//! - [`dispatcher`]: the cooperative context-switch protocol
//! - [`shell`]: text commands mapping 1:1 onto the kernel operations
//!
//! Everything is driven through a [`Kernel`] instance. A process-wide
//! instance is available as [`kernel::KERNEL`]; tests construct their own.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod context;
pub mod dispatcher;
pub mod kernel;
pub mod memory;
pub mod pcb;
pub mod queue;
pub mod shell;

pub use context::{Context, OpCode};
pub use dispatcher::Dispatcher;
pub use kernel::Kernel;
pub use memory::heap::Heap;
pub use memory::AllocError;
pub use pcb::{Pcb, ProcessClass, ProcessError, State};
pub use queue::{QueueId, QueueSet};
pub use shell::{CommandExecutor, CommandResult};
