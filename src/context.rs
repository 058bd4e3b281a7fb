//! Saved register context and trap op-codes.
//!
//! A [`Context`] is the register block the trap shim pushes when a process
//! traps into the kernel, and the block it pops before resuming whatever the
//! dispatcher picked next. The dispatcher itself only moves these values
//! around; it never interprets individual registers.

/// Hardware register block saved on a trap, in push order.
///
/// The layout is fixed by the trap shim's stack frame, hence `repr(C)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Context {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

/// Kernel code segment selector.
const KERNEL_CS: u32 = 0x8;
/// Kernel data segment selector.
const KERNEL_DS: u32 = 0x10;
/// Initial EFLAGS: interrupts enabled, reserved bit set.
const INITIAL_EFLAGS: u32 = 0x202;

impl Context {
    /// Builds an initial frame for a process that has never run: kernel
    /// segments, interrupts enabled, instruction pointer at `entry`.
    ///
    /// `esp`/`ebp` are left zero; the trap shim knows where the physical
    /// stack lives and fills them in when it first loads the frame.
    pub fn new(entry: u32) -> Self {
        Self {
            gs: KERNEL_DS,
            fs: KERNEL_DS,
            es: KERNEL_DS,
            ds: KERNEL_DS,
            cs: KERNEL_CS,
            eip: entry,
            eflags: INITIAL_EFLAGS,
            ..Self::default()
        }
    }
}

/// Operation requested by the trapping process.
///
/// `Read` and `Write` are reserved for device I/O and are not interpreted by
/// this core; the dispatcher treats them as a yield.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum OpCode {
    Exit = 0,
    Idle = 1,
    Read = 2,
    Write = 3,
}

impl OpCode {
    /// Maps a raw op-code from the trap frame; `None` for anything the
    /// protocol does not define.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Exit),
            1 => Some(Self::Idle),
            2 => Some(Self::Read),
            3 => Some(Self::Write),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }
}
