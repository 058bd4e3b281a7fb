//! # Command Executor
//!
//! Parses and executes shell commands against a [`Kernel`].
//!
//! ## Available Commands
//!
//! ### General
//! - `help`: Display available commands
//! - `version`: Show kernel version
//! - `exit`: Request shell exit (handled by caller)
//!
//! ### Process Management
//! - `cpcb <name> <class> <priority>`: Create a process
//! - `dpcb <name>`: Delete a process
//! - `bpcb <name>` / `upcb <name>`: Block / unblock a process
//! - `spcb <name>`: Suspend a process
//! - `rpcb <name>` | `rpcb --all`: Resume one or every process
//! - `ppcb <name> <priority>`: Change a process's priority
//! - `showpcb [--all|--ready|--blocked|--suspended|--name <name>]`:
//!   Display process control blocks
//!
//! ### Memory Management
//! - `initheap <size>`: Initialize the heap
//! - `allocmem <size>` / `freemem <addr>`: Allocate / free heap memory
//! - `isempty`: Report whether any memory is allocated
//! - `showmemory [--all|--free|--allocated]`: Display heap block lists
//!
//! ## Architecture
//!
//! Commands return `CommandResult`:
//! - `Output(String)`: Successful output to display
//! - `Error(String)`: Error message to display
//! - `Exit`: Request to exit (handled by caller)

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::str::SplitWhitespace;

use bitflags::bitflags;

use crate::kernel::Kernel;
use crate::memory::{BlockInfo, BlockTag};
use crate::pcb::{Pcb, ProcessClass};
use crate::queue::QueueId;

pub enum CommandResult {
    Output(String),
    Error(String),
    Exit,
}

bitflags! {
    struct PcbFilter: u8 {
        const READY = 1;
        const BLOCKED = 1 << 1;
        const SUSPENDED = 1 << 2;
    }
}

bitflags! {
    struct MemFilter: u8 {
        const FREE = 1;
        const ALLOCATED = 1 << 1;
    }
}

impl PcbFilter {
    /// Queues selected by the filter. The flags combine conjunctively: a
    /// suspended queue is shown only when `--suspended` is given together
    /// with its class flag, and `--suspended` alone selects nothing.
    fn matches(self, id: QueueId) -> bool {
        match id {
            QueueId::Ready => self.contains(Self::READY),
            QueueId::Blocked => self.contains(Self::BLOCKED),
            QueueId::SuspendedReady => self.contains(Self::READY | Self::SUSPENDED),
            QueueId::SuspendedBlocked => self.contains(Self::BLOCKED | Self::SUSPENDED),
        }
    }
}

pub struct CommandExecutor;

impl CommandExecutor {
    pub fn execute(kernel: &mut Kernel, input: &str) -> CommandResult {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CommandResult::Output(String::new());
        }

        let mut parts = trimmed.split_whitespace();
        let cmd = match parts.next() {
            Some(c) => c,
            None => return CommandResult::Error(String::from("Empty command")),
        };

        match cmd {
            "help" => Self::help(),
            "version" => Self::version(),
            "cpcb" => Self::create_pcb(kernel, parts),
            "dpcb" => Self::delete_pcb(kernel, parts),
            "bpcb" => Self::block_pcb(kernel, parts),
            "upcb" => Self::unblock_pcb(kernel, parts),
            "spcb" => Self::suspend_pcb(kernel, parts),
            "rpcb" => Self::resume_pcb(kernel, parts),
            "ppcb" => Self::set_priority(kernel, parts),
            "showpcb" => Self::show_pcb(kernel, parts),
            "initheap" => Self::init_heap(kernel, parts),
            "allocmem" => Self::alloc_mem(kernel, parts),
            "freemem" => Self::free_mem(kernel, parts),
            "isempty" => Self::is_empty(kernel),
            "showmemory" => Self::show_memory(kernel, parts),
            "exit" => CommandResult::Exit,
            _ => CommandResult::Error(format!("Unknown command: {cmd}")),
        }
    }

    fn help() -> CommandResult {
        let help_text = "Available Commands:\n  \
            help                  - Show this help message\n  \
            version               - Show kernel version\n  \
            cpcb <name> <class> <priority>\n                        \
            - Create a process (class: 0/system, 1/application)\n  \
            dpcb <name>           - Delete a process\n  \
            bpcb <name>           - Block a process\n  \
            upcb <name>           - Unblock a process\n  \
            spcb <name>           - Suspend a process\n  \
            rpcb <name>|--all     - Resume a process / all processes\n  \
            ppcb <name> <priority>\n                        \
            - Change a process's priority\n  \
            showpcb [--all|--ready|--blocked|--suspended|--name <name>]\n                        \
            - Display process control blocks\n  \
            initheap <size>       - Initialize the heap\n  \
            allocmem <size>       - Allocate heap memory\n  \
            freemem <addr>        - Free heap memory\n  \
            isempty               - Report whether the heap is empty\n  \
            showmemory [--all|--free|--allocated]\n                        \
            - Display heap block lists\n  \
            exit                  - Exit the shell";
        CommandResult::Output(String::from(help_text))
    }

    fn version() -> CommandResult {
        CommandResult::Output(format!("mikros {}", env!("CARGO_PKG_VERSION")))
    }

    fn create_pcb(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        let (name, class, priority) = match (args.next(), args.next(), args.next()) {
            (Some(n), Some(c), Some(p)) => (n, c, p),
            _ => return CommandResult::Error(String::from("Usage: cpcb <name> <class> <priority>")),
        };
        let class = match parse_class(class) {
            Some(c) => c,
            None => {
                return CommandResult::Error(format!(
                    "Invalid class '{class}' (expected 0/system or 1/application)"
                ))
            }
        };
        let priority: u8 = match priority.parse() {
            Ok(p) => p,
            Err(_) => return CommandResult::Error(format!("Invalid priority '{priority}'")),
        };
        match kernel.create_process(name, class, priority) {
            Ok(()) => CommandResult::Output(format!("Created process '{name}'")),
            Err(e) => CommandResult::Error(format!("Cannot create '{name}': {e}")),
        }
    }

    fn delete_pcb(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        let name = match args.next() {
            Some(n) => n,
            None => return CommandResult::Error(String::from("Usage: dpcb <name>")),
        };
        match kernel.delete_process(name) {
            Ok(()) => CommandResult::Output(format!("Deleted process '{name}'")),
            Err(e) => CommandResult::Error(format!("Cannot delete '{name}': {e}")),
        }
    }

    fn block_pcb(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        let name = match args.next() {
            Some(n) => n,
            None => return CommandResult::Error(String::from("Usage: bpcb <name>")),
        };
        match kernel.block(name) {
            Ok(()) => CommandResult::Output(format!("Blocked process '{name}'")),
            Err(e) => CommandResult::Error(format!("Cannot block '{name}': {e}")),
        }
    }

    fn unblock_pcb(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        let name = match args.next() {
            Some(n) => n,
            None => return CommandResult::Error(String::from("Usage: upcb <name>")),
        };
        match kernel.unblock(name) {
            Ok(()) => CommandResult::Output(format!("Unblocked process '{name}'")),
            Err(e) => CommandResult::Error(format!("Cannot unblock '{name}': {e}")),
        }
    }

    fn suspend_pcb(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        let name = match args.next() {
            Some(n) => n,
            None => return CommandResult::Error(String::from("Usage: spcb <name>")),
        };
        match kernel.suspend(name) {
            Ok(()) => CommandResult::Output(format!("Suspended process '{name}'")),
            Err(e) => CommandResult::Error(format!("Cannot suspend '{name}': {e}")),
        }
    }

    fn resume_pcb(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        match args.next() {
            Some("--all") => {
                kernel.resume_all();
                CommandResult::Output(String::from("Resumed all processes"))
            }
            Some(name) => match kernel.resume(name) {
                Ok(()) => CommandResult::Output(format!("Resumed process '{name}'")),
                Err(e) => CommandResult::Error(format!("Cannot resume '{name}': {e}")),
            },
            None => CommandResult::Error(String::from("Usage: rpcb <name>|--all")),
        }
    }

    fn set_priority(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        let (name, priority) = match (args.next(), args.next()) {
            (Some(n), Some(p)) => (n, p),
            _ => return CommandResult::Error(String::from("Usage: ppcb <name> <priority>")),
        };
        let priority: u8 = match priority.parse() {
            Ok(p) => p,
            Err(_) => return CommandResult::Error(format!("Invalid priority '{priority}'")),
        };
        match kernel.set_priority(name, priority) {
            Ok(()) => CommandResult::Output(format!("Set priority of '{name}' to {priority}")),
            Err(e) => CommandResult::Error(format!("Cannot reprioritize '{name}': {e}")),
        }
    }

    /// `--name` prints the named PCB first, then any queues the other
    /// flags select; given no arguments the command prints usage.
    fn show_pcb(kernel: &Kernel, mut args: SplitWhitespace) -> CommandResult {
        let mut filter = PcbFilter::empty();
        let mut named = None;
        let mut any_arg = false;
        while let Some(arg) = args.next() {
            any_arg = true;
            match arg {
                "--all" => filter = PcbFilter::all(),
                "--ready" => filter |= PcbFilter::READY,
                "--blocked" => filter |= PcbFilter::BLOCKED,
                "--suspended" => filter |= PcbFilter::SUSPENDED,
                "--name" => match args.next() {
                    Some(n) => named = Some(n),
                    None => {
                        return CommandResult::Error(String::from("Usage: showpcb --name <name>"))
                    }
                },
                _ => return CommandResult::Error(format!("Unknown option '{arg}'")),
            }
        }
        if !any_arg {
            return CommandResult::Error(String::from(
                "Usage: showpcb [--all|--ready|--blocked|--suspended|--name <name>]",
            ));
        }

        let mut out = String::new();
        if let Some(name) = named {
            let found = kernel
                .queues()
                .find(name)
                .or_else(|| kernel.running().filter(|pcb| pcb.name() == name));
            match found {
                Some(pcb) => out.push_str(&render_pcb(pcb)),
                None => return CommandResult::Error(format!("No process named '{name}'")),
            }
        }
        if filter == PcbFilter::all() {
            if let Some(pcb) = kernel.running() {
                out.push_str("===== Running =====\n");
                out.push_str(&render_pcb(pcb));
            }
        }
        for id in QueueId::ALL {
            if !filter.matches(id) {
                continue;
            }
            out.push_str(&format!("===== {} =====\n", id.label()));
            let mut any = false;
            for pcb in kernel.queues().iter(id) {
                out.push_str(&render_pcb(pcb));
                any = true;
            }
            if !any {
                out.push_str("(empty)\n");
            }
        }
        CommandResult::Output(out)
    }

    fn init_heap(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        let size = match parse_number(args.next(), "initheap <size>") {
            Ok(s) => s,
            Err(e) => return e,
        };
        match kernel.init_heap(size) {
            Ok(()) => CommandResult::Output(format!("Heap initialized with {size} bytes")),
            Err(e) => CommandResult::Error(format!("Cannot initialize heap: {e}")),
        }
    }

    fn alloc_mem(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        let size = match parse_number(args.next(), "allocmem <size>") {
            Ok(s) => s,
            Err(e) => return e,
        };
        match kernel.alloc_mem(size) {
            Ok(addr) => CommandResult::Output(format!("Allocated {size} bytes at {addr:#x}")),
            Err(e) => CommandResult::Error(format!("Cannot allocate: {e}")),
        }
    }

    fn free_mem(kernel: &mut Kernel, mut args: SplitWhitespace) -> CommandResult {
        let raw = match args.next() {
            Some(r) => r,
            None => return CommandResult::Error(String::from("Usage: freemem <addr>")),
        };
        let addr = match parse_addr(raw) {
            Some(a) => a,
            None => return CommandResult::Error(format!("Invalid address '{raw}'")),
        };
        match kernel.free_mem(addr) {
            Ok(()) => CommandResult::Output(format!("Freed memory at {addr:#x}")),
            Err(e) => CommandResult::Error(format!("Cannot free {addr:#x}: {e}")),
        }
    }

    fn is_empty(kernel: &Kernel) -> CommandResult {
        if kernel.heap_is_empty() {
            CommandResult::Output(String::from("Heap is empty"))
        } else {
            CommandResult::Output(String::from("Heap has allocated memory"))
        }
    }

    fn show_memory(kernel: &Kernel, mut args: SplitWhitespace) -> CommandResult {
        let mut filter = MemFilter::empty();
        while let Some(arg) = args.next() {
            match arg {
                "--all" => filter = MemFilter::all(),
                "--free" => filter |= MemFilter::FREE,
                "--allocated" => filter |= MemFilter::ALLOCATED,
                _ => return CommandResult::Error(format!("Unknown option '{arg}'")),
            }
        }
        if filter.is_empty() {
            filter = MemFilter::all();
        }

        let mut out = String::new();
        if filter.contains(MemFilter::FREE) {
            out.push_str("===== Free Blocks =====\n");
            out.push_str(&render_blocks(&kernel.heap().free_blocks()));
        }
        if filter.contains(MemFilter::ALLOCATED) {
            out.push_str("===== Allocated Blocks =====\n");
            out.push_str(&render_blocks(&kernel.heap().allocated_blocks()));
        }
        CommandResult::Output(out)
    }
}

fn parse_class(raw: &str) -> Option<ProcessClass> {
    match raw {
        "0" | "system" => Some(ProcessClass::System),
        "1" | "application" => Some(ProcessClass::Application),
        _ => None,
    }
}

/// Parses a size argument, turning a missing or malformed value into the
/// shell error to return. `str::parse` accepts a literal `0`; whether zero
/// is a valid size is the kernel's call, not the parser's.
fn parse_number(raw: Option<&str>, usage: &str) -> Result<usize, CommandResult> {
    let raw = raw.ok_or_else(|| CommandResult::Error(format!("Usage: {usage}")))?;
    raw.parse()
        .map_err(|_| CommandResult::Error(format!("Invalid number '{raw}'")))
}

/// Addresses come back from `allocmem` in hex, so accept both `0x`-prefixed
/// hex and plain decimal.
fn parse_addr(raw: &str) -> Option<usize> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn render_pcb(pcb: &Pcb) -> String {
    format!(
        "Process name: {}\n  Class: {}\n  State: {}\n  Suspended: {}\n  Priority: {}\n",
        pcb.name(),
        pcb.class(),
        pcb.state,
        if pcb.suspended { "yes" } else { "no" },
        pcb.priority(),
    )
}

fn render_blocks(blocks: &[BlockInfo]) -> String {
    if blocks.is_empty() {
        return String::from("(none)\n");
    }
    blocks
        .iter()
        .map(|block| {
            format!(
                "{} block at {:#x}\n  Block size: {}\n  Usable size: {}\n  Owner: {}\n",
                match block.tag {
                    BlockTag::Free => "Free",
                    BlockTag::Allocated => "Allocated",
                },
                block.begin,
                block.total,
                block.usable,
                block.owner,
            )
        })
        .collect::<Vec<String>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcb::State;

    fn kernel() -> Kernel {
        Kernel::with_arena(0x0010_0000, 0x0010_0000)
    }

    fn output(result: CommandResult) -> String {
        match result {
            CommandResult::Output(s) => s,
            CommandResult::Error(e) => panic!("expected output, got error: {e}"),
            CommandResult::Exit => panic!("expected output, got exit"),
        }
    }

    fn error(result: CommandResult) -> String {
        match result {
            CommandResult::Error(e) => e,
            CommandResult::Output(s) => panic!("expected error, got output: {s}"),
            CommandResult::Exit => panic!("expected error, got exit"),
        }
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let mut k = kernel();
        assert_eq!(output(CommandExecutor::execute(&mut k, "   ")), "");
    }

    #[test]
    fn unknown_command_is_an_error() {
        let mut k = kernel();
        let msg = error(CommandExecutor::execute(&mut k, "bogus"));
        assert!(msg.contains("bogus"));
    }

    #[test]
    fn exit_is_passed_through() {
        let mut k = kernel();
        assert!(matches!(
            CommandExecutor::execute(&mut k, "exit"),
            CommandResult::Exit
        ));
    }

    #[test]
    fn cpcb_accepts_numeric_and_named_classes() {
        let mut k = kernel();
        output(CommandExecutor::execute(&mut k, "cpcb sys0 0 9"));
        output(CommandExecutor::execute(&mut k, "cpcb app1 application 4"));
        assert_eq!(k.queues().find("sys0").unwrap().class(), ProcessClass::System);
        assert_eq!(
            k.queues().find("app1").unwrap().class(),
            ProcessClass::Application
        );
    }

    #[test]
    fn cpcb_priority_zero_is_a_valid_priority() {
        let mut k = kernel();
        output(CommandExecutor::execute(&mut k, "cpcb idle 1 0"));
        assert_eq!(k.queues().find("idle").unwrap().priority(), 0);
    }

    #[test]
    fn cpcb_rejects_malformed_arguments() {
        let mut k = kernel();
        error(CommandExecutor::execute(&mut k, "cpcb"));
        error(CommandExecutor::execute(&mut k, "cpcb p 2 5"));
        error(CommandExecutor::execute(&mut k, "cpcb p 1 abc"));
        error(CommandExecutor::execute(&mut k, "cpcb p 1 10"));
        assert_eq!(k.process_count(), 0);
    }

    #[test]
    fn process_lifecycle_through_the_shell() {
        let mut k = kernel();
        output(CommandExecutor::execute(&mut k, "cpcb p 1 5"));
        output(CommandExecutor::execute(&mut k, "bpcb p"));
        assert_eq!(k.queues().find("p").unwrap().state, State::Blocked);
        output(CommandExecutor::execute(&mut k, "spcb p"));
        assert!(k.queues().find("p").unwrap().suspended);
        output(CommandExecutor::execute(&mut k, "rpcb --all"));
        assert!(!k.queues().find("p").unwrap().suspended);
        output(CommandExecutor::execute(&mut k, "upcb p"));
        output(CommandExecutor::execute(&mut k, "ppcb p 9"));
        assert_eq!(k.queues().find("p").unwrap().priority(), 9);
        output(CommandExecutor::execute(&mut k, "dpcb p"));
        let msg = error(CommandExecutor::execute(&mut k, "dpcb p"));
        assert!(msg.contains("no such process"));
    }

    #[test]
    fn showpcb_lists_queues_and_finds_by_name() {
        let mut k = kernel();
        output(CommandExecutor::execute(&mut k, "cpcb a 1 5"));
        output(CommandExecutor::execute(&mut k, "cpcb b 1 3"));
        output(CommandExecutor::execute(&mut k, "bpcb b"));

        let all = output(CommandExecutor::execute(&mut k, "showpcb --all"));
        assert!(all.contains("Process name: a"));
        assert!(all.contains("Process name: b"));

        let ready = output(CommandExecutor::execute(&mut k, "showpcb --ready"));
        assert!(ready.contains("Process name: a"));
        assert!(!ready.contains("Process name: b"));

        let one = output(CommandExecutor::execute(&mut k, "showpcb --name b"));
        assert!(one.contains("State: blocked"));
        error(CommandExecutor::execute(&mut k, "showpcb --name nope"));
        error(CommandExecutor::execute(&mut k, "showpcb"));
    }

    #[test]
    fn showpcb_flags_combine_conjunctively() {
        let mut k = kernel();
        output(CommandExecutor::execute(&mut k, "cpcb active 1 5"));
        output(CommandExecutor::execute(&mut k, "cpcb susp 1 5"));
        output(CommandExecutor::execute(&mut k, "spcb susp"));
        output(CommandExecutor::execute(&mut k, "cpcb parked 1 5"));
        output(CommandExecutor::execute(&mut k, "bpcb parked"));
        output(CommandExecutor::execute(&mut k, "spcb parked"));

        // A class flag alone covers only the active queue of that class.
        let ready = output(CommandExecutor::execute(&mut k, "showpcb --ready"));
        assert!(ready.contains("Process name: active"));
        assert!(!ready.contains("Process name: susp"));

        // The suspended variant needs both its class flag and --suspended,
        // and the combination stays within the class.
        let both = output(CommandExecutor::execute(&mut k, "showpcb --ready --suspended"));
        assert!(both.contains("Process name: susp"));
        assert!(!both.contains("Process name: parked"));

        // --suspended alone selects no queue at all.
        let alone = output(CommandExecutor::execute(&mut k, "showpcb --suspended"));
        assert!(!alone.contains("Process name:"));

        let all = output(CommandExecutor::execute(&mut k, "showpcb --all"));
        for name in ["active", "susp", "parked"] {
            assert!(all.contains(&format!("Process name: {name}")));
        }
    }

    #[test]
    fn showpcb_name_combines_with_queue_flags() {
        let mut k = kernel();
        output(CommandExecutor::execute(&mut k, "cpcb a 1 5"));
        output(CommandExecutor::execute(&mut k, "cpcb b 1 3"));
        output(CommandExecutor::execute(&mut k, "bpcb b"));

        let combined = output(CommandExecutor::execute(&mut k, "showpcb --name b --ready"));
        assert!(combined.contains("Process name: b"));
        assert!(combined.contains("Process name: a"));
        assert!(!combined.contains(QueueId::Blocked.label()));
    }

    #[test]
    fn memory_commands_round_trip() {
        let mut k = kernel();
        error(CommandExecutor::execute(&mut k, "allocmem 64"));
        output(CommandExecutor::execute(&mut k, "initheap 1024"));
        error(CommandExecutor::execute(&mut k, "initheap 1024"));

        let msg = output(CommandExecutor::execute(&mut k, "allocmem 64"));
        let addr = msg.rsplit(' ').next().unwrap().to_string();
        assert!(addr.starts_with("0x"));
        assert_eq!(
            output(CommandExecutor::execute(&mut k, "isempty")),
            "Heap has allocated memory"
        );

        let shown = output(CommandExecutor::execute(&mut k, "showmemory --allocated"));
        assert!(shown.contains("Owner: bootstrap"));

        output(CommandExecutor::execute(&mut k, &format!("freemem {addr}")));
        assert_eq!(
            output(CommandExecutor::execute(&mut k, "isempty")),
            "Heap is empty"
        );
    }

    #[test]
    fn memory_commands_reject_malformed_numbers() {
        let mut k = kernel();
        output(CommandExecutor::execute(&mut k, "initheap 1024"));
        error(CommandExecutor::execute(&mut k, "allocmem many"));
        error(CommandExecutor::execute(&mut k, "freemem 0xzz"));
        error(CommandExecutor::execute(&mut k, "initheap"));
    }
}
