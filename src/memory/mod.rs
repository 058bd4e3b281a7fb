//! Memory management: the backing-allocation capability and the
//! boundary-tag heap built on top of it.
//!
//! The heap does not assume any particular source for its arena. It asks a
//! [`BackingAlloc`] for a range of addresses once, at initialization, and
//! manages that range itself from then on. Early in boot the backing is a
//! placement region ([`BumpRegion`]); an embedding kernel can substitute
//! anything that hands out address ranges.

pub mod heap;

pub use heap::{BlockInfo, BlockTag, Heap, BLOCK_OVERHEAD, FOOTER_SIZE, HEADER_SIZE};

use core::fmt;

/// Default base address for the kernel heap arena.
pub const DEFAULT_ARENA_BASE: usize = 0x0D00_0000;
/// Default capacity of the backing region behind the kernel heap.
pub const DEFAULT_ARENA_CAPACITY: usize = 0x0100_0000;

/// Allocation-layer errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The heap has not been initialized yet.
    Uninitialized,
    /// The heap was already initialized; initialization is one-shot.
    AlreadyInitialized,
    /// A zero or otherwise unusable size was requested.
    InvalidSize,
    /// No free block can satisfy the request.
    OutOfMemory,
    /// The address does not match any allocated block.
    NotFound,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("heap is not initialized"),
            Self::AlreadyInitialized => f.write_str("heap is already initialized"),
            Self::InvalidSize => f.write_str("invalid allocation size"),
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::NotFound => f.write_str("address is not an allocated block"),
        }
    }
}

/// The raw allocation capability the heap arena is obtained from.
///
/// `alloc` hands out the start address of a fresh `bytes`-sized range, or
/// `None` when the backing is exhausted. `free` returns the range starting
/// at `addr` to the backing, reporting whether anything was reclaimed.
pub trait BackingAlloc {
    fn alloc(&mut self, bytes: usize) -> Option<usize>;
    fn free(&mut self, addr: usize) -> bool;
}

#[inline]
const fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

/// Placement allocator over a fixed address range: hands out consecutive
/// aligned ranges and never reclaims them. This is the boot-phase backing
/// for the heap arena.
pub struct BumpRegion {
    base: usize,
    end: usize,
    next: usize,
}

const BUMP_ALIGN: usize = 8;

impl BumpRegion {
    pub const fn new(base: usize, size: usize) -> Self {
        Self {
            base,
            end: base + size,
            next: base,
        }
    }

    pub fn used(&self) -> usize {
        self.next - self.base
    }

    pub fn remaining(&self) -> usize {
        self.end - self.next
    }
}

impl BackingAlloc for BumpRegion {
    fn alloc(&mut self, bytes: usize) -> Option<usize> {
        if bytes == 0 {
            return None;
        }
        let start = align_up(self.next, BUMP_ALIGN);
        let new_next = start.checked_add(bytes)?;
        if new_next > self.end {
            return None;
        }
        self.next = new_next;
        Some(start)
    }

    fn free(&mut self, _addr: usize) -> bool {
        // Placement allocations are permanent.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_region_hands_out_disjoint_ranges() {
        let mut region = BumpRegion::new(0x1000, 0x100);
        let a = region.alloc(0x40).unwrap();
        let b = region.alloc(0x40).unwrap();
        assert_eq!(a, 0x1000);
        assert!(b >= a + 0x40);
        assert_eq!(region.used(), b + 0x40 - 0x1000);
    }

    #[test]
    fn bump_region_exhausts() {
        let mut region = BumpRegion::new(0x1000, 0x20);
        assert!(region.alloc(0x21).is_none());
        assert!(region.alloc(0x20).is_some());
        assert!(region.alloc(1).is_none());
        assert_eq!(region.remaining(), 0);
    }

    #[test]
    fn bump_region_never_reclaims() {
        let mut region = BumpRegion::new(0x1000, 0x100);
        let a = region.alloc(0x10).unwrap();
        assert!(!region.free(a));
        assert_eq!(region.used(), 0x10);
    }

    #[test]
    fn zero_byte_request_is_refused() {
        let mut region = BumpRegion::new(0x1000, 0x100);
        assert!(region.alloc(0).is_none());
    }
}
