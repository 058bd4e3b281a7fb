//! Boundary-tag heap allocator.
//!
//! The heap manages a single arena as a sequence of blocks, each bracketed
//! by a header and footer whose combined size is [`BLOCK_OVERHEAD`]. Two
//! doubly-linked lists run over the blocks — free and allocated — both kept
//! sorted by ascending address, which makes first-fit a front-to-back walk
//! and physical adjacency a comparison of one block's end against the next
//! block's start.
//!
//! Block records are held in an index-addressed slot map with integer
//! handles for the prev/next links, so a stale reference to a merged or
//! recycled block is unrepresentable. Arena addresses are plain integers
//! obtained from the backing capability; the heap never dereferences them.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::{AllocError, BackingAlloc};

/// Bytes reserved at the front of every block for its header (tag, begin
/// address, total and usable sizes, owner name).
pub const HEADER_SIZE: usize = 32;
/// Bytes reserved at the back of every block for its footer (tag, sizes).
pub const FOOTER_SIZE: usize = 16;
/// Per-block bookkeeping overhead.
pub const BLOCK_OVERHEAD: usize = HEADER_SIZE + FOOTER_SIZE;

/// Owner recorded on blocks that belong to no process.
const FREE_OWNER: &str = "free";

/// Whether a block is on the free or the allocated list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockTag {
    Free,
    Allocated,
}

/// Index of a block record in the slot map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Handle(usize);

struct Block {
    tag: BlockTag,
    /// Arena address of the block's header.
    start: usize,
    /// Header + usable bytes + footer.
    total: usize,
    owner: String,
    prev: Option<Handle>,
    next: Option<Handle>,
}

impl Block {
    fn usable(&self) -> usize {
        self.total - BLOCK_OVERHEAD
    }

    /// Data-start address, the value handed to callers.
    fn begin(&self) -> usize {
        self.start + HEADER_SIZE
    }

    /// One past the footer; equal to the next physical block's start.
    fn end(&self) -> usize {
        self.start + self.total
    }
}

/// Snapshot of one block, for display and inspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub tag: BlockTag,
    pub begin: usize,
    pub total: usize,
    pub usable: usize,
    pub owner: String,
}

/// The boundary-tag heap.
pub struct Heap {
    slots: Vec<Block>,
    spare: Vec<usize>,
    free_head: Option<Handle>,
    alloc_head: Option<Handle>,
    arena_total: usize,
    allocated_total: usize,
    initialized: bool,
}

impl Heap {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            spare: Vec::new(),
            free_head: None,
            alloc_head: None,
            arena_total: 0,
            allocated_total: 0,
            initialized: false,
        }
    }

    /// Carves the arena into a single free block of `size` usable bytes
    /// plus its boundary tags. Callable exactly once; later calls fail with
    /// `AlreadyInitialized` and leave the heap untouched.
    pub fn init(&mut self, size: usize, backing: &mut dyn BackingAlloc) -> Result<(), AllocError> {
        if self.initialized {
            return Err(AllocError::AlreadyInitialized);
        }
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }
        let total = size + BLOCK_OVERHEAD;
        let base = backing.alloc(total).ok_or(AllocError::OutOfMemory)?;

        let handle = self.new_slot(Block {
            tag: BlockTag::Free,
            start: base,
            total,
            owner: FREE_OWNER.to_string(),
            prev: None,
            next: None,
        });
        self.free_head = Some(handle);
        self.arena_total = total;
        self.allocated_total = 0;
        self.initialized = true;
        Ok(())
    }

    /// Allocates `size` usable bytes for the named owner and returns the
    /// data-start address.
    ///
    /// First fit over the address-sorted free list: the chosen block must
    /// have `usable >= size + BLOCK_OVERHEAD`, so the remainder left after
    /// the split always has room for its own boundary tags. The allocated
    /// block enters the allocated list at its address-sorted position.
    pub fn allocate(&mut self, size: usize, owner: &str) -> Result<usize, AllocError> {
        if !self.initialized {
            return Err(AllocError::Uninitialized);
        }
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }
        let needed = size + BLOCK_OVERHEAD;

        let mut cursor = self.free_head;
        let chosen = loop {
            match cursor {
                None => return Err(AllocError::OutOfMemory),
                Some(h) if self.slots[h.0].usable() >= needed => break h,
                Some(h) => cursor = self.slots[h.0].next,
            }
        };

        // Shrink the chosen free block in place to the remainder. Its list
        // links stay valid: the start moves forward but never past the next
        // free block.
        let start = self.slots[chosen.0].start;
        self.slots[chosen.0].start = start + needed;
        self.slots[chosen.0].total -= needed;

        let handle = self.new_slot(Block {
            tag: BlockTag::Allocated,
            start,
            total: needed,
            owner: owner.to_string(),
            prev: None,
            next: None,
        });
        self.alloc_head = self.insert_sorted(self.alloc_head, handle);
        self.allocated_total += needed;
        Ok(start + HEADER_SIZE)
    }

    /// Releases the allocated block whose data-start address is `addr`.
    ///
    /// The block moves to the free list at its address-sorted position and
    /// free blocks are then coalesced to a fixed point: full passes merging
    /// every pair of physically adjacent free blocks, repeated until a pass
    /// makes no merge.
    pub fn deallocate(&mut self, addr: usize) -> Result<(), AllocError> {
        if !self.initialized {
            return Err(AllocError::Uninitialized);
        }
        let mut cursor = self.alloc_head;
        let found = loop {
            match cursor {
                None => return Err(AllocError::NotFound),
                Some(h) if self.slots[h.0].begin() == addr => break h,
                Some(h) => cursor = self.slots[h.0].next,
            }
        };

        self.alloc_head = self.unlink(self.alloc_head, found);
        self.allocated_total -= self.slots[found.0].total;
        self.slots[found.0].tag = BlockTag::Free;
        self.slots[found.0].owner = FREE_OWNER.to_string();
        self.free_head = self.insert_sorted(self.free_head, found);
        self.coalesce();
        Ok(())
    }

    /// True iff zero bytes are currently allocated.
    pub fn is_empty(&self) -> bool {
        self.allocated_total == 0
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Arena size including all boundary tags.
    pub fn arena_size(&self) -> usize {
        self.arena_total
    }

    /// Bytes currently allocated, boundary tags included.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_total
    }

    /// Free blocks in ascending address order.
    pub fn free_blocks(&self) -> Vec<BlockInfo> {
        self.list_info(self.free_head)
    }

    /// Allocated blocks in ascending address order.
    pub fn allocated_blocks(&self) -> Vec<BlockInfo> {
        self.list_info(self.alloc_head)
    }

    fn list_info(&self, head: Option<Handle>) -> Vec<BlockInfo> {
        let mut out = Vec::new();
        let mut cursor = head;
        while let Some(h) = cursor {
            let block = &self.slots[h.0];
            out.push(BlockInfo {
                tag: block.tag,
                begin: block.begin(),
                total: block.total,
                usable: block.usable(),
                owner: block.owner.clone(),
            });
            cursor = block.next;
        }
        out
    }

    /// Merges adjacent free blocks until a full pass over the free list
    /// finds nothing to merge.
    fn coalesce(&mut self) {
        loop {
            let mut merged = false;
            let mut cursor = self.free_head;
            while let Some(h) = cursor {
                let next = self.slots[h.0].next;
                match next {
                    Some(n) if self.slots[h.0].end() == self.slots[n.0].start => {
                        self.slots[h.0].total += self.slots[n.0].total;
                        let after = self.slots[n.0].next;
                        self.slots[h.0].next = after;
                        if let Some(a) = after {
                            self.slots[a.0].prev = Some(h);
                        }
                        self.release_slot(n);
                        merged = true;
                        // Re-check the grown block against its new neighbor.
                    }
                    _ => cursor = next,
                }
            }
            if !merged {
                break;
            }
        }
    }

    /// Links `handle` into the list at its address-sorted position and
    /// returns the (possibly new) head.
    fn insert_sorted(&mut self, head: Option<Handle>, handle: Handle) -> Option<Handle> {
        let start = self.slots[handle.0].start;
        let mut prev: Option<Handle> = None;
        let mut cursor = head;
        while let Some(c) = cursor {
            if self.slots[c.0].start > start {
                break;
            }
            prev = cursor;
            cursor = self.slots[c.0].next;
        }
        self.slots[handle.0].prev = prev;
        self.slots[handle.0].next = cursor;
        if let Some(p) = prev {
            self.slots[p.0].next = Some(handle);
        }
        if let Some(c) = cursor {
            self.slots[c.0].prev = Some(handle);
        }
        if prev.is_none() {
            Some(handle)
        } else {
            head
        }
    }

    /// Unlinks `handle` from the list and returns the (possibly new) head.
    /// Fixes the head pointer when the head is removed and the neighbor
    /// links in all cases.
    fn unlink(&mut self, head: Option<Handle>, handle: Handle) -> Option<Handle> {
        let (prev, next) = {
            let block = &self.slots[handle.0];
            (block.prev, block.next)
        };
        if let Some(p) = prev {
            self.slots[p.0].next = next;
        }
        if let Some(n) = next {
            self.slots[n.0].prev = prev;
        }
        self.slots[handle.0].prev = None;
        self.slots[handle.0].next = None;
        if head == Some(handle) {
            next
        } else {
            head
        }
    }

    fn new_slot(&mut self, block: Block) -> Handle {
        match self.spare.pop() {
            Some(index) => {
                self.slots[index] = block;
                Handle(index)
            }
            None => {
                self.slots.push(block);
                Handle(self.slots.len() - 1)
            }
        }
    }

    fn release_slot(&mut self, handle: Handle) {
        self.spare.push(handle.0);
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
