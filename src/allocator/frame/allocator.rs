//! Main frame allocator implementation

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

use crate::allocator::linear::{LinearAllocator, LinearMark};
use crate::allocator::traits::{Allocator, MemoryUsage, Resettable};
use crate::error::AllocResult;

/// Frame-scoped scratch allocator backed by a linear arena
///
/// Allocations made between [`FrameAllocator::begin`] and
/// [`FrameAllocator::end`] are freed together when the frame ends.
/// Exactly one frame may be open at a time; mismatched `begin`/`end`
/// pairs abort.
pub struct FrameAllocator {
    arena: LinearAllocator,
    frame_mark: Cell<Option<LinearMark>>,
}

impl FrameAllocator {
    /// Creates a frame allocator with a zeroed heap buffer of `capacity` bytes
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Ok(Self { arena: LinearAllocator::new(capacity)?, frame_mark: Cell::new(None) })
    }

    /// Creates a frame allocator over a caller-provided buffer
    pub fn from_boxed_slice(memory: Box<[u8]>) -> AllocResult<Self> {
        Ok(Self { arena: LinearAllocator::from_boxed_slice(memory)?, frame_mark: Cell::new(None) })
    }

    /// Releases the allocator and returns the buffer to the caller
    pub fn into_boxed_slice(self) -> Box<[u8]> {
        self.arena.into_boxed_slice()
    }

    /// Begins a new frame
    ///
    /// Aborts if a frame is already open; frames do not nest.
    pub fn begin(&self) {
        assert!(self.frame_mark.get().is_none(), "frame already begun");
        self.frame_mark.set(Some(self.arena.mark()));
    }

    /// Ends the current frame, freeing every allocation made since `begin`
    ///
    /// Aborts if no frame is open.
    ///
    /// # Safety
    /// Pointers allocated inside the frame become invalid.
    pub unsafe fn end(&self) {
        let mark = self.frame_mark.take().expect("frame end without a matching begin");
        // SAFETY: the mark was taken from our own arena at frame begin.
        unsafe { self.arena.rewind_to(mark) };
    }

    /// Allocates scratch memory for the current frame
    pub fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        // SAFETY: linear allocation has no caller preconditions; the
        // returned memory is uninitialized.
        unsafe { self.arena.allocate(layout) }
    }

    /// Checks whether a frame is currently open
    pub fn frame_open(&self) -> bool {
        self.frame_mark.get().is_some()
    }

    /// Bytes consumed from the backing arena
    pub fn frame_usage(&self) -> usize {
        self.arena.allocated_size()
    }

    /// Bytes left in the backing arena
    pub fn remaining_size(&self) -> usize {
        self.arena.remaining_size()
    }

    /// Total capacity of the backing arena
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }
}

impl MemoryUsage for FrameAllocator {
    fn used_memory(&self) -> usize {
        self.arena.used_memory()
    }

    fn available_memory(&self) -> Option<usize> {
        self.arena.available_memory()
    }

    fn total_memory(&self) -> Option<usize> {
        self.arena.total_memory()
    }
}

impl Resettable for FrameAllocator {
    unsafe fn reset(&self) {
        self.frame_mark.set(None);
        // SAFETY: forwarded caller contract.
        unsafe { self.arena.reset() };
    }
}
