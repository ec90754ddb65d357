//! Main linear allocator implementation

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

use super::LinearMark;
use crate::allocator::buffer::MemoryBuffer;
use crate::allocator::traits::{Allocator, MemoryUsage, Resettable};
use crate::error::{AllocError, AllocResult};
use crate::utils::align_up;

/// Monotonic bump allocator over a fixed buffer
///
/// Allocations advance a single cursor; individual deallocation is not
/// supported. Marks taken with [`LinearAllocator::mark`] can be rewound to,
/// freeing everything allocated since, which makes the allocator a natural
/// backing store for scoped scratch data.
///
/// # Memory Layout
/// ```text
/// [start]---[alloc1]--[alloc2]--[alloc3]--[top]------[free]------[end]
///            <-------- allocated -------->     <--- available --->
/// ```
pub struct LinearAllocator {
    buffer: MemoryBuffer,
    top: Cell<usize>,
}

impl LinearAllocator {
    /// Creates a linear allocator with a zeroed heap buffer of `capacity` bytes
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Ok(Self::from_buffer(MemoryBuffer::new(capacity)?))
    }

    /// Creates a linear allocator over a caller-provided buffer
    pub fn from_boxed_slice(memory: Box<[u8]>) -> AllocResult<Self> {
        Ok(Self::from_buffer(MemoryBuffer::from_boxed_slice(memory)?))
    }

    fn from_buffer(buffer: MemoryBuffer) -> Self {
        let top = Cell::new(buffer.start_addr());
        Self { buffer, top }
    }

    /// Releases the allocator and returns the buffer to the caller
    ///
    /// All outstanding allocations are invalidated.
    pub fn into_boxed_slice(self) -> Box<[u8]> {
        self.buffer.into_boxed_slice()
    }

    /// Total capacity of the managed buffer
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Bytes consumed so far, alignment padding included
    #[inline]
    pub fn allocated_size(&self) -> usize {
        self.top.get() - self.buffer.start_addr()
    }

    /// Bytes left between the cursor and the end of the buffer
    #[inline]
    pub fn remaining_size(&self) -> usize {
        self.buffer.end_addr() - self.top.get()
    }

    /// Takes a mark at the current cursor position
    #[must_use = "a mark is only useful if kept for a later rewind"]
    pub fn mark(&self) -> LinearMark {
        LinearMark { position: self.top.get() }
    }

    /// Rewinds the cursor to a previously taken mark
    ///
    /// Frees every allocation made after the mark was taken. Rewinding to a
    /// mark at or above the current cursor is a no-op. The mark must come
    /// from this allocator and must not have been invalidated by a reset;
    /// a mark outside the managed buffer aborts.
    ///
    /// # Safety
    /// Pointers returned after the mark was taken become invalid.
    pub unsafe fn rewind_to(&self, mark: LinearMark) {
        assert!(
            mark.position >= self.buffer.start_addr() && mark.position <= self.buffer.end_addr(),
            "mark outside the managed buffer"
        );

        if self.top.get() > mark.position {
            self.top.set(mark.position);
        }
    }

    fn try_bump(&self, layout: Layout) -> AllocResult<NonNull<u8>> {
        let aligned = align_up(self.top.get(), layout.align());
        let new_top = aligned
            .checked_add(layout.size())
            .ok_or_else(|| AllocError::size_overflow(layout))?;
        if new_top > self.buffer.end_addr() {
            return Err(AllocError::out_of_memory(layout));
        }

        self.top.set(new_top);

        // SAFETY: aligned lies within the buffer (checked above).
        let ptr = unsafe { self.buffer.ptr_at(aligned) };
        // SAFETY: buffer pointers are never null.
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }
}

unsafe impl Allocator for LinearAllocator {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            return Ok(NonNull::slice_from_raw_parts(NonNull::dangling(), 0));
        }

        let ptr = self.try_bump(layout)?;
        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // Individual deallocation is not supported; use marks or reset.
    }
}

impl MemoryUsage for LinearAllocator {
    fn used_memory(&self) -> usize {
        self.allocated_size()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.remaining_size())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.capacity())
    }
}

impl Resettable for LinearAllocator {
    unsafe fn reset(&self) {
        self.top.set(self.buffer.start_addr());
    }
}
