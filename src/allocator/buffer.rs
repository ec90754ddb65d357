//! Exclusive ownership of the managed byte range
//!
//! Every allocator in this crate owns its buffer for its whole lifetime and
//! hands out raw pointers into it. `MemoryBuffer` is the one place that
//! performs the address arithmetic for those pointers, so the rest of the
//! crate can reason in plain `usize` addresses.

use core::cell::UnsafeCell;

use crate::error::{AllocError, AllocResult};

/// Interior-mutability wrapper for the managed bytes
///
/// Allocators mutate buffer contents through shared references, so the
/// bytes live behind an `UnsafeCell`. The allocators are single-threaded
/// by contract; the wrapper is `Send` but deliberately not `Sync`.
#[repr(transparent)]
struct BufferCell(UnsafeCell<[u8]>);

impl BufferCell {
    fn get(&self) -> *mut [u8] {
        self.0.get()
    }
}

/// Exclusive owner of a contiguous byte range `[start, start + capacity)`
///
/// Construct with [`MemoryBuffer::new`] for a zeroed heap buffer or
/// [`MemoryBuffer::from_boxed_slice`] for a caller-provided one. The buffer
/// can be handed back to the caller with [`MemoryBuffer::into_boxed_slice`].
pub(crate) struct MemoryBuffer {
    memory: Box<BufferCell>,
    start: usize,
    capacity: usize,
}

// SAFETY: MemoryBuffer exclusively owns its heap allocation and holds no
// thread-local state, so moving it to another thread is sound. It is not
// Sync: allocators mutate the bytes through shared references without
// synchronization.
unsafe impl Send for MemoryBuffer {}

impl MemoryBuffer {
    /// Allocates a zeroed buffer of `capacity` bytes
    pub fn new(capacity: usize) -> AllocResult<Self> {
        if capacity == 0 {
            return Err(AllocError::invalid_layout("buffer capacity must be non-zero"));
        }
        Ok(Self::from_boxed(vec![0u8; capacity].into_boxed_slice()))
    }

    /// Takes ownership of a caller-provided buffer
    pub fn from_boxed_slice(memory: Box<[u8]>) -> AllocResult<Self> {
        if memory.is_empty() {
            return Err(AllocError::invalid_layout("buffer capacity must be non-zero"));
        }
        Ok(Self::from_boxed(memory))
    }

    fn from_boxed(memory: Box<[u8]>) -> Self {
        let capacity = memory.len();
        let ptr = Box::into_raw(memory) as *mut u8;
        // SAFETY: BufferCell is repr(transparent) over UnsafeCell<[u8]>,
        // which is repr(transparent) over [u8]; the fat-pointer layout is
        // identical, and ownership transfers straight through
        // into_raw/from_raw.
        let memory: Box<BufferCell> = unsafe {
            Box::from_raw(core::ptr::slice_from_raw_parts_mut(ptr, capacity) as *mut BufferCell)
        };
        let start = memory.get() as *mut u8 as usize;

        Self { memory, start, capacity }
    }

    /// Releases the buffer back to the caller
    pub fn into_boxed_slice(self) -> Box<[u8]> {
        let capacity = self.capacity;
        let ptr = Box::into_raw(self.memory) as *mut u8;
        // SAFETY: inverse of the cast in from_boxed; same allocation, same
        // length.
        unsafe { Box::from_raw(core::ptr::slice_from_raw_parts_mut(ptr, capacity)) }
    }

    /// First address of the managed range
    #[inline]
    pub fn start_addr(&self) -> usize {
        self.start
    }

    /// One past the last address of the managed range
    #[inline]
    pub fn end_addr(&self) -> usize {
        self.start + self.capacity
    }

    /// Size of the managed range in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks whether an address lies inside the managed range
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end_addr()
    }

    /// Materializes a pointer to `addr` with provenance over the whole buffer
    ///
    /// # Safety
    /// `addr` must lie within `[start_addr, end_addr]`.
    #[inline]
    pub unsafe fn ptr_at(&self, addr: usize) -> *mut u8 {
        debug_assert!(addr >= self.start && addr <= self.end_addr());
        // SAFETY: the offset stays within the buffer allocation per the
        // caller's contract.
        unsafe { (self.memory.get() as *mut u8).add(addr - self.start) }
    }

    /// Fills `len` bytes starting at `addr` with `pattern`
    ///
    /// # Safety
    /// `[addr, addr + len)` must lie within the managed range and must not
    /// overlap any bookkeeping the caller still needs.
    #[inline]
    pub unsafe fn fill(&self, addr: usize, len: usize, pattern: u8) {
        debug_assert!(addr >= self.start && addr + len <= self.end_addr());
        // SAFETY: range checked above; we have exclusive access to the
        // bytes through the UnsafeCell.
        unsafe { core::ptr::write_bytes(self.ptr_at(addr), pattern, len) };
    }
}
