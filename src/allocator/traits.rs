//! Shared allocator traits
//!
//! The capability set every buffer-backed allocator in this crate can opt
//! into: raw allocation over [`Layout`], capacity reporting, and wholesale
//! reset. Allocators whose contracts do not fit the shared surface (the
//! strict-LIFO stack allocator) expose inherent methods instead.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::AllocResult;

/// Raw memory allocation over caller-visible layouts
///
/// # Safety Requirements
///
/// Implementors must ensure that:
/// - Returned pointers are valid and properly aligned for the layout
/// - Live allocations never overlap
/// - Deallocation only occurs for pointers this allocator returned
pub unsafe trait Allocator {
    /// Allocates memory with the given layout
    ///
    /// # Safety
    /// - Returned memory is uninitialized and must be initialized before use
    /// - The pointer must not outlive the allocator or survive a reset
    ///
    /// # Errors
    /// Returns an out-of-memory error when no free span satisfies the
    /// request; the allocator's state is unchanged in that case.
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>>;

    /// Deallocates memory at the given pointer with the specified layout
    ///
    /// # Safety
    /// - `ptr` must have been allocated by this allocator
    /// - `layout` must match the original allocation layout
    /// - After this call `ptr` becomes invalid; double-free is undefined
    ///   behavior
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Attempts to resize an existing allocation
    ///
    /// The default implementation allocates fresh memory, copies the common
    /// prefix, and releases the old block. Allocators with in-place resize
    /// paths override this.
    ///
    /// # Safety
    /// - `ptr` must have been allocated by this allocator with `old_layout`
    /// - On success the old pointer becomes invalid; on failure it stays
    ///   live and untouched
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        if old_layout.size() == new_layout.size() && old_layout.align() == new_layout.align() {
            return Ok(NonNull::slice_from_raw_parts(ptr, new_layout.size()));
        }

        // SAFETY: forwarded caller contract.
        let new_ptr = unsafe { self.allocate(new_layout)? };

        let copy_size = core::cmp::min(old_layout.size(), new_layout.size());
        if copy_size > 0 {
            // SAFETY: both regions are live, disjoint allocations of at
            // least copy_size bytes.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    ptr.as_ptr(),
                    new_ptr.as_ptr().cast::<u8>(),
                    copy_size,
                );
            }
        }

        // SAFETY: ptr and old_layout match the original allocation.
        unsafe { self.deallocate(ptr, old_layout) };
        Ok(new_ptr)
    }
}

/// Memory usage reporting
///
/// Simple byte-count accessors; the managed buffers are fixed, so totals
/// are always known.
pub trait MemoryUsage {
    /// Bytes currently unavailable for allocation
    fn used_memory(&self) -> usize;

    /// Bytes still available for allocation
    fn available_memory(&self) -> Option<usize>;

    /// Total managed capacity in bytes
    fn total_memory(&self) -> Option<usize> {
        self.available_memory().map(|available| self.used_memory() + available)
    }
}

/// Allocators that can invalidate every outstanding allocation at once
pub trait Resettable {
    /// Resets the allocator to its initial state
    ///
    /// # Safety
    /// Every pointer previously returned by the allocator becomes invalid.
    /// The caller must ensure no live references into the buffer remain.
    unsafe fn reset(&self);

    /// Checks if the allocator can currently be reset
    fn can_reset(&self) -> bool {
        true
    }
}

/// RAII guard that resets an allocator when dropped
///
/// Useful for temporary allocations scoped to a block:
///
/// ```ignore
/// let guard = ResetGuard::new(&arena);
/// // ... temporary allocations ...
/// // arena is reset when guard goes out of scope
/// ```
pub struct ResetGuard<'a, A: Resettable + ?Sized> {
    allocator: &'a A,
    should_reset: bool,
}

impl<'a, A: Resettable + ?Sized> ResetGuard<'a, A> {
    /// Creates a guard that resets `allocator` on drop
    ///
    /// # Safety
    /// The reset performed on drop invalidates every allocation made from
    /// `allocator`; the caller must not let such pointers escape the
    /// guard's scope.
    pub unsafe fn new(allocator: &'a A) -> Self {
        Self { allocator, should_reset: true }
    }

    /// Disables the reset on drop, keeping all allocations
    pub fn disable_reset(&mut self) {
        self.should_reset = false;
    }

    /// Gets a reference to the guarded allocator
    pub fn allocator(&self) -> &A {
        self.allocator
    }
}

impl<'a, A: Resettable + ?Sized> Drop for ResetGuard<'a, A> {
    fn drop(&mut self) {
        if self.should_reset && self.allocator.can_reset() {
            // SAFETY: the guard's constructor carries the invalidation
            // contract.
            unsafe { self.allocator.reset() };
        }
    }
}

// Blanket implementations for references

unsafe impl<T: Allocator + ?Sized> Allocator for &T {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        unsafe { (**self).allocate(layout) }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        unsafe { (**self).reallocate(ptr, old_layout, new_layout) }
    }
}

impl<T: MemoryUsage + ?Sized> MemoryUsage for &T {
    fn used_memory(&self) -> usize {
        (**self).used_memory()
    }

    fn available_memory(&self) -> Option<usize> {
        (**self).available_memory()
    }

    fn total_memory(&self) -> Option<usize> {
        (**self).total_memory()
    }
}

impl<T: Resettable + ?Sized> Resettable for &T {
    unsafe fn reset(&self) {
        unsafe { (**self).reset() }
    }

    fn can_reset(&self) -> bool {
        (**self).can_reset()
    }
}
