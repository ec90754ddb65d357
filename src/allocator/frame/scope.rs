//! RAII-based frame pairing

use super::FrameAllocator;

/// RAII helper that begins a frame on creation and ends it on drop
///
/// While the scope is alive, do not call `begin` or `end` on the
/// allocator directly; the drop-time `end` must find the frame it opened.
pub struct FrameScope<'a> {
    allocator: &'a FrameAllocator,
}

impl<'a> FrameScope<'a> {
    /// Opens a frame on `allocator`
    pub fn new(allocator: &'a FrameAllocator) -> Self {
        allocator.begin();
        Self { allocator }
    }

    /// Gets the underlying allocator
    pub fn allocator(&self) -> &'a FrameAllocator {
        self.allocator
    }
}

impl<'a> Drop for FrameScope<'a> {
    fn drop(&mut self) {
        // SAFETY: the scope owns the frame it opened; allocations made
        // inside it must not outlive the scope, which is the type's
        // documented contract.
        unsafe { self.allocator.end() };
    }
}
