//! Monotonic bump allocation with mark/rewind
//!
//! The linear allocator hands out consecutive aligned spans from a fixed
//! buffer and never frees individual allocations. Everything after a
//! [`LinearMark`] can be released at once with `rewind_to`, and `reset`
//! releases the whole buffer.

pub mod allocator;
pub mod mark;

pub use allocator::LinearAllocator;
pub use mark::LinearMark;
