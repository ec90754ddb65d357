//! Per-frame scratch allocation
//!
//! A thin wrapper over the linear allocator: `begin` records the cursor,
//! `end` rewinds to it, so everything allocated inside the frame is freed
//! in one step. [`FrameScope`] does the pairing with RAII.

pub mod allocator;
pub mod scope;

pub use allocator::FrameAllocator;
pub use scope::FrameScope;
