//! Fixed-size block pool allocation

pub mod allocator;

pub use allocator::PoolAllocator;
