//! Cursor marks for scoped deallocation

/// Snapshot of a linear allocator's cursor
///
/// Rewinding to a mark frees every allocation made after the mark was
/// taken. A mark is only meaningful for the allocator that produced it and
/// is invalidated by a later `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearMark {
    pub(crate) position: usize,
}
