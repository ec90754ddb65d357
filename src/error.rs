//! Memory allocation error type
//!
//! Provides a unified error type for allocator operations with:
//! - A small set of failure kinds
//! - Optional information about the layout that failed to allocate
//! - Optional static context messages
//!
//! Out-of-space conditions are reported through this type and are
//! recoverable; contract violations (freeing out of LIFO order, foreign
//! pool pointers, marks outside the managed buffer) are assertions and
//! abort the process instead.

use core::alloc::Layout;
use core::fmt;

/// Specific kind of allocation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum AllocErrorKind {
    /// No free span satisfies the request
    #[error("out of memory")]
    OutOfMemory,
    /// Arithmetic overflow while sizing the request
    #[error("size overflow")]
    SizeOverflow,
    /// Alignment is not a power of two
    #[error("invalid alignment")]
    InvalidAlignment,
    /// Request parameters violate the allocator's contract
    #[error("invalid layout")]
    InvalidLayout,
}

impl AllocErrorKind {
    /// Returns a static string describing the error
    pub const fn as_str(&self) -> &'static str {
        match self {
            AllocErrorKind::OutOfMemory => "out of memory",
            AllocErrorKind::SizeOverflow => "size overflow",
            AllocErrorKind::InvalidAlignment => "invalid alignment",
            AllocErrorKind::InvalidLayout => "invalid layout",
        }
    }
}

/// Error returned by allocator operations
///
/// Carries the failure kind plus, when available, the layout that could not
/// be satisfied. A failed allocation never invalidates existing allocations;
/// in particular a failed `reallocate` leaves the original pointer live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    kind: AllocErrorKind,
    layout: Option<Layout>,
    message: Option<&'static str>,
}

impl AllocError {
    /// Creates a new allocation error with a specific kind
    #[inline]
    pub const fn new_with_kind(kind: AllocErrorKind) -> Self {
        Self { kind, layout: None, message: None }
    }

    /// Creates an out-of-memory error for the given layout
    #[inline]
    pub const fn out_of_memory(layout: Layout) -> Self {
        Self { kind: AllocErrorKind::OutOfMemory, layout: Some(layout), message: None }
    }

    /// Creates a size-overflow error for the given layout
    #[inline]
    pub const fn size_overflow(layout: Layout) -> Self {
        Self { kind: AllocErrorKind::SizeOverflow, layout: Some(layout), message: None }
    }

    /// Creates an invalid-layout error with a context message
    #[inline]
    pub const fn invalid_layout(message: &'static str) -> Self {
        Self { kind: AllocErrorKind::InvalidLayout, layout: None, message: Some(message) }
    }

    /// Creates an invalid-alignment error with a context message
    #[inline]
    pub const fn invalid_alignment(message: &'static str) -> Self {
        Self { kind: AllocErrorKind::InvalidAlignment, layout: None, message: Some(message) }
    }

    /// Attaches layout information to the error
    #[inline]
    pub const fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Returns the specific error kind
    #[inline]
    pub const fn kind(&self) -> AllocErrorKind {
        self.kind
    }

    /// Returns the layout associated with this error, if any
    #[inline]
    pub const fn layout(&self) -> Option<Layout> {
        self.layout
    }

    /// Returns the context message, if any
    #[inline]
    pub const fn message(&self) -> Option<&'static str> {
        self.message
    }

    /// Checks if this is an out-of-memory error
    #[inline]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self.kind, AllocErrorKind::OutOfMemory)
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layout {
            Some(layout) => write!(
                f,
                "memory allocation failed ({}): could not allocate {} bytes with alignment {}",
                self.kind.as_str(),
                layout.size(),
                layout.align()
            )?,
            None => write!(f, "memory allocation failed ({})", self.kind.as_str())?,
        }

        if let Some(message) = self.message {
            write!(f, ": {message}")?;
        }

        Ok(())
    }
}

impl std::error::Error for AllocError {}

/// Result type for allocation operations
pub type AllocResult<T> = Result<T, AllocError>;
