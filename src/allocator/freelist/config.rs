//! Free-list allocator configuration

/// Configuration for the free-list allocator
#[derive(Debug, Clone)]
pub struct FreeListConfig {
    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for freed payloads (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for FreeListConfig {
    fn default() -> Self {
        Self {
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
        }
    }
}

impl FreeListConfig {
    /// Production configuration - no tracking, no fill patterns
    #[must_use]
    pub fn production() -> Self {
        Self { track_stats: false, alloc_pattern: None, dealloc_pattern: None }
    }

    /// Debug configuration - full tracking and fill patterns
    #[must_use]
    pub fn debug() -> Self {
        Self { track_stats: true, alloc_pattern: Some(0xCC), dealloc_pattern: Some(0xDD) }
    }
}
