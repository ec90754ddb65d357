//! Virtual-memory facade
//!
//! Page-granular reserve / commit / decommit / release over the host OS
//! virtual-memory interface, so allocators can be layered on
//! demand-committed address space. Three states per range: reserved (no
//! access), committed (read/write), decommitted (back to reserved,
//! contents lost).
//!
//! Pointers passed to [`commit`], [`decommit`], and [`release`] must be
//! page-aligned; partial operations are allowed only at page granularity
//! and the caller tracks which subranges are committed. The cached page
//! size is the crate's only process-wide state.

use core::ptr::NonNull;

use once_cell::sync::OnceCell;

static PAGE_SIZE: OnceCell<usize> = OnceCell::new();

/// Returns the OS page size
///
/// Queried once on first use and cached; immutable thereafter.
pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(query_page_size)
}

#[inline]
fn span(pages: usize) -> Option<usize> {
    pages.checked_mul(page_size()).filter(|&len| len > 0)
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn query_page_size() -> usize {
            // SAFETY: sysconf has no memory preconditions.
            let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            assert!(page_size > 0, "could not query the page size");
            page_size as usize
        }

        /// Reserves `pages` pages of address space with no access rights
        ///
        /// The returned pointer is page-aligned. The memory cannot be
        /// touched until committed.
        pub fn reserve(pages: usize) -> Option<NonNull<u8>> {
            let len = span(pages)?;
            // SAFETY: anonymous private mapping; no file descriptor, no
            // existing memory involved.
            let ptr = unsafe {
                libc::mmap(
                    core::ptr::null_mut(),
                    len,
                    libc::PROT_NONE,
                    libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
                    -1,
                    0,
                )
            };

            if ptr == libc::MAP_FAILED { None } else { NonNull::new(ptr.cast()) }
        }

        /// Makes `pages` pages starting at `ptr` readable and writable
        ///
        /// `ptr` must be page-aligned and inside a range obtained from
        /// [`reserve`].
        pub fn commit(ptr: NonNull<u8>, pages: usize) -> bool {
            debug_assert!(ptr.as_ptr() as usize % page_size() == 0);
            let Some(len) = span(pages) else { return false };
            // SAFETY: the caller provides a page-aligned pointer into a
            // reserved mapping.
            unsafe { libc::mprotect(ptr.as_ptr().cast(), len, libc::PROT_READ | libc::PROT_WRITE) == 0 }
        }

        /// Returns `pages` pages starting at `ptr` to the reserved state
        ///
        /// Contents are considered lost. `ptr` must be page-aligned.
        pub fn decommit(ptr: NonNull<u8>, pages: usize) -> bool {
            debug_assert!(ptr.as_ptr() as usize % page_size() == 0);
            let Some(len) = span(pages) else { return false };
            // SAFETY: the caller provides a page-aligned pointer into a
            // reserved mapping.
            unsafe { libc::mprotect(ptr.as_ptr().cast(), len, libc::PROT_NONE) == 0 }
        }

        /// Releases `pages` pages of reserved address space back to the OS
        ///
        /// `ptr` must be the pointer returned by [`reserve`].
        pub fn release(ptr: NonNull<u8>, pages: usize) -> bool {
            debug_assert!(ptr.as_ptr() as usize % page_size() == 0);
            let Some(len) = span(pages) else { return false };
            // SAFETY: the caller passes a mapping obtained from reserve
            // with its full page count.
            unsafe { libc::munmap(ptr.as_ptr().cast(), len) == 0 }
        }
    } else if #[cfg(windows)] {
        use winapi::um::memoryapi::{VirtualAlloc, VirtualFree};
        use winapi::um::sysinfoapi::GetSystemInfo;
        use winapi::um::winnt::{
            MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_NOACCESS, PAGE_READWRITE,
        };

        fn query_page_size() -> usize {
            // SAFETY: GetSystemInfo fills the struct it is handed.
            let info = unsafe {
                let mut info = core::mem::zeroed();
                GetSystemInfo(&mut info);
                info
            };
            let page_size = info.dwPageSize as usize;
            assert!(page_size > 0, "could not query the page size");
            page_size
        }

        /// Reserves `pages` pages of address space with no access rights
        ///
        /// The returned pointer is page-aligned. The memory cannot be
        /// touched until committed.
        pub fn reserve(pages: usize) -> Option<NonNull<u8>> {
            let len = span(pages)?;
            // SAFETY: fresh reservation; no existing memory involved.
            let ptr = unsafe {
                VirtualAlloc(core::ptr::null_mut(), len, MEM_RESERVE, PAGE_NOACCESS)
            };
            NonNull::new(ptr.cast())
        }

        /// Makes `pages` pages starting at `ptr` readable and writable
        ///
        /// `ptr` must be page-aligned and inside a range obtained from
        /// [`reserve`].
        pub fn commit(ptr: NonNull<u8>, pages: usize) -> bool {
            debug_assert!(ptr.as_ptr() as usize % page_size() == 0);
            let Some(len) = span(pages) else { return false };
            // SAFETY: the caller provides a page-aligned pointer into a
            // reserved range.
            !unsafe { VirtualAlloc(ptr.as_ptr().cast(), len, MEM_COMMIT, PAGE_READWRITE) }
                .is_null()
        }

        /// Returns `pages` pages starting at `ptr` to the reserved state
        ///
        /// Contents are considered lost. `ptr` must be page-aligned.
        pub fn decommit(ptr: NonNull<u8>, pages: usize) -> bool {
            debug_assert!(ptr.as_ptr() as usize % page_size() == 0);
            let Some(len) = span(pages) else { return false };
            // SAFETY: the caller provides a page-aligned pointer into a
            // committed range.
            unsafe { VirtualFree(ptr.as_ptr().cast(), len, MEM_DECOMMIT) != 0 }
        }

        /// Releases reserved address space back to the OS
        ///
        /// `ptr` must be the pointer returned by [`reserve`]. The page
        /// count is implied by the original reservation.
        pub fn release(ptr: NonNull<u8>, _pages: usize) -> bool {
            debug_assert!(ptr.as_ptr() as usize % page_size() == 0);
            // SAFETY: the caller passes a pointer obtained from reserve.
            unsafe { VirtualFree(ptr.as_ptr().cast(), 0, MEM_RELEASE) != 0 }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_positive_power_of_two() {
        let size = page_size();
        assert!(size > 0);
        assert!(size.is_power_of_two());
        assert_eq!(size, page_size());
    }

    #[test]
    fn reserve_commit_write_release() {
        let ptr = reserve(4).expect("reserve four pages");
        assert_eq!(ptr.as_ptr() as usize % page_size(), 0);

        assert!(commit(ptr, 4));
        unsafe {
            ptr.as_ptr().write(0x5A);
            ptr.as_ptr().add(4 * page_size() - 1).write(0xA5);
            assert_eq!(ptr.as_ptr().read(), 0x5A);
        }

        assert!(release(ptr, 4));
    }

    #[test]
    fn decommitted_pages_can_be_recommitted() {
        let ptr = reserve(2).expect("reserve two pages");

        assert!(commit(ptr, 2));
        unsafe { ptr.as_ptr().write(1) };

        assert!(decommit(ptr, 2));
        assert!(commit(ptr, 2));
        unsafe { ptr.as_ptr().write(2) };

        assert!(release(ptr, 2));
    }

    #[test]
    fn partial_commit_at_page_granularity() {
        let pages = 4;
        let ptr = reserve(pages).expect("reserve");

        // Commit only the middle two pages; the caller tracks the split.
        let middle =
            NonNull::new(unsafe { ptr.as_ptr().add(page_size()) }).expect("non-null offset");
        assert!(commit(middle, 2));
        unsafe { middle.as_ptr().write(7) };

        assert!(decommit(middle, 2));
        assert!(release(ptr, pages));
    }

    #[test]
    fn zero_pages_is_rejected() {
        assert!(reserve(0).is_none());
    }
}
