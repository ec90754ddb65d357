//! Main free-list allocator implementation
//!
//! # Safety
//!
//! The allocator keeps an address-ordered, singly-linked list of free
//! spans threaded through the buffer itself:
//! - Every free span starts with an in-place [`FreeNode`] header
//! - The list is sorted by ascending header address
//! - No two consecutive free nodes are byte-adjacent (coalescing is eager)
//! - A span handed out to the caller keeps its header's `size` intact; the
//!   byte(s) immediately before the payload encode the distance back to
//!   the header, so `free` needs nothing but the pointer

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::{self, NonNull};

use super::FreeListConfig;
use super::node::{
    FreeNode, NODE_ALIGN, NODE_SIZE, SPLITTING_THRESHOLD, node_end, payload_start,
    read_back_offset, write_back_offset,
};
use crate::allocator::buffer::MemoryBuffer;
use crate::allocator::stats::{AllocatorStats, OpCounters, StatisticsProvider};
use crate::allocator::traits::{Allocator, MemoryUsage, Resettable};
use crate::error::{AllocError, AllocResult};
use crate::utils::{align_up, is_aligned, next_align_up};

/// General-purpose allocator for variable-sized allocations in a fixed arena
///
/// First-fit search with immediate splitting on allocation and eager
/// coalescing on free. Aligned payloads carry a variable-length
/// back-pointer in the padding before the returned pointer, so freeing and
/// reallocating need no per-allocation header of fixed size.
///
/// # Memory Layout
/// ```text
///           one allocation inside a former free span
/// [FreeNode hdr][pad ... varint][payload (returned pointer)      ][tail]
///               <- grows down -^
/// ```
///
/// The varint encodes `payload - header_start`, written backward from the
/// byte just below the payload. The requested size is padded by one full
/// alignment step, so at least one padding byte always exists.
pub struct FreeListAllocator {
    buffer: MemoryBuffer,
    free_list: Cell<*mut FreeNode>,
    config: FreeListConfig,
    counters: OpCounters,
}

impl FreeListAllocator {
    /// Creates a free-list allocator with a zeroed heap buffer of `capacity` bytes
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Self::with_config(capacity, FreeListConfig::default())
    }

    /// Creates a free-list allocator with custom configuration
    pub fn with_config(capacity: usize, config: FreeListConfig) -> AllocResult<Self> {
        Self::from_buffer(MemoryBuffer::new(capacity)?, config)
    }

    /// Creates a free-list allocator over a caller-provided buffer
    pub fn from_boxed_slice(memory: Box<[u8]>) -> AllocResult<Self> {
        Self::from_buffer(MemoryBuffer::from_boxed_slice(memory)?, FreeListConfig::default())
    }

    fn from_buffer(buffer: MemoryBuffer, config: FreeListConfig) -> AllocResult<Self> {
        let node_addr = align_up(buffer.start_addr(), NODE_ALIGN);
        if node_addr + NODE_SIZE + SPLITTING_THRESHOLD > buffer.end_addr() {
            return Err(AllocError::invalid_layout("buffer too small for a single free node"));
        }

        // SAFETY: node_addr + NODE_SIZE <= end_addr (checked above) and
        // node_addr is NODE_ALIGN-aligned by construction.
        let node = unsafe { buffer.ptr_at(node_addr) }.cast::<FreeNode>();
        unsafe {
            node.write(FreeNode {
                size: buffer.end_addr() - (node_addr + NODE_SIZE),
                next: ptr::null_mut(),
            });
        }

        let counters = OpCounters::new(config.track_stats);
        Ok(Self { buffer, free_list: Cell::new(node), config, counters })
    }

    /// Releases the allocator and returns the buffer to the caller
    ///
    /// All outstanding allocations are invalidated.
    pub fn into_boxed_slice(self) -> Box<[u8]> {
        self.buffer.into_boxed_slice()
    }

    /// Total size of the managed buffer
    #[inline]
    pub fn total_size(&self) -> usize {
        self.buffer.capacity()
    }

    /// Total payload bytes across all free nodes
    ///
    /// May be fragmented across several spans; a single allocation of this
    /// size can still fail.
    pub fn free_size(&self) -> usize {
        let mut size = 0;
        let mut node = self.free_list.get();

        while !node.is_null() {
            // SAFETY: list nodes are valid headers inside the buffer.
            unsafe {
                size += (*node).size;
                node = (*node).next;
            }
        }

        size
    }

    /// Allocates `layout.size()` bytes aligned to `layout.align()`
    ///
    /// Zero-sized layouts are rejected: the back-pointer encoding needs at
    /// least one padding byte owned by a real allocation.
    ///
    /// # Errors
    /// Out-of-memory when no free span fits the padded request; the free
    /// list is left unchanged.
    pub fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            return Err(AllocError::invalid_layout("free-list allocations must be non-empty"));
        }

        let align = layout.align();
        // One extra alignment step guarantees a padding byte before the
        // payload for the back-pointer, whatever the header alignment.
        let effective = align_up(layout.size(), align)
            .checked_add(align)
            .ok_or_else(|| AllocError::size_overflow(layout))?;

        let Some((node, previous)) = self.first_fit(effective) else {
            self.counters.record_failure();
            return Err(AllocError::out_of_memory(layout));
        };

        // SAFETY: node came from the free list, so its header is valid and
        // its span holds at least `effective` payload bytes.
        unsafe {
            let aligned = next_align_up(payload_start(node), align);
            write_back_offset(self.buffer.ptr_at(aligned - 1), aligned - node as usize);

            self.split_node_if_possible(node, effective);

            // Unlink the consumed node; its next is the split-off tail if
            // one was created.
            let next = (*node).next;
            if previous.is_null() {
                self.free_list.set(next);
            } else {
                (*previous).next = next;
            }

            if let Some(pattern) = self.config.alloc_pattern {
                self.buffer.fill(aligned, layout.size(), pattern);
            }

            if self.counters.enabled() {
                self.counters.record_allocation(self.used_memory());
            }

            let ptr = NonNull::new_unchecked(self.buffer.ptr_at(aligned));
            Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
        }
    }

    /// Frees an allocation, coalescing with byte-adjacent free neighbors
    ///
    /// # Safety
    /// - `ptr` must have been returned by this allocator's `allocate` or
    ///   `reallocate`
    /// - `ptr` must not be freed twice
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        let addr = ptr.as_ptr() as usize;
        assert!(self.buffer.contains(addr), "pointer does not belong to this allocator");

        // SAFETY: a live allocation always carries its back-pointer in the
        // byte(s) immediately below the payload.
        let node = unsafe {
            let offset = read_back_offset(self.buffer.ptr_at(addr - 1));
            let node_addr = addr - offset;
            debug_assert!(self.buffer.contains(node_addr), "back-pointer escapes the buffer");
            debug_assert!(is_aligned(node_addr, NODE_ALIGN), "back-pointer to misaligned header");
            self.buffer.ptr_at(node_addr).cast::<FreeNode>()
        };

        if let Some(pattern) = self.config.dealloc_pattern {
            // Payload span only; the header and back-pointer bytes below
            // `addr` are dead after this free anyway.
            unsafe { self.buffer.fill(addr, node_end(node) - addr, pattern) };
        }

        // SAFETY: node is a valid header recovered above; the list
        // operations preserve address ordering and the no-adjacency
        // invariant via the merges.
        unsafe {
            let previous = self.previous_free_node(node);

            if previous.is_null() {
                // The node precedes every free span and becomes the new
                // head; it may be byte-adjacent to the old head.
                (*node).next = self.free_list.get();
                self.free_list.set(node);
                self.try_merge(node, (*node).next);
            } else {
                (*node).next = (*previous).next;
                (*previous).next = node;
                self.try_merge(previous, node);
            }
        }

        self.counters.record_deallocation();
    }

    /// Resizes an allocation, in place when possible
    ///
    /// Shrinking splits the tail back into the free list; growing absorbs
    /// a byte-adjacent successor span when one is large enough. Otherwise
    /// the contents move to a fresh allocation. In every branch the first
    /// `min(old_size, new_size)` payload bytes are preserved.
    ///
    /// # Errors
    /// - Invalid-layout for zero-sized requests (the allocation is kept)
    /// - Out-of-memory when the move path cannot allocate; the original
    ///   pointer stays live and untouched
    ///
    /// # Safety
    /// `ptr` must have been returned by this allocator and not yet freed.
    /// On success the old pointer is invalid unless it was resized in
    /// place (the returned pointer equals it).
    pub unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        let new_size = new_layout.size();
        if new_size == 0 {
            return Err(AllocError::invalid_layout("free-list allocations must be non-empty"));
        }

        let addr = ptr.as_ptr() as usize;
        assert!(self.buffer.contains(addr), "pointer does not belong to this allocator");

        let align = new_layout.align();

        // SAFETY: live allocations carry a valid back-pointer.
        let node = unsafe {
            let offset = read_back_offset(self.buffer.ptr_at(addr - 1));
            self.buffer.ptr_at(addr - offset).cast::<FreeNode>()
        };
        // SAFETY: node header is intact for live allocations.
        let current_size = unsafe { node_end(node) } - addr;

        // An in-place resize keeps the pointer, so the existing address
        // must already satisfy the requested alignment.
        if is_aligned(addr, align) {
            // Free-list neighbors of the live node: previous is the last
            // free node below it, successor the first above.
            let mut previous: *mut FreeNode = ptr::null_mut();
            let mut successor = self.free_list.get();
            while !successor.is_null() && (successor as usize) < node as usize {
                // SAFETY: list traversal over valid headers.
                unsafe {
                    previous = successor;
                    successor = (*successor).next;
                }
            }

            if current_size >= new_size {
                // Shrink in place: temporarily link the node into the list
                // so the split machinery can give the tail back, then
                // unlink it again.
                // SAFETY: node is a valid header; successor/previous were
                // just computed from the list.
                unsafe {
                    (*node).next = successor;
                    self.split_node_if_possible(node, new_size + align);

                    let tail = (*node).next;
                    if !tail.is_null() {
                        self.try_merge(tail, (*tail).next);
                    }

                    if previous.is_null() {
                        self.free_list.set((*node).next);
                    } else {
                        (*previous).next = (*node).next;
                    }
                }

                self.counters.record_reallocation();
                return Ok(NonNull::slice_from_raw_parts(ptr, new_size));
            }

            // Forward-extend in place when a free span starts exactly at
            // this allocation's end and the merged span covers the request.
            // SAFETY: successor is either null or a valid header.
            let can_extend = !successor.is_null()
                && successor as usize == unsafe { node_end(node) }
                && current_size + NODE_SIZE + unsafe { (*successor).size } >= new_size;

            if can_extend {
                // SAFETY: successor is byte-adjacent, so absorbing it keeps
                // the node's span contiguous; the split gives any excess
                // back to the list.
                unsafe {
                    (*node).size += NODE_SIZE + (*successor).size;
                    (*node).next = (*successor).next;

                    self.split_node_if_possible(node, new_size + align);

                    if previous.is_null() {
                        self.free_list.set((*node).next);
                    } else {
                        (*previous).next = (*node).next;
                    }
                }

                self.counters.record_reallocation();
                return Ok(NonNull::slice_from_raw_parts(ptr, new_size));
            }
        }

        // Move path: allocate first so failure leaves the original intact.
        let new_ptr = self.allocate(new_layout)?;

        // SAFETY: both regions are live and disjoint; the copy length is
        // bounded by both payload spans.
        unsafe {
            ptr::copy_nonoverlapping(
                ptr.as_ptr(),
                new_ptr.as_ptr().cast::<u8>(),
                core::cmp::min(new_size, current_size),
            );
            self.free(ptr);
        }

        self.counters.record_reallocation();
        Ok(new_ptr)
    }

    /// Lowest-address free node with `size >= requested`, plus its
    /// predecessor in the list
    fn first_fit(&self, requested: usize) -> Option<(*mut FreeNode, *mut FreeNode)> {
        let mut previous: *mut FreeNode = ptr::null_mut();
        let mut node = self.free_list.get();

        while !node.is_null() {
            // SAFETY: list nodes are valid headers.
            unsafe {
                if (*node).size >= requested {
                    return Some((node, previous));
                }
                previous = node;
                node = (*node).next;
            }
        }

        None
    }

    /// Highest-address free node strictly below `node`, or null
    ///
    /// # Safety
    /// The free list must be well formed.
    unsafe fn previous_free_node(&self, node: *mut FreeNode) -> *mut FreeNode {
        let mut previous: *mut FreeNode = ptr::null_mut();
        let mut current = self.free_list.get();

        while !current.is_null() && (current as usize) < node as usize {
            // SAFETY: list traversal over valid headers.
            unsafe {
                previous = current;
                current = (*current).next;
            }
        }

        previous
    }

    /// Carves the tail of `node` into a new free node when the remainder
    /// after `allocated_size` payload bytes is worth keeping
    ///
    /// # Safety
    /// `node` must be a valid header with `size >= allocated_size`, and its
    /// `next` must point at the node's list successor (or null).
    unsafe fn split_node_if_possible(&self, node: *mut FreeNode, allocated_size: usize) {
        // SAFETY: node is a valid header per the caller's contract.
        unsafe {
            if (*node).size < allocated_size + NODE_SIZE + SPLITTING_THRESHOLD {
                return;
            }

            let new_addr = align_up(payload_start(node) + allocated_size, NODE_ALIGN);
            let new_node = self.buffer.ptr_at(new_addr).cast::<FreeNode>();

            // Order matters: the tail's size reads the old node_end before
            // the node's own size shrinks.
            new_node.write(FreeNode {
                size: node_end(node) - (new_addr + NODE_SIZE),
                next: (*node).next,
            });

            (*node).size = new_addr - payload_start(node);
            (*node).next = new_node;
        }
    }

    /// Merges byte-adjacent neighbors after an insertion
    ///
    /// `previous` was just linked before `node`; at most two merges are
    /// possible per call given the no-adjacency invariant, so the forward
    /// merge is checked once more after a successful first merge.
    ///
    /// # Safety
    /// `previous` must be a valid header; `node` is its list successor and
    /// may be null.
    unsafe fn try_merge(&self, previous: *mut FreeNode, node: *mut FreeNode) {
        // SAFETY: headers are valid per the caller's contract; every merge
        // rewrites size/next of a node that stays in the list.
        unsafe {
            if !node.is_null() && node_end(previous) == node as usize {
                (*previous).size += NODE_SIZE + (*node).size;
                (*previous).next = (*node).next;

                let next = (*previous).next;
                if !next.is_null() && node_end(previous) == next as usize {
                    (*previous).size += NODE_SIZE + (*next).size;
                    (*previous).next = (*next).next;
                }
            } else if !node.is_null() {
                let next = (*node).next;
                if !next.is_null() && node_end(node) == next as usize {
                    (*node).size += NODE_SIZE + (*next).size;
                    (*node).next = (*next).next;
                }
            }
        }
    }
}

unsafe impl Allocator for FreeListAllocator {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        FreeListAllocator::allocate(self, layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        // The back-pointer recovers the span; the layout is not needed.
        // SAFETY: forwarded caller contract.
        unsafe { self.free(ptr) };
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        _old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        // SAFETY: forwarded caller contract.
        unsafe { FreeListAllocator::reallocate(self, ptr, new_layout) }
    }
}

impl MemoryUsage for FreeListAllocator {
    /// Bytes not currently available as free payload, header and padding
    /// overhead included
    fn used_memory(&self) -> usize {
        self.total_size() - self.free_size()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.free_size())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.total_size())
    }
}

impl Resettable for FreeListAllocator {
    unsafe fn reset(&self) {
        let node_addr = align_up(self.buffer.start_addr(), NODE_ALIGN);
        // SAFETY: construction validated that a single node fits.
        let node = unsafe { self.buffer.ptr_at(node_addr) }.cast::<FreeNode>();
        unsafe {
            node.write(FreeNode {
                size: self.buffer.end_addr() - (node_addr + NODE_SIZE),
                next: ptr::null_mut(),
            });
        }
        self.free_list.set(node);
    }
}

impl StatisticsProvider for FreeListAllocator {
    fn statistics(&self) -> AllocatorStats {
        self.counters.snapshot(self.used_memory())
    }

    fn reset_statistics(&self) {
        self.counters.reset();
    }

    fn statistics_enabled(&self) -> bool {
        self.counters.enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_free_size_accounts_for_one_header() {
        let allocator = FreeListAllocator::new(4096).expect("allocator");
        assert!(allocator.free_size() >= 4096 - NODE_SIZE - NODE_ALIGN);
        assert!(allocator.free_size() < 4096);
    }

    #[test]
    fn init_rejects_tiny_buffers() {
        assert!(FreeListAllocator::new(NODE_SIZE).is_err());
    }

    #[test]
    fn allocate_free_restores_free_size() {
        let allocator = FreeListAllocator::new(4096).expect("allocator");
        let initial = allocator.free_size();
        let layout = Layout::from_size_align(100, 8).unwrap();

        let ptr = allocator.allocate(layout).expect("allocation");
        assert!(allocator.free_size() < initial);

        unsafe { allocator.free(ptr.cast()) };
        assert_eq!(allocator.free_size(), initial);
    }

    #[test]
    fn split_keeps_remainder_allocatable() {
        let allocator = FreeListAllocator::new(4096).expect("allocator");
        let layout = Layout::from_size_align(64, 8).unwrap();

        let _a = allocator.allocate(layout).expect("allocation");
        let _b = allocator.allocate(layout).expect("allocation");
        assert!(allocator.free_size() > 3000);
    }

    #[test]
    fn no_fit_leaves_free_list_unchanged() {
        let allocator = FreeListAllocator::new(1024).expect("allocator");
        let before = allocator.free_size();

        let huge = Layout::from_size_align(4096, 8).unwrap();
        for _ in 0..4 {
            assert!(allocator.allocate(huge).is_err());
            assert_eq!(allocator.free_size(), before);
        }
    }
}
