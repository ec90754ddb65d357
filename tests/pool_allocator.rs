//! Integration tests for the pool allocator

use nebula_arena::allocator::{Allocator, PoolAllocator};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::alloc::Layout;

#[test]
fn test_pool_allocator_basic() {
    let pool = PoolAllocator::new(4096, 64, 8).expect("Failed to create pool allocator");

    let ptr = pool.allocate_block().expect("Allocation failed");
    unsafe {
        std::ptr::write_bytes(ptr.as_ptr(), 0x42, 64);
        assert_eq!(*ptr.as_ptr(), 0x42);

        pool.free_block(ptr);
    }
    assert_eq!(pool.free_count(), pool.block_count());
}

#[test]
fn test_pool_allocator_counts_invariant() {
    let pool = PoolAllocator::new(4096, 64, 8).expect("Failed to create pool allocator");
    let total = pool.block_count();

    let mut blocks = Vec::new();
    loop {
        assert_eq!(pool.free_count() + pool.used_count(), total);
        match pool.allocate_block() {
            Some(ptr) => blocks.push(ptr),
            None => break,
        }
    }

    assert_eq!(pool.used_count(), total);

    for ptr in blocks {
        unsafe { pool.free_block(ptr) };
        assert_eq!(pool.free_count() + pool.used_count(), total);
    }
    assert_eq!(pool.free_count(), total);
}

#[test]
fn test_pool_allocator_exhaustion_and_shuffled_free() {
    // 4 KiB buffer, 64-byte blocks at 8-byte alignment; drain the pool,
    // then free in shuffled order and expect a full pool again.
    let pool = PoolAllocator::new(4096, 64, 8).expect("Failed to create pool allocator");
    let total = pool.block_count();
    assert!(total >= 63);

    let mut blocks = Vec::new();
    while let Some(ptr) = pool.allocate_block() {
        blocks.push(ptr);
    }

    assert_eq!(blocks.len(), total);
    assert_eq!(pool.used_count(), total);
    assert!(pool.allocate_block().is_none());

    let mut rng = StdRng::seed_from_u64(0x9001);
    blocks.shuffle(&mut rng);
    for ptr in blocks {
        unsafe { pool.free_block(ptr) };
    }

    assert_eq!(pool.free_count(), total);
    assert_eq!(pool.used_count(), 0);
}

#[test]
fn test_pool_allocator_block_alignment_and_disjointness() {
    let pool = PoolAllocator::new(2048, 48, 16).expect("Failed to create pool allocator");

    let mut blocks = Vec::new();
    while let Some(ptr) = pool.allocate_block() {
        assert_eq!(ptr.as_ptr() as usize % 16, 0);
        blocks.push(ptr);
    }

    // Tag every block, then verify no write leaked into a neighbor
    unsafe {
        for (index, ptr) in blocks.iter().enumerate() {
            std::ptr::write_bytes(ptr.as_ptr(), index as u8, pool.block_size());
        }
        for (index, ptr) in blocks.iter().enumerate() {
            assert_eq!(*ptr.as_ptr(), index as u8);
            assert_eq!(*ptr.as_ptr().add(pool.block_size() - 1), index as u8);
        }

        for ptr in blocks {
            pool.free_block(ptr);
        }
    }
}

#[test]
fn test_pool_allocator_block_size_rounded_to_alignment() {
    let pool = PoolAllocator::new(1024, 20, 16).expect("Failed to create pool allocator");
    assert_eq!(pool.block_size(), 32);
    assert_eq!(pool.block_align(), 16);
}

#[test]
fn test_pool_allocator_init_failures() {
    // Rounded block size below pointer size
    assert!(PoolAllocator::new(1024, 2, 2).is_err());
    // Alignment not a power of two
    assert!(PoolAllocator::new(1024, 64, 12).is_err());
    // Buffer too small for even one block
    assert!(PoolAllocator::new(16, 64, 8).is_err());
}

#[test]
fn test_pool_allocator_trait_interface() {
    let pool = PoolAllocator::new(2048, 64, 8).expect("Failed to create pool allocator");

    unsafe {
        // Oversized layouts are rejected up front
        let too_big = Layout::from_size_align(128, 8).unwrap();
        assert!(pool.allocate(too_big).is_err());

        let layout = Layout::from_size_align(48, 8).unwrap();
        let ptr = pool.allocate(layout).expect("Allocation failed");
        assert_eq!(pool.used_count(), 1);

        // Resizing within the block keeps the pointer
        let grown = pool
            .reallocate(ptr.cast(), layout, Layout::from_size_align(64, 8).unwrap())
            .expect("Reallocation failed");
        assert_eq!(grown.cast::<u8>().as_ptr(), ptr.cast::<u8>().as_ptr());

        pool.deallocate(ptr.cast(), layout);
        assert_eq!(pool.used_count(), 0);
    }
}

#[test]
fn test_pool_allocator_caller_buffer() {
    let buffer = vec![0u8; 1024].into_boxed_slice();
    let pool =
        PoolAllocator::from_boxed_slice(buffer, 32, 8).expect("Failed to adopt caller buffer");
    let total = pool.block_count();
    assert!(total >= 31);

    let ptr = pool.allocate_block().expect("Allocation failed");
    unsafe { pool.free_block(ptr) };

    let returned = pool.into_boxed_slice();
    assert_eq!(returned.len(), 1024);
}
