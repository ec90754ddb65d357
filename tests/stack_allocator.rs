//! Integration tests for the stack allocator

use nebula_arena::allocator::{MemoryUsage, Resettable, StackAllocator, StackConfig};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::alloc::Layout;

#[test]
fn test_stack_allocator_basic() {
    let allocator = StackAllocator::new(4096).expect("Failed to create stack allocator");

    unsafe {
        let layout = Layout::from_size_align(128, 8).unwrap();
        let ptr = allocator.allocate(layout).expect("Allocation failed");

        std::ptr::write_bytes(ptr.cast::<u8>().as_ptr(), 0x55, 128);
        assert_eq!(*ptr.cast::<u8>().as_ptr(), 0x55);

        allocator.free(ptr.cast());
        assert_eq!(allocator.allocated_size(), 0);
    }
}

#[test]
fn test_stack_allocator_lifo_round_trip() {
    let allocator = StackAllocator::new(8192).expect("Failed to create stack allocator");
    let layout = Layout::from_size_align(64, 8).unwrap();

    unsafe {
        let mut pointers = Vec::new();
        for value in 0u8..16 {
            let ptr = allocator.allocate(layout).expect("Allocation failed");
            std::ptr::write_bytes(ptr.cast::<u8>().as_ptr(), value, 64);
            pointers.push(ptr);
        }

        // Contents stay intact while the stack grows
        for (value, ptr) in pointers.iter().enumerate() {
            assert_eq!(*ptr.cast::<u8>().as_ptr(), value as u8);
        }

        for ptr in pointers.into_iter().rev() {
            allocator.free(ptr.cast());
        }
        assert_eq!(allocator.allocated_size(), 0);
    }
}

#[test]
fn test_stack_allocator_varied_alignment_round_trip() {
    // 8 KiB arena, up to 200 allocations of random size and alignment,
    // freed in reverse order; the stack must drain to empty.
    let allocator = StackAllocator::with_config(8192, StackConfig::production())
        .expect("Failed to create stack allocator");
    let mut rng = StdRng::seed_from_u64(0x57AC);

    unsafe {
        let mut pointers = Vec::new();
        for _ in 0..200 {
            let size = rng.gen_range(1..=64);
            let align = 1usize << rng.gen_range(0..=6);
            let layout = Layout::from_size_align(size, align).unwrap();

            match allocator.allocate(layout) {
                Ok(ptr) => {
                    assert_eq!(ptr.cast::<u8>().as_ptr() as usize % align, 0);
                    pointers.push(ptr);
                }
                Err(_) => break,
            }
        }
        assert!(!pointers.is_empty(), "expected at least one success");

        for ptr in pointers.into_iter().rev() {
            allocator.free(ptr.cast());
        }
        assert_eq!(allocator.allocated_size(), 0);
    }
}

#[test]
fn test_stack_allocator_free_then_reallocate_same_pointer() {
    let allocator = StackAllocator::new(4096).expect("Failed to create stack allocator");

    unsafe {
        for shift in 0..6 {
            let layout = Layout::from_size_align(48, 1usize << shift).unwrap();

            let first = allocator.allocate(layout).expect("Allocation failed");
            let addr = first.cast::<u8>().as_ptr() as usize;
            allocator.free(first.cast());

            let second = allocator.allocate(layout).expect("Allocation failed");
            assert_eq!(second.cast::<u8>().as_ptr() as usize, addr);
            allocator.free(second.cast());
        }
    }
}

#[test]
fn test_stack_allocator_reset() {
    let allocator = StackAllocator::new(2048).expect("Failed to create stack allocator");
    let layout = Layout::from_size_align(128, 8).unwrap();

    unsafe {
        allocator.allocate(layout).expect("Allocation failed");
        allocator.allocate(layout).expect("Allocation failed");
        assert!(allocator.allocated_size() > 0);

        allocator.reset();
        assert_eq!(allocator.allocated_size(), 0);
        assert_eq!(allocator.remaining_size(), allocator.capacity());
    }
}

#[test]
fn test_stack_allocator_exhaustion_recovers() {
    let allocator = StackAllocator::with_config(256, StackConfig::production())
        .expect("Failed to create stack allocator");

    unsafe {
        let big = Layout::from_size_align(160, 8).unwrap();
        let ptr = allocator.allocate(big).expect("Allocation failed");

        // No room for a second one of the same size
        assert!(allocator.allocate(big).is_err());

        // Popping the top frees the space again
        allocator.free(ptr.cast());
        let again = allocator.allocate(big).expect("Allocation after free failed");
        allocator.free(again.cast());
    }
}

#[test]
#[should_panic(expected = "stack free out of LIFO order")]
fn test_stack_allocator_out_of_order_free_panics() {
    let allocator = StackAllocator::with_config(1024, StackConfig::production())
        .expect("Failed to create stack allocator");
    let layout = Layout::from_size_align(32, 8).unwrap();

    unsafe {
        let first = allocator.allocate(layout).expect("Allocation failed");
        let _second = allocator.allocate(layout).expect("Allocation failed");
        allocator.free(first.cast());
    }
}

#[test]
fn test_stack_allocator_memory_usage() {
    let allocator = StackAllocator::new(1024).expect("Failed to create stack allocator");

    assert_eq!(allocator.used_memory(), 0);
    assert_eq!(allocator.total_memory(), Some(1024));

    unsafe {
        let layout = Layout::from_size_align(100, 8).unwrap();
        let ptr = allocator.allocate(layout).expect("Allocation failed");
        assert!(allocator.used_memory() >= 100);

        allocator.free(ptr.cast());
        assert_eq!(allocator.used_memory(), 0);
    }
}

proptest! {
    #[test]
    fn prop_lifo_sequences_drain_to_empty(
        requests in proptest::collection::vec((1usize..=128, 0u32..=6), 1..32)
    ) {
        let allocator = StackAllocator::with_config(64 * 1024, StackConfig::production())
            .expect("Failed to create stack allocator");

        unsafe {
            let mut pointers = Vec::new();
            for (size, align_shift) in requests {
                let align = 1usize << align_shift;
                let layout = Layout::from_size_align(size, align).unwrap();
                let ptr = allocator.allocate(layout).expect("Allocation failed");

                prop_assert_eq!(ptr.cast::<u8>().as_ptr() as usize % align, 0);
                pointers.push(ptr);
            }

            for ptr in pointers.into_iter().rev() {
                allocator.free(ptr.cast());
            }
            prop_assert_eq!(allocator.allocated_size(), 0);
        }
    }
}
