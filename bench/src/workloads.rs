//! The eleven allocation patterns the harness times against each strategy:
//! a run of tiny allocations, a zig-zag of two sizes, scattered frees, a
//! batch of large blocks, a ramp of increasing sizes, a sweep of frees, a
//! clamped-size ramp, a wide mix of sizes and frees, evenly spaced frees,
//! alternating alloc/free, and a final cleanup pass.

use std::time::{Duration, Instant};

use crate::errors::BenchError;

pub const TEST_COUNT: usize = 11;

pub const TEST_NAMES: [&str; TEST_COUNT] = [
    "tiny allocations",
    "zig-zag",
    "occasional free",
    "large allocations",
    "increasing size allocations",
    "sweeping free",
    "clamped allocations",
    "random allocations",
    "even free",
    "flipping",
    "complete cleanup",
];

const SLOT_COUNT: usize = 512;

/// Anything that can stand in for a strategy under comparison. `blockmem`'s
/// own `Engine` trait already has this exact shape; the system allocator
/// gets a small local adapter in `main.rs` since `GlobalAlloc` needs a
/// `Layout` on free and `Engine` doesn't carry one.
pub trait Allocator {
    fn allocate(&mut self, size: usize) -> *mut u8;
    fn free(&mut self, ptr: *mut u8);
}

impl<T: blockmem::Engine> Allocator for T {
    fn allocate(&mut self, size: usize) -> *mut u8 {
        blockmem::Engine::allocate(self, size)
    }

    fn free(&mut self, ptr: *mut u8) {
        blockmem::Engine::free(self, ptr)
    }
}

/// Times the eleven workloads against one allocator.
///
/// Mirrors the original harness's fixed slot table: `512` logical pointers,
/// each either empty or holding one live allocation, driven through the same
/// access pattern. Returns an error (rather than silently losing track of a
/// slot) on any double-assign, double-free, or null allocation, since a lost
/// slot would invalidate the comparison between strategies.
pub fn run(allocator: &mut dyn Allocator) -> Result<[Duration; TEST_COUNT], BenchError> {
    let mut slots: Vec<Option<*mut u8>> = vec![None; SLOT_COUNT];
    let mut times = [Duration::ZERO; TEST_COUNT];

    let assign = |allocator: &mut dyn Allocator, slots: &mut [Option<*mut u8>], i: usize, size: usize| -> Result<(), BenchError> {
        if slots[i].is_some() {
            return Err(BenchError(Some(format!("slot {i} was already assigned"))));
        }
        let p = allocator.allocate(size);
        if p.is_null() {
            return Err(BenchError(Some(format!(
                "allocation of {size} bytes at slot {i} returned null"
            ))));
        }
        unsafe { p.write(0xAB) };
        slots[i] = Some(p);
        Ok(())
    };

    let clear = |allocator: &mut dyn Allocator, slots: &mut [Option<*mut u8>], i: usize| -> Result<(), BenchError> {
        match slots[i].take() {
            Some(p) => {
                allocator.free(p);
                Ok(())
            }
            None => Err(BenchError(Some(format!("slot {i} was already empty")))),
        }
    };

    // 0: tiny allocations
    let start = Instant::now();
    for i in 0..50 {
        let size = match i % 3 {
            0 => 8,
            1 => 16,
            _ => 64,
        };
        assign(allocator, &mut slots, i, size)?;
    }
    times[0] = start.elapsed();

    // 1: zig-zag
    let start = Instant::now();
    for i in 50..100 {
        let size = if i % 2 == 0 { 100 } else { 10 };
        assign(allocator, &mut slots, i, size)?;
    }
    times[1] = start.elapsed();

    // 2: occasional free
    let start = Instant::now();
    for i in (3..100).step_by(7) {
        clear(allocator, &mut slots, i)?;
    }
    times[2] = start.elapsed();

    // 3: large allocations, reusing the slots just freed
    let start = Instant::now();
    for i in (3..100).step_by(7) {
        assign(allocator, &mut slots, i, 1000)?;
    }
    times[3] = start.elapsed();

    // 4: increasing size allocations
    let start = Instant::now();
    for i in 100..200 {
        assign(allocator, &mut slots, i, 20 + (i - 100) * 32)?;
    }
    times[4] = start.elapsed();

    // 5: sweeping free
    let start = Instant::now();
    for i in 20..80 {
        clear(allocator, &mut slots, i)?;
    }
    times[5] = start.elapsed();

    // 6: clamped allocations, reusing the slots just swept
    let start = Instant::now();
    for i in 20..80 {
        assign(allocator, &mut slots, i, 8 + ((i - 20) * 13) % 64)?;
    }
    times[6] = start.elapsed();

    // 7: a wide mix of sizes
    let start = Instant::now();
    for i in 200..SLOT_COUNT {
        let size = match i % 8 {
            0 => 5 + ((i - 200) * 31) % 117,
            1..=4 => 64,
            5 | 6 => i,
            _ => 2000,
        };
        assign(allocator, &mut slots, i, size)?;
    }
    times[7] = start.elapsed();

    // 8: even frees
    let start = Instant::now();
    for i in (0..SLOT_COUNT).step_by(2) {
        clear(allocator, &mut slots, i)?;
    }
    times[8] = start.elapsed();

    // 9: flipping — re-fill the even slots, leave the odd ones alone
    let start = Instant::now();
    for i in 0..SLOT_COUNT {
        if i % 2 == 0 {
            assign(allocator, &mut slots, i, 12 + i)?;
        } else {
            clear(allocator, &mut slots, i)?;
        }
    }
    times[9] = start.elapsed();

    // 10: complete cleanup — everything still held is in the even slots
    let start = Instant::now();
    for i in (0..SLOT_COUNT).step_by(2) {
        clear(allocator, &mut slots, i)?;
    }
    times[10] = start.elapsed();

    Ok(times)
}
