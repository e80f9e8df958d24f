//! The allocate/free facade and an opt-in `GlobalAlloc` adapter.
//!
//! The published, spec-mandated interface is the plain pointer pair exposed
//! by `BuddyHeap`/`BitmemHeap` directly (§4.5, §9 design notes: a drop-in
//! allocator substitute returns a plain pointer, not an opaque handle).
//! `Locked<T>` is an additive convenience for anyone who wants to install one
//! of these engines as `#[global_allocator]`, generalizing
//! `sleiderr-fzkernel`'s `LockedBuddyAllocator<N>` from a single fixed memory
//! window to the multi-page, OS-backed engines in this crate.

use std::alloc::{GlobalAlloc, Layout};
use std::sync::Mutex;

use crate::bitmem::BitmemHeap;
use crate::buddy::BuddyHeap;

/// Common surface of both free-space index strategies.
pub trait Engine {
    fn allocate(&mut self, size: usize) -> *mut u8;
    fn free(&mut self, ptr: *mut u8);
}

impl Engine for BuddyHeap {
    fn allocate(&mut self, size: usize) -> *mut u8 {
        BuddyHeap::allocate(self, size)
    }

    fn free(&mut self, ptr: *mut u8) {
        BuddyHeap::free(self, ptr)
    }
}

impl Engine for BitmemHeap {
    fn allocate(&mut self, size: usize) -> *mut u8 {
        BitmemHeap::allocate(self, size)
    }

    fn free(&mut self, ptr: *mut u8) {
        BitmemHeap::free(self, ptr)
    }
}

/// Wraps an engine in a mutex so it can back a `#[global_allocator]`.
///
/// The engine types themselves are intentionally `!Sync` (§5: single-threaded
/// by default); this is the one place a mutex is introduced, and only when
/// the caller opts into shared, cross-thread use.
pub struct Locked<T> {
    inner: Mutex<T>,
}

impl<T> Locked<T> {
    pub const fn new(engine: T) -> Self
    where
        T: Sized,
    {
        Self {
            inner: Mutex::new(engine),
        }
    }
}

unsafe impl<T: Engine> GlobalAlloc for Locked<T> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let mut engine = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        engine.allocate(layout.size().max(layout.align()))
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let mut engine = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        engine.free(ptr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_buddy_heap_round_trips_through_global_alloc() {
        let locked = Locked::new(BuddyHeap::new());
        let layout = Layout::from_size_align(48, 8).unwrap();
        unsafe {
            let p = locked.alloc(layout);
            assert!(!p.is_null());
            p.write(0x42);
            assert_eq!(p.read(), 0x42);
            locked.dealloc(p, layout);
        }
    }

    #[test]
    fn locked_bitmem_heap_round_trips_through_global_alloc() {
        let locked = Locked::new(BitmemHeap::new());
        let layout = Layout::from_size_align(100, 8).unwrap();
        unsafe {
            let p = locked.alloc(layout);
            assert!(!p.is_null());
            locked.dealloc(p, layout);
        }
    }
}
