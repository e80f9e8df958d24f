//! Linked-list buddy free-space index.
//!
//! Free blocks of a given level are threaded into a doubly-linked list whose
//! head lives in `BuddyHeap::free_lists[level]`. The links themselves live
//! inside the free block's own payload — safe, since a free block's payload
//! is otherwise unused — and are never read once the block is taken.

use std::ptr;

use crate::addr;
use crate::error::PageSourceError;
use crate::header::{Flag, Header};
use crate::level::{self, level_for, LEVELS, MAX_LEVEL};
use crate::page::new_page;

/// Linkage pair threaded through a free block's payload.
#[repr(C)]
#[derive(Clone, Copy)]
struct FreeLink {
    prev: *mut Header,
    next: *mut Header,
}

const EMPTY_LINK: FreeLink = FreeLink {
    prev: ptr::null_mut(),
    next: ptr::null_mut(),
};

/// # Safety
/// `header` must point at the start of a live block at least
/// `HEADER_SIZE` bytes long.
unsafe fn link_mut(header: *mut Header) -> *mut FreeLink {
    Header::payload_of(header).cast::<FreeLink>()
}

/// A buddy-strategy engine instance: owns the pages it has mapped and the
/// free-lists indexing them. Not a process-wide global — see DESIGN.md.
pub struct BuddyHeap {
    free_lists: [*mut Header; LEVELS],
    pages_mapped: usize,
}

// Safety: the raw pointers here are only ever dereferenced through `&mut
// self` or through `Locked<BuddyHeap>`'s mutex, never concurrently.
unsafe impl Send for BuddyHeap {}

impl Default for BuddyHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl BuddyHeap {
    pub fn new() -> Self {
        Self {
            free_lists: [ptr::null_mut(); LEVELS],
            pages_mapped: 0,
        }
    }

    /// Returns a writable region of at least `size` bytes, or null on
    /// failure or a zero-length request.
    pub fn allocate(&mut self, size: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        let Some(level) = level_for(size) else {
            debug_assert!(false, "requested size {size} exceeds a single page");
            return ptr::null_mut();
        };
        match self.find(level) {
            Ok(header) => unsafe {
                (*header).flag = Flag::Taken;
                (*header).level = level;
                Header::payload_of(header)
            },
            Err(_) => ptr::null_mut(),
        }
    }

    /// Releases a region previously returned by `allocate` on this instance.
    /// Null is a no-op.
    pub fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        unsafe {
            let header = Header::from_payload(ptr);
            debug_assert!(!(*header).is_free(), "double free detected");
            self.insert(header);
        }
    }

    /// Count of free blocks per level, for the out-of-core diagnostic
    /// printer. Read-only; never mutates the index.
    pub fn free_list_summary(&self) -> [usize; LEVELS] {
        let mut counts = [0usize; LEVELS];
        for (level, count) in counts.iter_mut().enumerate() {
            let mut node = self.free_lists[level];
            while !node.is_null() {
                *count += 1;
                node = unsafe { (*link_mut(node)).next };
            }
        }
        counts
    }

    /// Number of pages this instance has mapped over its lifetime.
    pub fn pages_mapped(&self) -> usize {
        self.pages_mapped
    }

    fn push_front(&mut self, level: u8, header: *mut Header) {
        unsafe {
            let old_head = self.free_lists[level as usize];
            link_mut(header).write(FreeLink {
                prev: ptr::null_mut(),
                next: old_head,
            });
            if !old_head.is_null() {
                (*link_mut(old_head)).prev = header;
            }
            self.free_lists[level as usize] = header;
            (*header).flag = Flag::Free;
            (*header).level = level;
        }
    }

    fn pop_front(&mut self, level: u8) -> Option<*mut Header> {
        let head = self.free_lists[level as usize];
        if head.is_null() {
            return None;
        }
        unsafe {
            let next = (*link_mut(head)).next;
            if !next.is_null() {
                (*link_mut(next)).prev = ptr::null_mut();
            }
            self.free_lists[level as usize] = next;
        }
        Some(head)
    }

    fn remove(&mut self, level: u8, header: *mut Header) {
        unsafe {
            let link = *link_mut(header);
            if !link.prev.is_null() {
                (*link_mut(link.prev)).next = link.next;
            } else {
                self.free_lists[level as usize] = link.next;
            }
            if !link.next.is_null() {
                (*link_mut(link.next)).prev = link.prev;
            }
        }
    }

    /// Returns a free block of level `L`, allocating more pages as needed.
    fn find(&mut self, level: u8) -> Result<*mut Header, PageSourceError> {
        if let Some(head) = self.pop_front(level) {
            unsafe { link_mut(head).write(EMPTY_LINK) };
            return Ok(head);
        }

        if level == MAX_LEVEL {
            let page = new_page()?;
            self.pages_mapped += 1;
            let header = page.as_ptr().cast::<Header>();
            unsafe {
                header.write(Header::new(MAX_LEVEL, Flag::Free));
                link_mut(header).write(EMPTY_LINK);
            }
            return Ok(header);
        }

        let parent = self.find(level + 1)?;
        unsafe {
            (*parent).level = level;
            link_mut(parent).write(EMPTY_LINK);
        }

        let secondary = addr::buddy_of(parent.cast::<u8>(), level).cast::<Header>();
        unsafe {
            secondary.write(Header::new(level, Flag::Free));
        }
        self.push_front(level, secondary);

        Ok(parent)
    }

    /// Releases block `block` back into the index, merging with its buddy
    /// while possible.
    fn insert(&mut self, mut block: *mut Header) {
        unsafe {
            let mut level = (*block).level;
            while level < MAX_LEVEL {
                let buddy = addr::buddy_of(block.cast::<u8>(), level).cast::<Header>();
                let buddy_is_free_same_level = (*buddy).is_free() && (*buddy).level == level;
                if !buddy_is_free_same_level {
                    break;
                }
                self.remove(level, buddy);
                block = addr::primary_of(block.cast::<u8>(), level).cast::<Header>();
                level += 1;
                (*block).level = level;
            }
            self.push_front(level, block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_zero_returns_null() {
        let mut heap = BuddyHeap::new();
        assert!(heap.allocate(0).is_null());
    }

    #[test]
    fn free_of_null_is_a_no_op() {
        let mut heap = BuddyHeap::new();
        heap.free(ptr::null_mut());
    }

    /// S1: two 48-byte requests each round up to level 1 (64 bytes); their
    /// payload pointers are at least one block apart.
    #[test]
    fn two_small_allocations_land_in_distinct_blocks() {
        let mut heap = BuddyHeap::new();
        let p = heap.allocate(48);
        let q = heap.allocate(48);
        assert!(!p.is_null() && !q.is_null());
        let diff = (p as usize).abs_diff(q as usize);
        assert!(diff >= level::size_of_level(1));
    }

    /// S3: a 1000-byte request lands in a level-5 (1024-byte) block and can
    /// hold data at both ends.
    #[test]
    fn large_allocation_is_fully_writable() {
        let mut heap = BuddyHeap::new();
        let p = heap.allocate(1000);
        assert!(!p.is_null());
        unsafe {
            p.write(0xAB);
            p.add(999).write(0xAB);
            assert_eq!(p.read(), 0xAB);
            assert_eq!(p.add(999).read(), 0xAB);
        }
    }

    /// S4: after freeing every small block on a page, the space coalesces
    /// back into a single page-sized free block that a large request can use.
    #[test]
    fn freed_small_blocks_coalesce_into_a_full_page() {
        let mut heap = BuddyHeap::new();
        let mut ptrs = Vec::new();
        for _ in 0..128 {
            let p = heap.allocate(8);
            assert!(!p.is_null());
            ptrs.push(p);
        }
        assert_eq!(heap.pages_mapped(), 1);
        for p in ptrs {
            heap.free(p);
        }
        // S6 round-trip: exactly one level-7 free block remains.
        let summary = heap.free_list_summary();
        assert_eq!(summary[MAX_LEVEL as usize], 1);
        assert!(summary[..MAX_LEVEL as usize].iter().all(|&c| c == 0));

        let big = heap.allocate(4000);
        assert!(!big.is_null());
        assert_eq!(heap.pages_mapped(), 1);
    }

    #[test]
    fn disjointness_holds_across_many_sizes() {
        let mut heap = BuddyHeap::new();
        let mut live = Vec::new();
        for i in 0..64usize {
            let size = 8 + (i * 17) % 500;
            let p = heap.allocate(size);
            assert!(!p.is_null());
            live.push((p, size));
        }
        for i in 0..live.len() {
            for j in (i + 1)..live.len() {
                let (p, sp) = live[i];
                let (q, sq) = live[j];
                let (p, q) = (p as usize, q as usize);
                let overlap = p < q + sq && q < p + sp;
                assert!(!overlap, "blocks {i} and {j} overlap");
            }
        }
    }

    #[test]
    fn no_growth_on_repeated_alloc_free_of_the_same_size() {
        let mut heap = BuddyHeap::new();
        let warmup = heap.allocate(64);
        heap.free(warmup);
        let pages_after_warmup = heap.pages_mapped();
        for _ in 0..100 {
            let p = heap.allocate(64);
            heap.free(p);
        }
        assert_eq!(heap.pages_mapped(), pages_after_warmup);
    }

    #[test]
    fn finding_handles_out_clears_stale_linkage() {
        let mut heap = BuddyHeap::new();
        let p = heap.allocate(32);
        let header = unsafe { Header::from_payload(p) };
        let link = unsafe { *link_mut(header) };
        assert!(link.prev.is_null() && link.next.is_null());
    }
}
