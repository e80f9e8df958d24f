//! Bit-packed bitmem free-space index.
//!
//! Each page carries its own descriptor in its first 32 bytes: a 128-bit
//! occupancy bitmap (one bit per 32-byte unit) plus a `prev`/`next` pair
//! threading the page into a chain. `next` is tagged: because pages are
//! 4096-byte aligned, its low 12 bits are free to carry the page's current
//! free-unit count instead of address bits.

use std::ptr;

use crate::addr;
use crate::error::PageSourceError;
use crate::header::{Flag, Header};
use crate::level::{level_for, size_of_level, PAGE_SIZE};
use crate::page::new_page;

const UNIT_SIZE: usize = size_of_level(0);
const UNITS_PER_PAGE: usize = PAGE_SIZE / UNIT_SIZE;
const TAG_MASK: usize = PAGE_SIZE - 1;

/// Highest level bitmem can ever hand out.
///
/// Unit 0 of every page is permanently taken by the page descriptor itself,
/// so a full page (level `MAX_LEVEL`, all 128 units) never has a free
/// aligned run of that size to offer — the level-`MAX_LEVEL` request would
/// fail on every page, fresh or not. Requests above this level return null
/// from `allocate` rather than mapping pages forever in search of a run that
/// can't exist; the buddy strategy has no such ceiling since it never
/// reserves part of its own blocks for bookkeeping.
const MAX_SERVICEABLE_LEVEL: u8 = crate::level::MAX_LEVEL - 1;

/// The 32-byte page descriptor, co-located with the page it describes.
#[repr(C)]
struct PageHead {
    bitmap: [u8; 16],
    next: *mut PageHead,
    prev: *mut PageHead,
}

/// A page address plus the free-unit count smuggled into its low 12 bits.
///
/// Never exposed outside this module; every read/write of `next` goes
/// through `decode`/`encode`.
#[derive(Clone, Copy)]
struct PageLink {
    page: *mut PageHead,
    free_units: u8,
}

impl PageLink {
    fn decode(raw: *mut PageHead) -> Self {
        let bits = raw as usize;
        PageLink {
            page: (bits & !TAG_MASK) as *mut PageHead,
            free_units: (bits & TAG_MASK) as u8,
        }
    }

    fn encode(self) -> *mut PageHead {
        (((self.page as usize) & !TAG_MASK) | (self.free_units as usize & TAG_MASK)) as *mut PageHead
    }

    fn is_end_of_chain(self) -> bool {
        self.page.is_null()
    }
}

fn bit_is_free(bitmap: &[u8; 16], unit: usize) -> bool {
    let byte = unit / 8;
    let bit = unit % 8;
    (bitmap[byte] >> bit) & 1 == 1
}

fn set_bit(bitmap: &mut [u8; 16], unit: usize, free: bool) {
    let byte = unit / 8;
    let bit = unit % 8;
    if free {
        bitmap[byte] |= 1 << bit;
    } else {
        bitmap[byte] &= !(1 << bit);
    }
}

fn aligned_run_is_free(bitmap: &[u8; 16], offset: usize, units: usize) -> bool {
    (offset..offset + units).all(|u| bit_is_free(bitmap, u))
}

fn mark_run(bitmap: &mut [u8; 16], offset: usize, units: usize, free: bool) {
    for u in offset..offset + units {
        set_bit(bitmap, u, free);
    }
}

/// One diagnostic line: a page's address and current free-unit count.
pub struct PageSummary {
    pub addr: usize,
    pub free_units: u8,
}

/// A bitmem-strategy engine instance. Owns the chain of pages it has mapped.
pub struct BitmemHeap {
    head: *mut PageHead,
    pages_mapped: usize,
}

// Safety: raw pointers are only ever dereferenced through `&mut self` or
// through `Locked<BitmemHeap>`'s mutex.
unsafe impl Send for BitmemHeap {}

impl Default for BitmemHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl BitmemHeap {
    pub fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            pages_mapped: 0,
        }
    }

    pub fn allocate(&mut self, size: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        let Some(level) = level_for(size) else {
            debug_assert!(false, "requested size {size} exceeds a single page");
            return ptr::null_mut();
        };
        if level > MAX_SERVICEABLE_LEVEL {
            log::debug!(
                "bitmem: {size}-byte request needs level {level}, above this strategy's \
                 serviceable maximum of {MAX_SERVICEABLE_LEVEL} (unit 0 is always reserved \
                 for the page descriptor)"
            );
            return ptr::null_mut();
        }
        match self.find(level) {
            Ok(header) => unsafe { Header::payload_of(header) },
            Err(_) => ptr::null_mut(),
        }
    }

    pub fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        unsafe {
            let header = Header::from_payload(ptr);
            debug_assert!(!(*header).is_free(), "double free detected");
            self.free_block(header);
        }
    }

    /// One entry per linked page, for the out-of-core diagnostic printer.
    /// Read-only; never mutates the chain.
    pub fn page_chain_summary(&self) -> Vec<PageSummary> {
        let mut out = Vec::new();
        let mut page = self.head;
        while !page.is_null() {
            let link = PageLink::decode(unsafe { (*page).next });
            out.push(PageSummary {
                addr: page as usize,
                free_units: link.free_units,
            });
            page = link.page;
        }
        out
    }

    pub fn pages_mapped(&self) -> usize {
        self.pages_mapped
    }

    fn new_linked_page(&mut self) -> Result<*mut PageHead, PageSourceError> {
        let mapped = new_page()?;
        self.pages_mapped += 1;
        let page = mapped.as_ptr().cast::<PageHead>();
        unsafe {
            let mut bitmap = [0xFFu8; 16];
            set_bit(&mut bitmap, 0, false); // unit 0 holds the descriptor itself
            (*page).bitmap = bitmap;
            (*page).prev = ptr::null_mut();
            (*page).next = PageLink {
                page: ptr::null_mut(),
                free_units: (UNITS_PER_PAGE - 1) as u8,
            }
            .encode();
        }
        Ok(page)
    }

    fn set_free_units(&mut self, page: *mut PageHead, free_units: usize) {
        unsafe {
            let current = PageLink::decode((*page).next);
            (*page).next = PageLink {
                page: current.page,
                free_units: free_units as u8,
            }
            .encode();
        }
    }

    fn link_tail(&mut self, tail: *mut PageHead, new_page: *mut PageHead) {
        unsafe {
            let current = PageLink::decode((*tail).next);
            (*tail).next = PageLink {
                page: new_page,
                free_units: current.free_units,
            }
            .encode();
            (*new_page).prev = tail;
        }
    }

    /// Tries to find a block of `level` in `page`; `None` if it has no room.
    fn page_take(&mut self, page: *mut PageHead, level: u8) -> Option<*mut Header> {
        let units_needed = 1usize << level;
        let free_units = PageLink::decode(unsafe { (*page).next }).free_units as usize;
        if free_units < units_needed {
            return None;
        }

        let mut offset = 0usize;
        while offset + units_needed <= UNITS_PER_PAGE {
            let bitmap = unsafe { &mut (*page).bitmap };
            if aligned_run_is_free(bitmap, offset, units_needed) {
                mark_run(bitmap, offset, units_needed, false);
                let header = unsafe { (page as *mut u8).add(offset * UNIT_SIZE).cast::<Header>() };
                unsafe { header.write(Header::new(level, Flag::Taken)) };
                self.set_free_units(page, free_units - units_needed);
                return Some(header);
            }
            offset += units_needed;
        }
        None
    }

    /// Iterates the page chain from the head; allocates a new page and
    /// retries if none has room.
    fn find(&mut self, level: u8) -> Result<*mut Header, PageSourceError> {
        if self.head.is_null() {
            self.head = self.new_linked_page()?;
        }

        let mut page = self.head;
        loop {
            if let Some(block) = self.page_take(page, level) {
                return Ok(block);
            }
            let link = PageLink::decode(unsafe { (*page).next });
            if link.is_end_of_chain() {
                break;
            }
            page = link.page;
        }

        let fresh = self.new_linked_page()?;
        self.link_tail(page, fresh);
        // `allocate` already rejects levels above `MAX_SERVICEABLE_LEVEL`, so
        // a fresh page should always have room here; this arm is a defensive
        // fallback for any other internal caller of `find`.
        self.page_take(fresh, level).ok_or_else(|| {
            PageSourceError(Some(format!(
                "a freshly mapped page had no room for a level-{level} block"
            )))
        })
    }

    fn free_block(&mut self, header: *mut Header) {
        unsafe {
            let level = (*header).level;
            let units = 1usize << level;
            let page = addr::page_base_of(header.cast::<u8>()).cast::<PageHead>();
            let offset = addr::unit_offset(header.cast::<u8>());
            mark_run(&mut (*page).bitmap, offset, units, true);
            let free_units = PageLink::decode((*page).next).free_units as usize;
            self.set_free_units(page, free_units + units);
        }
    }
}
