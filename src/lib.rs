//! A user-space general-purpose memory allocator that services
//! variable-sized allocation requests by subdividing fixed-size OS-mapped
//! pages into power-of-two blocks.
//!
//! The crate ships two independent free-space index strategies behind a
//! shared header/level layout: [`buddy::BuddyHeap`], a linked-list buddy
//! allocator, and [`bitmem::BitmemHeap`], a bit-packed per-page bitmap
//! allocator. Both request whole 4096-byte pages from the OS through
//! [`page::new_page`] and carve them into blocks of `32 * 2^level` bytes,
//! `level` in `0..=7`.
//!
//! Each engine is a plain, single-threaded, instance-owned value — construct
//! one with `BuddyHeap::new()`/`BitmemHeap::new()` and call `allocate`/`free`
//! on it directly. [`alloc::Locked`] additionally wraps either engine behind
//! a mutex implementing [`std::alloc::GlobalAlloc`], for anyone who wants to
//! install one as `#[global_allocator]`.

pub mod addr;
pub mod alloc;
pub mod bitmem;
pub mod buddy;
pub mod error;
pub mod header;
pub mod level;
pub mod page;

pub use alloc::{Engine, Locked};
pub use bitmem::BitmemHeap;
pub use buddy::BuddyHeap;
pub use error::PageSourceError;
pub use level::{level_for, size_of_level, MAX_LEVEL, PAGE_SIZE};
