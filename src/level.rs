//! Size-class arithmetic shared by both free-space index strategies.

use crate::header::HEADER_SIZE;

/// log2 of the smallest block size (32 bytes).
pub const MIN_LEVEL_SHIFT: u32 = 5;

/// Highest level; a level-`MAX_LEVEL` block is a whole page.
pub const MAX_LEVEL: u8 = 7;

/// Number of distinct levels, `0..=MAX_LEVEL`.
pub const LEVELS: usize = MAX_LEVEL as usize + 1;

/// Size in bytes of a page, and of a level-`MAX_LEVEL` block.
pub const PAGE_SIZE: usize = size_of_level(MAX_LEVEL);

/// Size in bytes of the block at a given level.
pub const fn size_of_level(level: u8) -> usize {
    1usize << (level as u32 + MIN_LEVEL_SHIFT)
}

/// Smallest level whose block can hold `requested` payload bytes behind a header.
///
/// Returns `None` if no level up to `MAX_LEVEL` is large enough.
pub fn level_for(requested: usize) -> Option<u8> {
    let total = requested.checked_add(HEADER_SIZE)?;
    (0..LEVELS as u8).find(|&level| size_of_level(level) >= total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_powers_of_two() {
        assert_eq!(size_of_level(0), 32);
        assert_eq!(size_of_level(1), 64);
        assert_eq!(size_of_level(7), 4096);
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn level_for_accounts_for_header() {
        // 48 + 16 = 64, exactly level 1's size (S1 in the allocator contract).
        assert_eq!(level_for(48), Some(1));
        // 1000 + 16 = 1016, fits level 5 (1024) but not level 4 (512).
        assert_eq!(level_for(1000), Some(5));
        // 8 + 16 = 24, fits level 0 (32).
        assert_eq!(level_for(8), Some(0));
    }

    #[test]
    fn level_for_rejects_oversized_requests() {
        assert_eq!(level_for(PAGE_SIZE), None);
        assert_eq!(level_for(usize::MAX), None);
    }
}
