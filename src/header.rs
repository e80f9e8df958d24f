//! The fixed-size prefix placed at the start of every block.

/// Bytes every block reserves for its header, regardless of level.
///
/// The smallest block (32 bytes, level 0) is left with exactly 16 payload
/// bytes once this is subtracted — just enough to hold a `FreeLink` when the
/// block is free (see `crate::buddy::FreeLink`), and nothing left over for a
/// taken block's user data at that level.
pub const HEADER_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Flag {
    Free = 0,
    Taken = 1,
}

/// The block prefix. Lives at the very start of a block; the user-visible
/// pointer is `HEADER_SIZE` bytes past it — a fixed, documented span, not
/// `size_of::<Header>()`, which is smaller.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct Header {
    pub level: u8,
    pub flag: Flag,
}

impl Header {
    pub const fn new(level: u8, flag: Flag) -> Self {
        Self { level, flag }
    }

    pub fn is_free(&self) -> bool {
        matches!(self.flag, Flag::Free)
    }

    /// Recovers the header for the block whose payload starts at `payload`.
    ///
    /// # Safety
    /// `payload` must be a pointer previously returned by this crate's
    /// `allocate`, still `HEADER_SIZE` bytes into a live block.
    pub unsafe fn from_payload(payload: *mut u8) -> *mut Header {
        payload.sub(HEADER_SIZE).cast::<Header>()
    }

    /// The payload pointer for the block whose header starts at `header`.
    ///
    /// # Safety
    /// `header` must point at the start of a live block of at least
    /// `HEADER_SIZE` bytes.
    pub unsafe fn payload_of(header: *mut Header) -> *mut u8 {
        header.cast::<u8>().add(HEADER_SIZE)
    }
}
