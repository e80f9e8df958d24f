//! Page source: the sole FFI boundary, a thin wrapper over an anonymous mmap.

use std::ptr::NonNull;

use crate::error::PageSourceError;
use crate::level::PAGE_SIZE;

/// A freshly mapped, zero-initialised, page-aligned 4096-byte region.
pub type PagePtr = NonNull<u8>;

/// Requests a fresh page-aligned, zero-initialised 4096-byte region from the
/// OS.
///
/// Never unmaps, never grows an existing mapping; no caching beyond what the
/// free-space index already provides.
pub fn new_page() -> Result<PagePtr, PageSourceError> {
    // Safety: fixed-size, anonymous, non-file-backed mapping; the only FFI
    // call in this crate.
    let addr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            PAGE_SIZE,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if addr == libc::MAP_FAILED {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        log::warn!("page source: mmap failed (errno {errno})");
        return Err(PageSourceError::errno(errno));
    }

    let ptr = addr.cast::<u8>();
    debug_assert!(
        (ptr as usize) & (PAGE_SIZE - 1) == 0,
        "mmap returned a non-page-aligned address"
    );
    log::debug!("page source: mapped new page at {ptr:p}");

    // Safety: MAP_ANONYMOUS pages are zero-filled on first touch; we don't
    // re-zero, and `addr` is non-null (checked against MAP_FAILED above).
    Ok(unsafe { NonNull::new_unchecked(ptr) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_is_aligned_and_zeroed() {
        let page = new_page().expect("mmap should succeed in tests");
        let ptr = page.as_ptr();
        assert_eq!((ptr as usize) & (PAGE_SIZE - 1), 0);
        let bytes = unsafe { std::slice::from_raw_parts(ptr, PAGE_SIZE) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn successive_pages_do_not_overlap() {
        let a = new_page().unwrap();
        let b = new_page().unwrap();
        let (a, b) = (a.as_ptr() as usize, b.as_ptr() as usize);
        assert!(a.abs_diff(b) >= PAGE_SIZE);
    }
}
