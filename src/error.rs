//! Error types at the crate's single fallible boundary: the page source.

use std::fmt;

/// Failure requesting a fresh page from the OS.
#[derive(Debug, Clone)]
pub struct PageSourceError(pub Option<String>);

impl PageSourceError {
    pub fn errno(errno: i32) -> Self {
        Self(Some(format!("mmap failed with errno {errno}")))
    }
}

impl std::error::Error for PageSourceError {}

impl fmt::Display for PageSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(msg) => write!(f, "{msg}"),
            None => write!(f, "page source failed"),
        }
    }
}
