//! Identifier types for heap storage.
//!
//! These wrap raw numbers so heap page numbers and in-page offsets cannot be
//! mixed up with index page ids or key values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Heap page identifier - the position of a page inside a heap file.
///
/// # Example
///
/// ```rust
/// use quarry_common::types::PageId;
///
/// let page = PageId::new(42);
/// assert_eq!(page.as_u32(), 42);
/// assert_eq!(page.next(), PageId::new(43));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageId(u32);

impl PageId {
    /// The first page of every heap file.
    pub const FIRST: Self = Self(0);

    /// Creates a new `PageId` from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the page id as a `u64` file position multiplier.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }

    /// Returns the next page id.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageId({})", self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PageId {
    #[inline]
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

impl From<PageId> for u32 {
    #[inline]
    fn from(id: PageId) -> Self {
        id.0
    }
}

/// Location of a record inside a heap file: its page and its 0-based slot
/// within that page.
///
/// Index leaves store one of these per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordLocation {
    /// Heap page holding the record.
    pub page: PageId,
    /// Slot of the record within the page.
    pub offset: u32,
}

impl RecordLocation {
    /// Creates a new record location.
    #[inline]
    #[must_use]
    pub const fn new(page: PageId, offset: u32) -> Self {
        Self { page, offset }
    }
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId::new(1) < PageId::new(2));
        assert_eq!(PageId::FIRST.next(), PageId::new(1));
        assert_eq!(PageId::new(u32::MAX).next(), PageId::new(u32::MAX));
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(PageId::new(7).to_string(), "7");
        assert_eq!(format!("{:?}", PageId::new(7)), "PageId(7)");
    }

    #[test]
    fn test_record_location_ordering() {
        let a = RecordLocation::new(PageId::new(0), 5);
        let b = RecordLocation::new(PageId::new(1), 0);
        assert!(a < b);
        assert_eq!(b.to_string(), "1:0");
    }
}
