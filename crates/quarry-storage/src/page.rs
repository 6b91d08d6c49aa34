//! Fixed-capacity record pages.
//!
//! On disk a page is exactly `page_size` bytes:
//!
//! ```text
//! +--------------+----------+----------+-----+--------------+
//! | record_count | record 0 | record 1 | ... | zero padding |
//! +--------------+----------+----------+-----+--------------+
//!     u32 LE
//! ```
//!
//! Records are self-sized (their first field is their length), so no slot
//! array is needed. A record's slot is its position in append order.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use quarry_common::{QuarryError, QuarryResult, PAGE_HEADER_SIZE};

use crate::record::Record;

/// A fixed-capacity container of packed records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    page_size: usize,
    records: Vec<Record>,
    used: usize,
}

impl Page {
    /// Creates an empty page.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            records: Vec::new(),
            used: PAGE_HEADER_SIZE,
        }
    }

    /// Appends a record. Returns false when it does not fit; the caller then
    /// flushes this page and starts a new one.
    pub fn append(&mut self, record: &Record) -> bool {
        if self.used + record.len() > self.page_size {
            return false;
        }
        self.used += record.len();
        self.records.push(record.clone());
        true
    }

    /// Returns the record at `slot`.
    pub fn get(&self, slot: usize) -> Option<&Record> {
        self.records.get(slot)
    }

    /// Records in slot order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Number of records on the page.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when the page holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Bytes still available for records.
    pub fn free_space(&self) -> usize {
        self.page_size - self.used
    }

    /// Largest record an empty page of this size accepts.
    pub fn max_record_size(page_size: usize) -> usize {
        page_size.saturating_sub(PAGE_HEADER_SIZE)
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.used = PAGE_HEADER_SIZE;
    }

    /// Serializes the page to exactly `page_size` bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.page_size);
        buf.put_u32_le(u32::try_from(self.records.len()).unwrap_or(u32::MAX));
        for record in &self.records {
            buf.put_slice(record.as_bytes());
        }
        buf.resize(self.page_size, 0);
        buf.freeze()
    }

    /// Decodes a page previously produced by [`Page::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Corruption`] if the buffer size or any record
    /// header is inconsistent.
    pub fn from_bytes(data: Bytes, page_size: usize) -> QuarryResult<Self> {
        if data.len() != page_size || page_size < PAGE_HEADER_SIZE {
            return Err(QuarryError::corruption(format!(
                "page buffer is {} bytes, expected {page_size}",
                data.len()
            )));
        }
        let count = (&data[..PAGE_HEADER_SIZE]).get_u32_le() as usize;
        let mut page = Self::new(page_size);
        let mut pos = PAGE_HEADER_SIZE;
        for slot in 0..count {
            if pos + 4 > data.len() {
                return Err(QuarryError::corruption(format!(
                    "record {slot} header past end of page"
                )));
            }
            let len = (&data[pos..pos + 4]).get_u32_le() as usize;
            if len < 4 || pos + len > data.len() {
                return Err(QuarryError::corruption(format!(
                    "record {slot} of {len} bytes overruns page"
                )));
            }
            let record = Record::from_bytes(data.slice(pos..pos + len))?;
            page.used += record.len();
            page.records.push(record);
            pos += len;
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn record(i: i32) -> Record {
        Record::from_values(&[Value::Int(i), Value::Str(format!("row-{i}"))])
    }

    #[test]
    fn test_append_until_full() {
        let mut page = Page::new(128);
        let mut appended = 0;
        while page.append(&record(appended)) {
            appended += 1;
        }
        assert!(appended > 0);
        assert_eq!(page.len(), appended as usize);
        assert!(page.free_space() < record(appended).len());
    }

    #[test]
    fn test_round_trip() {
        let mut page = Page::new(256);
        for i in 0..5 {
            assert!(page.append(&record(i)));
        }
        let bytes = page.to_bytes();
        assert_eq!(bytes.len(), 256);

        let decoded = Page::from_bytes(bytes, 256).unwrap();
        assert_eq!(decoded, page);
        assert_eq!(decoded.get(3).unwrap().int(0).unwrap(), 3);
        assert!(decoded.get(5).is_none());
    }

    #[test]
    fn test_rejects_bad_buffers() {
        let page = Page::new(64);
        assert!(Page::from_bytes(page.to_bytes(), 128).is_err());

        let mut raw = BytesMut::zeroed(64);
        raw[0] = 1;
        raw[4] = 200;
        assert!(Page::from_bytes(raw.freeze(), 64).is_err());
    }

    #[test]
    fn test_oversized_record_never_fits() {
        let big = Record::from_values(&[Value::Str("x".repeat(100))]);
        let mut page = Page::new(64);
        assert!(!page.append(&big));
        assert!(big.len() > Page::max_record_size(64));
    }
}
